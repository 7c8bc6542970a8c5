use crate::edit::TextEdit;
use crate::rules::{Rule, RuleContext, RuleError, RuleOutput};
use serde_json::{json, Value};
use std::collections::HashSet;
use styler_parser::{BinaryOp, Span, TokenKind};

const PRIORITY: i32 = 10;

const ALL_OPERATORS: &[&str] = &[
    "+", "-", "*", "/", "%", "<<", ">>", ">>>", "&", "|", "^", "==", "!=", "<", ">", "<=", ">=",
    "&&", "||",
];

/// Enforces canonical spacing: one space after commas, around binary
/// operators (configurable set) and assignment operators, none just
/// inside parentheses and brackets, and one space between `)` and `{`.
/// Gaps containing comments or line breaks are left alone.
pub struct WhitespaceNormalizer;

impl Rule for WhitespaceNormalizer {
    fn id(&self) -> &'static str {
        "whitespace"
    }

    fn description(&self) -> &'static str {
        "normalize spacing around punctuation and operators"
    }

    fn default_options(&self) -> Value {
        json!({ "binary_operators": ALL_OPERATORS })
    }

    fn validate(&self, options: &Value) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if let Some(value) = options.get("binary_operators") {
            match value.as_array() {
                Some(list) => {
                    for entry in list {
                        match entry.as_str() {
                            Some(op) if ALL_OPERATORS.contains(&op) => {}
                            other => errors.push(format!(
                                "unknown binary operator {other:?} in `binary_operators`"
                            )),
                        }
                    }
                }
                None => errors.push("`binary_operators` must be a list of operators".into()),
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn apply(&self, ctx: &RuleContext<'_>) -> Result<RuleOutput, RuleError> {
        let configured: HashSet<&str> = ctx
            .options
            .get("binary_operators")
            .and_then(Value::as_array)
            .map(|list| list.iter().filter_map(Value::as_str).collect())
            .unwrap_or_else(|| ALL_OPERATORS.iter().copied().collect());

        let mut out = RuleOutput::default();
        let op_spans = collect_operator_spans(ctx, &configured);

        for span in op_spans {
            let (first, last) = match token_range_of(ctx, span) {
                Some(range) => range,
                None => continue,
            };
            if first > 0 {
                self.want_gap(ctx, first - 1, " ", &mut out);
            }
            self.want_gap(ctx, last, " ", &mut out);
        }

        for (i, token) in ctx.tokens.iter().enumerate() {
            if token.kind == TokenKind::Eof {
                break;
            }
            match token.kind {
                TokenKind::Comma => {
                    let next = ctx.tokens[i + 1].kind;
                    if !matches!(
                        next,
                        TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace | TokenKind::Eof
                    ) {
                        self.want_gap(ctx, i, " ", &mut out);
                    }
                }
                TokenKind::LParen | TokenKind::LBracket => {
                    if !matches!(ctx.tokens[i + 1].kind, TokenKind::Eof) {
                        self.want_gap(ctx, i, "", &mut out);
                    }
                }
                TokenKind::RParen => {
                    if ctx.tokens[i + 1].kind == TokenKind::LBrace {
                        self.want_gap(ctx, i, " ", &mut out);
                    }
                }
                TokenKind::Semicolon => {
                    // No space before `;`.
                    if i > 0 {
                        self.want_gap(ctx, i - 1, "", &mut out);
                    }
                }
                _ => {}
            }
            if matches!(
                ctx.tokens[i + 1].kind,
                TokenKind::RParen | TokenKind::RBracket
            ) {
                self.want_gap(ctx, i, "", &mut out);
            }
        }

        Ok(out)
    }
}

impl WhitespaceNormalizer {
    /// Propose replacing the gap after token `i` with `want`, unless the
    /// gap crosses a line or holds a comment, or already matches.
    fn want_gap(&self, ctx: &RuleContext<'_>, i: usize, want: &str, out: &mut RuleOutput) {
        if ctx.gap_has_newline(i) || ctx.gap_has_comment(i) {
            return;
        }
        let gap = ctx.gap_span(i);
        if ctx.source.slice(gap) != want {
            out.edits
                .push(TextEdit::replace(gap, want, "whitespace", PRIORITY));
        }
    }
}

/// Operator spans come from the tree: fused comparison/shift operators
/// carry a span covering their whole token run, and plain `=` tokens in
/// declarators and annotation pairs are included directly.
fn collect_operator_spans(ctx: &RuleContext<'_>, configured: &HashSet<&str>) -> Vec<Span> {
    let mut spans = HashSet::new();
    for id in ctx.arena.descendants(ctx.root) {
        let attrs = ctx.arena.attrs(id);
        if let (Some(op), Some(span)) = (attrs.binary_op, attrs.op_span) {
            if configured.contains(binary_op_str(op)) {
                spans.insert(span);
            }
        }
        if let (Some(_), Some(span)) = (attrs.assign_op, attrs.op_span) {
            spans.insert(span);
        }
    }
    for token in ctx.tokens {
        if token.kind == TokenKind::Assign {
            spans.insert(token.span);
        }
    }
    let mut spans: Vec<Span> = spans.into_iter().collect();
    spans.sort();
    spans
}

fn binary_op_str(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Or => "||",
        BinaryOp::And => "&&",
        BinaryOp::BitOr => "|",
        BinaryOp::BitXor => "^",
        BinaryOp::BitAnd => "&",
        BinaryOp::Eq => "==",
        BinaryOp::NotEq => "!=",
        BinaryOp::Lt => "<",
        BinaryOp::Gt => ">",
        BinaryOp::Le => "<=",
        BinaryOp::Ge => ">=",
        BinaryOp::Shl => "<<",
        BinaryOp::Shr => ">>",
        BinaryOp::UShr => ">>>",
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Rem => "%",
    }
}

/// Maps an operator span back to its (first, last) token indices.
fn token_range_of(ctx: &RuleContext<'_>, span: Span) -> Option<(usize, usize)> {
    let first = ctx
        .tokens
        .binary_search_by_key(&span.start, |t| t.span.start)
        .ok()?;
    let mut last = first;
    while ctx.tokens[last].span.end < span.end {
        last += 1;
        if last >= ctx.tokens.len() {
            return None;
        }
    }
    Some((first, last))
}
