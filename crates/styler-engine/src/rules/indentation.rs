use crate::edit::TextEdit;
use crate::rules::{opts, render_indent, Rule, RuleContext, RuleError, RuleOutput};
use serde_json::{json, Value};
use styler_parser::{NodeKind, TokenKind};

const PRIORITY: i32 = 5;

/// Re-indents every line from the tree's nesting depth. Continuation
/// lines — lines that start in the middle of a statement or declaration —
/// receive `continuation_factor` extra units. Lines that begin inside a
/// multi-line token (text blocks) or inside a comment are left untouched.
pub struct Indentation;

impl Rule for Indentation {
    fn id(&self) -> &'static str {
        "indentation"
    }

    fn description(&self) -> &'static str {
        "re-indent lines from syntactic nesting depth"
    }

    fn default_options(&self) -> Value {
        json!({
            "unit": "spaces",
            "size": 4,
            "continuation_factor": 2,
        })
    }

    fn validate(&self, options: &Value) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        opts::expect_choice(options, "unit", &["spaces", "tabs"], &mut errors);
        if let Some(value) = options.get("size") {
            if !value.as_u64().is_some_and(|v| v >= 1) {
                errors.push("`size` must be a positive integer".into());
            }
        }
        if let Some(value) = options.get("continuation_factor") {
            if value.as_u64().is_none() {
                errors.push("`continuation_factor` must be a non-negative integer".into());
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn apply(&self, ctx: &RuleContext<'_>) -> Result<RuleOutput, RuleError> {
        let unit = opts::str_opt(ctx.options, "unit", "spaces").to_owned();
        let size = opts::usize_opt(ctx.options, "size", 4);
        let continuation_factor = opts::usize_opt(ctx.options, "continuation_factor", 2);

        let mut out = RuleOutput::default();
        for line in 1..=ctx.source.line_count() {
            if line % 1024 == 0 {
                ctx.checkpoint()?;
            }
            let Some(first) = ctx.first_token_on_line(line) else {
                continue;
            };
            let Some(line_span) = ctx.source.line_span(line) else {
                continue;
            };
            if line_start_is_inside_opaque_region(ctx, line_span.start) {
                continue;
            }

            let depth = ctx.indent_depth(first);
            let extra = if is_continuation(ctx, first) {
                continuation_factor
            } else {
                0
            };
            let want = render_indent(&unit, size, depth, extra);
            let Some(indent_span) = ctx.line_indent_span(line) else {
                continue;
            };
            if ctx.source.slice(indent_span) != want {
                out.edits
                    .push(TextEdit::replace(indent_span, want, "indentation", PRIORITY));
            }
        }
        Ok(out)
    }
}

/// True when the byte at a line start falls inside a multi-line token
/// (text block) or a multi-line comment; rewriting such "indentation"
/// would corrupt the literal or comment. Tokens and trivia are sorted by
/// span, so a binary search finds the only candidates.
fn line_start_is_inside_opaque_region(ctx: &RuleContext<'_>, offset: usize) -> bool {
    let idx = ctx.tokens.partition_point(|t| t.span.start < offset);
    if idx > 0 {
        let token = &ctx.tokens[idx - 1];
        if token.span.start < offset && offset < token.span.end {
            return true;
        }
    }
    let idx = ctx.trivia.partition_point(|t| t.span.start < offset);
    if idx > 0 {
        let trivia = &ctx.trivia[idx - 1];
        if trivia.is_comment() && trivia.span.start < offset && offset < trivia.span.end {
            return true;
        }
    }
    false
}

/// A line is a continuation when its first token is not the first token
/// of its nearest anchoring construct (statement, member, label, import,
/// annotation, ...). Brace tokens always sit at structural depth.
fn is_continuation(ctx: &RuleContext<'_>, idx: usize) -> bool {
    if matches!(
        ctx.tokens[idx].kind,
        TokenKind::LBrace | TokenKind::RBrace
    ) {
        return false;
    }
    let node = ctx.node_at_token(idx);
    for anc in std::iter::once(node).chain(ctx.arena.ancestors(node)) {
        let kind = ctx.arena.kind(anc);
        if is_anchor(kind) {
            return ctx.arena.attrs(anc).first_token as usize != idx;
        }
    }
    false
}

fn is_anchor(kind: NodeKind) -> bool {
    kind.is_statement()
        || kind.is_type_declaration()
        || matches!(
            kind,
            NodeKind::PackageDecl
                | NodeKind::ImportDecl
                | NodeKind::FieldDecl
                | NodeKind::MethodDecl
                | NodeKind::ConstructorDecl
                | NodeKind::CompactConstructorDecl
                | NodeKind::InitializerBlock
                | NodeKind::AnnotationElementDecl
                | NodeKind::EnumConstant
                | NodeKind::Annotation
                | NodeKind::SwitchRule
                | NodeKind::SwitchGroup
                | NodeKind::CaseLabel
                | NodeKind::DefaultLabel
                | NodeKind::ModuleDecl
                | NodeKind::RequiresDirective
                | NodeKind::ExportsDirective
                | NodeKind::OpensDirective
                | NodeKind::UsesDirective
                | NodeKind::ProvidesDirective
                | NodeKind::CatchClause
                | NodeKind::FinallyClause
        )
}
