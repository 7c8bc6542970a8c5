use crate::edit::TextEdit;
use crate::rules::{opts, Rule, RuleContext, RuleError, RuleOutput};
use crate::violation::{Severity, Violation};
use serde_json::{json, Value};
use styler_parser::{NodeKind, Span, TokenKind};

const PRIORITY: i32 = 15;

/// Flags lines longer than `max_length` code points (tabs expanded by
/// `tab_width`). With `smart_wrap`, emits edits that break the line at
/// grammar-aware points — argument lists fan out one argument per line
/// with the closing `)` aligned under the call's opening parenthesis,
/// otherwise breaks go before binary operators and after the dots of
/// method chains — with a continuation indent one unit past the line's
/// own indent. A violation is reported only when wrapping cannot bring
/// the line under the limit (or wrapping is disabled).
pub struct LineLength;

impl Rule for LineLength {
    fn id(&self) -> &'static str {
        "line-length"
    }

    fn description(&self) -> &'static str {
        "limit line width, optionally wrapping at grammar-aware points"
    }

    fn default_options(&self) -> Value {
        json!({
            "max_length": 120,
            "tab_width": 4,
            "smart_wrap": false,
            "indent_size": 4,
        })
    }

    fn validate(&self, options: &Value) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if let Some(value) = options.get("max_length") {
            match value.as_u64() {
                Some(v) if v >= 20 => {}
                _ => errors.push("`max_length` must be an integer >= 20".into()),
            }
        }
        if let Some(value) = options.get("tab_width") {
            if !value.as_u64().is_some_and(|v| v >= 1) {
                errors.push("`tab_width` must be a positive integer".into());
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn apply(&self, ctx: &RuleContext<'_>) -> Result<RuleOutput, RuleError> {
        let max = opts::usize_opt(ctx.options, "max_length", 120);
        let tab_width = opts::usize_opt(ctx.options, "tab_width", 4);
        let smart_wrap = opts::bool_opt(ctx.options, "smart_wrap", false);
        let indent_size = opts::usize_opt(ctx.options, "indent_size", 4);

        let mut out = RuleOutput::default();
        for line in 1..=ctx.source.line_count() {
            if line % 1024 == 0 {
                ctx.checkpoint()?;
            }
            let span = match ctx.source.line_span(line) {
                Some(span) => span,
                None => continue,
            };
            let width = display_width(ctx.source.slice(span), tab_width);
            if width <= max {
                continue;
            }

            if !smart_wrap {
                out.violations
                    .push(over_limit(ctx, span, width, max));
                continue;
            }

            let fixed = self.wrap_line(ctx, line, span, max, tab_width, indent_size, &mut out);
            if !fixed {
                out.violations
                    .push(over_limit(ctx, span, width, max));
            }
        }
        Ok(out)
    }
}

impl LineLength {
    /// Returns whether the planned breaks bring every resulting segment
    /// under the limit.
    #[allow(clippy::too_many_arguments)]
    fn wrap_line(
        &self,
        ctx: &RuleContext<'_>,
        line: usize,
        line_span: Span,
        max: usize,
        tab_width: usize,
        indent_size: usize,
        out: &mut RuleOutput,
    ) -> bool {
        let first = match ctx.first_token_on_line(line) {
            Some(first) => first,
            // Comment-only lines or the interior of a text block; nothing
            // the wrapper can split.
            None => return false,
        };
        // A line that begins inside a multi-line token cannot be wrapped.
        if ctx.tokens[first].span.start >= line_span.end {
            return false;
        }

        let base_indent = {
            let span = ctx.line_indent_span(line).unwrap_or(Span::empty(line_span.start));
            ctx.source.slice(span).to_owned()
        };
        let continuation = format!("{base_indent}{}", " ".repeat(indent_size));
        let ending = ctx.source.line_ending().as_str();

        // Preferred shape: fan out the first argument list on the line.
        // The caller already established the line is over the limit; the
        // list itself may sit well under it and still be the right place
        // to break.
        if let Some(breaks) = self.arg_list_breaks(ctx, line, line_span, &base_indent) {
            return self.emit_breaks(ctx, line_span, breaks, max, tab_width, out);
        }

        // Fallback: greedy breaks before binary operators and after the
        // dots of method chains.
        let mut candidates: Vec<(usize, String)> = Vec::new();
        for (i, token) in tokens_on_line(ctx, line, line_span) {
            if token.kind != TokenKind::Dot || i == 0 {
                continue;
            }
            let node = ctx.node_at_token(i);
            if matches!(
                ctx.arena.kind(node),
                NodeKind::MethodCall | NodeKind::FieldAccess
            ) {
                // Break before the dot: the dot starts the next line.
                candidates.push((
                    ctx.tokens[i - 1].span.end,
                    format!("{ending}{continuation}"),
                ));
            }
        }
        for id in ctx.arena.descendants(ctx.root) {
            let attrs = ctx.arena.attrs(id);
            if attrs.binary_op.is_none() {
                continue;
            }
            if let Some(op) = attrs.op_span {
                if op.start >= line_span.start && op.end <= line_span.end {
                    // The operator starts the continuation line.
                    candidates.push((op.start, format!("{ending}{continuation}")));
                }
            }
        }
        candidates.sort_by_key(|(at, _)| *at);
        candidates.dedup_by_key(|(at, _)| *at);
        // Break at every candidate, chain style; a half-broken chain reads
        // worse than a fully fanned-out one.
        self.emit_breaks(ctx, line_span, candidates, max, tab_width, out)
    }

    /// Fans out the first argument list that sits entirely on this line:
    /// one break after `(`, one after each top-level comma, and one before
    /// `)`, which lands aligned under the call's opening parenthesis.
    fn arg_list_breaks(
        &self,
        ctx: &RuleContext<'_>,
        line: usize,
        line_span: Span,
        base_indent: &str,
    ) -> Option<Vec<(usize, String)>> {
        let indent_size = opts::usize_opt(ctx.options, "indent_size", 4);
        let continuation = format!("{base_indent}{}", " ".repeat(indent_size));
        let ending = ctx.source.line_ending().as_str();

        let mut best: Option<styler_parser::NodeId> = None;
        for (i, token) in tokens_on_line(ctx, line, line_span) {
            if token.kind != TokenKind::Comma {
                continue;
            }
            let node = ctx.node_at_token(i);
            if !matches!(
                ctx.arena.kind(node),
                NodeKind::ArgList | NodeKind::ParamList
            ) {
                continue;
            }
            let attrs = ctx.arena.attrs(node);
            let open = ctx.tokens[attrs.first_token as usize].span;
            let close = ctx.tokens[attrs.last_token as usize].span;
            if open.start < line_span.start || close.end > line_span.end {
                continue;
            }
            best = Some(node);
            break;
        }
        let list = best?;
        let attrs = ctx.arena.attrs(list);
        let (first, last) = (attrs.first_token as usize, attrs.last_token as usize);
        let mut breaks = Vec::new();
        // After `(`.
        breaks.push((
            ctx.tokens[first].span.end,
            format!("{ending}{continuation}"),
        ));
        for i in first + 1..last {
            if ctx.tokens[i].kind == TokenKind::Comma && ctx.node_at_token(i) == list {
                breaks.push((ctx.tokens[i].span.end, format!("{ending}{continuation}")));
            }
        }
        // Before `)`, aligned with the opening parenthesis — which need
        // not be the line's own indent when the call starts mid-line.
        let paren_col = ctx.source.byte_to_line_col(ctx.tokens[first].span.start).col;
        breaks.push((
            ctx.tokens[last].span.start,
            format!("{ending}{}", " ".repeat(paren_col.saturating_sub(1))),
        ));
        Some(breaks)
    }

    /// Turns planned breaks into gap-replacing edits and reports whether
    /// the resulting segments all fit.
    fn emit_breaks(
        &self,
        ctx: &RuleContext<'_>,
        line_span: Span,
        breaks: Vec<(usize, String)>,
        max: usize,
        tab_width: usize,
        out: &mut RuleOutput,
    ) -> bool {
        if breaks.is_empty() {
            return false;
        }
        let text = ctx.source.slice(line_span);
        let mut all_fit = true;
        let mut prev = line_span.start;
        let mut prev_indent = 0;
        for (at, ins) in &breaks {
            let seg = &text[prev - line_span.start..*at - line_span.start];
            if display_width(seg.trim_end(), tab_width) + prev_indent > max {
                all_fit = false;
            }
            prev = *at;
            prev_indent = display_width(ins.trim_start_matches(['\r', '\n']), tab_width);
            // Swallow any spaces already sitting after the break point.
            let mut end = *at;
            let bytes = ctx.source.text().as_bytes();
            while end < line_span.end && (bytes[end] == b' ' || bytes[end] == b'\t') {
                end += 1;
            }
            out.edits.push(TextEdit::replace(
                Span::new(*at, end),
                ins.clone(),
                "line-length",
                PRIORITY,
            ));
        }
        let tail = &text[prev - line_span.start..];
        if display_width(tail.trim_end(), tab_width) + prev_indent > max {
            all_fit = false;
        }
        all_fit
    }
}

fn over_limit(ctx: &RuleContext<'_>, span: Span, width: usize, max: usize) -> Violation {
    Violation::new(
        ctx.source,
        "line-length",
        Severity::Warn,
        span,
        format!("line is {width} characters long (maximum is {max})"),
    )
    .with_hint("break the line or raise `max_length`")
}

/// Width in display columns: code points count one, tabs advance to the
/// next `tab_width` stop.
fn display_width(text: &str, tab_width: usize) -> usize {
    let mut width = 0;
    for c in text.chars() {
        if c == '\t' {
            width += tab_width - (width % tab_width);
        } else {
            width += 1;
        }
    }
    width
}

/// Significant tokens whose span starts within the given line.
fn tokens_on_line<'a>(
    ctx: &'a RuleContext<'_>,
    line: usize,
    line_span: Span,
) -> impl Iterator<Item = (usize, &'a styler_parser::Token)> {
    let start = ctx.first_token_on_line(line).unwrap_or(ctx.tokens.len());
    ctx.tokens[start..]
        .iter()
        .enumerate()
        .map(move |(off, t)| (start + off, t))
        .take_while(move |(_, t)| t.span.start < line_span.end && t.kind != TokenKind::Eof)
}
