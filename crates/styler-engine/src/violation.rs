use crate::edit::TextEdit;
use serde::Serialize;
use styler_parser::{LineCol, SourceBuffer, Span};

/// Diagnostic severity. Ordering puts `Error` highest so reports can sort
/// most-severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
        }
    }
}

/// A diagnostic emitted by a rule (or by the parser, surfaced through the
/// pseudo-rule id `parse`). Positions are resolved against the source
/// buffer when the violation is recorded, so reporting needs no file
/// access.
#[derive(Debug, Clone)]
pub struct Violation {
    pub rule_id: String,
    pub severity: Severity,
    pub span: Span,
    pub start: LineCol,
    pub end: LineCol,
    pub message: String,
    pub fix_hint: Option<String>,
    pub fix_edit: Option<TextEdit>,
    /// The text of the first source line the violation covers, for human
    /// reports.
    pub excerpt: Option<String>,
}

impl Violation {
    pub fn new(
        source: &SourceBuffer,
        rule_id: impl Into<String>,
        severity: Severity,
        span: Span,
        message: impl Into<String>,
    ) -> Self {
        let start = source.byte_to_line_col(span.start);
        let end = source.byte_to_line_col(span.end);
        let excerpt = source
            .line_span(start.line)
            .map(|line| source.slice(line).to_owned());
        Self {
            rule_id: rule_id.into(),
            severity,
            span,
            start,
            end,
            message: message.into(),
            fix_hint: None,
            fix_edit: None,
            excerpt,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    pub fn with_fix(mut self, fix: TextEdit) -> Self {
        self.fix_edit = Some(fix);
        self
    }
}
