use crate::lexer::TokenKind;
use crate::source::Span;
use std::fmt;

/// A lexical or syntactic error recovered during parsing.
///
/// Errors are returned alongside the resulting tree; they never abort a
/// parse. A lexer-level error carries `found: TokenKind::Error` and an empty
/// `expected` set.
#[derive(Clone, PartialEq, Eq)]
pub struct ParseError {
    pub span: Span,
    pub expected: Vec<TokenKind>,
    pub found: TokenKind,
    pub message: String,
}

impl ParseError {
    pub fn new<S: Into<String>>(span: Span, found: TokenKind, message: S) -> Self {
        Self {
            span,
            expected: Vec::new(),
            found,
            message: message.into(),
        }
    }

    pub fn expecting<S: Into<String>>(
        span: Span,
        expected: Vec<TokenKind>,
        found: TokenKind,
        message: S,
    ) -> Self {
        Self {
            span,
            expected,
            found,
            message: message.into(),
        }
    }

    /// Whether this error originated in the lexer rather than the parser.
    pub fn is_lex_error(&self) -> bool {
        self.found == TokenKind::Error
    }
}

impl fmt::Debug for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ERROR@{}:{} {:?}",
            self.span.start, self.span.end, self.message
        )
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
