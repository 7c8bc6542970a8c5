//! Error-tolerant lexer and parser for Java source, through JDK 25.
//!
//! The crate turns a UTF-8 source buffer into a token stream with preserved
//! trivia (whitespace and comments) and a full syntax tree stored in a
//! contiguous arena. Both stages are loss-free: tokens and trivia together
//! cover every byte of the input, and every syntactic error is recovered
//! into an `Error` node so a complete tree is always produced.
//!
//! ```rust
//! use styler_parser::{Parser, SourceBuffer};
//!
//! let source = SourceBuffer::new("class A { int x; }".to_owned());
//! let parse = Parser::new(&source).parse();
//! assert!(parse.errors.is_empty());
//! ```

mod arena;
mod error;
mod lexer;
mod limit;
mod parser;
mod source;
#[cfg(test)]
mod tests;

pub use crate::arena::{
    AssignOp, BinaryOp, Modifiers, NodeAttrs, NodeId, NodeKind, SyntaxArena, UnaryOp,
};
pub use crate::error::ParseError;
pub use crate::lexer::{
    LexOutput, Lexer, LiteralValue, Token, TokenKind, Trivia, TriviaKind, TriviaRange,
};
pub use crate::limit::LimitTracker;
pub use crate::parser::{ParseResult, Parser};
pub use crate::source::{LineCol, LineEnding, SourceBuffer, SourceError, Span};
