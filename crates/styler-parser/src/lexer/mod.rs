mod cursor;
mod lookup;

use crate::error::ParseError;
use crate::source::{SourceBuffer, Span};
use cursor::Cursor;
use lookup::{is_digit, is_hex_digit, is_ident_part, is_ident_start, is_inline_whitespace};
use ordered_float::OrderedFloat;
use std::fmt;

/// The kind of a lexical token.
///
/// Contextual keywords (`var`, `yield`, `record`, `sealed`, `permits`,
/// `module`, `when`, ...) lex as [`Ident`](TokenKind::Ident); the parser
/// classifies them by text. `>` is always emitted as a single token so that
/// nested type arguments close without lexer feedback; the parser fuses
/// adjacent `>`s into shift and comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TokenKind {
    // Reserved keywords.
    AbstractKw,
    AssertKw,
    BooleanKw,
    BreakKw,
    ByteKw,
    CaseKw,
    CatchKw,
    CharKw,
    ClassKw,
    ConstKw,
    ContinueKw,
    DefaultKw,
    DoKw,
    DoubleKw,
    ElseKw,
    EnumKw,
    ExtendsKw,
    FinalKw,
    FinallyKw,
    FloatKw,
    ForKw,
    GotoKw,
    IfKw,
    ImplementsKw,
    ImportKw,
    InstanceofKw,
    IntKw,
    InterfaceKw,
    LongKw,
    NativeKw,
    NewKw,
    PackageKw,
    PrivateKw,
    ProtectedKw,
    PublicKw,
    ReturnKw,
    ShortKw,
    StaticKw,
    StrictfpKw,
    SuperKw,
    SwitchKw,
    SynchronizedKw,
    ThisKw,
    ThrowKw,
    ThrowsKw,
    TransientKw,
    TryKw,
    VoidKw,
    VolatileKw,
    WhileKw,
    TrueKw,
    FalseKw,
    NullKw,
    /// `_`, reserved since Java 9; also the unnamed pattern variable.
    UnderscoreKw,

    Ident,

    IntLit,
    LongLit,
    FloatLit,
    DoubleLit,
    CharLit,
    StringLit,
    TextBlock,

    // Separators.
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semicolon,
    Comma,
    Dot,
    Ellipsis,
    At,

    // Operators.
    Assign,
    EqEq,
    Bang,
    BangEq,
    Lt,
    LtEq,
    Shl,
    ShlAssign,
    /// Always a single `>`; never merged by the lexer.
    Gt,
    Amp,
    AmpAmp,
    AmpAssign,
    Pipe,
    PipePipe,
    PipeAssign,
    Caret,
    CaretAssign,
    Plus,
    PlusAssign,
    PlusPlus,
    Minus,
    MinusAssign,
    MinusMinus,
    Arrow,
    Star,
    StarAssign,
    Slash,
    SlashAssign,
    Percent,
    PercentAssign,
    Tilde,
    Question,
    Colon,
    ColonColon,

    Eof,
    Error,
}

impl TokenKind {
    pub fn is_literal(&self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            IntLit | LongLit | FloatLit | DoubleLit | CharLit | StringLit | TextBlock | TrueKw
                | FalseKw
                | NullKw
        )
    }

    pub fn is_keyword(&self) -> bool {
        use TokenKind::*;
        *self >= AbstractKw && *self <= UnderscoreKw
    }

    /// Whether the token can begin a primitive type.
    pub fn is_primitive_type(&self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            BooleanKw | ByteKw | ShortKw | IntKw | LongKw | CharKw | FloatKw | DoubleKw
        )
    }

    pub fn is_assignment_op(&self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            Assign
                | PlusAssign
                | MinusAssign
                | StarAssign
                | SlashAssign
                | PercentAssign
                | AmpAssign
                | PipeAssign
                | CaretAssign
                | ShlAssign
        )
    }

    /// A short human-readable description used in error messages.
    pub fn describe(&self) -> &'static str {
        use TokenKind::*;
        match self {
            Ident => "an identifier",
            IntLit | LongLit => "an integer literal",
            FloatLit | DoubleLit => "a floating-point literal",
            CharLit => "a character literal",
            StringLit => "a string literal",
            TextBlock => "a text block",
            LParen => "`(`",
            RParen => "`)`",
            LBrace => "`{`",
            RBrace => "`}`",
            LBracket => "`[`",
            RBracket => "`]`",
            Semicolon => "`;`",
            Comma => "`,`",
            Dot => "`.`",
            Ellipsis => "`...`",
            At => "`@`",
            Assign => "`=`",
            Arrow => "`->`",
            Colon => "`:`",
            ColonColon => "`::`",
            Gt => "`>`",
            Lt => "`<`",
            Eof => "end of file",
            Error => "invalid input",
            _ => "a keyword",
        }
    }
}

/// Decoded payload of a literal token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LiteralValue {
    Int(i64),
    Long(i64),
    Float(OrderedFloat<f32>),
    Double(OrderedFloat<f64>),
    Char(char),
    Str(String),
}

/// A half-open range into the trivia vector of a [`LexOutput`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TriviaRange {
    pub start: u32,
    pub end: u32,
}

impl TriviaRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start: start as u32,
            end: end as u32,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn indices(&self) -> std::ops::Range<usize> {
        self.start as usize..self.end as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriviaKind {
    /// A run of horizontal whitespace within one line.
    Whitespace,
    /// Exactly one line terminator: `\n`, `\r\n`, or `\r`.
    Newline,
    LineComment,
    BlockComment,
    DocComment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trivia {
    pub kind: TriviaKind,
    pub span: Span,
}

impl Trivia {
    pub fn is_comment(&self) -> bool {
        matches!(
            self.kind,
            TriviaKind::LineComment | TriviaKind::BlockComment | TriviaKind::DocComment
        )
    }
}

#[derive(Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub value: Option<LiteralValue>,
    pub leading: TriviaRange,
    pub trailing: TriviaRange,
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}@{}:{}", self.kind, self.span.start, self.span.end)
    }
}

/// Everything the lexer produced for one source buffer: the significant
/// tokens (terminated by exactly one `Eof`), the trivia they interleave
/// with, and any lexical errors. Tokens and trivia together partition the
/// source bytes.
#[derive(Debug)]
pub struct LexOutput {
    pub tokens: Vec<Token>,
    pub trivia: Vec<Trivia>,
    pub errors: Vec<ParseError>,
}

/// A deterministic scanner over a UTF-8 source buffer.
pub struct Lexer<'a> {
    cursor: Cursor<'a>,
    tokens: Vec<Token>,
    trivia: Vec<Trivia>,
    errors: Vec<ParseError>,
    pending_leading: TriviaRange,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a SourceBuffer) -> Self {
        Self::from_str(source.text())
    }

    pub fn from_str(text: &'a str) -> Self {
        Self {
            cursor: Cursor::new(text),
            tokens: Vec::new(),
            trivia: Vec::new(),
            errors: Vec::new(),
            pending_leading: TriviaRange::default(),
        }
    }

    pub fn lex(mut self) -> LexOutput {
        loop {
            let run_start = self.trivia.len();
            self.scan_trivia_run();
            self.split_trivia_run(run_start);

            if self.cursor.is_eof() {
                let at = self.cursor.pos();
                self.push_token(TokenKind::Eof, Span::empty(at), None);
                break;
            }
            self.scan_token();
        }

        LexOutput {
            tokens: self.tokens,
            trivia: self.trivia,
            errors: self.errors,
        }
    }

    /// Splits the trivia scanned since the previous token between that
    /// token's trailing range (same line, up to and including the first
    /// terminator) and the next token's leading range.
    fn split_trivia_run(&mut self, run_start: usize) {
        let run_end = self.trivia.len();
        let split = if self.tokens.is_empty() {
            run_start
        } else {
            self.trivia[run_start..run_end]
                .iter()
                .position(|t| t.kind == TriviaKind::Newline)
                .map(|k| run_start + k + 1)
                .unwrap_or(run_end)
        };
        if let Some(prev) = self.tokens.last_mut() {
            prev.trailing = TriviaRange::new(run_start, split);
        }
        self.pending_leading = TriviaRange::new(split, run_end);
    }

    fn push_token(&mut self, kind: TokenKind, span: Span, value: Option<LiteralValue>) {
        let leading = self.pending_leading;
        self.pending_leading = TriviaRange::default();
        self.tokens.push(Token {
            kind,
            span,
            value,
            leading,
            trailing: TriviaRange::default(),
        });
    }

    fn push_trivia(&mut self, kind: TriviaKind, span: Span) {
        debug_assert!(!span.is_empty());
        self.trivia.push(Trivia { kind, span });
    }

    fn error(&mut self, span: Span, message: impl Into<String>) {
        self.errors
            .push(ParseError::new(span, TokenKind::Error, message));
    }

    // ------------------------------------------------------------------
    // Trivia
    // ------------------------------------------------------------------

    fn scan_trivia_run(&mut self) {
        loop {
            let start = self.cursor.pos();
            match self.cursor.first() {
                Some(c) if is_inline_whitespace(c) => {
                    self.cursor.eat_while(is_inline_whitespace);
                    self.push_trivia(TriviaKind::Whitespace, Span::new(start, self.cursor.pos()));
                }
                Some('\n') => {
                    self.cursor.bump();
                    self.push_trivia(TriviaKind::Newline, Span::new(start, self.cursor.pos()));
                }
                Some('\r') => {
                    self.cursor.bump();
                    self.cursor.eat('\n');
                    self.push_trivia(TriviaKind::Newline, Span::new(start, self.cursor.pos()));
                }
                Some('/') if self.cursor.starts_with("//") => {
                    self.cursor.eat_while(|c| c != '\n' && c != '\r');
                    self.push_trivia(TriviaKind::LineComment, Span::new(start, self.cursor.pos()));
                }
                Some('/') if self.cursor.starts_with("/*") => {
                    self.scan_block_comment(start);
                }
                _ => break,
            }
        }
    }

    fn scan_block_comment(&mut self, start: usize) {
        self.cursor.bump(); // /
        self.cursor.bump(); // *
        let is_doc = self.cursor.starts_with("*") && !self.cursor.starts_with("*/");

        let mut terminated = false;
        while let Some(c) = self.cursor.bump() {
            if c == '*' && self.cursor.eat('/') {
                terminated = true;
                break;
            }
        }
        let span = Span::new(start, self.cursor.pos());
        if !terminated {
            // Closed at end of input so the parser can still recover.
            self.error(span, "unterminated block comment");
        }
        let kind = if is_doc {
            TriviaKind::DocComment
        } else {
            TriviaKind::BlockComment
        };
        self.push_trivia(kind, span);
    }

    // ------------------------------------------------------------------
    // Tokens
    // ------------------------------------------------------------------

    fn scan_token(&mut self) {
        let start = self.cursor.pos();
        let c = match self.cursor.first() {
            Some(c) => c,
            None => return,
        };

        if is_ident_start(c) {
            self.scan_word(start);
            return;
        }
        if c == '\\' {
            // A unicode escape may begin an identifier.
            match self.try_unicode_escape() {
                Some(decoded) if is_ident_start(decoded) => {
                    self.scan_word_decoded(start, decoded);
                }
                Some(_) | None => {
                    if self.cursor.pos() == start {
                        self.cursor.bump();
                    }
                    let span = Span::new(start, self.cursor.pos());
                    self.error(span, "stray `\\` in input");
                    self.push_token(TokenKind::Error, span, None);
                }
            }
            return;
        }
        if is_digit(c) {
            self.scan_number(start);
            return;
        }

        match c {
            '.' => {
                self.cursor.bump();
                if self.cursor.first().is_some_and(is_digit) {
                    self.scan_fraction(start, String::from("."));
                } else if self.cursor.starts_with("..") {
                    self.cursor.bump();
                    self.cursor.bump();
                    self.emit(start, TokenKind::Ellipsis);
                } else {
                    self.emit(start, TokenKind::Dot);
                }
            }
            '"' => {
                if self.cursor.starts_with("\"\"\"") {
                    self.scan_text_block(start);
                } else {
                    self.scan_string(start);
                }
            }
            '\'' => self.scan_char(start),
            '(' => self.single(start, TokenKind::LParen),
            ')' => self.single(start, TokenKind::RParen),
            '{' => self.single(start, TokenKind::LBrace),
            '}' => self.single(start, TokenKind::RBrace),
            '[' => self.single(start, TokenKind::LBracket),
            ']' => self.single(start, TokenKind::RBracket),
            ';' => self.single(start, TokenKind::Semicolon),
            ',' => self.single(start, TokenKind::Comma),
            '@' => self.single(start, TokenKind::At),
            '~' => self.single(start, TokenKind::Tilde),
            '?' => self.single(start, TokenKind::Question),
            ':' => {
                self.cursor.bump();
                if self.cursor.eat(':') {
                    self.emit(start, TokenKind::ColonColon);
                } else {
                    self.emit(start, TokenKind::Colon);
                }
            }
            '=' => {
                self.cursor.bump();
                if self.cursor.eat('=') {
                    self.emit(start, TokenKind::EqEq);
                } else {
                    self.emit(start, TokenKind::Assign);
                }
            }
            '!' => {
                self.cursor.bump();
                if self.cursor.eat('=') {
                    self.emit(start, TokenKind::BangEq);
                } else {
                    self.emit(start, TokenKind::Bang);
                }
            }
            '<' => {
                self.cursor.bump();
                if self.cursor.eat('=') {
                    self.emit(start, TokenKind::LtEq);
                } else if self.cursor.eat('<') {
                    if self.cursor.eat('=') {
                        self.emit(start, TokenKind::ShlAssign);
                    } else {
                        self.emit(start, TokenKind::Shl);
                    }
                } else {
                    self.emit(start, TokenKind::Lt);
                }
            }
            // `>` stays a single token; see the TokenKind docs.
            '>' => self.single(start, TokenKind::Gt),
            '&' => {
                self.cursor.bump();
                if self.cursor.eat('&') {
                    self.emit(start, TokenKind::AmpAmp);
                } else if self.cursor.eat('=') {
                    self.emit(start, TokenKind::AmpAssign);
                } else {
                    self.emit(start, TokenKind::Amp);
                }
            }
            '|' => {
                self.cursor.bump();
                if self.cursor.eat('|') {
                    self.emit(start, TokenKind::PipePipe);
                } else if self.cursor.eat('=') {
                    self.emit(start, TokenKind::PipeAssign);
                } else {
                    self.emit(start, TokenKind::Pipe);
                }
            }
            '^' => {
                self.cursor.bump();
                if self.cursor.eat('=') {
                    self.emit(start, TokenKind::CaretAssign);
                } else {
                    self.emit(start, TokenKind::Caret);
                }
            }
            '+' => {
                self.cursor.bump();
                if self.cursor.eat('+') {
                    self.emit(start, TokenKind::PlusPlus);
                } else if self.cursor.eat('=') {
                    self.emit(start, TokenKind::PlusAssign);
                } else {
                    self.emit(start, TokenKind::Plus);
                }
            }
            '-' => {
                self.cursor.bump();
                if self.cursor.eat('-') {
                    self.emit(start, TokenKind::MinusMinus);
                } else if self.cursor.eat('=') {
                    self.emit(start, TokenKind::MinusAssign);
                } else if self.cursor.eat('>') {
                    self.emit(start, TokenKind::Arrow);
                } else {
                    self.emit(start, TokenKind::Minus);
                }
            }
            '*' => {
                self.cursor.bump();
                if self.cursor.eat('=') {
                    self.emit(start, TokenKind::StarAssign);
                } else {
                    self.emit(start, TokenKind::Star);
                }
            }
            '/' => {
                self.cursor.bump();
                if self.cursor.eat('=') {
                    self.emit(start, TokenKind::SlashAssign);
                } else {
                    self.emit(start, TokenKind::Slash);
                }
            }
            '%' => {
                self.cursor.bump();
                if self.cursor.eat('=') {
                    self.emit(start, TokenKind::PercentAssign);
                } else {
                    self.emit(start, TokenKind::Percent);
                }
            }
            _ => {
                self.cursor.bump();
                let span = Span::new(start, self.cursor.pos());
                self.error(span, format!("unexpected character `{c}`"));
                self.push_token(TokenKind::Error, span, None);
            }
        }
    }

    fn single(&mut self, start: usize, kind: TokenKind) {
        self.cursor.bump();
        self.emit(start, kind);
    }

    fn emit(&mut self, start: usize, kind: TokenKind) {
        let span = Span::new(start, self.cursor.pos());
        self.push_token(kind, span, None);
    }

    // ------------------------------------------------------------------
    // Words
    // ------------------------------------------------------------------

    fn scan_word(&mut self, start: usize) {
        let first = self.cursor.bump().unwrap_or('\0');
        self.scan_word_decoded(start, first);
    }

    /// Continues an identifier whose first (possibly escape-decoded)
    /// character is `first`. Keyword classification uses the decoded text.
    fn scan_word_decoded(&mut self, start: usize, first: char) {
        let mut text = String::new();
        text.push(first);
        loop {
            match self.cursor.first() {
                Some(c) if is_ident_part(c) => {
                    self.cursor.bump();
                    text.push(c);
                }
                Some('\\') => match self.try_unicode_escape() {
                    Some(decoded) if is_ident_part(decoded) => text.push(decoded),
                    Some(_) | None => break,
                },
                _ => break,
            }
        }
        let kind = lookup::keyword_kind(&text).unwrap_or(TokenKind::Ident);
        self.emit(start, kind);
    }

    /// Consumes `\u{XXXX}`-style escapes (`\` followed by one or more `u`s
    /// and four hex digits) and returns the decoded character. Leaves the
    /// cursor untouched when the input is not a well-formed escape.
    fn try_unicode_escape(&mut self) -> Option<char> {
        let mut probe = self.cursor.clone();
        if !probe.eat('\\') || probe.first() != Some('u') {
            return None;
        }
        while probe.eat('u') {}
        let mut code: u32 = 0;
        for _ in 0..4 {
            let d = probe.first()?.to_digit(16)?;
            probe.bump();
            code = code * 16 + d;
        }
        let decoded = char::from_u32(code)?;
        self.cursor = probe;
        Some(decoded)
    }

    // ------------------------------------------------------------------
    // Numbers
    // ------------------------------------------------------------------

    fn scan_number(&mut self, start: usize) {
        if self.cursor.starts_with("0x") || self.cursor.starts_with("0X") {
            self.cursor.bump();
            self.cursor.bump();
            self.scan_hex(start);
            return;
        }
        if self.cursor.starts_with("0b") || self.cursor.starts_with("0B") {
            self.cursor.bump();
            self.cursor.bump();
            let digits_start = self.cursor.pos();
            self.cursor.eat_while(|c| c == '0' || c == '1' || c == '_');
            let digits = self.cursor.slice_from(digits_start).to_owned();
            let long = self.eat_long_suffix();
            let span = Span::new(start, self.cursor.pos());
            self.check_digits(span, &digits, 2);
            let value = parse_int(&digits, 2, long);
            self.finish_int(span, long, value);
            return;
        }

        let digits_start = self.cursor.pos();
        self.cursor.eat_while(|c| is_digit(c) || c == '_');
        let int_digits = self.cursor.slice_from(digits_start).to_owned();
        let span_so_far = Span::new(start, self.cursor.pos());
        self.check_digits(span_so_far, &int_digits, 10);

        // `1.`, `1.5`, `1e3`, `1f` continue as floating-point.
        if self.cursor.first() == Some('.') && self.cursor.second() != Some('.') {
            self.cursor.bump();
            self.scan_fraction(start, format!("{int_digits}."));
            return;
        }
        if matches!(self.cursor.first(), Some('e' | 'E' | 'f' | 'F' | 'd' | 'D')) {
            self.scan_fraction(start, int_digits);
            return;
        }

        // Octal when a leading zero is followed by more digits.
        let radix = if int_digits.len() > 1 && int_digits.starts_with('0') {
            8
        } else {
            10
        };
        let long = self.eat_long_suffix();
        let span = Span::new(start, self.cursor.pos());
        let digits = if radix == 8 { &int_digits[1..] } else { &int_digits[..] };
        let value = parse_int(digits, radix, long);
        self.finish_int(span, long, value);
    }

    fn scan_hex(&mut self, start: usize) {
        let digits_start = self.cursor.pos();
        self.cursor.eat_while(|c| is_hex_digit(c) || c == '_');
        let digits = self.cursor.slice_from(digits_start).to_owned();

        // Hexadecimal floating-point: 0x1.8p3
        if self.cursor.first() == Some('.') || matches!(self.cursor.first(), Some('p' | 'P')) {
            let mut frac = String::new();
            if self.cursor.eat('.') {
                let frac_start = self.cursor.pos();
                self.cursor.eat_while(|c| is_hex_digit(c) || c == '_');
                frac = self.cursor.slice_from(frac_start).to_owned();
            }
            let mut exp = String::new();
            if matches!(self.cursor.first(), Some('p' | 'P')) {
                self.cursor.bump();
                if matches!(self.cursor.first(), Some('+' | '-')) {
                    exp.push(self.cursor.bump().unwrap());
                }
                let exp_start = self.cursor.pos();
                self.cursor.eat_while(|c| is_digit(c) || c == '_');
                exp.push_str(self.cursor.slice_from(exp_start));
            } else {
                let span = Span::new(start, self.cursor.pos());
                self.error(span, "hexadecimal floating-point literal requires an exponent");
            }
            let is_float = match self.cursor.first() {
                Some('f' | 'F') => {
                    self.cursor.bump();
                    true
                }
                Some('d' | 'D') => {
                    self.cursor.bump();
                    false
                }
                _ => false,
            };
            let span = Span::new(start, self.cursor.pos());
            let value = parse_hex_float(&digits, &frac, &exp);
            self.finish_float(span, is_float, value);
            return;
        }

        let long = self.eat_long_suffix();
        let span = Span::new(start, self.cursor.pos());
        if digits.is_empty() {
            self.error(span, "hexadecimal literal has no digits");
        }
        self.check_digits(span, &digits, 16);
        let value = parse_int(&digits, 16, long);
        self.finish_int(span, long, value);
    }

    /// Continues a decimal floating-point literal. `text` holds what has
    /// been consumed so far (`"."`, `"12."`, or just the integer digits when
    /// dispatch saw an exponent or suffix next).
    fn scan_fraction(&mut self, start: usize, mut text: String) {
        let frac_start = self.cursor.pos();
        self.cursor.eat_while(|c| is_digit(c) || c == '_');
        text.push_str(self.cursor.slice_from(frac_start));

        if matches!(self.cursor.first(), Some('e' | 'E')) {
            self.cursor.bump();
            text.push('e');
            if matches!(self.cursor.first(), Some('+' | '-')) {
                text.push(self.cursor.bump().unwrap());
            }
            let exp_start = self.cursor.pos();
            self.cursor.eat_while(|c| is_digit(c) || c == '_');
            let exp = self.cursor.slice_from(exp_start);
            if exp.is_empty() {
                let span = Span::new(start, self.cursor.pos());
                self.error(span, "floating-point exponent has no digits");
            }
            text.push_str(exp);
        }

        let is_float = match self.cursor.first() {
            Some('f' | 'F') => {
                self.cursor.bump();
                true
            }
            Some('d' | 'D') => {
                self.cursor.bump();
                false
            }
            _ => false,
        };
        let span = Span::new(start, self.cursor.pos());
        self.check_digits(span, &text, 10);
        let cleaned: String = text.chars().filter(|&c| c != '_').collect();
        let value = cleaned.parse::<f64>().ok();
        self.finish_float(span, is_float, value);
    }

    fn eat_long_suffix(&mut self) -> bool {
        matches!(self.cursor.first(), Some('l' | 'L')) && {
            self.cursor.bump();
            true
        }
    }

    fn finish_int(&mut self, span: Span, long: bool, value: Option<i64>) {
        if value.is_none() {
            self.error(span, "integer literal is out of range");
        }
        let (kind, value) = if long {
            (TokenKind::LongLit, value.map(LiteralValue::Long))
        } else {
            (TokenKind::IntLit, value.map(LiteralValue::Int))
        };
        self.push_token(kind, span, value);
    }

    fn finish_float(&mut self, span: Span, is_float: bool, value: Option<f64>) {
        let (kind, value) = if is_float {
            (
                TokenKind::FloatLit,
                value.map(|v| LiteralValue::Float(OrderedFloat(v as f32))),
            )
        } else {
            (
                TokenKind::DoubleLit,
                value.map(|v| LiteralValue::Double(OrderedFloat(v))),
            )
        };
        self.push_token(kind, span, value);
    }

    /// Underscores may only appear between digits.
    fn check_digits(&mut self, span: Span, text: &str, radix: u32) {
        let chars: Vec<char> = text.chars().collect();
        for (i, &c) in chars.iter().enumerate() {
            if c != '_' {
                continue;
            }
            let prev_ok = i > 0 && chars[i - 1].is_digit(radix.max(10));
            let next_ok = i + 1 < chars.len() && chars[i + 1].is_digit(radix.max(10));
            if !prev_ok || !next_ok {
                self.error(span, "underscores must be surrounded by digits");
                return;
            }
        }
    }

    // ------------------------------------------------------------------
    // Character and string literals
    // ------------------------------------------------------------------

    fn scan_char(&mut self, start: usize) {
        self.cursor.bump(); // '
        let mut value = None;
        match self.cursor.first() {
            None | Some('\n') | Some('\r') => {
                let span = Span::new(start, self.cursor.pos());
                self.error(span, "unterminated character literal");
                self.push_token(TokenKind::CharLit, span, None);
                return;
            }
            Some('\\') => {
                value = self.scan_escape();
            }
            Some('\'') => {
                self.cursor.bump();
                let span = Span::new(start, self.cursor.pos());
                self.error(span, "empty character literal");
                self.push_token(TokenKind::CharLit, span, None);
                return;
            }
            Some(c) => {
                self.cursor.bump();
                value = Some(c);
            }
        }
        if !self.cursor.eat('\'') {
            // Skip to the closing quote on the same line, if any.
            self.cursor
                .eat_while(|c| c != '\'' && c != '\n' && c != '\r');
            let closed = self.cursor.eat('\'');
            let span = Span::new(start, self.cursor.pos());
            self.error(
                span,
                if closed {
                    "too many characters in character literal"
                } else {
                    "unterminated character literal"
                },
            );
            self.push_token(TokenKind::CharLit, span, None);
            return;
        }
        let span = Span::new(start, self.cursor.pos());
        self.push_token(TokenKind::CharLit, span, value.map(LiteralValue::Char));
    }

    fn scan_string(&mut self, start: usize) {
        self.cursor.bump(); // "
        let mut decoded = String::new();
        let mut terminated = false;
        loop {
            match self.cursor.first() {
                None | Some('\n') | Some('\r') => break,
                Some('"') => {
                    self.cursor.bump();
                    terminated = true;
                    break;
                }
                Some('\\') => {
                    if let Some(c) = self.scan_escape() {
                        decoded.push(c);
                    }
                }
                Some(c) => {
                    self.cursor.bump();
                    decoded.push(c);
                }
            }
        }
        let span = Span::new(start, self.cursor.pos());
        if !terminated {
            self.error(span, "unterminated string literal");
        }
        self.push_token(TokenKind::StringLit, span, Some(LiteralValue::Str(decoded)));
    }

    fn scan_text_block(&mut self, start: usize) {
        self.cursor.bump();
        self.cursor.bump();
        self.cursor.bump(); // """
        self.cursor.eat_while(is_inline_whitespace);
        let opened = self.cursor.eat('\n') || {
            if self.cursor.eat('\r') {
                self.cursor.eat('\n');
                true
            } else {
                false
            }
        };
        if !opened {
            let span = Span::new(start, self.cursor.pos());
            self.error(span, "text block delimiter must be followed by a line terminator");
        }
        let content_start = self.cursor.pos();
        let mut terminated = false;
        loop {
            if self.cursor.is_eof() {
                break;
            }
            if self.cursor.starts_with("\"\"\"") {
                terminated = true;
                break;
            }
            if self.cursor.first() == Some('\\') {
                self.cursor.bump();
                self.cursor.bump();
            } else {
                self.cursor.bump();
            }
        }
        let content = self.cursor.slice_from(content_start).to_owned();
        if terminated {
            self.cursor.bump();
            self.cursor.bump();
            self.cursor.bump();
        }
        let span = Span::new(start, self.cursor.pos());
        if !terminated {
            self.error(span, "unterminated text block");
        }
        let value = decode_text_block(&content);
        self.push_token(TokenKind::TextBlock, span, Some(LiteralValue::Str(value)));
    }

    /// Consumes one escape sequence (after the caller saw `\`) and returns
    /// the decoded character, or `None` for malformed escapes.
    fn scan_escape(&mut self) -> Option<char> {
        let esc_start = self.cursor.pos();
        self.cursor.bump(); // backslash
        let c = self.cursor.first()?;
        match c {
            'b' => {
                self.cursor.bump();
                Some('\u{0008}')
            }
            's' => {
                self.cursor.bump();
                Some(' ')
            }
            't' => {
                self.cursor.bump();
                Some('\t')
            }
            'n' => {
                self.cursor.bump();
                Some('\n')
            }
            'f' => {
                self.cursor.bump();
                Some('\u{000C}')
            }
            'r' => {
                self.cursor.bump();
                Some('\r')
            }
            '"' => {
                self.cursor.bump();
                Some('"')
            }
            '\'' => {
                self.cursor.bump();
                Some('\'')
            }
            '\\' => {
                self.cursor.bump();
                Some('\\')
            }
            'u' => {
                while self.cursor.eat('u') {}
                let mut code: u32 = 0;
                for _ in 0..4 {
                    let d = self.cursor.first().and_then(|c| c.to_digit(16));
                    match d {
                        Some(d) => {
                            self.cursor.bump();
                            code = code * 16 + d;
                        }
                        None => {
                            let span = Span::new(esc_start, self.cursor.pos());
                            self.error(span, "malformed unicode escape");
                            return None;
                        }
                    }
                }
                char::from_u32(code)
            }
            '0'..='7' => {
                // Octal escape, up to three digits, max \377.
                let mut code: u32 = 0;
                let mut digits = 0;
                while digits < 3 {
                    match self.cursor.first().and_then(|c| c.to_digit(8)) {
                        Some(d) if code * 8 + d <= 0o377 => {
                            self.cursor.bump();
                            code = code * 8 + d;
                            digits += 1;
                        }
                        _ => break,
                    }
                }
                char::from_u32(code)
            }
            _ => {
                self.cursor.bump();
                let span = Span::new(esc_start, self.cursor.pos());
                self.error(span, format!("invalid escape sequence `\\{c}`"));
                None
            }
        }
    }
}

fn parse_int(digits: &str, radix: u32, long: bool) -> Option<i64> {
    let cleaned: String = digits.chars().filter(|&c| c != '_').collect();
    if cleaned.is_empty() {
        return Some(0);
    }
    let raw = u64::from_str_radix(&cleaned, radix).ok()?;
    let max = if long { u64::MAX } else { u32::MAX as u64 };
    if radix != 10 && raw <= max {
        // Hex/octal/binary literals may fill the sign bit.
        return Some(if long { raw as i64 } else { raw as u32 as i64 });
    }
    let signed_max = if long {
        i64::MAX as u64 + 1
    } else {
        i32::MAX as u64 + 1
    };
    // The extra unit of range is only usable under unary minus; accept it
    // here and leave the check to later phases.
    if raw <= signed_max {
        Some(raw as i64)
    } else {
        None
    }
}

fn parse_hex_float(int_digits: &str, frac_digits: &str, exp: &str) -> Option<f64> {
    let clean = |s: &str| -> String { s.chars().filter(|&c| c != '_').collect() };
    let int_part = clean(int_digits);
    let frac_part = clean(frac_digits);
    let mut mantissa = 0.0f64;
    for c in int_part.chars() {
        mantissa = mantissa * 16.0 + c.to_digit(16)? as f64;
    }
    let mut scale = 1.0 / 16.0;
    for c in frac_part.chars() {
        mantissa += c.to_digit(16)? as f64 * scale;
        scale /= 16.0;
    }
    let exp: i32 = clean(exp).parse().ok()?;
    Some(mantissa * 2f64.powi(exp))
}

/// Strips incidental whitespace from text block content per the language
/// rules: the minimum indent over non-blank lines (and the closing line)
/// is removed, trailing whitespace per line is dropped, and escapes are
/// processed afterwards by the caller's use of the raw value.
fn decode_text_block(content: &str) -> String {
    let lines: Vec<&str> = content.split_inclusive('\n').collect();
    let mut min_indent = usize::MAX;
    for (i, line) in lines.iter().enumerate() {
        let stripped = line.trim_end_matches(['\n', '\r']);
        let is_last = i + 1 == lines.len();
        if stripped.trim().is_empty() && !is_last {
            continue;
        }
        let indent = stripped.len() - stripped.trim_start().len();
        min_indent = min_indent.min(indent);
    }
    if min_indent == usize::MAX {
        min_indent = 0;
    }
    let mut out = String::new();
    for line in &lines {
        let stripped = line.trim_end_matches(['\n', '\r']);
        let had_newline = line.len() != stripped.len();
        let cut = stripped.len().min(min_indent);
        out.push_str(stripped[cut..].trim_end());
        if had_newline {
            out.push('\n');
        }
    }
    // Drop the final line (it only held the closing delimiter's indent).
    if let Some(pos) = out.rfind('\n') {
        if out[pos + 1..].trim().is_empty() {
            out.truncate(pos + 1);
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    fn lex(input: &str) -> LexOutput {
        Lexer::from_str(input).lex()
    }

    fn kinds(input: &str) -> Vec<TokenKind> {
        lex(input).tokens.iter().map(|t| t.kind).collect()
    }

    /// Tokens and trivia must partition the input bytes exactly.
    fn assert_partition(input: &str) {
        let out = lex(input);
        let mut spans: Vec<Span> = out
            .tokens
            .iter()
            .filter(|t| t.kind != TokenKind::Eof)
            .map(|t| t.span)
            .chain(out.trivia.iter().map(|t| t.span))
            .collect();
        spans.sort();
        let mut at = 0;
        for span in spans {
            assert_eq!(span.start, at, "gap or overlap at byte {at} in {input:?}");
            at = span.end;
        }
        assert_eq!(at, input.len(), "input not fully covered: {input:?}");
        assert_eq!(
            out.tokens.iter().filter(|t| t.kind == TokenKind::Eof).count(),
            1
        );
    }

    #[test]
    fn partitions_source() {
        for input in [
            "",
            "class A { int x = 1; }",
            "// only a comment\n",
            "/* block */ /** doc */",
            "int a=0x1F_2L; double d = .5e-3; float f = 1_000.5f;",
            "String s = \"hi\\n\"; char c = '\\u0041';",
            "a >>> b >>= c",
            "\"\"\"\n  text\n  \"\"\"",
            "@interface A { int value() default 3; }",
        ] {
            assert_partition(input);
        }
    }

    #[test]
    fn empty_input_yields_single_eof() {
        let out = lex("");
        assert_eq!(out.tokens.len(), 1);
        assert_eq!(out.tokens[0].kind, TokenKind::Eof);
        assert!(out.trivia.is_empty());
        assert!(out.errors.is_empty());
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(
            kinds("class var yield record _"),
            vec![
                TokenKind::ClassKw,
                TokenKind::Ident,
                TokenKind::Ident,
                TokenKind::Ident,
                TokenKind::UnderscoreKw,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn scientific_notation_is_one_token() {
        let out = lex("double x = 1.5e10;");
        let lit = out
            .tokens
            .iter()
            .find(|t| t.kind == TokenKind::DoubleLit)
            .unwrap();
        assert_eq!(lit.span.len(), 6);
        assert_eq!(
            lit.value,
            Some(LiteralValue::Double(OrderedFloat(1.5e10)))
        );
        assert!(out.errors.is_empty());
    }

    #[test]
    fn numeric_edge_cases() {
        let out = lex(".5e-3 0x1.8p3 0b1010 0777 1_000.5f 42L 0xCAFEL");
        let values: Vec<_> = out.tokens.iter().filter_map(|t| t.value.clone()).collect();
        assert_eq!(
            values,
            vec![
                LiteralValue::Double(OrderedFloat(0.5e-3)),
                LiteralValue::Double(OrderedFloat(12.0)),
                LiteralValue::Int(0b1010),
                LiteralValue::Int(0o777),
                LiteralValue::Float(OrderedFloat(1000.5f32)),
                LiteralValue::Long(42),
                LiteralValue::Long(0xCAFE),
            ]
        );
        assert!(out.errors.is_empty(), "{:?}", out.errors);
    }

    #[test]
    fn misplaced_underscore_is_reported() {
        let out = lex("int x = 1_;");
        assert_eq!(out.errors.len(), 1);
        assert!(out.errors[0].message.contains("underscores"));
    }

    #[test]
    fn gt_is_never_merged() {
        assert_eq!(
            kinds("a >> b"),
            vec![
                TokenKind::Ident,
                TokenKind::Gt,
                TokenKind::Gt,
                TokenKind::Ident,
                TokenKind::Eof
            ]
        );
        assert_eq!(
            kinds("List<List<String>>"),
            vec![
                TokenKind::Ident,
                TokenKind::Lt,
                TokenKind::Ident,
                TokenKind::Lt,
                TokenKind::Ident,
                TokenKind::Gt,
                TokenKind::Gt,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn shift_left_is_merged() {
        assert_eq!(
            kinds("a << 2"),
            vec![
                TokenKind::Ident,
                TokenKind::Shl,
                TokenKind::IntLit,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn comments_are_trivia() {
        let out = lex("int x; // trailing\n/* lead */ int y;");
        assert_eq!(
            out.trivia
                .iter()
                .filter(|t| t.is_comment())
                .count(),
            2
        );
        // The line comment trails `;` on the same line.
        let semi = &out.tokens[2];
        assert_eq!(semi.kind, TokenKind::Semicolon);
        let trailing: Vec<_> = semi.trailing.indices().map(|i| out.trivia[i].kind).collect();
        assert!(trailing.contains(&TriviaKind::LineComment));
    }

    #[test]
    fn unterminated_block_comment_is_closed_at_eof() {
        let out = lex("int x; /* no end");
        assert_eq!(out.errors.len(), 1);
        assert!(out.errors[0].message.contains("unterminated block comment"));
        assert_eq!(out.trivia.last().unwrap().kind, TriviaKind::BlockComment);
        assert_partition("int x; /* no end");
    }

    #[test]
    fn text_block_value_strips_incidental_whitespace() {
        let out = lex("String s = \"\"\"\n    hello\n    world\n    \"\"\";");
        let lit = out
            .tokens
            .iter()
            .find(|t| t.kind == TokenKind::TextBlock)
            .unwrap();
        assert_eq!(
            lit.value,
            Some(LiteralValue::Str("hello\nworld\n".to_owned()))
        );
    }

    #[test]
    fn unicode_escape_decodes_before_keyword_classification() {
        // `class` spells `class`.
        assert_eq!(
            kinds("\\u0063lass A {}"),
            vec![
                TokenKind::ClassKw,
                TokenKind::Ident,
                TokenKind::LBrace,
                TokenKind::RBrace,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn error_token_resumes_scanning() {
        let out = lex("int x = #; int y;");
        assert!(out.tokens.iter().any(|t| t.kind == TokenKind::Error));
        assert!(out.errors.iter().any(|e| e.message.contains('#')));
        // Scanning continued past the bad byte.
        assert!(out.tokens.iter().filter(|t| t.kind == TokenKind::IntKw).count() == 2);
        assert_partition("int x = #; int y;");
    }

    #[test]
    fn char_literals() {
        let out = lex(r"char a = 'x'; char b = '\n'; char c = 'A'; char d = '\101';");
        let values: Vec<_> = out.tokens.iter().filter_map(|t| t.value.clone()).collect();
        assert_eq!(
            values,
            vec![
                LiteralValue::Char('x'),
                LiteralValue::Char('\n'),
                LiteralValue::Char('A'),
                LiteralValue::Char('A'),
            ]
        );
    }
}
