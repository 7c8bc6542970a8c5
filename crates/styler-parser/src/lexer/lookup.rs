use crate::lexer::TokenKind;

/// Classifies a scanned word as a reserved keyword, boolean/null literal, or
/// `None` for a plain identifier. Contextual keywords (`var`, `yield`,
/// `record`, `sealed`, `permits`, `module`, ...) are identifiers here; the
/// parser decides by text.
pub(crate) fn keyword_kind(text: &str) -> Option<TokenKind> {
    use TokenKind::*;
    let kind = match text {
        "abstract" => AbstractKw,
        "assert" => AssertKw,
        "boolean" => BooleanKw,
        "break" => BreakKw,
        "byte" => ByteKw,
        "case" => CaseKw,
        "catch" => CatchKw,
        "char" => CharKw,
        "class" => ClassKw,
        "const" => ConstKw,
        "continue" => ContinueKw,
        "default" => DefaultKw,
        "do" => DoKw,
        "double" => DoubleKw,
        "else" => ElseKw,
        "enum" => EnumKw,
        "extends" => ExtendsKw,
        "final" => FinalKw,
        "finally" => FinallyKw,
        "float" => FloatKw,
        "for" => ForKw,
        "goto" => GotoKw,
        "if" => IfKw,
        "implements" => ImplementsKw,
        "import" => ImportKw,
        "instanceof" => InstanceofKw,
        "int" => IntKw,
        "interface" => InterfaceKw,
        "long" => LongKw,
        "native" => NativeKw,
        "new" => NewKw,
        "package" => PackageKw,
        "private" => PrivateKw,
        "protected" => ProtectedKw,
        "public" => PublicKw,
        "return" => ReturnKw,
        "short" => ShortKw,
        "static" => StaticKw,
        "strictfp" => StrictfpKw,
        "super" => SuperKw,
        "switch" => SwitchKw,
        "synchronized" => SynchronizedKw,
        "this" => ThisKw,
        "throw" => ThrowKw,
        "throws" => ThrowsKw,
        "transient" => TransientKw,
        "try" => TryKw,
        "void" => VoidKw,
        "volatile" => VolatileKw,
        "while" => WhileKw,
        "true" => TrueKw,
        "false" => FalseKw,
        "null" => NullKw,
        "_" => UnderscoreKw,
        _ => return None,
    };
    Some(kind)
}

/// JLS `JavaLetter`: letters, `_`, `$`, and non-ASCII letters.
pub(crate) fn is_ident_start(c: char) -> bool {
    c == '_' || c == '$' || c.is_alphabetic()
}

/// JLS `JavaLetterOrDigit`.
pub(crate) fn is_ident_part(c: char) -> bool {
    is_ident_start(c) || c.is_numeric() || matches!(c, '\u{200C}' | '\u{200D}')
}

pub(crate) fn is_digit(c: char) -> bool {
    c.is_ascii_digit()
}

pub(crate) fn is_hex_digit(c: char) -> bool {
    c.is_ascii_hexdigit()
}

/// Horizontal whitespace; line terminators are separate trivia.
pub(crate) fn is_inline_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\u{000C}')
}
