use crate::arena::NodeKind;
use crate::lexer::TokenKind;
use crate::parser::{CompletedMarker, Parser};

/// *Type*: an annotated primitive or class/interface type, possibly with
/// array dimensions. Returns the completed type node so callers can wrap
/// it (arrays, unions, intersections).
pub(crate) fn type_ref(p: &mut Parser<'_>) -> Option<CompletedMarker> {
    if !p.enter_recursion() {
        p.err_and_bump("type nesting too deep");
        return None;
    }
    let result = type_ref_inner(p);
    p.exit_recursion();
    result
}

fn type_ref_inner(p: &mut Parser<'_>) -> Option<CompletedMarker> {
    while p.at(TokenKind::At) && p.nth(1) != TokenKind::InterfaceKw {
        super::annotation(p);
    }

    let mut base = match p.peek() {
        k if k.is_primitive_type() => {
            let m = p.start();
            p.bump();
            m.complete(p, NodeKind::PrimitiveType)
        }
        TokenKind::Ident
            if p.at_word("var")
                && p.nth(1) != TokenKind::Dot
                && p.nth(1) != TokenKind::Lt =>
        {
            let m = p.start();
            p.bump();
            m.complete(p, NodeKind::VarType)
        }
        TokenKind::Ident => class_type(p),
        _ => {
            p.error("expected a type");
            return None;
        }
    };

    // Array dimensions, each optionally annotated: `int @A [] []`.
    loop {
        let mut probe = 0;
        while p.nth(probe) == TokenKind::At {
            // Skip the probe past `@Name` (dotted names are rare here).
            if p.nth(probe + 1) == TokenKind::Ident {
                probe += 2;
            } else {
                break;
            }
        }
        if p.nth(probe) == TokenKind::LBracket && p.nth(probe + 1) == TokenKind::RBracket {
            let m = base.precede(p);
            while p.at(TokenKind::At) {
                super::annotation(p);
            }
            p.bump(); // [
            p.bump(); // ]
            base = m.complete(p, NodeKind::ArrayType);
        } else {
            break;
        }
    }
    Some(base)
}

/// `Ident TypeArgs? (. Ident TypeArgs?)*`
fn class_type(p: &mut Parser<'_>) -> CompletedMarker {
    let m = p.start();
    let mut name = String::new();
    name.push_str(p.current_text());
    p.bump();
    if p.at(TokenKind::Lt) {
        type_args(p);
    }
    while p.at(TokenKind::Dot) && (p.nth(1) == TokenKind::Ident || p.nth(1) == TokenKind::At) {
        p.bump(); // .
        while p.at(TokenKind::At) {
            super::annotation(p);
        }
        if !p.at(TokenKind::Ident) {
            break;
        }
        name.push('.');
        name.push_str(p.current_text());
        p.bump();
        if p.at(TokenKind::Lt) {
            type_args(p);
        }
    }
    let c = m.complete(p, NodeKind::ClassType);
    p.set_name(c, &name);
    c
}

/// `< TypeArgument (, TypeArgument)* >` or the diamond `<>`.
pub(crate) fn type_args(p: &mut Parser<'_>) {
    let m = p.start();
    p.expect(TokenKind::Lt);
    if !p.at(TokenKind::Gt) && !p.at_eof() {
        loop {
            type_argument(p);
            if !p.eat(TokenKind::Comma) {
                break;
            }
        }
    }
    p.expect(TokenKind::Gt);
    m.complete(p, NodeKind::TypeArgs);
}

fn type_argument(p: &mut Parser<'_>) {
    while p.at(TokenKind::At) {
        super::annotation(p);
    }
    if p.at(TokenKind::Question) {
        let m = p.start();
        p.bump();
        if p.at(TokenKind::ExtendsKw) || p.at(TokenKind::SuperKw) {
            p.bump();
            type_ref(p);
        }
        m.complete(p, NodeKind::WildcardType);
    } else {
        type_ref(p);
    }
}

/// `void` or a type; method return position.
pub(crate) fn return_type(p: &mut Parser<'_>) {
    if p.at(TokenKind::VoidKw) {
        let m = p.start();
        p.bump();
        m.complete(p, NodeKind::VoidType);
    } else {
        type_ref(p);
    }
}

pub(crate) fn at_type_start(p: &Parser<'_>) -> bool {
    p.peek().is_primitive_type() || p.at(TokenKind::Ident) || p.at(TokenKind::At)
}

// ----------------------------------------------------------------------
// Probes. These scan token offsets and never touch the tree.
// ----------------------------------------------------------------------

/// Whether a type followed by a declarator name starts at the cursor —
/// i.e. this is a declaration, not an expression statement.
pub(crate) fn declaration_ahead(p: &Parser<'_>) -> bool {
    match type_end(p, 0) {
        Some(end) => matches!(p.nth(end), TokenKind::Ident | TokenKind::UnderscoreKw),
        None => false,
    }
}

/// Returns the offset just past a type starting at offset `i`, or `None`
/// if the tokens there do not look like a type.
pub(crate) fn type_end(p: &Parser<'_>, mut i: usize) -> Option<usize> {
    match p.nth(i) {
        k if k.is_primitive_type() => i += 1,
        TokenKind::Ident => {
            i += 1;
            loop {
                if p.nth(i) == TokenKind::Lt {
                    i = skip_angles(p, i)?;
                }
                if p.nth(i) == TokenKind::Dot && p.nth(i + 1) == TokenKind::Ident {
                    i += 2;
                } else {
                    break;
                }
            }
        }
        _ => return None,
    }
    while p.nth(i) == TokenKind::LBracket && p.nth(i + 1) == TokenKind::RBracket {
        i += 2;
    }
    Some(i)
}

/// Skips a balanced `< ... >` run starting at offset `i` (which must hold
/// `<`). Only tokens that can occur in type arguments are accepted; `>`
/// closes one level per token since the lexer never merges them.
fn skip_angles(p: &Parser<'_>, mut i: usize) -> Option<usize> {
    debug_assert_eq!(p.nth(i), TokenKind::Lt);
    let mut depth = 0usize;
    loop {
        match p.nth(i) {
            TokenKind::Lt => depth += 1,
            TokenKind::Gt => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            TokenKind::Ident
            | TokenKind::Dot
            | TokenKind::Comma
            | TokenKind::Question
            | TokenKind::ExtendsKw
            | TokenKind::SuperKw
            | TokenKind::LBracket
            | TokenKind::RBracket
            | TokenKind::At
            | TokenKind::Amp => {}
            k if k.is_primitive_type() => {}
            _ => return None,
        }
        i += 1;
    }
}
