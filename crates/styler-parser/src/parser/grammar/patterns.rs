use crate::arena::NodeKind;
use crate::lexer::TokenKind;
use crate::parser::Parser;

use super::{expressions, modifiers, types};

/// The right-hand side of `instanceof`: a type pattern, a record
/// deconstruction pattern, or a plain type.
pub(crate) fn pattern_or_type(p: &mut Parser<'_>) {
    if pattern_ahead(p) {
        pattern(p);
    } else {
        types::type_ref(p);
    }
}

/// *Pattern*:
///     Modifiers? Type Ident            (type pattern)
///     Modifiers? Type **(** PatternList? **)**   (record pattern)
pub(crate) fn pattern(p: &mut Parser<'_>) {
    if !p.enter_recursion() {
        p.err_and_bump("pattern nesting too deep");
        return;
    }
    pattern_inner(p);
    p.exit_recursion();
}

fn pattern_inner(p: &mut Parser<'_>) {
    let m = p.start();
    let (_, _) = modifiers(p);
    types::type_ref(p);
    if p.at(TokenKind::LParen) {
        p.bump();
        if !p.at(TokenKind::RParen) && !p.at_eof() {
            loop {
                component_pattern(p);
                if !p.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        p.expect(TokenKind::RParen);
        m.complete(p, NodeKind::RecordPattern);
        return;
    }
    let name = match p.peek() {
        TokenKind::Ident | TokenKind::UnderscoreKw => {
            let n = p.current_text().to_owned();
            p.bump();
            n
        }
        _ => {
            p.error("expected a pattern variable name");
            String::new()
        }
    };
    let c = m.complete(p, NodeKind::TypePattern);
    p.set_name(c, &name);
}

/// One component of a record pattern: a nested pattern, or the unnamed
/// variable `_`.
fn component_pattern(p: &mut Parser<'_>) {
    if p.at(TokenKind::UnderscoreKw) {
        let m = p.start();
        p.bump();
        let c = m.complete(p, NodeKind::TypePattern);
        p.set_name(c, "_");
        return;
    }
    if pattern_ahead(p) {
        pattern(p);
    } else {
        p.err_and_bump("expected a pattern");
    }
}

/// One element of a `case` label: `null`, `default`, a pattern, or a
/// constant expression.
pub(crate) fn case_item(p: &mut Parser<'_>) {
    match p.peek() {
        TokenKind::NullKw => {
            let m = p.start();
            p.bump();
            m.complete(p, NodeKind::Literal);
        }
        TokenKind::DefaultKw => {
            let m = p.start();
            p.bump();
            m.complete(p, NodeKind::DefaultLabel);
        }
        _ => {
            if pattern_ahead(p) {
                pattern(p);
            } else if expressions::expression(p).is_none() {
                p.err_and_bump("expected a case constant or pattern");
            }
        }
    }
}

/// Probe: a type followed by a declarator name, `_`, or `(` means a
/// pattern rather than a constant expression or plain type.
fn pattern_ahead(p: &Parser<'_>) -> bool {
    if p.at(TokenKind::UnderscoreKw) {
        return true;
    }
    let mut i = 0;
    // Skip `final` and simple annotations in the probe.
    loop {
        match p.nth(i) {
            TokenKind::FinalKw => i += 1,
            TokenKind::At if p.nth(i + 1) == TokenKind::Ident => i += 2,
            _ => break,
        }
    }
    match types::type_end(p, i) {
        Some(end) => matches!(
            p.nth(end),
            TokenKind::Ident | TokenKind::UnderscoreKw | TokenKind::LParen
        ),
        None => false,
    }
}
