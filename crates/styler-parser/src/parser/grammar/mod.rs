//! One function per grammar production, in the style of a hand-written
//! recursive-descent parser. Functions take `&mut Parser` and build nodes
//! through markers; probes that disambiguate (`lambda` vs parenthesized
//! expression, cast vs parenthesized, declaration vs expression statement)
//! scan token indices and never allocate nodes.

mod declarations;
mod expressions;
mod modules;
mod patterns;
mod statements;
mod types;

pub(crate) use declarations::type_declaration_after_modifiers;
pub(crate) use expressions::expression;

use crate::arena::{Modifiers, NodeKind};
use crate::lexer::TokenKind;
use crate::parser::{CompletedMarker, Parser};

/// *CompilationUnit*:
///     PackageDeclaration? ImportDeclaration* TypeDeclaration*
///     | ImportDeclaration* ModuleDeclaration
///     | ImportDeclaration* (top-level members: an implicit class)
pub(crate) fn compilation_unit(p: &mut Parser<'_>) {
    while !p.at_eof() {
        let before = p.cursor();
        match p.peek() {
            TokenKind::ImportKw => import_declaration(p),
            TokenKind::Semicolon => {
                let m = p.start();
                p.bump();
                m.complete(p, NodeKind::EmptyStmt);
            }
            _ => top_level(p),
        }
        debug_assert!(p.cursor() > before, "compilation unit loop must advance");
    }
}

/// Parses modifiers, then dispatches on what follows: a package
/// declaration, a type declaration, a module declaration, or — for
/// unnamed class files — a run of top-level members.
fn top_level(p: &mut Parser<'_>) {
    let m = p.start();
    let (mods_node, mods) = modifiers(p);

    if p.at(TokenKind::PackageKw) {
        p.bump();
        let name = qualified_name(p);
        p.expect(TokenKind::Semicolon);
        let c = m.complete(p, NodeKind::PackageDecl);
        p.set_name(c, &name);
        return;
    }

    if is_type_declaration_start(p) {
        type_declaration_after_modifiers(p, m, mods);
        return;
    }

    if p.at_word("module") || (p.at_word("open") && p.nth_text(1) == "module") {
        modules::module_declaration(p, m);
        return;
    }

    // Anything else that looks like a member belongs to an implicit class.
    if declarations::at_member_start(p) {
        declarations::implicit_class(p, m, mods_node, mods);
        return;
    }

    m.abandon(p);
    p.err_and_bump("expected a declaration");
}

/// *ImportDeclaration*:
///     **import** Name (**.** `*`)? **;**
///     **import** **static** Name (**.** `*`)? **;**
///     **import** **module** Name **;**
fn import_declaration(p: &mut Parser<'_>) {
    let m = p.start();
    p.bump(); // import
    if p.at(TokenKind::StaticKw) {
        p.bump();
    } else if p.at_word("module") && p.nth(1) == TokenKind::Ident {
        p.bump();
    }
    let mut name = qualified_name(p);
    if p.at(TokenKind::Dot) && p.nth(1) == TokenKind::Star {
        p.bump();
        p.bump();
        name.push_str(".*");
    }
    p.expect(TokenKind::Semicolon);
    let c = m.complete(p, NodeKind::ImportDecl);
    p.set_name(c, &name);
}

pub(crate) fn is_type_declaration_start(p: &Parser<'_>) -> bool {
    match p.peek() {
        TokenKind::ClassKw | TokenKind::InterfaceKw | TokenKind::EnumKw => true,
        TokenKind::At => p.nth(1) == TokenKind::InterfaceKw,
        TokenKind::Ident => p.at_word("record") && p.nth(1) == TokenKind::Ident,
        _ => false,
    }
}

/// Parses a possibly-empty run of annotations and modifier keywords into a
/// `Modifiers` node (omitted entirely when there is nothing to hold) and
/// returns the node plus the collected bitset. `sealed` and `non-sealed`
/// are contextual; `non-sealed` is fused from three adjacent tokens.
pub(crate) fn modifiers(p: &mut Parser<'_>) -> (Option<CompletedMarker>, Modifiers) {
    let mut mods = Modifiers::default();
    let m = p.start();
    let mut any = false;
    loop {
        let flag = match p.peek() {
            TokenKind::PublicKw => Some(Modifiers::PUBLIC),
            TokenKind::ProtectedKw => Some(Modifiers::PROTECTED),
            TokenKind::PrivateKw => Some(Modifiers::PRIVATE),
            TokenKind::StaticKw => Some(Modifiers::STATIC),
            TokenKind::FinalKw => Some(Modifiers::FINAL),
            TokenKind::AbstractKw => Some(Modifiers::ABSTRACT),
            TokenKind::NativeKw => Some(Modifiers::NATIVE),
            TokenKind::SynchronizedKw => Some(Modifiers::SYNCHRONIZED),
            TokenKind::TransientKw => Some(Modifiers::TRANSIENT),
            TokenKind::VolatileKw => Some(Modifiers::VOLATILE),
            TokenKind::StrictfpKw => Some(Modifiers::STRICTFP),
            TokenKind::DefaultKw => Some(Modifiers::DEFAULT),
            TokenKind::At if p.nth(1) != TokenKind::InterfaceKw => {
                annotation(p);
                any = true;
                continue;
            }
            TokenKind::Ident if p.at_word("sealed") => Some(Modifiers::SEALED),
            TokenKind::Ident
                if p.at_word("non")
                    && p.nth(1) == TokenKind::Minus
                    && p.nth_text(2) == "sealed"
                    && p.adjacent(0)
                    && p.adjacent(1) =>
            {
                p.bump();
                p.bump();
                p.bump();
                mods.insert(Modifiers::NON_SEALED);
                any = true;
                continue;
            }
            _ => None,
        };
        match flag {
            Some(flag) => {
                p.bump();
                mods.insert(flag);
                any = true;
            }
            None => break,
        }
    }
    if any {
        let c = m.complete(p, NodeKind::Modifiers);
        (Some(c), mods)
    } else {
        m.abandon(p);
        (None, mods)
    }
}

/// *Annotation*:
///     **@** TypeName ( **(** ... **)** )?
pub(crate) fn annotation(p: &mut Parser<'_>) {
    let m = p.start();
    p.expect(TokenKind::At);
    let name = qualified_name(p);
    if p.at(TokenKind::LParen) {
        annotation_args(p);
    }
    let c = m.complete(p, NodeKind::Annotation);
    p.set_name(c, &name);
}

/// The parenthesized part of an annotation: a single element value or a
/// comma-separated list of `name = value` pairs.
fn annotation_args(p: &mut Parser<'_>) {
    let m = p.start();
    p.bump(); // (
    if !p.at(TokenKind::RParen) {
        loop {
            if p.at(TokenKind::Ident) && p.nth(1) == TokenKind::Assign {
                let pair = p.start();
                let name = p.current_text().to_owned();
                p.bump();
                p.bump(); // =
                annotation_value(p);
                let c = pair.complete(p, NodeKind::AnnotationValuePair);
                p.set_name(c, &name);
            } else {
                annotation_value(p);
            }
            if !p.eat(TokenKind::Comma) {
                break;
            }
        }
    }
    p.expect(TokenKind::RParen);
    m.complete(p, NodeKind::AnnotationArgs);
}

/// An annotation element value: a nested annotation, an array initializer,
/// or a (conditional) expression.
pub(crate) fn annotation_value(p: &mut Parser<'_>) {
    match p.peek() {
        TokenKind::At => {
            if p.enter_recursion() {
                annotation(p);
                p.exit_recursion();
            } else {
                p.err_and_bump("annotation nesting too deep");
            }
        }
        TokenKind::LBrace => expressions::array_initializer(p),
        _ => {
            expression(p);
        }
    }
}

/// Consumes `Ident (. Ident)*`, returning the dotted text for attributes.
/// The tokens stay inside the caller's node.
pub(crate) fn qualified_name(p: &mut Parser<'_>) -> String {
    let mut text = String::new();
    if p.at(TokenKind::Ident) {
        text.push_str(p.current_text());
        p.bump();
    } else {
        p.error("expected a name");
        return text;
    }
    while p.at(TokenKind::Dot) && p.nth(1) == TokenKind::Ident {
        p.bump();
        text.push('.');
        text.push_str(p.current_text());
        p.bump();
    }
    text
}
