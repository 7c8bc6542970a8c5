use crate::arena::NodeKind;
use crate::lexer::TokenKind;
use crate::parser::{Marker, Parser};

use super::qualified_name;

/// *ModuleDeclaration*:
///     Annotation* **open**? **module** Name **{** ModuleDirective* **}**
pub(crate) fn module_declaration(p: &mut Parser<'_>, m: Marker) {
    if p.at_word("open") {
        p.bump();
    }
    p.bump(); // module (contextual)
    let name = qualified_name(p);
    p.expect(TokenKind::LBrace);
    while !p.at(TokenKind::RBrace) && !p.at_eof() {
        module_directive(p);
    }
    p.expect(TokenKind::RBrace);
    let c = m.complete(p, NodeKind::ModuleDecl);
    p.set_name(c, &name);
}

/// One of the five module directives. All keywords here are contextual.
fn module_directive(p: &mut Parser<'_>) {
    if p.at_word("requires") {
        let m = p.start();
        p.bump();
        // `transitive` / `static` qualifiers; `transitive` may itself be
        // the required module's name, so require a name after it.
        loop {
            if p.at(TokenKind::StaticKw) {
                p.bump();
            } else if p.at_word("transitive") && p.nth(1) == TokenKind::Ident {
                p.bump();
            } else {
                break;
            }
        }
        let name = qualified_name(p);
        p.expect(TokenKind::Semicolon);
        let c = m.complete(p, NodeKind::RequiresDirective);
        p.set_name(c, &name);
    } else if p.at_word("exports") || p.at_word("opens") {
        let kind = if p.at_word("exports") {
            NodeKind::ExportsDirective
        } else {
            NodeKind::OpensDirective
        };
        let m = p.start();
        p.bump();
        let name = qualified_name(p);
        if p.at_word("to") {
            p.bump();
            loop {
                qualified_name(p);
                if !p.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        p.expect(TokenKind::Semicolon);
        let c = m.complete(p, kind);
        p.set_name(c, &name);
    } else if p.at_word("uses") {
        let m = p.start();
        p.bump();
        let name = qualified_name(p);
        p.expect(TokenKind::Semicolon);
        let c = m.complete(p, NodeKind::UsesDirective);
        p.set_name(c, &name);
    } else if p.at_word("provides") {
        let m = p.start();
        p.bump();
        let name = qualified_name(p);
        if p.at_word("with") {
            p.bump();
            loop {
                qualified_name(p);
                if !p.eat(TokenKind::Comma) {
                    break;
                }
            }
        } else {
            p.error("expected `with` in provides directive");
        }
        p.expect(TokenKind::Semicolon);
        let c = m.complete(p, NodeKind::ProvidesDirective);
        p.set_name(c, &name);
    } else {
        p.err_and_bump("expected a module directive");
    }
}
