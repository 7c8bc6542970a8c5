use crate::arena::{Modifiers, NodeKind};
use crate::lexer::TokenKind;
use crate::parser::{Marker, Parser};

use super::{
    declarations, expressions, is_type_declaration_start, modifiers, patterns, types,
};

pub(crate) fn block(p: &mut Parser<'_>) {
    let m = p.start();
    p.expect(TokenKind::LBrace);
    while !p.at(TokenKind::RBrace) && !p.at_eof() {
        let before = p.cursor();
        statement(p);
        debug_assert!(p.cursor() > before, "statement loop must advance");
    }
    p.expect(TokenKind::RBrace);
    m.complete(p, NodeKind::Block);
}

/// *Statement*. Always consumes at least one token.
pub(crate) fn statement(p: &mut Parser<'_>) {
    if !p.enter_recursion() {
        p.err_and_bump("statement nesting too deep");
        return;
    }
    statement_inner(p);
    p.exit_recursion();
}

fn statement_inner(p: &mut Parser<'_>) {
    match p.peek() {
        TokenKind::LBrace => block(p),
        TokenKind::Semicolon => {
            let m = p.start();
            p.bump();
            m.complete(p, NodeKind::EmptyStmt);
        }
        TokenKind::IfKw => if_statement(p),
        TokenKind::WhileKw => {
            let m = p.start();
            p.bump();
            condition(p);
            statement(p);
            m.complete(p, NodeKind::WhileStmt);
        }
        TokenKind::DoKw => {
            let m = p.start();
            p.bump();
            statement(p);
            p.expect(TokenKind::WhileKw);
            condition(p);
            p.expect(TokenKind::Semicolon);
            m.complete(p, NodeKind::DoStmt);
        }
        TokenKind::ForKw => for_statement(p),
        TokenKind::SwitchKw => {
            let m = p.start();
            p.bump();
            condition(p);
            switch_block(p);
            m.complete(p, NodeKind::SwitchStmt);
        }
        TokenKind::TryKw => try_statement(p),
        TokenKind::ReturnKw => {
            let m = p.start();
            p.bump();
            if !p.at(TokenKind::Semicolon) {
                if expressions::expression(p).is_none() {
                    p.error("expected an expression or `;` after `return`");
                }
            }
            p.expect(TokenKind::Semicolon);
            m.complete(p, NodeKind::ReturnStmt);
        }
        TokenKind::ThrowKw => {
            let m = p.start();
            p.bump();
            if expressions::expression(p).is_none() {
                p.error("expected an expression after `throw`");
            }
            p.expect(TokenKind::Semicolon);
            m.complete(p, NodeKind::ThrowStmt);
        }
        TokenKind::BreakKw => {
            let m = p.start();
            p.bump();
            if p.at(TokenKind::Ident) {
                p.bump();
            }
            p.expect(TokenKind::Semicolon);
            m.complete(p, NodeKind::BreakStmt);
        }
        TokenKind::ContinueKw => {
            let m = p.start();
            p.bump();
            if p.at(TokenKind::Ident) {
                p.bump();
            }
            p.expect(TokenKind::Semicolon);
            m.complete(p, NodeKind::ContinueStmt);
        }
        TokenKind::AssertKw => {
            let m = p.start();
            p.bump();
            if expressions::expression(p).is_none() {
                p.error("expected a condition after `assert`");
            }
            if p.eat(TokenKind::Colon) {
                if expressions::expression(p).is_none() {
                    p.error("expected a detail message");
                }
            }
            p.expect(TokenKind::Semicolon);
            m.complete(p, NodeKind::AssertStmt);
        }
        TokenKind::SynchronizedKw => {
            let m = p.start();
            p.bump();
            condition(p);
            block(p);
            m.complete(p, NodeKind::SynchronizedStmt);
        }
        // `super(...)` / `this(...)`: an explicit constructor invocation,
        // which may follow other statements in flexible constructor bodies.
        TokenKind::ThisKw | TokenKind::SuperKw if p.nth(1) == TokenKind::LParen => {
            let m = p.start();
            p.bump();
            expressions::arg_list(p);
            p.expect(TokenKind::Semicolon);
            m.complete(p, NodeKind::ExplicitCtorInvocation);
        }
        // Local class/interface/record declarations and `final`/annotated
        // local variables share a modifier prefix.
        TokenKind::ClassKw
        | TokenKind::InterfaceKw
        | TokenKind::EnumKw
        | TokenKind::AbstractKw
        | TokenKind::FinalKw
        | TokenKind::StaticKw
        | TokenKind::At => {
            let m = p.start();
            let (_, mods) = modifiers(p);
            if is_type_declaration_start(p) {
                declarations::type_declaration_after_modifiers(p, m, mods);
            } else {
                local_var_rest(p, m, mods);
            }
        }
        TokenKind::Ident
            if p.nth(1) == TokenKind::Colon && p.nth(2) != TokenKind::Colon =>
        {
            let m = p.start();
            let name = p.current_text().to_owned();
            p.bump();
            p.bump(); // :
            statement(p);
            let c = m.complete(p, NodeKind::LabeledStmt);
            p.set_name(c, &name);
        }
        TokenKind::Ident
            if p.at_word("yield") && expressions::at_expression_start(p, 1) =>
        {
            let m = p.start();
            p.bump();
            if expressions::expression(p).is_none() {
                p.error("expected an expression after `yield`");
            }
            p.expect(TokenKind::Semicolon);
            m.complete(p, NodeKind::YieldStmt);
        }
        TokenKind::Ident if p.at_word("record") && p.nth(1) == TokenKind::Ident => {
            let m = p.start();
            let (_, mods) = modifiers(p);
            declarations::type_declaration_after_modifiers(p, m, mods);
        }
        _ => {
            if types::declaration_ahead(p) {
                let m = p.start();
                local_var_rest(p, m, Modifiers::default());
            } else if expressions::at_expression_start(p, 0) {
                let m = p.start();
                expressions::expression(p);
                p.expect(TokenKind::Semicolon);
                m.complete(p, NodeKind::ExprStmt);
            } else {
                p.err_and_bump("expected a statement");
            }
        }
    }
}

/// The rest of a local variable declaration: type, declarators, `;`.
fn local_var_rest(p: &mut Parser<'_>, m: Marker, mods: Modifiers) {
    types::type_ref(p);
    loop {
        declarations::variable_declarator(p);
        if !p.eat(TokenKind::Comma) {
            break;
        }
    }
    p.expect(TokenKind::Semicolon);
    let c = m.complete(p, NodeKind::LocalVarDecl);
    p.set_modifiers(c, mods);
}

fn if_statement(p: &mut Parser<'_>) {
    let m = p.start();
    p.bump(); // if
    condition(p);
    statement(p);
    if p.eat(TokenKind::ElseKw) {
        statement(p);
    }
    m.complete(p, NodeKind::IfStmt);
}

/// `( expression )` as used by if/while/do/switch/synchronized.
fn condition(p: &mut Parser<'_>) {
    p.expect(TokenKind::LParen);
    if expressions::expression(p).is_none() {
        p.error("expected a condition expression");
    }
    p.expect(TokenKind::RParen);
}

/// Distinguishes the classic three-part `for` from the enhanced form by
/// scanning for a `:` before any `;` at parenthesis depth one; ternary
/// colons are excluded by matching them against `?`s.
fn for_statement(p: &mut Parser<'_>) {
    let m = p.start();
    p.bump(); // for
    p.expect(TokenKind::LParen);

    if for_each_ahead(p) {
        let (_, _) = modifiers(p);
        types::type_ref(p);
        match p.peek() {
            TokenKind::Ident | TokenKind::UnderscoreKw => {
                let v = p.start();
                let name = p.current_text().to_owned();
                p.bump();
                let c = v.complete(p, NodeKind::VariableDeclarator);
                p.set_name(c, &name);
            }
            _ => p.error("expected a loop variable name"),
        }
        p.expect(TokenKind::Colon);
        if expressions::expression(p).is_none() {
            p.error("expected an iterable expression");
        }
        p.expect(TokenKind::RParen);
        statement(p);
        m.complete(p, NodeKind::ForEachStmt);
        return;
    }

    // Init.
    if !p.at(TokenKind::Semicolon) {
        let init = p.start();
        if p.at(TokenKind::FinalKw) || p.at(TokenKind::At) || types::declaration_ahead(p) {
            let decl = p.start();
            let (_, mods) = modifiers(p);
            types::type_ref(p);
            loop {
                declarations::variable_declarator(p);
                if !p.eat(TokenKind::Comma) {
                    break;
                }
            }
            let c = decl.complete(p, NodeKind::LocalVarDecl);
            p.set_modifiers(c, mods);
        } else {
            loop {
                if expressions::expression(p).is_none() {
                    p.error("expected a for-init expression");
                    break;
                }
                if !p.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        init.complete(p, NodeKind::ForInit);
    }
    p.expect(TokenKind::Semicolon);

    // Condition.
    if !p.at(TokenKind::Semicolon) {
        if expressions::expression(p).is_none() {
            p.error("expected a loop condition");
        }
    }
    p.expect(TokenKind::Semicolon);

    // Update.
    if !p.at(TokenKind::RParen) {
        let update = p.start();
        loop {
            if expressions::expression(p).is_none() {
                p.error("expected a for-update expression");
                break;
            }
            if !p.eat(TokenKind::Comma) {
                break;
            }
        }
        update.complete(p, NodeKind::ForUpdate);
    }
    p.expect(TokenKind::RParen);
    statement(p);
    m.complete(p, NodeKind::ForStmt);
}

fn for_each_ahead(p: &Parser<'_>) -> bool {
    let mut depth = 1usize;
    let mut ternaries = 0usize;
    let mut i = 0usize;
    loop {
        match p.nth(i) {
            TokenKind::LParen | TokenKind::LBracket => depth += 1,
            TokenKind::RParen | TokenKind::RBracket => {
                if depth == 1 {
                    return false;
                }
                depth -= 1;
            }
            TokenKind::Semicolon if depth == 1 => return false,
            TokenKind::Question if depth == 1 => ternaries += 1,
            TokenKind::Colon if depth == 1 => {
                if ternaries == 0 {
                    return true;
                }
                ternaries -= 1;
            }
            TokenKind::Eof | TokenKind::LBrace => return false,
            _ => {}
        }
        i += 1;
    }
}

fn try_statement(p: &mut Parser<'_>) {
    let m = p.start();
    p.bump(); // try
    if p.at(TokenKind::LParen) {
        resource_list(p);
    }
    block(p);
    while p.at(TokenKind::CatchKw) {
        catch_clause(p);
    }
    if p.at(TokenKind::FinallyKw) {
        let f = p.start();
        p.bump();
        block(p);
        f.complete(p, NodeKind::FinallyClause);
    }
    m.complete(p, NodeKind::TryStmt);
}

fn resource_list(p: &mut Parser<'_>) {
    let m = p.start();
    p.bump(); // (
    while !p.at(TokenKind::RParen) && !p.at_eof() {
        resource(p);
        if !p.eat(TokenKind::Semicolon) {
            break;
        }
    }
    p.expect(TokenKind::RParen);
    m.complete(p, NodeKind::ResourceList);
}

/// Either a fresh declaration (`Type name = expr`) or an existing
/// effectively-final variable.
fn resource(p: &mut Parser<'_>) {
    let m = p.start();
    let (_, mods) = modifiers(p);
    if types::declaration_ahead(p) {
        types::type_ref(p);
        let name = p.current_text().to_owned();
        if matches!(p.peek(), TokenKind::Ident | TokenKind::UnderscoreKw) {
            p.bump();
        } else {
            p.error("expected a resource name");
        }
        p.expect(TokenKind::Assign);
        if expressions::expression(p).is_none() {
            p.error("expected a resource initializer");
        }
        let c = m.complete(p, NodeKind::Resource);
        p.set_name(c, &name);
        p.set_modifiers(c, mods);
    } else {
        if expressions::expression(p).is_none() {
            p.error("expected a resource");
        }
        m.complete(p, NodeKind::Resource);
    }
}

fn catch_clause(p: &mut Parser<'_>) {
    let m = p.start();
    p.bump(); // catch
    p.expect(TokenKind::LParen);
    let formal = p.start();
    let (_, _) = modifiers(p);
    let first = types::type_ref(p);
    if p.at(TokenKind::Pipe) {
        if let Some(first) = first {
            let union = first.precede(p);
            while p.eat(TokenKind::Pipe) {
                types::type_ref(p);
            }
            union.complete(p, NodeKind::UnionType);
        }
    }
    match p.peek() {
        TokenKind::Ident | TokenKind::UnderscoreKw => {
            let name = p.current_text().to_owned();
            p.bump();
            let c = formal.complete(p, NodeKind::CatchFormal);
            p.set_name(c, &name);
        }
        _ => {
            p.error("expected an exception variable name");
            formal.complete(p, NodeKind::CatchFormal);
        }
    }
    p.expect(TokenKind::RParen);
    block(p);
    m.complete(p, NodeKind::CatchClause);
}

/// The braced body of a switch statement or expression. Arrow rules and
/// colon groups may not be mixed, but the parser accepts either form per
/// label and leaves that check to later phases.
pub(crate) fn switch_block(p: &mut Parser<'_>) {
    let m = p.start();
    p.expect(TokenKind::LBrace);
    while !p.at(TokenKind::RBrace) && !p.at_eof() {
        match p.peek() {
            TokenKind::CaseKw | TokenKind::DefaultKw => switch_rule_or_group(p),
            _ => p.err_and_bump("expected `case` or `default`"),
        }
    }
    p.expect(TokenKind::RBrace);
    m.complete(p, NodeKind::SwitchBlock);
}

fn switch_rule_or_group(p: &mut Parser<'_>) {
    let m = p.start();
    switch_label(p);
    if p.at(TokenKind::Arrow) {
        p.bump();
        match p.peek() {
            TokenKind::LBrace => block(p),
            TokenKind::ThrowKw => statement(p),
            _ => {
                if expressions::expression(p).is_none() {
                    p.error("expected an expression after `->`");
                }
                p.expect(TokenKind::Semicolon);
            }
        }
        m.complete(p, NodeKind::SwitchRule);
        return;
    }

    p.expect(TokenKind::Colon);
    // Further stacked labels: `case 1: case 2:`.
    while matches!(p.peek(), TokenKind::CaseKw | TokenKind::DefaultKw) {
        switch_label(p);
        if !p.eat(TokenKind::Colon) {
            p.error("expected `:` after switch label");
            break;
        }
    }
    while !matches!(
        p.peek(),
        TokenKind::CaseKw | TokenKind::DefaultKw | TokenKind::RBrace | TokenKind::Eof
    ) {
        statement(p);
    }
    m.complete(p, NodeKind::SwitchGroup);
}

/// `case` with its constants/patterns and optional `when` guard, or
/// `default`.
fn switch_label(p: &mut Parser<'_>) {
    match p.peek() {
        TokenKind::CaseKw => {
            let m = p.start();
            p.bump();
            loop {
                patterns::case_item(p);
                if !p.eat(TokenKind::Comma) {
                    break;
                }
            }
            if p.at_word("when") {
                let g = p.start();
                p.bump();
                if expressions::expression(p).is_none() {
                    p.error("expected a guard expression after `when`");
                }
                g.complete(p, NodeKind::Guard);
            }
            m.complete(p, NodeKind::CaseLabel);
        }
        TokenKind::DefaultKw => {
            let m = p.start();
            p.bump();
            m.complete(p, NodeKind::DefaultLabel);
        }
        _ => p.error("expected `case` or `default`"),
    }
}
