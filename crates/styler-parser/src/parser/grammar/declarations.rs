use crate::arena::{Modifiers, NodeKind};
use crate::lexer::TokenKind;
use crate::parser::{CompletedMarker, Marker, Parser};

use super::{expressions, is_type_declaration_start, modifiers, statements, types};

/// Dispatches a type declaration whose modifiers have already been parsed
/// into the open marker `m`.
pub(crate) fn type_declaration_after_modifiers(
    p: &mut Parser<'_>,
    m: Marker,
    mods: Modifiers,
) {
    match p.peek() {
        TokenKind::ClassKw => class_declaration(p, m, mods),
        TokenKind::InterfaceKw => interface_declaration(p, m, mods),
        TokenKind::EnumKw => enum_declaration(p, m, mods),
        TokenKind::At => annotation_declaration(p, m, mods),
        TokenKind::Ident if p.at_word("record") => record_declaration(p, m, mods),
        _ => {
            m.complete(p, NodeKind::Error);
            p.err_and_bump("expected a type declaration");
        }
    }
}

/// *ClassDeclaration*:
///     Modifiers? **class** Ident TypeParameters? Superclass?
///     Superinterfaces? PermittedSubclasses? ClassBody
fn class_declaration(p: &mut Parser<'_>, m: Marker, mods: Modifiers) {
    p.bump(); // class
    let name = declared_name(p);
    if p.at(TokenKind::Lt) {
        type_parameters(p);
    }
    if p.at(TokenKind::ExtendsKw) {
        extends_clause(p);
    }
    if p.at(TokenKind::ImplementsKw) {
        implements_clause(p);
    }
    if p.at_word("permits") {
        permits_clause(p);
    }
    class_body(p);
    let c = m.complete(p, NodeKind::ClassDecl);
    finish_decl(p, c, &name, mods);
}

fn interface_declaration(p: &mut Parser<'_>, m: Marker, mods: Modifiers) {
    p.bump(); // interface
    let name = declared_name(p);
    if p.at(TokenKind::Lt) {
        type_parameters(p);
    }
    if p.at(TokenKind::ExtendsKw) {
        extends_clause(p);
    }
    if p.at_word("permits") {
        permits_clause(p);
    }
    class_body(p);
    let c = m.complete(p, NodeKind::InterfaceDecl);
    finish_decl(p, c, &name, mods);
}

/// *RecordDeclaration*:
///     Modifiers? **record** Ident TypeParameters? RecordHeader
///     Superinterfaces? ClassBody
fn record_declaration(p: &mut Parser<'_>, m: Marker, mods: Modifiers) {
    p.bump(); // record (contextual)
    let name = declared_name(p);
    if p.at(TokenKind::Lt) {
        type_parameters(p);
    }
    record_header(p);
    if p.at(TokenKind::ImplementsKw) {
        implements_clause(p);
    }
    class_body(p);
    let c = m.complete(p, NodeKind::RecordDecl);
    finish_decl(p, c, &name, mods);
}

fn record_header(p: &mut Parser<'_>) {
    let m = p.start();
    p.expect(TokenKind::LParen);
    if !p.at(TokenKind::RParen) && !p.at_eof() {
        loop {
            record_component(p);
            if !p.eat(TokenKind::Comma) {
                break;
            }
        }
    }
    p.expect(TokenKind::RParen);
    m.complete(p, NodeKind::RecordHeader);
}

fn record_component(p: &mut Parser<'_>) {
    let m = p.start();
    let (_, _) = modifiers(p);
    types::type_ref(p);
    p.eat(TokenKind::Ellipsis);
    let name = declared_name(p);
    let c = m.complete(p, NodeKind::RecordComponent);
    p.set_name(c, &name);
}

/// *EnumDeclaration*: constants first, then ordinary members after `;`.
fn enum_declaration(p: &mut Parser<'_>, m: Marker, mods: Modifiers) {
    p.bump(); // enum
    let name = declared_name(p);
    if p.at(TokenKind::ImplementsKw) {
        implements_clause(p);
    }
    let body = p.start();
    p.expect(TokenKind::LBrace);
    while !p.at(TokenKind::RBrace)
        && !p.at(TokenKind::Semicolon)
        && !p.at_eof()
    {
        enum_constant(p);
        if !p.eat(TokenKind::Comma) {
            break;
        }
    }
    if p.eat(TokenKind::Semicolon) {
        while !p.at(TokenKind::RBrace) && !p.at_eof() {
            member(p);
        }
    }
    p.expect(TokenKind::RBrace);
    body.complete(p, NodeKind::ClassBody);
    let c = m.complete(p, NodeKind::EnumDecl);
    finish_decl(p, c, &name, mods);
}

fn enum_constant(p: &mut Parser<'_>) {
    let m = p.start();
    let (_, _) = modifiers(p);
    let name = declared_name(p);
    if p.at(TokenKind::LParen) {
        expressions::arg_list(p);
    }
    if p.at(TokenKind::LBrace) {
        class_body(p);
    }
    let c = m.complete(p, NodeKind::EnumConstant);
    p.set_name(c, &name);
}

/// *AnnotationInterfaceDeclaration*: **@** **interface** Ident Body
fn annotation_declaration(p: &mut Parser<'_>, m: Marker, mods: Modifiers) {
    p.expect(TokenKind::At);
    p.expect(TokenKind::InterfaceKw);
    let name = declared_name(p);
    class_body(p);
    let c = m.complete(p, NodeKind::AnnotationDecl);
    finish_decl(p, c, &name, mods);
}

pub(crate) fn class_body(p: &mut Parser<'_>) {
    if !p.enter_recursion() {
        p.err_and_bump("type declaration nesting too deep");
        return;
    }
    let m = p.start();
    p.expect(TokenKind::LBrace);
    while !p.at(TokenKind::RBrace) && !p.at_eof() {
        let before = p.cursor();
        member(p);
        debug_assert!(p.cursor() > before, "member loop must advance");
    }
    p.expect(TokenKind::RBrace);
    m.complete(p, NodeKind::ClassBody);
    p.exit_recursion();
}

/// One class-body member: a nested type, field, method, constructor,
/// compact constructor, initializer block, or stray `;`.
pub(crate) fn member(p: &mut Parser<'_>) {
    match p.peek() {
        TokenKind::Semicolon => {
            let m = p.start();
            p.bump();
            m.complete(p, NodeKind::EmptyStmt);
        }
        TokenKind::LBrace => {
            let m = p.start();
            statements::block(p);
            m.complete(p, NodeKind::InitializerBlock);
        }
        _ => {
            let m = p.start();
            let (_, mods) = modifiers(p);
            member_after_modifiers(p, m, mods);
        }
    }
}

pub(crate) fn member_after_modifiers(p: &mut Parser<'_>, m: Marker, mods: Modifiers) {
    // `static { ... }` initializer.
    if p.at(TokenKind::LBrace) {
        statements::block(p);
        let c = m.complete(p, NodeKind::InitializerBlock);
        p.set_modifiers(c, mods);
        return;
    }

    if is_type_declaration_start(p) {
        type_declaration_after_modifiers(p, m, mods);
        return;
    }

    // Generic method or constructor.
    if p.at(TokenKind::Lt) {
        type_parameters(p);
        if p.at(TokenKind::Ident) && p.nth(1) == TokenKind::LParen {
            constructor_rest(p, m, mods);
        } else {
            types::return_type(p);
            method_rest(p, m, mods);
        }
        return;
    }

    // Constructor: a bare name directly followed by `(`.
    if p.at(TokenKind::Ident) && p.nth(1) == TokenKind::LParen {
        constructor_rest(p, m, mods);
        return;
    }

    // Compact record constructor: a bare name directly followed by `{`.
    if p.at(TokenKind::Ident) && p.nth(1) == TokenKind::LBrace {
        let name = declared_name(p);
        statements::block(p);
        let c = m.complete(p, NodeKind::CompactConstructorDecl);
        finish_decl(p, c, &name, mods);
        return;
    }

    if !types::at_type_start(p) && !p.at(TokenKind::VoidKw) {
        p.error("expected a member declaration");
        skip_to_member_boundary(p);
        m.complete(p, NodeKind::Error);
        return;
    }

    types::return_type(p);
    match p.peek() {
        TokenKind::Ident | TokenKind::UnderscoreKw if p.nth(1) == TokenKind::LParen => {
            method_rest(p, m, mods);
        }
        TokenKind::Ident | TokenKind::UnderscoreKw => {
            field_rest(p, m, mods);
        }
        _ => {
            p.error("expected a field or method name");
            skip_to_member_boundary(p);
            m.complete(p, NodeKind::Error);
        }
    }
}

/// Panic-mode resync for broken members: stop before a closing brace or
/// just past a `;` so the enclosing body keeps its structure.
fn skip_to_member_boundary(p: &mut Parser<'_>) {
    while !p.at_eof() && !matches!(p.peek(), TokenKind::RBrace | TokenKind::Semicolon) {
        p.bump();
    }
    p.eat(TokenKind::Semicolon);
}

fn constructor_rest(p: &mut Parser<'_>, m: Marker, mods: Modifiers) {
    let name = declared_name(p);
    parameter_list(p);
    if p.at(TokenKind::ThrowsKw) {
        throws_clause(p);
    }
    statements::block(p);
    let c = m.complete(p, NodeKind::ConstructorDecl);
    finish_decl(p, c, &name, mods);
}

/// The remainder of a method after its return type: name, parameters,
/// extra array dims, throws, and a block body or `;`. An annotation
/// interface element (`int value() default 3;`) takes the same shape plus
/// a `default` clause and is re-kinded accordingly.
fn method_rest(p: &mut Parser<'_>, m: Marker, mods: Modifiers) {
    let name = declared_name(p);
    parameter_list(p);
    while p.at(TokenKind::LBracket) && p.nth(1) == TokenKind::RBracket {
        p.bump();
        p.bump();
    }
    if p.at(TokenKind::ThrowsKw) {
        throws_clause(p);
    }
    let mut is_annotation_element = false;
    if p.at(TokenKind::DefaultKw) {
        p.bump();
        super::annotation_value(p);
        is_annotation_element = true;
    }
    if p.at(TokenKind::LBrace) {
        statements::block(p);
    } else {
        p.expect(TokenKind::Semicolon);
    }
    let kind = if is_annotation_element {
        NodeKind::AnnotationElementDecl
    } else {
        NodeKind::MethodDecl
    };
    let c = m.complete(p, kind);
    finish_decl(p, c, &name, mods);
}

fn field_rest(p: &mut Parser<'_>, m: Marker, mods: Modifiers) {
    loop {
        variable_declarator(p);
        if !p.eat(TokenKind::Comma) {
            break;
        }
    }
    p.expect(TokenKind::Semicolon);
    let c = m.complete(p, NodeKind::FieldDecl);
    p.set_modifiers(c, mods);
}

/// `name dims? (= initializer)?`, shared by fields and local variables.
pub(crate) fn variable_declarator(p: &mut Parser<'_>) {
    let m = p.start();
    let name = declared_name(p);
    while p.at(TokenKind::LBracket) && p.nth(1) == TokenKind::RBracket {
        p.bump();
        p.bump();
    }
    if p.eat(TokenKind::Assign) {
        variable_initializer(p);
    }
    let c = m.complete(p, NodeKind::VariableDeclarator);
    p.set_name(c, &name);
}

pub(crate) fn variable_initializer(p: &mut Parser<'_>) {
    if p.at(TokenKind::LBrace) {
        expressions::array_initializer(p);
    } else {
        expressions::expression(p);
    }
}

pub(crate) fn parameter_list(p: &mut Parser<'_>) {
    let m = p.start();
    p.expect(TokenKind::LParen);
    if !p.at(TokenKind::RParen) && !p.at_eof() {
        loop {
            parameter(p);
            if !p.eat(TokenKind::Comma) {
                break;
            }
        }
    }
    p.expect(TokenKind::RParen);
    m.complete(p, NodeKind::ParamList);
}

/// A formal parameter, including varargs and the receiver parameter
/// (`Type this`).
pub(crate) fn parameter(p: &mut Parser<'_>) {
    let m = p.start();
    let (_, _) = modifiers(p);
    types::type_ref(p);
    p.eat(TokenKind::Ellipsis);
    let name = match p.peek() {
        TokenKind::Ident | TokenKind::UnderscoreKw => declared_name(p),
        TokenKind::ThisKw => {
            p.bump();
            "this".to_owned()
        }
        _ => {
            p.error("expected a parameter name");
            String::new()
        }
    };
    while p.at(TokenKind::LBracket) && p.nth(1) == TokenKind::RBracket {
        p.bump();
        p.bump();
    }
    let c = m.complete(p, NodeKind::Param);
    p.set_name(c, &name);
}

pub(crate) fn throws_clause(p: &mut Parser<'_>) {
    let m = p.start();
    p.bump(); // throws
    loop {
        types::type_ref(p);
        if !p.eat(TokenKind::Comma) {
            break;
        }
    }
    m.complete(p, NodeKind::ThrowsClause);
}

pub(crate) fn type_parameters(p: &mut Parser<'_>) {
    let m = p.start();
    p.expect(TokenKind::Lt);
    if !p.at(TokenKind::Gt) && !p.at_eof() {
        loop {
            type_parameter(p);
            if !p.eat(TokenKind::Comma) {
                break;
            }
        }
    }
    p.expect(TokenKind::Gt);
    m.complete(p, NodeKind::TypeParams);
}

fn type_parameter(p: &mut Parser<'_>) {
    let m = p.start();
    while p.at(TokenKind::At) {
        super::annotation(p);
    }
    let name = declared_name(p);
    if p.eat(TokenKind::ExtendsKw) {
        loop {
            types::type_ref(p);
            if !p.eat(TokenKind::Amp) {
                break;
            }
        }
    }
    let c = m.complete(p, NodeKind::TypeParam);
    p.set_name(c, &name);
}

fn extends_clause(p: &mut Parser<'_>) {
    let m = p.start();
    p.bump(); // extends
    loop {
        types::type_ref(p);
        if !p.eat(TokenKind::Comma) {
            break;
        }
    }
    m.complete(p, NodeKind::ExtendsClause);
}

fn implements_clause(p: &mut Parser<'_>) {
    let m = p.start();
    p.bump(); // implements
    loop {
        types::type_ref(p);
        if !p.eat(TokenKind::Comma) {
            break;
        }
    }
    m.complete(p, NodeKind::ImplementsClause);
}

fn permits_clause(p: &mut Parser<'_>) {
    let m = p.start();
    p.bump(); // permits (contextual)
    loop {
        types::type_ref(p);
        if !p.eat(TokenKind::Comma) {
            break;
        }
    }
    m.complete(p, NodeKind::PermitsClause);
}

/// Whether the cursor could begin a class-body member. Used for implicit
/// (unnamed) class files, where top-level members appear without an
/// enclosing declaration.
pub(crate) fn at_member_start(p: &Parser<'_>) -> bool {
    match p.peek() {
        TokenKind::VoidKw | TokenKind::Lt => true,
        k if k.is_primitive_type() => true,
        TokenKind::Ident => types::declaration_ahead(p),
        _ => false,
    }
}

/// Top-level members with no enclosing type declaration. The first
/// member's modifiers were already parsed; `mods_node` is wrapped into the
/// first member via `precede`.
pub(crate) fn implicit_class(
    p: &mut Parser<'_>,
    m: Marker,
    mods_node: Option<CompletedMarker>,
    mods: Modifiers,
) {
    let first = match mods_node {
        Some(c) => c.precede(p),
        None => p.start(),
    };
    member_after_modifiers(p, first, mods);
    while !p.at_eof() {
        member(p);
    }
    m.complete(p, NodeKind::ImplicitClass);
}

fn declared_name(p: &mut Parser<'_>) -> String {
    match p.peek() {
        TokenKind::Ident | TokenKind::UnderscoreKw => {
            let text = p.current_text().to_owned();
            p.bump();
            text
        }
        _ => {
            p.error("expected a name");
            String::new()
        }
    }
}

fn finish_decl(p: &mut Parser<'_>, c: CompletedMarker, name: &str, mods: Modifiers) {
    p.set_name(c, name);
    p.set_modifiers(c, mods);
}
