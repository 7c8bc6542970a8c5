use crate::arena::{AssignOp, BinaryOp, NodeKind, UnaryOp};
use crate::lexer::TokenKind;
use crate::parser::{CompletedMarker, Parser};
use crate::source::Span;

use super::{declarations, patterns, statements, types};

/// *Expression*. Returns `None` without consuming anything when the cursor
/// cannot begin an expression; callers decide how to recover.
pub(crate) fn expression(p: &mut Parser<'_>) -> Option<CompletedMarker> {
    if !p.enter_recursion() {
        p.err_and_bump("expression nesting too deep");
        return None;
    }
    let result = assignment(p);
    p.exit_recursion();
    result
}

/// Assignment is right-associative; lambdas are checked first since a
/// lambda parameter list is otherwise indistinguishable from a
/// parenthesized expression without unbounded lookahead.
fn assignment(p: &mut Parser<'_>) -> Option<CompletedMarker> {
    if at_lambda_start(p) {
        return Some(lambda(p));
    }
    let lhs = ternary(p)?;
    if let Some((op, n_tokens, span)) = peek_assign_op(p) {
        let m = lhs.precede(p);
        for _ in 0..n_tokens {
            p.bump();
        }
        if expression(p).is_none() {
            p.error("expected an expression after assignment operator");
        }
        let c = m.complete(p, NodeKind::AssignmentExpr);
        p.set_assign_op(c, op, span);
        return Some(c);
    }
    Some(lhs)
}

/// The compound assignment operators built from single `>` tokens
/// (`>>=`, `>>>=`) are fused here by adjacency.
fn peek_assign_op(p: &Parser<'_>) -> Option<(AssignOp, usize, Span)> {
    use TokenKind::*;
    let one = |op| Some((op, 1, p.current_span()));
    match p.peek() {
        Assign => one(AssignOp::Assign),
        PlusAssign => one(AssignOp::Add),
        MinusAssign => one(AssignOp::Sub),
        StarAssign => one(AssignOp::Mul),
        SlashAssign => one(AssignOp::Div),
        PercentAssign => one(AssignOp::Rem),
        AmpAssign => one(AssignOp::BitAnd),
        PipeAssign => one(AssignOp::BitOr),
        CaretAssign => one(AssignOp::BitXor),
        ShlAssign => one(AssignOp::Shl),
        Gt if p.adjacent(0) && p.nth(1) == Gt => {
            if p.adjacent(1) && p.nth(2) == Gt && p.adjacent(2) && p.nth(3) == Assign {
                Some((AssignOp::UShr, 4, p.span_of_next(4)))
            } else if p.adjacent(1) && p.nth(2) == Assign {
                Some((AssignOp::Shr, 3, p.span_of_next(3)))
            } else {
                None
            }
        }
        _ => None,
    }
}

fn ternary(p: &mut Parser<'_>) -> Option<CompletedMarker> {
    let cond = binary(p, 0)?;
    if p.at(TokenKind::Question) {
        let m = cond.precede(p);
        p.bump();
        if expression(p).is_none() {
            p.error("expected an expression in conditional");
        }
        p.expect(TokenKind::Colon);
        if expression(p).is_none() {
            p.error("expected an expression in conditional");
        }
        return Some(m.complete(p, NodeKind::ConditionalExpr));
    }
    Some(cond)
}

/// Precedence climbing over the binary operators; `instanceof` sits at
/// relational precedence and takes a pattern or type on its right.
fn binary(p: &mut Parser<'_>, min_prec: u8) -> Option<CompletedMarker> {
    const REL_PREC: u8 = 7;
    let mut lhs = unary(p)?;
    loop {
        if p.at(TokenKind::InstanceofKw) && REL_PREC >= min_prec {
            let m = lhs.precede(p);
            p.bump();
            patterns::pattern_or_type(p);
            lhs = m.complete(p, NodeKind::InstanceofExpr);
            continue;
        }
        let (op, prec, n_tokens, span) = match peek_binary_op(p) {
            Some(found) => found,
            None => break,
        };
        if prec < min_prec {
            break;
        }
        let m = lhs.precede(p);
        for _ in 0..n_tokens {
            p.bump();
        }
        if binary(p, prec + 1).is_none() {
            p.error("expected an operand");
        }
        let c = m.complete(p, NodeKind::BinaryExpr);
        p.set_binary_op(c, op, span);
        lhs = c;
    }
    Some(lhs)
}

fn peek_binary_op(p: &Parser<'_>) -> Option<(BinaryOp, u8, usize, Span)> {
    use TokenKind::*;
    let one = |op, prec| Some((op, prec, 1, p.current_span()));
    match p.peek() {
        PipePipe => one(BinaryOp::Or, 1),
        AmpAmp => one(BinaryOp::And, 2),
        Pipe => one(BinaryOp::BitOr, 3),
        Caret => one(BinaryOp::BitXor, 4),
        Amp => one(BinaryOp::BitAnd, 5),
        EqEq => one(BinaryOp::Eq, 6),
        BangEq => one(BinaryOp::NotEq, 6),
        Lt => one(BinaryOp::Lt, 7),
        LtEq => one(BinaryOp::Le, 7),
        Shl => one(BinaryOp::Shl, 8),
        Plus => one(BinaryOp::Add, 9),
        Minus => one(BinaryOp::Sub, 9),
        Star => one(BinaryOp::Mul, 10),
        Slash => one(BinaryOp::Div, 10),
        Percent => one(BinaryOp::Rem, 10),
        Gt => {
            if p.adjacent(0) && p.nth(1) == Gt {
                if p.adjacent(1) && p.nth(2) == Gt {
                    if p.adjacent(2) && p.nth(3) == Assign {
                        None // `>>>=`, handled as assignment
                    } else {
                        Some((BinaryOp::UShr, 8, 3, p.span_of_next(3)))
                    }
                } else if p.adjacent(1) && p.nth(2) == Assign {
                    None // `>>=`
                } else {
                    Some((BinaryOp::Shr, 8, 2, p.span_of_next(2)))
                }
            } else if p.adjacent(0) && p.nth(1) == Assign {
                Some((BinaryOp::Ge, 7, 2, p.span_of_next(2)))
            } else {
                one(BinaryOp::Gt, 7)
            }
        }
        _ => None,
    }
}

fn unary(p: &mut Parser<'_>) -> Option<CompletedMarker> {
    let op = match p.peek() {
        TokenKind::Plus => Some(UnaryOp::Plus),
        TokenKind::Minus => Some(UnaryOp::Minus),
        TokenKind::Bang => Some(UnaryOp::Not),
        TokenKind::Tilde => Some(UnaryOp::BitNot),
        TokenKind::PlusPlus => Some(UnaryOp::PreInc),
        TokenKind::MinusMinus => Some(UnaryOp::PreDec),
        _ => None,
    };
    if let Some(op) = op {
        let span = p.current_span();
        let m = p.start();
        p.bump();
        if p.enter_recursion() {
            if unary(p).is_none() {
                p.error("expected an operand");
            }
            p.exit_recursion();
        } else {
            p.err_and_bump("expression nesting too deep");
        }
        let c = m.complete(p, NodeKind::UnaryExpr);
        p.set_unary_op(c, op, span);
        return Some(c);
    }
    if p.at(TokenKind::LParen) && at_cast(p) {
        return Some(cast(p));
    }
    postfix(p)
}

/// `( Type ) operand` — the probe distinguishes a cast from a
/// parenthesized expression by requiring type-shaped content and an
/// operand-shaped continuation (with the usual `+`/`-` exception for
/// reference types).
fn at_cast(p: &Parser<'_>) -> bool {
    let mut end = match types::type_end(p, 1) {
        Some(end) => end,
        None => return false,
    };
    while p.nth(end) == TokenKind::Amp {
        end = match types::type_end(p, end + 1) {
            Some(e) => e,
            None => return false,
        };
    }
    if p.nth(end) != TokenKind::RParen {
        return false;
    }
    let after = p.nth(end + 1);
    let primitive = p.nth(1).is_primitive_type();
    match after {
        TokenKind::Ident
        | TokenKind::UnderscoreKw
        | TokenKind::LParen
        | TokenKind::Bang
        | TokenKind::Tilde
        | TokenKind::ThisKw
        | TokenKind::SuperKw
        | TokenKind::NewKw
        | TokenKind::SwitchKw => true,
        TokenKind::Plus | TokenKind::Minus | TokenKind::PlusPlus | TokenKind::MinusMinus => {
            primitive
        }
        k => k.is_literal(),
    }
}

fn cast(p: &mut Parser<'_>) -> CompletedMarker {
    let m = p.start();
    p.bump(); // (
    let first = types::type_ref(p);
    if p.at(TokenKind::Amp) {
        if let Some(first) = first {
            let inter = first.precede(p);
            while p.eat(TokenKind::Amp) {
                types::type_ref(p);
            }
            inter.complete(p, NodeKind::IntersectionType);
        }
    }
    p.expect(TokenKind::RParen);
    if at_lambda_start(p) {
        lambda(p);
    } else if unary(p).is_none() {
        p.error("expected an operand after cast");
    }
    m.complete(p, NodeKind::CastExpr)
}

fn postfix(p: &mut Parser<'_>) -> Option<CompletedMarker> {
    let mut lhs = primary(p)?;
    loop {
        match p.peek() {
            TokenKind::Dot => match p.nth(1) {
                TokenKind::Ident if p.nth(2) == TokenKind::LParen => {
                    let m = lhs.precede(p);
                    p.bump(); // .
                    let name = p.current_text().to_owned();
                    p.bump();
                    arg_list(p);
                    let c = m.complete(p, NodeKind::MethodCall);
                    p.set_name(c, &name);
                    lhs = c;
                }
                TokenKind::Ident => {
                    let m = lhs.precede(p);
                    p.bump(); // .
                    let name = p.current_text().to_owned();
                    p.bump();
                    let c = m.complete(p, NodeKind::FieldAccess);
                    p.set_name(c, &name);
                    lhs = c;
                }
                TokenKind::Lt => {
                    // `recv.<T>method(args)`
                    let m = lhs.precede(p);
                    p.bump(); // .
                    types::type_args(p);
                    let name = if p.at(TokenKind::Ident) {
                        let n = p.current_text().to_owned();
                        p.bump();
                        n
                    } else {
                        p.error("expected a method name after type arguments");
                        String::new()
                    };
                    if p.at(TokenKind::LParen) {
                        arg_list(p);
                    }
                    let c = m.complete(p, NodeKind::MethodCall);
                    p.set_name(c, &name);
                    lhs = c;
                }
                TokenKind::NewKw => {
                    // Qualified inner creation: `outer.new Inner(...)`.
                    let m = lhs.precede(p);
                    p.bump(); // .
                    p.bump(); // new
                    types::type_ref(p);
                    if p.at(TokenKind::LParen) {
                        arg_list(p);
                    }
                    if p.at(TokenKind::LBrace) {
                        declarations::class_body(p);
                    }
                    lhs = m.complete(p, NodeKind::ObjectCreation);
                }
                TokenKind::ThisKw => {
                    let m = lhs.precede(p);
                    p.bump();
                    p.bump();
                    lhs = m.complete(p, NodeKind::ThisExpr);
                }
                TokenKind::SuperKw => {
                    let m = lhs.precede(p);
                    p.bump();
                    p.bump();
                    lhs = m.complete(p, NodeKind::SuperExpr);
                }
                TokenKind::ClassKw => {
                    let m = lhs.precede(p);
                    p.bump();
                    p.bump();
                    lhs = m.complete(p, NodeKind::ClassLiteral);
                }
                _ => break,
            },
            TokenKind::LBracket if p.nth(1) != TokenKind::RBracket => {
                let m = lhs.precede(p);
                p.bump();
                if expression(p).is_none() {
                    p.error("expected an index expression");
                }
                p.expect(TokenKind::RBracket);
                lhs = m.complete(p, NodeKind::ArrayAccess);
            }
            TokenKind::ColonColon => {
                let m = lhs.precede(p);
                p.bump();
                if p.at(TokenKind::Lt) {
                    types::type_args(p);
                }
                let name = match p.peek() {
                    TokenKind::Ident => {
                        let n = p.current_text().to_owned();
                        p.bump();
                        n
                    }
                    TokenKind::NewKw => {
                        p.bump();
                        "new".to_owned()
                    }
                    _ => {
                        p.error("expected a method name or `new` in method reference");
                        String::new()
                    }
                };
                let c = m.complete(p, NodeKind::MethodRef);
                p.set_name(c, &name);
                lhs = c;
            }
            TokenKind::PlusPlus => {
                let span = p.current_span();
                let m = lhs.precede(p);
                p.bump();
                let c = m.complete(p, NodeKind::PostfixExpr);
                p.set_unary_op(c, UnaryOp::PostInc, span);
                lhs = c;
            }
            TokenKind::MinusMinus => {
                let span = p.current_span();
                let m = lhs.precede(p);
                p.bump();
                let c = m.complete(p, NodeKind::PostfixExpr);
                p.set_unary_op(c, UnaryOp::PostDec, span);
                lhs = c;
            }
            _ => break,
        }
    }
    Some(lhs)
}

fn primary(p: &mut Parser<'_>) -> Option<CompletedMarker> {
    match p.peek() {
        k if k.is_literal() => {
            let m = p.start();
            p.bump();
            Some(m.complete(p, NodeKind::Literal))
        }
        TokenKind::Ident => {
            // A plain name; calls like `foo(...)` are unqualified method
            // calls rather than field/paren chains.
            if p.nth(1) == TokenKind::LParen {
                let m = p.start();
                let name = p.current_text().to_owned();
                p.bump();
                arg_list(p);
                let c = m.complete(p, NodeKind::MethodCall);
                p.set_name(c, &name);
                Some(c)
            } else {
                let m = p.start();
                let name = p.current_text().to_owned();
                p.bump();
                let c = m.complete(p, NodeKind::NameRef);
                p.set_name(c, &name);
                Some(c)
            }
        }
        TokenKind::UnderscoreKw => {
            let m = p.start();
            p.bump();
            let c = m.complete(p, NodeKind::NameRef);
            p.set_name(c, "_");
            Some(c)
        }
        TokenKind::LParen => {
            let m = p.start();
            p.bump();
            if expression(p).is_none() {
                p.error("expected an expression");
            }
            p.expect(TokenKind::RParen);
            Some(m.complete(p, NodeKind::ParenExpr))
        }
        TokenKind::ThisKw => {
            let m = p.start();
            p.bump();
            Some(m.complete(p, NodeKind::ThisExpr))
        }
        TokenKind::SuperKw => {
            let m = p.start();
            p.bump();
            Some(m.complete(p, NodeKind::SuperExpr))
        }
        TokenKind::NewKw => Some(creation(p)),
        TokenKind::SwitchKw => Some(switch_expression(p)),
        TokenKind::VoidKw => {
            let m = p.start();
            p.bump();
            p.expect(TokenKind::Dot);
            p.expect(TokenKind::ClassKw);
            Some(m.complete(p, NodeKind::ClassLiteral))
        }
        k if k.is_primitive_type() => {
            // `int.class`, `int[].class`
            let m = p.start();
            p.bump();
            while p.at(TokenKind::LBracket) && p.nth(1) == TokenKind::RBracket {
                p.bump();
                p.bump();
            }
            p.expect(TokenKind::Dot);
            p.expect(TokenKind::ClassKw);
            Some(m.complete(p, NodeKind::ClassLiteral))
        }
        _ => None,
    }
}

/// `new` expressions: class instances (with optional anonymous body) and
/// arrays (with sized dims or an initializer).
fn creation(p: &mut Parser<'_>) -> CompletedMarker {
    let m = p.start();
    p.bump(); // new
    if p.at(TokenKind::Lt) {
        types::type_args(p);
    }
    if p.peek().is_primitive_type() {
        let t = p.start();
        p.bump();
        t.complete(p, NodeKind::PrimitiveType);
        return array_creation_rest(p, m);
    }
    // Class type without array-dim wrapping; dims belong to the creation.
    let t = p.start();
    let mut name = String::new();
    if p.at(TokenKind::Ident) {
        name.push_str(p.current_text());
        p.bump();
        if p.at(TokenKind::Lt) {
            types::type_args(p);
        }
        while p.at(TokenKind::Dot) && p.nth(1) == TokenKind::Ident {
            p.bump();
            name.push('.');
            name.push_str(p.current_text());
            p.bump();
            if p.at(TokenKind::Lt) {
                types::type_args(p);
            }
        }
    } else {
        p.error("expected a type after `new`");
    }
    let t = t.complete(p, NodeKind::ClassType);
    p.set_name(t, &name);

    if p.at(TokenKind::LBracket) {
        return array_creation_rest(p, m);
    }
    arg_list(p);
    if p.at(TokenKind::LBrace) {
        declarations::class_body(p);
    }
    m.complete(p, NodeKind::ObjectCreation)
}

fn array_creation_rest(
    p: &mut Parser<'_>,
    m: crate::parser::Marker,
) -> CompletedMarker {
    while p.at(TokenKind::LBracket) {
        p.bump();
        if !p.at(TokenKind::RBracket) {
            if expression(p).is_none() {
                p.error("expected an array dimension");
            }
        }
        p.expect(TokenKind::RBracket);
    }
    if p.at(TokenKind::LBrace) {
        array_initializer(p);
    }
    m.complete(p, NodeKind::ArrayCreation)
}

pub(crate) fn array_initializer(p: &mut Parser<'_>) {
    if !p.enter_recursion() {
        p.err_and_bump("initializer nesting too deep");
        return;
    }
    let m = p.start();
    p.expect(TokenKind::LBrace);
    while !p.at(TokenKind::RBrace) && !p.at_eof() {
        declarations::variable_initializer(p);
        if !p.eat(TokenKind::Comma) {
            break;
        }
    }
    p.expect(TokenKind::RBrace);
    m.complete(p, NodeKind::ArrayInitializer);
    p.exit_recursion();
}

pub(crate) fn arg_list(p: &mut Parser<'_>) {
    let m = p.start();
    p.expect(TokenKind::LParen);
    if !p.at(TokenKind::RParen) && !p.at_eof() {
        loop {
            if expression(p).is_none() {
                p.error("expected an argument");
                break;
            }
            if !p.eat(TokenKind::Comma) {
                break;
            }
        }
    }
    p.expect(TokenKind::RParen);
    m.complete(p, NodeKind::ArgList);
}

fn switch_expression(p: &mut Parser<'_>) -> CompletedMarker {
    let m = p.start();
    p.bump(); // switch
    p.expect(TokenKind::LParen);
    if expression(p).is_none() {
        p.error("expected a selector expression");
    }
    p.expect(TokenKind::RParen);
    statements::switch_block(p);
    m.complete(p, NodeKind::SwitchExpr)
}

// ----------------------------------------------------------------------
// Lambdas
// ----------------------------------------------------------------------

/// Whether the token `n` ahead can begin an expression. Used by statement
/// dispatch (`yield`, expression statements).
pub(crate) fn at_expression_start(p: &Parser<'_>, n: usize) -> bool {
    let kind = p.nth(n);
    kind.is_literal()
        || kind.is_primitive_type()
        || matches!(
            kind,
            TokenKind::Ident
                | TokenKind::UnderscoreKw
                | TokenKind::LParen
                | TokenKind::Bang
                | TokenKind::Tilde
                | TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::PlusPlus
                | TokenKind::MinusMinus
                | TokenKind::NewKw
                | TokenKind::ThisKw
                | TokenKind::SuperKw
                | TokenKind::SwitchKw
                | TokenKind::VoidKw
        )
}

pub(crate) fn at_lambda_start(p: &Parser<'_>) -> bool {
    match p.peek() {
        TokenKind::Ident | TokenKind::UnderscoreKw => p.nth(1) == TokenKind::Arrow,
        TokenKind::LParen => {
            let mut depth = 0usize;
            let mut i = 0usize;
            loop {
                match p.nth(i) {
                    TokenKind::LParen => depth += 1,
                    TokenKind::RParen => {
                        depth -= 1;
                        if depth == 0 {
                            return p.nth(i + 1) == TokenKind::Arrow;
                        }
                    }
                    TokenKind::Eof => return false,
                    _ => {}
                }
                i += 1;
            }
        }
        _ => false,
    }
}

fn lambda(p: &mut Parser<'_>) -> CompletedMarker {
    let m = p.start();
    let params = p.start();
    match p.peek() {
        TokenKind::Ident | TokenKind::UnderscoreKw => {
            let one = p.start();
            let name = p.current_text().to_owned();
            p.bump();
            let c = one.complete(p, NodeKind::Param);
            p.set_name(c, &name);
        }
        TokenKind::LParen => {
            p.bump();
            if !p.at(TokenKind::RParen) && !p.at_eof() {
                loop {
                    lambda_parameter(p);
                    if !p.eat(TokenKind::Comma) {
                        break;
                    }
                }
            }
            p.expect(TokenKind::RParen);
        }
        _ => p.error("expected lambda parameters"),
    }
    params.complete(p, NodeKind::LambdaParams);
    p.expect(TokenKind::Arrow);
    if p.at(TokenKind::LBrace) {
        statements::block(p);
    } else if expression(p).is_none() {
        p.error("expected a lambda body");
    }
    m.complete(p, NodeKind::Lambda)
}

/// Either an inferred-type parameter (`x`) or a full formal (`final T x`,
/// `var x`).
fn lambda_parameter(p: &mut Parser<'_>) {
    let bare = matches!(p.peek(), TokenKind::Ident | TokenKind::UnderscoreKw)
        && matches!(p.nth(1), TokenKind::Comma | TokenKind::RParen);
    if bare {
        let m = p.start();
        let name = p.current_text().to_owned();
        p.bump();
        let c = m.complete(p, NodeKind::Param);
        p.set_name(c, &name);
    } else {
        declarations::parameter(p);
    }
}
