use crate::arena::NodeKind;
use crate::lexer::TokenKind;
use crate::parser::{ParseResult, Parser};
use crate::source::SourceBuffer;
use pretty_assertions::assert_eq;

fn parse(input: &str) -> ParseResult {
    let source = SourceBuffer::new(input.to_owned());
    Parser::new(&source).parse()
}

fn assert_clean(input: &str) -> ParseResult {
    let result = parse(input);
    assert!(
        result.errors.is_empty(),
        "unexpected errors for {input:?}: {:?}",
        result.errors
    );
    result
}

fn kinds_in(result: &ParseResult) -> Vec<NodeKind> {
    result
        .arena
        .descendants(result.root)
        .map(|id| result.arena.kind(id))
        .collect()
}

#[test]
fn empty_file() {
    let result = assert_clean("");
    assert_eq!(result.arena.kind(result.root), NodeKind::CompilationUnit);
    assert_eq!(result.arena.span(result.root).len(), 0);
    assert_eq!(result.tokens.len(), 1);
}

#[test]
fn minimal_class() {
    let result = assert_clean("class A{int x ;}");
    let kinds = kinds_in(&result);
    assert!(kinds.contains(&NodeKind::ClassDecl));
    assert!(kinds.contains(&NodeKind::ClassBody));
    assert!(kinds.contains(&NodeKind::FieldDecl));
    assert!(kinds.contains(&NodeKind::VariableDeclarator));
}

#[test]
fn minimal_class_tree_shape() {
    use expect_test::expect;

    let result = assert_clean("class A{int x ;}");
    let tree = expect![[r#"
        CompilationUnit@0..16
          ClassDecl@0..16
            ClassBody@7..16
              FieldDecl@8..15
                PrimitiveType@8..12
                VariableDeclarator@12..14
    "#]];
    tree.assert_eq(&result.arena.dump(result.root));
}

#[test]
fn root_span_covers_whole_input() {
    let input = "  // leading\nclass A {}\n";
    let result = assert_clean(input);
    let span = result.arena.span(result.root);
    assert_eq!(span.start, 0);
    assert_eq!(span.end, input.len());
}

#[test]
fn child_spans_nest_and_ascend() {
    let result = assert_clean(
        "package p;\nimport java.util.List;\nclass A { void f(int x) { if (x > 0) { f(x - 1); } } }\n",
    );
    for id in result.arena.descendants(result.root) {
        let mut last_start = None;
        for child in result.arena.children(id) {
            let child_span = result.arena.span(child);
            assert!(
                result.arena.span(id).contains(child_span),
                "child {child:?} escapes parent {id:?}"
            );
            if let Some(prev) = last_start {
                assert!(child_span.start >= prev, "children out of source order");
            }
            last_start = Some(child_span.start);
        }
    }
}

#[test]
fn declarations_parse_clean() {
    for input in [
        "interface I { int f(); default int g() { return 1; } }",
        "enum E { A, B(1) { void f() {} }; E() {} E(int x) {} }",
        "record Point(int x, int y) { Point { } }",
        "sealed interface Shape permits Circle, Square {}",
        "non-sealed class Circle extends Base {}",
        "@interface Anno { int value() default 3; String[] names() default {}; }",
        "public final class C<T extends Comparable<T> & Cloneable> {}",
        "abstract class B { static { counter = 0; } { instances++; } }",
        "class Outer { class Inner {} static class Nested {} }",
        "class G { <T> T id(T t) { return t; } }",
        "class V { void f(int... rest) {} void g(@Anno final String s) {} }",
    ] {
        assert_clean(input);
    }
}

#[test]
fn statements_parse_clean() {
    for input in [
        "class S { void f() { int i = 0; while (i < 10) { i++; } } }",
        "class S { void f() { for (int i = 0, j = 1; i < j; i++, j--) {} } }",
        "class S { void f(java.util.List<String> l) { for (String s : l) {} } }",
        "class S { void f() { do { g(); } while (cond()); } }",
        "class S { void f() { try (var in = open(); out) { use(in); } catch (A | B e) { log(e); } finally { close(); } } }",
        "class S { void f() { outer: for (;;) { break outer; } } }",
        "class S { void f() { synchronized (lock) { counter++; } } }",
        "class S { void f() { assert x > 0 : \"positive\"; } }",
        "class S { S() { int x = prepare(); super(x); } }",
        "class S { void f() { var list = new java.util.ArrayList<String>(); } }",
        "class S { void f() { Runnable r = () -> {}; } }",
    ] {
        assert_clean(input);
    }
}

#[test]
fn expressions_parse_clean() {
    for input in [
        "class E { int x = a + b * c - d / e % f; }",
        "class E { boolean b = x >= 1 && y <= 2 || !z; }",
        "class E { int s = a >> 2 | b << 3 ^ c >>> 4; }",
        "class E { void f() { x >>= 1; y >>>= 2; z <<= 3; } }",
        "class E { int m = cond ? a : b; }",
        "class E { Object o = (java.util.Map<String, Integer>) raw; }",
        "class E { double d = (double) intValue; }",
        "class E { int[] a = new int[10]; int[][] b = new int[2][]; }",
        "class E { int[] c = new int[] {1, 2, 3}; int[] d = {4, 5}; }",
        "class E { Runnable r = this::run; java.util.function.Supplier<E> s = E::new; }",
        "class E { Object o = obj.<String>generic(arg); }",
        "class E { Class<?> k = int.class; Class<?> v = void.class; Class<?> a = int[].class; }",
        "class E { String t = \"\"\"\n        hello\n        \"\"\"; }",
        "class E { Inner i = outer.new Inner(); }",
        "class E { boolean p = o instanceof String s && s.length() > 2; }",
        "class E { long big = x + ((long) y << 32); }",
    ] {
        assert_clean(input);
    }
}

#[test]
fn switch_forms_parse_clean() {
    for input in [
        "class S { int f(int x) { switch (x) { case 1: return 1; case 2: case 3: return 2; default: return 0; } } }",
        "class S { int f(int x) { return switch (x) { case 1, 2 -> 10; default -> 0; }; } }",
        "class S { int f(Object o) { return switch (o) { case Integer i when i > 0 -> i; case String s -> s.length(); case null, default -> -1; }; } }",
        "class S { int f(Object o) { return switch (o) { case Point(int x, int y) -> x + y; default -> 0; }; } }",
        "class S { void f(int x) { switch (x) { case 1 -> { log(); } default -> throw new IllegalStateException(); } } }",
        "class S { int f(int x) { return switch (x) { default -> { yield x * 2; } }; } }",
    ] {
        assert_clean(input);
    }
}

#[test]
fn module_declaration_parses() {
    let result = assert_clean(
        "module com.example.app {\n    requires transitive com.example.core;\n    requires static org.annotations;\n    exports com.example.api to com.example.client, com.example.test;\n    opens com.example.internal;\n    uses com.example.spi.Service;\n    provides com.example.spi.Service with com.example.impl.Default;\n}\n",
    );
    let kinds = kinds_in(&result);
    assert!(kinds.contains(&NodeKind::ModuleDecl));
    assert_eq!(
        kinds
            .iter()
            .filter(|k| **k == NodeKind::RequiresDirective)
            .count(),
        2
    );
    assert!(kinds.contains(&NodeKind::ExportsDirective));
    assert!(kinds.contains(&NodeKind::OpensDirective));
    assert!(kinds.contains(&NodeKind::UsesDirective));
    assert!(kinds.contains(&NodeKind::ProvidesDirective));
}

#[test]
fn import_module_parses() {
    let result = assert_clean("import module java.base;\nclass A {}\n");
    let import = result
        .arena
        .descendants(result.root)
        .find(|&id| result.arena.kind(id) == NodeKind::ImportDecl)
        .unwrap();
    assert_eq!(
        result.arena.attrs(import).name.as_deref(),
        Some("java.base")
    );
}

#[test]
fn implicit_class_file() {
    let result = assert_clean("String greeting = \"hello\";\n\nvoid main() {\n    println(greeting);\n}\n");
    let kinds = kinds_in(&result);
    assert!(kinds.contains(&NodeKind::ImplicitClass));
    assert!(kinds.contains(&NodeKind::FieldDecl));
    assert!(kinds.contains(&NodeKind::MethodDecl));
}

#[test]
fn every_significant_token_is_inside_the_root_token_range() {
    let result = assert_clean("class A { void f() { g(1, 2); } }");
    let attrs = result.arena.attrs(result.root);
    assert_eq!(attrs.first_token, 0);
    assert_eq!(attrs.last_token as usize, result.tokens.len() - 1);
}

#[test]
fn fused_operators_get_operator_attrs() {
    use crate::arena::{AssignOp, BinaryOp};

    let result = assert_clean("class E { void f() { int z = a >> b; c >>= d; boolean g = x >= y; } }");
    let mut shifts = 0;
    let mut shr_assigns = 0;
    let mut ges = 0;
    for id in result.arena.descendants(result.root) {
        let attrs = result.arena.attrs(id);
        if attrs.binary_op == Some(BinaryOp::Shr) {
            shifts += 1;
            let span = attrs.op_span.unwrap();
            assert_eq!(span.len(), 2);
        }
        if attrs.assign_op == Some(AssignOp::Shr) {
            shr_assigns += 1;
            assert_eq!(attrs.op_span.unwrap().len(), 3);
        }
        if attrs.binary_op == Some(BinaryOp::Ge) {
            ges += 1;
        }
    }
    assert_eq!((shifts, shr_assigns, ges), (1, 1, 1));
}

#[test]
fn nested_generics_close_without_errors() {
    assert_clean("class G { java.util.Map<String, java.util.List<int[]>> m; }");
    assert_clean("class G { Box<Box<Box<Box<String>>>> deep; }");
}

#[test]
fn recovery_produces_error_node_and_continues() {
    let result = parse("class A { int }\nclass B { void f() {} }");
    assert!(!result.errors.is_empty());
    let kinds = kinds_in(&result);
    assert!(kinds.contains(&NodeKind::Error));
    // The second class still parses.
    assert_eq!(
        kinds
            .iter()
            .filter(|k| **k == NodeKind::ClassDecl)
            .count(),
        2
    );
}

#[test]
fn recovery_always_advances() {
    // Pathological input must terminate with a tree and errors.
    let result = parse("]]]] ???? class ;;;; @@");
    assert!(!result.errors.is_empty());
    assert_eq!(result.arena.kind(result.root), NodeKind::CompilationUnit);
}

#[test]
fn unterminated_comment_is_a_lex_error() {
    let result = parse("class A { /* no end");
    assert!(result.errors.iter().any(|e| e.is_lex_error()));
}

#[test]
fn scientific_literal_round_trips_through_the_tree() {
    let input = "class A { double x = 1.5e10; }";
    let result = assert_clean(input);
    let source = SourceBuffer::new(input.to_owned());
    let lit = result
        .arena
        .descendants(result.root)
        .find(|&id| result.arena.kind(id) == NodeKind::Literal)
        .unwrap();
    let attrs = result.arena.attrs(lit);
    let token = &result.tokens[attrs.first_token as usize];
    assert_eq!(token.kind, TokenKind::DoubleLit);
    assert_eq!(source.slice(token.span), "1.5e10");
}

#[test]
fn recursion_limit_reports_once() {
    let mut deep = String::from("class D { int x = ");
    deep.push_str(&"(".repeat(600));
    deep.push('1');
    deep.push_str(&")".repeat(600));
    deep.push_str("; }");
    let source = SourceBuffer::new(deep);
    let result = Parser::new(&source).recursion_limit(100).parse();
    let limit_errors: Vec<_> = result
        .errors
        .iter()
        .filter(|e| e.message.contains("recursion limit"))
        .collect();
    assert_eq!(limit_errors.len(), 1);
}

#[test]
fn annotations_attach_to_declarations() {
    let result = assert_clean(
        "@Deprecated\n@SuppressWarnings(\"unchecked\")\nclass A { @Override public String toString() { return \"\"; } }",
    );
    let kinds = kinds_in(&result);
    assert_eq!(
        kinds
            .iter()
            .filter(|k| **k == NodeKind::Annotation)
            .count(),
        3
    );
}

#[test]
fn modifier_bitsets_are_recorded() {
    use crate::arena::Modifiers;

    let result = assert_clean("public final class A { private static int x; }");
    let class = result
        .arena
        .descendants(result.root)
        .find(|&id| result.arena.kind(id) == NodeKind::ClassDecl)
        .unwrap();
    let mods = result.arena.attrs(class).modifiers;
    assert!(mods.contains(Modifiers::PUBLIC));
    assert!(mods.contains(Modifiers::FINAL));
    let field = result
        .arena
        .descendants(result.root)
        .find(|&id| result.arena.kind(id) == NodeKind::FieldDecl)
        .unwrap();
    let mods = result.arena.attrs(field).modifiers;
    assert!(mods.contains(Modifiers::PRIVATE));
    assert!(mods.contains(Modifiers::STATIC));
}
