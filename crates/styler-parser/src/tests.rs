//! Cross-cutting invariants over the lexer and parser together.

use crate::{Lexer, NodeKind, Parser, SourceBuffer, TokenKind};
use pretty_assertions::assert_eq;

const CORPUS: &[&str] = &[
    "",
    "class A{int x ;}",
    "// only comments\n/* here */\n",
    "package com.example;\n\nimport java.util.*;\nimport java.util.List;\n\npublic class Service<T> implements AutoCloseable {\n    private final List<T> items = new java.util.ArrayList<>();\n\n    public void close() throws Exception {\n        items.clear();\n    }\n}\n",
    "record Pair<A, B>(A first, B second) {\n    static <A, B> Pair<A, B> of(A a, B b) { return new Pair<>(a, b); }\n}\n",
    "class Switchy {\n    String describe(Object o) {\n        return switch (o) {\n            case Integer i when i > 0 -> \"positive\";\n            case String s -> s;\n            case int[] arr -> \"array\";\n            case null, default -> \"other\";\n        };\n    }\n}\n",
    "void main() {\n    println(\"implicit\");\n}\n",
    "class Weird { int x = 0x1.8p3 > 1 ? 1_000 : 0b101; }\n",
];

/// Property: tokens and trivia partition the source bytes exactly.
#[test]
fn lex_partitions_every_corpus_file() {
    for input in CORPUS {
        let source = SourceBuffer::new((*input).to_owned());
        let out = Lexer::new(&source).lex();
        let mut spans: Vec<_> = out
            .tokens
            .iter()
            .filter(|t| t.kind != TokenKind::Eof)
            .map(|t| t.span)
            .chain(out.trivia.iter().map(|t| t.span))
            .collect();
        spans.sort();
        let mut at = 0;
        for span in spans {
            assert_eq!(span.start, at, "gap at byte {at} in {input:?}");
            at = span.end;
        }
        assert_eq!(at, input.len());
    }
}

/// Property: the root covers every significant token exactly once, and
/// all node spans nest.
#[test]
fn parse_consumes_all_tokens_and_nests_spans() {
    for input in CORPUS {
        let source = SourceBuffer::new((*input).to_owned());
        let result = Parser::new(&source).parse();
        assert!(result.errors.is_empty(), "{input:?}: {:?}", result.errors);

        let root_attrs = result.arena.attrs(result.root);
        assert_eq!(root_attrs.first_token, 0);
        assert_eq!(root_attrs.last_token as usize, result.tokens.len() - 1);
        assert_eq!(result.arena.span(result.root).start, 0);
        assert_eq!(result.arena.span(result.root).end, input.len());

        for id in result.arena.descendants(result.root) {
            for child in result.arena.children(id) {
                assert!(result.arena.span(id).contains(result.arena.span(child)));
                assert_eq!(result.arena.parent(child), Some(id));
            }
        }
    }
}

/// Property: parsing is deterministic — same input, same tree shape.
#[test]
fn parse_is_deterministic() {
    for input in CORPUS {
        let source = SourceBuffer::new((*input).to_owned());
        let a = Parser::new(&source).parse();
        let b = Parser::new(&source).parse();
        let shape = |r: &crate::ParseResult| -> Vec<(NodeKind, usize, usize)> {
            r.arena
                .descendants(r.root)
                .map(|id| {
                    let s = r.arena.span(id);
                    (r.arena.kind(id), s.start, s.end)
                })
                .collect()
        };
        assert_eq!(shape(&a), shape(&b));
        assert_eq!(a.tokens.len(), b.tokens.len());
    }
}

/// Broken inputs still produce a complete tree with a root that spans the
/// whole file.
#[test]
fn recovered_parses_still_cover_the_file() {
    for input in [
        "class A { int }",
        "class { }",
        "class A { void f( { } }",
        "import ;\nclass A {}",
        "class A { /* unterminated",
    ] {
        let source = SourceBuffer::new(input.to_owned());
        let result = Parser::new(&source).parse();
        assert!(!result.errors.is_empty(), "expected errors for {input:?}");
        assert_eq!(result.arena.kind(result.root), NodeKind::CompilationUnit);
        assert_eq!(result.arena.span(result.root).end, input.len());
    }
}
