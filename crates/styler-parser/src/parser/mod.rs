pub(crate) mod grammar;

use crate::arena::{AssignOp, BinaryOp, Modifiers, NodeId, NodeKind, SyntaxArena, UnaryOp};
use crate::error::ParseError;
use crate::lexer::{LexOutput, Lexer, Token, TokenKind, Trivia};
use crate::limit::LimitTracker;
use crate::source::{SourceBuffer, Span};

/// Chosen so that deeply nested (machine-generated) expressions abort with
/// a diagnostic well before the call stack runs out.
const DEFAULT_RECURSION_LIMIT: usize = 500;

/// The complete result of parsing one source buffer: the arena holding the
/// tree, the token/trivia streams it was built from, and every recovered
/// error. A non-empty `errors` list still comes with a full tree; failed
/// regions are represented by `NodeKind::Error` nodes.
#[derive(Debug)]
pub struct ParseResult {
    pub root: NodeId,
    pub arena: SyntaxArena,
    pub tokens: Vec<Token>,
    pub trivia: Vec<Trivia>,
    pub errors: Vec<ParseError>,
}

impl ParseResult {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Parse Java source into a [`ParseResult`].
///
/// ```rust
/// use styler_parser::{Parser, SourceBuffer};
///
/// let source = SourceBuffer::new("record Point(int x, int y) {}".to_owned());
/// let result = Parser::new(&source).parse();
/// assert!(result.is_clean());
/// ```
pub struct Parser<'a> {
    source: &'a SourceBuffer,
    tokens: Vec<Token>,
    trivia: Vec<Trivia>,
    /// Index of the next unconsumed significant token.
    pos: usize,
    events: Vec<Event>,
    attr_patches: Vec<(u32, AttrPatch)>,
    errors: Vec<ParseError>,
    recursion: LimitTracker,
    /// Set once the recursion limit trips; suppresses follow-on errors.
    limited: bool,
}

/// Copied-out view of an [`Event`] used while replaying, so tombstoning
/// forward parents can mutate the event list mid-iteration.
enum EventView {
    Start(Option<NodeKind>, Option<u32>),
    Finish,
    Token,
}

#[derive(Debug, Clone, Copy)]
enum Event {
    /// An opened node. `forward_parent` points at a later `Start` that must
    /// wrap this one (produced by [`CompletedMarker::precede`]).
    Start {
        kind: Option<NodeKind>,
        forward_parent: Option<u32>,
    },
    Finish,
    /// Consume one significant token into the current node.
    Token,
}

#[derive(Debug, Default, Clone)]
struct AttrPatch {
    name: Option<Box<str>>,
    binary_op: Option<BinaryOp>,
    unary_op: Option<UnaryOp>,
    assign_op: Option<AssignOp>,
    op_span: Option<Span>,
    modifiers: Option<Modifiers>,
}

/// An open node. Complete it with a kind, or abandon it.
#[must_use]
pub(crate) struct Marker(u32);

/// A finished node that can still be wrapped by a later parent.
#[derive(Clone, Copy)]
pub(crate) struct CompletedMarker(u32);

impl<'a> Parser<'a> {
    pub fn new(source: &'a SourceBuffer) -> Self {
        let LexOutput {
            tokens,
            trivia,
            errors,
        } = Lexer::new(source).lex();
        Self {
            source,
            tokens,
            trivia,
            pos: 0,
            events: Vec::new(),
            attr_patches: Vec::new(),
            errors,
            recursion: LimitTracker::new(DEFAULT_RECURSION_LIMIT),
            limited: false,
        }
    }

    /// Configure the recursion limit to use while parsing.
    pub fn recursion_limit(mut self, limit: usize) -> Self {
        self.recursion = LimitTracker::new(limit);
        self
    }

    pub fn parse(mut self) -> ParseResult {
        let m = self.start();
        grammar::compilation_unit(&mut self);
        m.complete(&mut self, NodeKind::CompilationUnit);

        let (arena, root) = self.build_tree();
        ParseResult {
            root,
            arena,
            tokens: self.tokens,
            trivia: self.trivia,
            errors: self.errors,
        }
    }

    // ------------------------------------------------------------------
    // Token access
    // ------------------------------------------------------------------

    pub(crate) fn peek(&self) -> TokenKind {
        self.nth(0)
    }

    pub(crate) fn nth(&self, n: usize) -> TokenKind {
        self.tokens
            .get(self.pos + n)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    pub(crate) fn at(&self, kind: TokenKind) -> bool {
        self.peek() == kind
    }

    pub(crate) fn at_eof(&self) -> bool {
        self.at(TokenKind::Eof)
    }

    /// Current cursor position, for progress assertions in parse loops.
    pub(crate) fn cursor(&self) -> usize {
        self.pos
    }

    /// Text of the token `n` ahead of the cursor.
    pub(crate) fn nth_text(&self, n: usize) -> &'a str {
        match self.tokens.get(self.pos + n) {
            Some(t) => self.source.slice(t.span),
            None => "",
        }
    }

    pub(crate) fn current_text(&self) -> &'a str {
        self.nth_text(0)
    }

    /// Whether the cursor is at the contextual keyword `word`.
    pub(crate) fn at_word(&self, word: &str) -> bool {
        self.at(TokenKind::Ident) && self.current_text() == word
    }

    pub(crate) fn current_span(&self) -> Span {
        match self.tokens.get(self.pos) {
            Some(t) => t.span,
            None => Span::empty(self.source.len()),
        }
    }

    /// Span covering the next `n` tokens; used for operators fused from
    /// adjacent tokens.
    pub(crate) fn span_of_next(&self, n: usize) -> Span {
        let first = self.current_span();
        let last = self
            .tokens
            .get(self.pos + n.saturating_sub(1))
            .map(|t| t.span)
            .unwrap_or(first);
        first.cover(last)
    }

    /// Whether tokens `n` and `n + 1` ahead touch with no trivia between.
    pub(crate) fn adjacent(&self, n: usize) -> bool {
        match (self.tokens.get(self.pos + n), self.tokens.get(self.pos + n + 1)) {
            (Some(a), Some(b)) => a.span.end == b.span.start,
            _ => false,
        }
    }

    pub(crate) fn bump(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
            self.events.push(Event::Token);
        }
    }

    pub(crate) fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Consume the expected token or record an error without consuming.
    pub(crate) fn expect(&mut self, kind: TokenKind) -> bool {
        if self.eat(kind) {
            return true;
        }
        let found = self.peek();
        self.push_error(ParseError::expecting(
            self.current_span(),
            vec![kind],
            found,
            format!("expected {}, found {}", kind.describe(), found.describe()),
        ));
        false
    }

    // ------------------------------------------------------------------
    // Errors and recovery
    // ------------------------------------------------------------------

    pub(crate) fn error(&mut self, message: impl Into<String>) {
        let found = self.peek();
        self.push_error(ParseError::new(self.current_span(), found, message));
    }

    fn push_error(&mut self, err: ParseError) {
        // Once the recursion limit trips, early termination produces
        // cascading "errors" that aren't; keep only the limit diagnostic.
        if !self.limited {
            self.errors.push(err);
        }
    }

    /// Report an error and consume exactly one token into an `Error` node.
    pub(crate) fn err_and_bump(&mut self, message: &str) {
        self.error(message);
        if self.at_eof() {
            return;
        }
        let m = self.start();
        self.bump();
        m.complete(self, NodeKind::Error);
    }

    /// Recursion guard for self-embedding productions. Returns `false`
    /// when the limit has been reached, after recording one diagnostic.
    pub(crate) fn enter_recursion(&mut self) -> bool {
        self.recursion.consume();
        if self.recursion.limited() {
            if !self.limited {
                self.errors.push(ParseError::new(
                    self.current_span(),
                    self.peek(),
                    "parser recursion limit reached",
                ));
                self.limited = true;
            }
            return false;
        }
        true
    }

    pub(crate) fn exit_recursion(&mut self) {
        self.recursion.release();
    }

    // ------------------------------------------------------------------
    // Node construction
    // ------------------------------------------------------------------

    pub(crate) fn start(&mut self) -> Marker {
        let at = self.events.len() as u32;
        self.events.push(Event::Start {
            kind: None,
            forward_parent: None,
        });
        Marker(at)
    }

    pub(crate) fn set_name(&mut self, m: CompletedMarker, name: &str) {
        self.patch(m.0).name = Some(name.into());
    }

    pub(crate) fn set_binary_op(&mut self, m: CompletedMarker, op: BinaryOp, span: Span) {
        let patch = self.patch(m.0);
        patch.binary_op = Some(op);
        patch.op_span = Some(span);
    }

    pub(crate) fn set_unary_op(&mut self, m: CompletedMarker, op: UnaryOp, span: Span) {
        let patch = self.patch(m.0);
        patch.unary_op = Some(op);
        patch.op_span = Some(span);
    }

    pub(crate) fn set_assign_op(&mut self, m: CompletedMarker, op: AssignOp, span: Span) {
        let patch = self.patch(m.0);
        patch.assign_op = Some(op);
        patch.op_span = Some(span);
    }

    pub(crate) fn set_modifiers(&mut self, m: CompletedMarker, mods: Modifiers) {
        self.patch(m.0).modifiers = Some(mods);
    }

    fn patch(&mut self, event: u32) -> &mut AttrPatch {
        match self.attr_patches.iter().position(|(e, _)| *e == event) {
            Some(i) => &mut self.attr_patches[i].1,
            None => {
                self.attr_patches.push((event, AttrPatch::default()));
                &mut self.attr_patches.last_mut().unwrap().1
            }
        }
    }

    // ------------------------------------------------------------------
    // Tree building
    // ------------------------------------------------------------------

    /// Replays the event stream into the arena. Forward parents are
    /// resolved here, so nodes are allocated strictly parent-first.
    fn build_tree(&mut self) -> (SyntaxArena, NodeId) {
        let mut arena = SyntaxArena::new();
        let mut stack: Vec<(NodeId, Option<u32>, Option<u32>)> = Vec::new();
        let mut root = None;
        let mut cursor: u32 = 0;
        let mut event_node: Vec<Option<NodeId>> = vec![None; self.events.len()];
        let mut chain: Vec<(usize, NodeKind)> = Vec::new();

        for i in 0..self.events.len() {
            let event = match self.events[i] {
                Event::Start { kind, forward_parent } => {
                    EventView::Start(kind, forward_parent)
                }
                Event::Finish => EventView::Finish,
                Event::Token => EventView::Token,
            };
            match event {
                EventView::Start(None, _) => {}
                EventView::Start(Some(kind), forward_parent) => {
                    chain.clear();
                    chain.push((i, kind));
                    let mut fp = forward_parent;
                    while let Some(j) = fp {
                        let j = j as usize;
                        if let Event::Start {
                            kind: Some(k),
                            forward_parent: next_fp,
                        } = self.events[j]
                        {
                            chain.push((j, k));
                            fp = next_fp;
                            // Mark resolved so the outer loop skips it.
                            self.events[j] = Event::Start {
                                kind: None,
                                forward_parent: None,
                            };
                        } else {
                            break;
                        }
                    }
                    // Outermost wrapper first.
                    for &(event_idx, kind) in chain.iter().rev() {
                        let id = arena.allocate(kind);
                        event_node[event_idx] = Some(id);
                        if let Some(&(parent, _, _)) = stack.last() {
                            arena.attach_child(parent, id);
                        } else if root.is_none() {
                            root = Some(id);
                        }
                        stack.push((id, None, None));
                    }
                }
                EventView::Token => {
                    let idx = cursor;
                    cursor += 1;
                    if let Some(top) = stack.last_mut() {
                        if top.1.is_none() {
                            top.1 = Some(idx);
                        }
                        top.2 = Some(idx);
                    }
                }
                EventView::Finish => {
                    let (id, first, last) = stack.pop().expect("unbalanced finish");
                    let span = self.node_span(first, last, cursor);
                    let first_token = first.unwrap_or(cursor);
                    let last_token = last.unwrap_or(cursor);
                    arena.seal(id, span, first_token, last_token);
                    // The parent's extent covers the child's tokens.
                    if let Some(top) = stack.last_mut() {
                        if let Some(f) = first {
                            if top.1.is_none() {
                                top.1 = Some(f);
                            }
                        }
                        if let Some(l) = last {
                            top.2 = Some(l);
                        }
                    }
                }
            }
        }
        debug_assert!(stack.is_empty(), "unbalanced start/finish events");

        for (event_idx, patch) in std::mem::take(&mut self.attr_patches) {
            if let Some(id) = event_node[event_idx as usize] {
                let attrs = arena.attrs_mut(id);
                if patch.name.is_some() {
                    attrs.name = patch.name;
                }
                if patch.binary_op.is_some() {
                    attrs.binary_op = patch.binary_op;
                }
                if patch.unary_op.is_some() {
                    attrs.unary_op = patch.unary_op;
                }
                if patch.assign_op.is_some() {
                    attrs.assign_op = patch.assign_op;
                }
                if patch.op_span.is_some() {
                    attrs.op_span = patch.op_span;
                }
                if let Some(mods) = patch.modifiers {
                    attrs.modifiers = mods;
                }
            }
        }

        let root = root.expect("compilation unit always produces a root");
        // The root's extent is the entire buffer, leading trivia included.
        arena.seal(
            root,
            Span::new(0, self.source.len()),
            0,
            (self.tokens.len() - 1) as u32,
        );
        (arena, root)
    }

    /// A node's extent includes the trivia attached to its first and last
    /// tokens: the leading run of the first and the trailing run of the
    /// last.
    fn node_span(&self, first: Option<u32>, last: Option<u32>, cursor: u32) -> Span {
        match (first, last) {
            (Some(first), Some(last)) => {
                let ft = &self.tokens[first as usize];
                let lt = &self.tokens[last as usize];
                let start = ft
                    .leading
                    .indices()
                    .next()
                    .map(|i| self.trivia[i].span.start)
                    .unwrap_or(ft.span.start);
                let end = lt
                    .trailing
                    .indices()
                    .next_back()
                    .map(|i| self.trivia[i].span.end)
                    .unwrap_or(lt.span.end);
                Span::new(start, end)
            }
            _ => {
                let at = self
                    .tokens
                    .get(cursor as usize)
                    .map(|t| t.span.start)
                    .unwrap_or(self.source.len());
                Span::empty(at)
            }
        }
    }
}

impl Marker {
    pub(crate) fn complete(self, p: &mut Parser<'_>, kind: NodeKind) -> CompletedMarker {
        match &mut p.events[self.0 as usize] {
            Event::Start { kind: slot, .. } => *slot = Some(kind),
            _ => unreachable!("marker does not point at a start event"),
        }
        p.events.push(Event::Finish);
        CompletedMarker(self.0)
    }

    /// Drop the marker without producing a node.
    pub(crate) fn abandon(self, p: &mut Parser<'_>) {
        if self.0 as usize == p.events.len() - 1 {
            if let Some(Event::Start { kind: None, forward_parent: None }) = p.events.last() {
                p.events.pop();
            }
        }
    }
}

impl CompletedMarker {
    /// Open a new node that will become this node's parent.
    pub(crate) fn precede(self, p: &mut Parser<'_>) -> Marker {
        let new = p.start();
        match &mut p.events[self.0 as usize] {
            Event::Start { forward_parent, .. } => *forward_parent = Some(new.0),
            _ => unreachable!("completed marker does not point at a start event"),
        }
        new
    }
}

#[cfg(test)]
mod tests;
