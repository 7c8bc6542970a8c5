//! The rule capability and its registry.
//!
//! A rule is pure over its inputs: the same tree, source, and options
//! always produce the same edits and violations, and rules never observe
//! each other's output. "Plugins" are compile-time registered
//! implementations of [`Rule`]; there is no dynamic loading.

mod braces;
mod imports;
mod indentation;
mod line_length;
mod whitespace;

use crate::edit::TextEdit;
use crate::violation::Violation;
use indexmap::IndexMap;
use serde_json::Value;
use styler_parser::{
    NodeId, NodeKind, SourceBuffer, Span, SyntaxArena, Token, TokenKind, Trivia,
};

pub use braces::BracePlacement;
pub use imports::ImportOrganizer;
pub use indentation::Indentation;
pub use line_length::LineLength;
pub use whitespace::WhitespaceNormalizer;

/// Why a rule application stopped early.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("cancelled")]
    Cancelled,
    #[error("per-file time budget exhausted")]
    TimedOut,
    #[error("{0}")]
    Failed(String),
}

#[derive(Debug, Default)]
pub struct RuleOutput {
    pub edits: Vec<TextEdit>,
    pub violations: Vec<Violation>,
}

/// An analyzer-plus-fixer unit. Implementations must be `Send + Sync`;
/// the registry is shared read-only across worker threads.
pub trait Rule: Send + Sync {
    fn id(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// The rule's option record with every key at its default.
    fn default_options(&self) -> Value;
    /// Checks a merged option record, returning the offending details.
    fn validate(&self, options: &Value) -> Result<(), Vec<String>>;
    fn apply(&self, ctx: &RuleContext<'_>) -> Result<RuleOutput, RuleError>;
}

/// Everything a rule may look at while analyzing one file.
pub struct RuleContext<'a> {
    pub source: &'a SourceBuffer,
    pub tokens: &'a [Token],
    pub trivia: &'a [Trivia],
    pub arena: &'a SyntaxArena,
    pub root: NodeId,
    pub options: &'a Value,
    /// Index of the first significant token on each 1-based line, if any.
    line_first_token: Vec<Option<u32>>,
    /// Polled at coarse points inside long traversals.
    interrupt: &'a dyn Fn() -> Option<RuleError>,
}

impl<'a> RuleContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: &'a SourceBuffer,
        tokens: &'a [Token],
        trivia: &'a [Trivia],
        arena: &'a SyntaxArena,
        root: NodeId,
        options: &'a Value,
        interrupt: &'a dyn Fn() -> Option<RuleError>,
    ) -> Self {
        let mut line_first_token = vec![None; source.line_count() + 2];
        for (i, token) in tokens.iter().enumerate() {
            if token.kind == TokenKind::Eof {
                continue;
            }
            let line = source.byte_to_line_col(token.span.start).line;
            if line_first_token[line].is_none() {
                line_first_token[line] = Some(i as u32);
            }
        }
        Self {
            source,
            tokens,
            trivia,
            arena,
            root,
            options,
            line_first_token,
            interrupt,
        }
    }

    /// Cancellation/deadline checkpoint; rules call this every few
    /// thousand nodes in large traversals.
    pub fn checkpoint(&self) -> Result<(), RuleError> {
        match (self.interrupt)() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn first_token_on_line(&self, line: usize) -> Option<usize> {
        self.line_first_token
            .get(line)
            .copied()
            .flatten()
            .map(|i| i as usize)
    }

    /// The whitespace gap between token `i` and token `i + 1`.
    pub fn gap_span(&self, i: usize) -> Span {
        Span::new(self.tokens[i].span.end, self.tokens[i + 1].span.start)
    }

    /// Trivia between token `i` and `i + 1`: the first token's trailing
    /// run followed by the next token's leading run.
    pub fn trivia_between(&self, i: usize) -> &[Trivia] {
        let start = self.tokens[i].trailing.start as usize;
        let end = self.tokens[i + 1].leading.end as usize;
        &self.trivia[start.min(end)..end]
    }

    pub fn gap_has_comment(&self, i: usize) -> bool {
        self.trivia_between(i).iter().any(Trivia::is_comment)
    }

    pub fn gap_has_newline(&self, i: usize) -> bool {
        self.trivia_between(i)
            .iter()
            .any(|t| t.kind == styler_parser::TriviaKind::Newline)
    }

    /// The deepest node whose token range contains token index `idx`.
    pub fn node_at_token(&self, idx: usize) -> NodeId {
        let idx = idx as u32;
        let mut current = self.root;
        'descend: loop {
            for child in self.arena.children(current) {
                let attrs = self.arena.attrs(child);
                if attrs.first_token <= idx && idx <= attrs.last_token && !self.is_empty_node(child)
                {
                    current = child;
                    continue 'descend;
                }
            }
            return current;
        }
    }

    fn is_empty_node(&self, id: NodeId) -> bool {
        // Nodes that consumed no tokens have a collapsed placeholder range.
        self.arena.span(id).is_empty() && self.arena.first_child(id).is_none()
    }

    /// Leading-whitespace span of a 1-based line.
    pub fn line_indent_span(&self, line: usize) -> Option<Span> {
        let span = self.source.line_span(line)?;
        let text = self.source.slice(span);
        let ws = text.len() - text.trim_start_matches([' ', '\t']).len();
        Some(Span::new(span.start, span.start + ws))
    }

    /// Nesting depth of the position of token `idx`, counting enclosing
    /// braced bodies. The opening and closing brace tokens themselves sit
    /// at the outer depth.
    pub fn indent_depth(&self, idx: usize) -> usize {
        let node = self.node_at_token(idx);
        let token = idx as u32;
        let mut depth = 0;
        for anc in std::iter::once(node).chain(self.arena.ancestors(node)) {
            let attrs = self.arena.attrs(anc);
            match self.arena.kind(anc) {
                NodeKind::Block
                | NodeKind::ClassBody
                | NodeKind::SwitchBlock
                | NodeKind::ArrayInitializer => {
                    if attrs.first_token < token && token < attrs.last_token {
                        depth += 1;
                    }
                }
                NodeKind::ModuleDecl => {
                    if let Some(brace) = self.find_token_in(anc, TokenKind::LBrace) {
                        if brace < token && token < attrs.last_token {
                            depth += 1;
                        }
                    }
                }
                NodeKind::SwitchGroup => {
                    // Statements sit one deeper than their labels.
                    let label_end = self
                        .arena
                        .children(anc)
                        .filter(|&c| {
                            matches!(
                                self.arena.kind(c),
                                NodeKind::CaseLabel | NodeKind::DefaultLabel
                            )
                        })
                        .map(|c| self.arena.attrs(c).last_token)
                        .max();
                    // The `:` trails the last label node.
                    if let Some(label_end) = label_end {
                        if token > label_end + 1 {
                            depth += 1;
                        }
                    }
                }
                _ => {}
            }
        }
        depth
    }

    fn find_token_in(&self, id: NodeId, kind: TokenKind) -> Option<u32> {
        let attrs = self.arena.attrs(id);
        (attrs.first_token..=attrs.last_token)
            .find(|&i| self.tokens.get(i as usize).map(|t| t.kind) == Some(kind))
    }
}

/// Renders an indentation prefix: `depth` levels plus `extra` continuation
/// levels, in spaces or tabs.
pub(crate) fn render_indent(unit: &str, size: usize, depth: usize, extra: usize) -> String {
    match unit {
        "tabs" => "\t".repeat(depth + extra),
        _ => " ".repeat((depth + extra) * size),
    }
}

/// Statically-populated mapping from rule id to implementation, in
/// registration order. Embedders may add their own rules before resolving
/// a configuration against the registry.
pub struct RuleRegistry {
    rules: IndexMap<&'static str, Box<dyn Rule>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self {
            rules: IndexMap::new(),
        }
    }

    /// The registry with the five built-in rules.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(ImportOrganizer));
        registry.register(Box::new(BracePlacement));
        registry.register(Box::new(LineLength));
        registry.register(Box::new(WhitespaceNormalizer));
        registry.register(Box::new(Indentation));
        registry
    }

    pub fn register(&mut self, rule: Box<dyn Rule>) {
        self.rules.insert(rule.id(), rule);
    }

    pub fn get(&self, id: &str) -> Option<&dyn Rule> {
        self.rules.get(id).map(|r| r.as_ref())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.rules.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.rules.keys().copied()
    }

    pub fn rules(&self) -> impl Iterator<Item = &dyn Rule> {
        self.rules.values().map(|r| r.as_ref())
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Shared option-parsing helpers for the built-in rules.
pub(crate) mod opts {
    use serde_json::Value;

    pub fn usize_opt(options: &Value, key: &str, default: usize) -> usize {
        options
            .get(key)
            .and_then(Value::as_u64)
            .map(|v| v as usize)
            .unwrap_or(default)
    }

    pub fn bool_opt(options: &Value, key: &str, default: bool) -> bool {
        options.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    pub fn str_opt<'a>(options: &'a Value, key: &str, default: &'a str) -> &'a str {
        options.get(key).and_then(Value::as_str).unwrap_or(default)
    }

    pub fn expect_choice(
        options: &Value,
        key: &str,
        choices: &[&str],
        errors: &mut Vec<String>,
    ) {
        if let Some(value) = options.get(key) {
            match value.as_str() {
                Some(s) if choices.contains(&s) => {}
                _ => errors.push(format!(
                    "`{key}` must be one of {}",
                    choices.join("|")
                )),
            }
        }
    }
}
