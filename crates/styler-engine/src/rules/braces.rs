use crate::edit::TextEdit;
use crate::rules::{opts, render_indent, Rule, RuleContext, RuleError, RuleOutput};
use serde_json::{json, Value};
use styler_parser::{NodeId, NodeKind, TokenKind};

const PRIORITY: i32 = 20;

#[derive(Clone, Copy, PartialEq)]
enum Placement {
    SameLine,
    NextLine,
}

#[derive(Clone, Copy, PartialEq)]
enum Category {
    Classes,
    Methods,
    Control,
}

/// Places opening braces on the same or the next line per category
/// (classes, methods, control structures), keeps body content off the
/// brace lines, and attaches `else`/`catch`/`finally`/do-`while` to the
/// closing brace per the control-structure option. Closing braces always
/// get their own line; `{}` stays as is. Gaps holding comments are never
/// touched.
pub struct BracePlacement;

impl Rule for BracePlacement {
    fn id(&self) -> &'static str {
        "braces"
    }

    fn description(&self) -> &'static str {
        "normalize opening/closing brace placement"
    }

    fn default_options(&self) -> Value {
        json!({
            "classes": "same_line",
            "methods": "same_line",
            "control_structures": "same_line",
            "indent_unit": "spaces",
            "indent_size": 4,
        })
    }

    fn validate(&self, options: &Value) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        for key in ["classes", "methods", "control_structures"] {
            opts::expect_choice(options, key, &["same_line", "next_line"], &mut errors);
        }
        opts::expect_choice(options, "indent_unit", &["spaces", "tabs"], &mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn apply(&self, ctx: &RuleContext<'_>) -> Result<RuleOutput, RuleError> {
        let placement = |key: &str| -> Placement {
            match opts::str_opt(ctx.options, key, "same_line") {
                "next_line" => Placement::NextLine,
                _ => Placement::SameLine,
            }
        };
        let classes = placement("classes");
        let methods = placement("methods");
        let control = placement("control_structures");
        let unit = opts::str_opt(ctx.options, "indent_unit", "spaces").to_owned();
        let size = opts::usize_opt(ctx.options, "indent_size", 4);

        let mut out = RuleOutput::default();
        let mut visited = 0usize;
        for id in ctx.arena.descendants(ctx.root) {
            visited += 1;
            if visited % 4096 == 0 {
                ctx.checkpoint()?;
            }
            let category = match body_category(ctx, id) {
                Some(category) => category,
                None => continue,
            };
            let Some(open) = self.body_open_brace(ctx, id) else {
                continue;
            };
            let close = ctx.arena.attrs(id).last_token as usize;
            if ctx.tokens[close].kind != TokenKind::RBrace {
                continue;
            }
            let option = match category {
                Category::Classes => classes,
                Category::Methods => methods,
                Category::Control => control,
            };

            // A construct that *starts* with its brace (bare instance
            // initializer) has no header to attach to.
            let has_header = ctx
                .arena
                .parent(id)
                .is_some_and(|parent| (ctx.arena.attrs(parent).first_token as usize) < open);
            if has_header {
                self.place_opening(ctx, open, option, &unit, size, &mut out);
            }
            if close > open + 1 {
                // Body content starts on a fresh line.
                self.want_break(ctx, open, &unit, size, &mut out);
                // The closing brace sits on its own line.
                self.want_break_before_close(ctx, close, &unit, size, &mut out);
            }
            self.attach_continuation_keyword(ctx, close, control, &unit, size, &mut out);
        }
        Ok(out)
    }
}

impl BracePlacement {
    /// The `{` opening a body node: its first token, except for bodies
    /// that start before their brace (none of the tracked kinds do).
    fn body_open_brace(&self, ctx: &RuleContext<'_>, id: NodeId) -> Option<usize> {
        let first = ctx.arena.attrs(id).first_token as usize;
        (ctx.tokens.get(first)?.kind == TokenKind::LBrace).then_some(first)
    }

    fn place_opening(
        &self,
        ctx: &RuleContext<'_>,
        open: usize,
        option: Placement,
        unit: &str,
        size: usize,
        out: &mut RuleOutput,
    ) {
        if open == 0 {
            return;
        }
        let before = open - 1;
        if ctx.gap_has_comment(before) {
            return;
        }
        let want = match option {
            Placement::SameLine => " ".to_owned(),
            Placement::NextLine => {
                let depth = ctx.indent_depth(open);
                format!(
                    "{}{}",
                    ctx.source.line_ending().as_str(),
                    render_indent(unit, size, depth, 0)
                )
            }
        };
        let gap = ctx.gap_span(before);
        if ctx.source.slice(gap) != want {
            out.edits
                .push(TextEdit::replace(gap, want, "braces", PRIORITY));
        }
    }

    /// Body content must not share the opening brace's line.
    fn want_break(
        &self,
        ctx: &RuleContext<'_>,
        open: usize,
        unit: &str,
        size: usize,
        out: &mut RuleOutput,
    ) {
        if ctx.gap_has_newline(open) || ctx.gap_has_comment(open) {
            return;
        }
        let depth = ctx.indent_depth(open + 1);
        let want = format!(
            "{}{}",
            ctx.source.line_ending().as_str(),
            render_indent(unit, size, depth, 0)
        );
        out.edits.push(TextEdit::replace(
            ctx.gap_span(open),
            want,
            "braces",
            PRIORITY,
        ));
    }

    fn want_break_before_close(
        &self,
        ctx: &RuleContext<'_>,
        close: usize,
        unit: &str,
        size: usize,
        out: &mut RuleOutput,
    ) {
        let before = close - 1;
        if ctx.gap_has_newline(before) || ctx.gap_has_comment(before) {
            return;
        }
        let depth = ctx.indent_depth(close);
        let want = format!(
            "{}{}",
            ctx.source.line_ending().as_str(),
            render_indent(unit, size, depth, 0)
        );
        out.edits.push(TextEdit::replace(
            ctx.gap_span(before),
            want,
            "braces",
            PRIORITY,
        ));
    }

    /// `} else`, `} catch`, `} finally`, and do-while's `} while` follow
    /// the control-structure placement option.
    fn attach_continuation_keyword(
        &self,
        ctx: &RuleContext<'_>,
        close: usize,
        option: Placement,
        unit: &str,
        size: usize,
        out: &mut RuleOutput,
    ) {
        let Some(next) = ctx.tokens.get(close + 1) else {
            return;
        };
        let attaches = match next.kind {
            TokenKind::ElseKw | TokenKind::CatchKw | TokenKind::FinallyKw => true,
            TokenKind::WhileKw => {
                let block = ctx.node_at_token(close);
                ctx.arena
                    .parent(block)
                    .is_some_and(|p| ctx.arena.kind(p) == NodeKind::DoStmt)
            }
            _ => false,
        };
        if !attaches || ctx.gap_has_comment(close) {
            return;
        }
        let want = match option {
            Placement::SameLine => " ".to_owned(),
            Placement::NextLine => {
                let depth = ctx.indent_depth(close);
                format!(
                    "{}{}",
                    ctx.source.line_ending().as_str(),
                    render_indent(unit, size, depth, 0)
                )
            }
        };
        let gap = ctx.gap_span(close);
        if ctx.source.slice(gap) != want {
            out.edits
                .push(TextEdit::replace(gap, want, "braces", PRIORITY));
        }
    }
}

/// Which placement option governs a brace-delimited body node.
fn body_category(ctx: &RuleContext<'_>, id: NodeId) -> Option<Category> {
    let parent = ctx.arena.parent(id)?;
    match ctx.arena.kind(id) {
        NodeKind::ClassBody => Some(Category::Classes),
        NodeKind::Block => match ctx.arena.kind(parent) {
            NodeKind::MethodDecl
            | NodeKind::ConstructorDecl
            | NodeKind::CompactConstructorDecl
            | NodeKind::InitializerBlock
            | NodeKind::AnnotationElementDecl => Some(Category::Methods),
            NodeKind::IfStmt
            | NodeKind::WhileStmt
            | NodeKind::DoStmt
            | NodeKind::ForStmt
            | NodeKind::ForEachStmt
            | NodeKind::TryStmt
            | NodeKind::CatchClause
            | NodeKind::FinallyClause
            | NodeKind::SynchronizedStmt
            | NodeKind::SwitchRule
            | NodeKind::LabeledStmt
            | NodeKind::Lambda => Some(Category::Control),
            _ => None,
        },
        NodeKind::SwitchBlock => Some(Category::Control),
        NodeKind::ModuleDecl => None,
        _ => None,
    }
}
