use crate::edit::TextEdit;
use crate::rules::{opts, Rule, RuleContext, RuleError, RuleOutput};
use crate::violation::{Severity, Violation};
use serde_json::{json, Value};
use std::collections::HashSet;
use styler_parser::{NodeKind, Span, TokenKind};

const PRIORITY: i32 = 30;

/// Sorts the import block into configured groups (lexicographic within a
/// group, one blank line between groups), optionally drops imports whose
/// simple name is never referenced, and merges explicit imports into an
/// already-present wildcard of the same package. Wildcard imports are
/// never removed: deciding whether `p.*` is used needs classpath
/// knowledge the engine does not have. A block with interleaved comments
/// is left untouched.
pub struct ImportOrganizer;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Import {
    name: String,
    is_static: bool,
    is_module: bool,
    /// Token range of the declaration, for the unused check.
    tokens: (usize, usize),
    span: Span,
}

impl Import {
    fn is_wildcard(&self) -> bool {
        self.name.ends_with(".*")
    }

    fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    fn package(&self) -> &str {
        match self.name.rfind('.') {
            Some(i) => &self.name[..i],
            None => "",
        }
    }

    fn render(&self) -> String {
        let mut line = String::from("import ");
        if self.is_static {
            line.push_str("static ");
        }
        if self.is_module {
            line.push_str("module ");
        }
        line.push_str(&self.name);
        line.push(';');
        line
    }
}

impl Rule for ImportOrganizer {
    fn id(&self) -> &'static str {
        "import-organizer"
    }

    fn description(&self) -> &'static str {
        "group, sort, and prune import declarations"
    }

    fn default_options(&self) -> Value {
        json!({
            "groups": ["java.", "javax.", ""],
            "remove_unused": false,
            "merge_wildcards": false,
        })
    }

    fn validate(&self, options: &Value) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if let Some(value) = options.get("groups") {
            match value.as_array() {
                Some(list) if list.iter().all(Value::is_string) => {}
                _ => errors.push("`groups` must be a list of package prefixes".into()),
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn apply(&self, ctx: &RuleContext<'_>) -> Result<RuleOutput, RuleError> {
        let groups: Vec<String> = ctx
            .options
            .get("groups")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_else(|| vec!["java.".into(), "javax.".into(), String::new()]);
        let remove_unused = opts::bool_opt(ctx.options, "remove_unused", false);
        let merge_wildcards = opts::bool_opt(ctx.options, "merge_wildcards", false);

        let mut out = RuleOutput::default();
        let imports = collect_imports(ctx);
        if imports.is_empty() {
            return Ok(out);
        }
        // Imports interleaved with other declarations (already a compile
        // error in javac) are left alone rather than folded together.
        if !imports_are_contiguous(ctx, &imports) {
            return Ok(out);
        }

        let block = Span::new(
            ctx.tokens[imports[0].tokens.0].span.start,
            ctx.tokens[imports.last().unwrap().tokens.1].span.end,
        );
        // Comments woven into the block would be lost by rewriting it.
        if ctx
            .trivia
            .iter()
            .any(|t| t.is_comment() && block.contains(t.span))
        {
            return Ok(out);
        }

        let mut kept: Vec<&Import> = imports.iter().collect();

        if merge_wildcards {
            let wildcards: HashSet<(bool, String)> = kept
                .iter()
                .filter(|i| i.is_wildcard())
                .map(|i| (i.is_static, i.package().to_owned()))
                .collect();
            kept.retain(|i| {
                i.is_wildcard()
                    || i.is_module
                    || !wildcards.contains(&(i.is_static, i.package().to_owned()))
            });
        }

        if remove_unused {
            let referenced = referenced_names(ctx, &imports);
            let mut removed = Vec::new();
            kept.retain(|i| {
                if i.is_wildcard() || i.is_module {
                    return true;
                }
                let used = referenced.contains(i.simple_name());
                if !used {
                    removed.push((*i).clone());
                }
                used
            });
            for import in removed {
                out.violations.push(
                    Violation::new(
                        ctx.source,
                        "import-organizer",
                        Severity::Info,
                        import.span,
                        format!("unused import `{}`", import.name),
                    )
                    .with_hint("remove the import"),
                );
            }
        }

        // Partition into groups: non-static imports by first matching
        // prefix (an empty prefix is the catch-all), static imports last.
        let ending = ctx.source.line_ending().as_str();
        let mut buckets: Vec<Vec<&Import>> = vec![Vec::new(); groups.len() + 2];
        for &import in &kept {
            let slot = if import.is_static {
                groups.len() + 1
            } else {
                groups
                    .iter()
                    .position(|g| import.name.starts_with(g.as_str()) || g.is_empty())
                    .unwrap_or(groups.len())
            };
            buckets[slot].push(import);
        }
        for bucket in &mut buckets {
            bucket.sort_by(|a, b| a.name.cmp(&b.name));
        }

        let rendered = buckets
            .iter()
            .filter(|b| !b.is_empty())
            .map(|b| {
                b.iter()
                    .map(|i| i.render())
                    .collect::<Vec<_>>()
                    .join(ending)
            })
            .collect::<Vec<_>>()
            .join(&format!("{ending}{ending}"));

        if rendered != ctx.source.slice(block) {
            let edit = TextEdit::replace(block, rendered, "import-organizer", PRIORITY);
            out.violations.push(
                Violation::new(
                    ctx.source,
                    "import-organizer",
                    Severity::Warn,
                    block,
                    "imports are not organized",
                )
                .with_hint("sort imports into configured groups")
                .with_fix(edit.clone()),
            );
            out.edits.push(edit);
        }

        // One blank line between the block and whatever follows it.
        let last_token = imports.last().unwrap().tokens.1;
        if let Some(next) = ctx.tokens.get(last_token + 1) {
            if next.kind != TokenKind::Eof && !ctx.gap_has_comment(last_token) {
                let gap = ctx.gap_span(last_token);
                let want = format!("{ending}{ending}");
                if ctx.source.slice(gap) != want {
                    out.edits
                        .push(TextEdit::replace(gap, want, "import-organizer", PRIORITY));
                }
            }
        }

        Ok(out)
    }
}

/// No non-import sibling may sit between the first and last import.
fn imports_are_contiguous(ctx: &RuleContext<'_>, imports: &[Import]) -> bool {
    let first = imports[0].tokens.0;
    let last = imports[imports.len() - 1].tokens.1;
    ctx.arena
        .children(ctx.root)
        .filter(|&id| ctx.arena.kind(id) != NodeKind::ImportDecl)
        .all(|id| {
            let attrs = ctx.arena.attrs(id);
            (attrs.last_token as usize) < first || (attrs.first_token as usize) > last
        })
}

fn collect_imports(ctx: &RuleContext<'_>) -> Vec<Import> {
    let mut imports = Vec::new();
    for id in ctx.arena.children(ctx.root) {
        if ctx.arena.kind(id) != NodeKind::ImportDecl {
            continue;
        }
        let attrs = ctx.arena.attrs(id);
        let name = attrs.name.as_deref().unwrap_or("").to_owned();
        if name.is_empty() {
            continue;
        }
        let first = attrs.first_token as usize;
        let last = attrs.last_token as usize;
        let second = &ctx.tokens[first + 1];
        let is_static = second.kind == TokenKind::StaticKw;
        let is_module =
            second.kind == TokenKind::Ident && ctx.source.slice(second.span) == "module";
        imports.push(Import {
            name,
            is_static,
            is_module,
            tokens: (first, last),
            span: Span::new(ctx.tokens[first].span.start, ctx.tokens[last].span.end),
        });
    }
    imports
}

/// Every identifier mentioned outside the import block itself. Comments
/// are trivia and never contribute.
fn referenced_names(ctx: &RuleContext<'_>, imports: &[Import]) -> HashSet<String> {
    let mut names = HashSet::new();
    for (i, token) in ctx.tokens.iter().enumerate() {
        if token.kind != TokenKind::Ident {
            continue;
        }
        if imports
            .iter()
            .any(|imp| imp.tokens.0 <= i && i <= imp.tokens.1)
        {
            continue;
        }
        names.insert(ctx.source.slice(token.span).to_owned());
    }
    names
}
