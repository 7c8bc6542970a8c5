//! Minimal unified-diff rendering for check/diff workflows. The hunk
//! construction trims the common prefix and suffix and emits the changed
//! middle as one hunk with three lines of context — not a minimal diff,
//! but a valid and deterministic one.

use std::fmt::Write as _;

const CONTEXT: usize = 3;

/// Renders the proposed change as a unified diff, or `None` when the
/// texts are identical.
pub fn render_unified_diff(path: &str, before: &str, after: &str) -> Option<String> {
    if before == after {
        return None;
    }
    let old: Vec<&str> = before.lines().collect();
    let new: Vec<&str> = after.lines().collect();

    let mut prefix = 0;
    while prefix < old.len() && prefix < new.len() && old[prefix] == new[prefix] {
        prefix += 1;
    }
    let mut suffix = 0;
    while suffix < old.len() - prefix
        && suffix < new.len() - prefix
        && old[old.len() - 1 - suffix] == new[new.len() - 1 - suffix]
    {
        suffix += 1;
    }

    let ctx_start = prefix.saturating_sub(CONTEXT);
    let old_end = (old.len() - suffix + CONTEXT).min(old.len());
    let new_end = (new.len() - suffix + CONTEXT).min(new.len());

    let old_count = old_end - ctx_start;
    let new_count = new_end - ctx_start;

    let mut out = String::new();
    let _ = writeln!(out, "--- a/{path}");
    let _ = writeln!(out, "+++ b/{path}");
    let _ = writeln!(
        out,
        "@@ -{},{} +{},{} @@",
        ctx_start + 1,
        old_count,
        ctx_start + 1,
        new_count
    );
    for line in &old[ctx_start..prefix] {
        let _ = writeln!(out, " {line}");
    }
    for line in &old[prefix..old.len() - suffix] {
        let _ = writeln!(out, "-{line}");
    }
    for line in &new[prefix..new.len() - suffix] {
        let _ = writeln!(out, "+{line}");
    }
    for line in &old[old.len() - suffix..old_end] {
        let _ = writeln!(out, " {line}");
    }
    Some(out)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn identical_text_yields_no_diff() {
        assert_eq!(render_unified_diff("A.java", "class A {}\n", "class A {}\n"), None);
    }

    #[test]
    fn single_line_change() {
        let before = "class A {\nint x ;\n}\n";
        let after = "class A {\n    int x;\n}\n";
        let diff = render_unified_diff("A.java", before, after).unwrap();
        assert!(diff.starts_with("--- a/A.java\n+++ b/A.java\n"));
        assert!(diff.contains("-int x ;"));
        assert!(diff.contains("+    int x;"));
        assert!(diff.contains(" class A {"));
    }

    #[test]
    fn hunk_header_counts_lines() {
        let before = "a\nb\nc\n";
        let after = "a\nB\nc\n";
        let diff = render_unified_diff("F.java", before, after).unwrap();
        assert!(diff.contains("@@ -1,3 +1,3 @@"), "{diff}");
    }
}
