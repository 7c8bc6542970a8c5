use crate::violation::{Severity, Violation};
use styler_parser::{SourceBuffer, Span};

/// A proposed byte-range replacement on the source buffer. An edit with an
/// empty span is an insertion at that point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub span: Span,
    pub replacement: String,
    /// Originating rule id.
    pub rule: &'static str,
    /// Higher wins when overlapping edits conflict.
    pub priority: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditIntent {
    Insert,
    Delete,
    Replace,
}

impl TextEdit {
    pub fn replace(span: Span, replacement: impl Into<String>, rule: &'static str, priority: i32) -> Self {
        Self {
            span,
            replacement: replacement.into(),
            rule,
            priority,
        }
    }

    pub fn insert(at: usize, text: impl Into<String>, rule: &'static str, priority: i32) -> Self {
        Self::replace(Span::empty(at), text, rule, priority)
    }

    pub fn delete(span: Span, rule: &'static str, priority: i32) -> Self {
        Self::replace(span, String::new(), rule, priority)
    }

    pub fn intent(&self) -> EditIntent {
        if self.span.is_empty() {
            EditIntent::Insert
        } else if self.replacement.is_empty() {
            EditIntent::Delete
        } else {
            EditIntent::Replace
        }
    }

    /// Whether applying this edit changes anything besides whitespace.
    pub fn is_whitespace_only(&self, source: &SourceBuffer) -> bool {
        let strip = |s: &str| -> String { s.chars().filter(|c| !c.is_whitespace()).collect() };
        strip(source.slice(self.span)) == strip(&self.replacement)
    }
}

/// Resolves overlapping edits deterministically: structurally identical
/// duplicates merge; otherwise strictly higher priority wins, then the
/// earlier-starting edit, then the smaller span, and finally the
/// lexicographically smaller rule id — that last tiebreak also records a
/// `rule-conflict` violation for the dropped edit.
///
/// The surviving edits are returned sorted by span start and are pairwise
/// non-overlapping.
pub fn resolve_conflicts(
    mut edits: Vec<TextEdit>,
    source: &SourceBuffer,
) -> (Vec<TextEdit>, Vec<Violation>) {
    edits.sort_by(|a, b| {
        (a.span.start, a.span.end, a.rule)
            .cmp(&(b.span.start, b.span.end, b.rule))
    });
    edits.dedup_by(|next, prev| next.span == prev.span && next.replacement == prev.replacement);

    let mut accepted: Vec<TextEdit> = Vec::with_capacity(edits.len());
    let mut violations = Vec::new();

    'next_edit: for edit in edits {
        while let Some(last) = accepted.last() {
            if !last.span.overlaps(edit.span) {
                break;
            }
            match decide(last, &edit) {
                Winner::First { report } => {
                    if report {
                        violations.push(conflict_violation(source, &edit, last));
                    }
                    continue 'next_edit;
                }
                Winner::Second { report } => {
                    let loser = accepted.pop().expect("non-empty");
                    if report {
                        violations.push(conflict_violation(source, &loser, &edit));
                    }
                }
            }
        }
        accepted.push(edit);
    }

    (accepted, violations)
}

enum Winner {
    First { report: bool },
    Second { report: bool },
}

fn decide(a: &TextEdit, b: &TextEdit) -> Winner {
    if a.priority != b.priority {
        return if a.priority > b.priority {
            Winner::First { report: false }
        } else {
            Winner::Second { report: false }
        };
    }
    if a.span.start != b.span.start {
        return if a.span.start < b.span.start {
            Winner::First { report: false }
        } else {
            Winner::Second { report: false }
        };
    }
    if a.span.len() != b.span.len() {
        return if a.span.len() < b.span.len() {
            Winner::First { report: false }
        } else {
            Winner::Second { report: false }
        };
    }
    if a.rule <= b.rule {
        Winner::First { report: true }
    } else {
        Winner::Second { report: true }
    }
}

fn conflict_violation(source: &SourceBuffer, dropped: &TextEdit, winner: &TextEdit) -> Violation {
    Violation::new(
        source,
        "rule-conflict",
        Severity::Warn,
        dropped.span,
        format!(
            "edit from rule `{}` conflicts with rule `{}` and was dropped",
            dropped.rule, winner.rule
        ),
    )
}

/// Applies non-overlapping edits to `text`. Edits are applied right to
/// left so earlier offsets stay valid; the input slice must already be
/// sorted by span start (as produced by [`resolve_conflicts`]). Applying
/// an empty edit list returns the input unchanged.
pub fn apply_edits(text: &str, edits: &[TextEdit]) -> String {
    debug_assert!(
        edits.windows(2).all(|w| w[0].span.start <= w[1].span.start
            && !w[0].span.overlaps(w[1].span)),
        "edits must be sorted and non-overlapping"
    );
    let mut out = text.to_owned();
    for edit in edits.iter().rev() {
        out.replace_range(edit.span.start..edit.span.end, &edit.replacement);
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn buffer(text: &str) -> SourceBuffer {
        SourceBuffer::new(text.to_owned())
    }

    #[test]
    fn empty_edit_list_is_identity() {
        assert_eq!(apply_edits("class A {}", &[]), "class A {}");
    }

    #[test]
    fn edits_apply_right_to_left() {
        let edits = vec![
            TextEdit::replace(Span::new(0, 1), "X", "a", 0),
            TextEdit::insert(5, "!", "a", 0),
            TextEdit::delete(Span::new(7, 9), "a", 0),
        ];
        assert_eq!(apply_edits("abcdefghi", &edits), "Xbcde!fg");
    }

    #[test]
    fn identical_edits_merge() {
        let src = buffer("aaaa");
        let edits = vec![
            TextEdit::replace(Span::new(0, 2), "xy", "rule-b", 1),
            TextEdit::replace(Span::new(0, 2), "xy", "rule-a", 5),
        ];
        let (survivors, violations) = resolve_conflicts(edits, &src);
        assert_eq!(survivors.len(), 1);
        assert!(violations.is_empty());
    }

    #[test]
    fn higher_priority_wins() {
        let src = buffer("aaaa");
        let edits = vec![
            TextEdit::replace(Span::new(0, 3), "low", "low-rule", 1),
            TextEdit::replace(Span::new(1, 2), "high", "high-rule", 9),
        ];
        let (survivors, violations) = resolve_conflicts(edits, &src);
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].rule, "high-rule");
        assert!(violations.is_empty());
    }

    #[test]
    fn equal_priority_earlier_start_wins() {
        let src = buffer("aaaa");
        let edits = vec![
            TextEdit::replace(Span::new(1, 3), "b", "b-rule", 1),
            TextEdit::replace(Span::new(0, 2), "a", "a-rule", 1),
        ];
        let (survivors, _) = resolve_conflicts(edits, &src);
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].rule, "a-rule");
    }

    #[test]
    fn same_start_smaller_span_wins() {
        let src = buffer("aaaa");
        let edits = vec![
            TextEdit::replace(Span::new(0, 4), "big", "big-rule", 1),
            TextEdit::replace(Span::new(0, 2), "small", "small-rule", 1),
        ];
        let (survivors, _) = resolve_conflicts(edits, &src);
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].rule, "small-rule");
    }

    #[test]
    fn final_tiebreak_is_rule_id_and_reports() {
        let src = buffer("aaaa");
        let edits = vec![
            TextEdit::replace(Span::new(0, 2), "zzz", "zeta", 1),
            TextEdit::replace(Span::new(0, 2), "alpha", "alpha", 1),
        ];
        let (survivors, violations) = resolve_conflicts(edits, &src);
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].rule, "alpha");
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule_id, "rule-conflict");
    }

    #[test]
    fn resolution_is_deterministic_across_input_orders() {
        let src = buffer("aaaaaaaa");
        let mut edits = vec![
            TextEdit::replace(Span::new(0, 4), "1", "r1", 2),
            TextEdit::replace(Span::new(2, 6), "2", "r2", 2),
            TextEdit::replace(Span::new(5, 8), "3", "r3", 7),
            TextEdit::insert(8, "4", "r4", 0),
        ];
        let (a, _) = resolve_conflicts(edits.clone(), &src);
        edits.reverse();
        let (b, _) = resolve_conflicts(edits, &src);
        assert_eq!(a, b);
    }

    #[test]
    fn non_overlapping_inserts_at_same_point_both_survive() {
        let src = buffer("ab");
        let edits = vec![
            TextEdit::insert(1, "x", "r1", 0),
            TextEdit::insert(1, "y", "r2", 0),
        ];
        let (survivors, violations) = resolve_conflicts(edits, &src);
        assert_eq!(survivors.len(), 2);
        assert!(violations.is_empty());
    }

    #[test]
    fn whitespace_only_detection() {
        let src = buffer("int  x=1;");
        assert!(TextEdit::replace(Span::new(3, 5), " ", "w", 0).is_whitespace_only(&src));
        assert!(!TextEdit::replace(Span::new(6, 7), " ", "w", 0).is_whitespace_only(&src));
    }
}
