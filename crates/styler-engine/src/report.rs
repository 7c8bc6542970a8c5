//! Violation report rendering: stable JSON for machines, narrative
//! grouping for humans, and the audience auto-detection between them.

use crate::config::ReportMode;
use crate::engine::FileOutcome;
use crate::parallel::FileResult;
use crate::violation::{Severity, Violation};
use serde::Serialize;
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Human,
    Machine,
}

/// Explicit configuration wins; otherwise a terminal gets the human
/// format and anything else (pipes, CI logs) gets JSON.
pub fn detect_audience(mode: ReportMode, stream_is_terminal: bool) -> Audience {
    match mode {
        ReportMode::Human => Audience::Human,
        ReportMode::Machine => Audience::Machine,
        ReportMode::Auto => {
            if stream_is_terminal {
                Audience::Human
            } else {
                Audience::Machine
            }
        }
    }
}

// Serialized shapes for the machine format. Field names are a stable
// interface; additions are allowed, renames are not.

#[derive(Serialize)]
struct MachinePosition {
    line: usize,
    col: usize,
    offset: usize,
}

#[derive(Serialize)]
struct MachineViolation<'a> {
    rule_id: &'a str,
    severity: &'a str,
    start: MachinePosition,
    end: MachinePosition,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    fix_hint: Option<&'a str>,
}

#[derive(Serialize)]
struct MachineStats {
    tokens: usize,
    nodes: usize,
    duration_ms: u64,
}

#[derive(Serialize)]
struct MachineFile<'a> {
    path: String,
    violations: Vec<MachineViolation<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stats: Option<MachineStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<MachineError<'a>>,
}

#[derive(Serialize)]
struct MachineError<'a> {
    kind: &'a str,
    message: &'a str,
}

/// One JSON array with an object per file.
pub fn render_machine(results: &[FileResult]) -> String {
    let files: Vec<MachineFile<'_>> = results
        .iter()
        .map(|result| {
            let error = match &result.outcome {
                FileOutcome::Error { kind, message } => Some(MachineError {
                    kind: kind.as_str(),
                    message,
                }),
                _ => None,
            };
            MachineFile {
                path: result.path.display().to_string(),
                violations: result
                    .outcome
                    .violations()
                    .iter()
                    .map(machine_violation)
                    .collect(),
                stats: result.outcome.stats().map(|s| MachineStats {
                    tokens: s.tokens,
                    nodes: s.nodes,
                    duration_ms: s.duration.as_millis() as u64,
                }),
                error,
            }
        })
        .collect();
    serde_json::to_string_pretty(&files).expect("report serialization is infallible")
}

fn machine_violation(v: &Violation) -> MachineViolation<'_> {
    MachineViolation {
        rule_id: &v.rule_id,
        severity: v.severity.as_str(),
        start: MachinePosition {
            line: v.start.line,
            col: v.start.col,
            offset: v.span.start,
        },
        end: MachinePosition {
            line: v.end.line,
            col: v.end.col,
            offset: v.span.end,
        },
        message: &v.message,
        fix_hint: v.fix_hint.as_deref(),
    }
}

/// Per-file header, violations grouped by severity (errors first), each
/// with `line:col  rule-id  message` and an optional excerpt with a caret
/// run underneath.
pub fn render_human(results: &[FileResult]) -> String {
    let mut out = String::new();
    for result in results {
        match &result.outcome {
            FileOutcome::Error { kind, message } => {
                let _ = writeln!(
                    out,
                    "{}: error [{}] {}",
                    result.path.display(),
                    kind.as_str(),
                    message
                );
                continue;
            }
            outcome => {
                let violations = outcome.violations();
                if violations.is_empty() {
                    continue;
                }
                let _ = writeln!(
                    out,
                    "{} ({} violation{})",
                    result.path.display(),
                    violations.len(),
                    if violations.len() == 1 { "" } else { "s" }
                );
                let mut sorted: Vec<&Violation> = violations.iter().collect();
                sorted.sort_by(|a, b| {
                    b.severity
                        .cmp(&a.severity)
                        .then(a.span.start.cmp(&b.span.start))
                });
                for v in sorted {
                    let _ = writeln!(
                        out,
                        "  {}:{}  {} [{}]  {}",
                        v.start.line,
                        v.start.col,
                        v.severity.as_str(),
                        v.rule_id,
                        v.message
                    );
                    if let Some(excerpt) = &v.excerpt {
                        let _ = writeln!(out, "    | {excerpt}");
                        let caret_start = v.start.col.saturating_sub(1);
                        let caret_len = if v.start.line == v.end.line {
                            (v.end.col.saturating_sub(v.start.col)).max(1)
                        } else {
                            excerpt.chars().count().saturating_sub(caret_start).max(1)
                        };
                        let _ = writeln!(
                            out,
                            "    | {}{}",
                            " ".repeat(caret_start),
                            "^".repeat(caret_len)
                        );
                    }
                }
                out.push('\n');
            }
        }
    }
    if out.is_empty() {
        out.push_str("no violations\n");
    }
    out
}

/// Stable process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Nothing to do; everything conformant.
    Clean,
    /// Files needed formatting, or warn/info violations were reported.
    Changed,
    /// At least one `error`-severity violation.
    ErrorViolations,
    /// Configuration rejected before the run started.
    ConfigInvalid,
    /// A run-level I/O or security failure.
    Fatal,
}

impl ExitStatus {
    pub fn code(&self) -> i32 {
        match self {
            ExitStatus::Clean => 0,
            ExitStatus::Changed => 1,
            ExitStatus::ErrorViolations => 2,
            ExitStatus::ConfigInvalid => 3,
            ExitStatus::Fatal => 4,
        }
    }

    /// Per-file rejections (too large, denied, unreadable) do not abort a
    /// run; they surface as file errors while the exit code reflects the
    /// formatting outcome of the rest.
    pub fn from_results(results: &[FileResult]) -> ExitStatus {
        let mut status = ExitStatus::Clean;
        for result in results {
            let has_error_violation = result
                .outcome
                .violations()
                .iter()
                .any(|v| v.severity == Severity::Error);
            if has_error_violation {
                return ExitStatus::ErrorViolations;
            }
            let needs_attention = match &result.outcome {
                FileOutcome::Formatted {
                    changed,
                    violations,
                    ..
                } => *changed || !violations.is_empty(),
                FileOutcome::CheckFailed { .. } => true,
                FileOutcome::Error { .. } => false,
            };
            if needs_attention {
                status = ExitStatus::Changed;
            }
        }
        status
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::engine::{ErrorKind, FileStats};
    use std::path::PathBuf;
    use styler_parser::{SourceBuffer, Span};

    fn violation(severity: Severity) -> Violation {
        let source = SourceBuffer::new("class A {}\n".to_owned());
        Violation::new(&source, "line-length", severity, Span::new(0, 5), "too long")
    }

    fn formatted(changed: bool, violations: Vec<Violation>) -> FileResult {
        FileResult {
            path: PathBuf::from("A.java"),
            outcome: FileOutcome::Formatted {
                output: String::new(),
                changed,
                violations,
                stats: FileStats::default(),
            },
        }
    }

    #[test]
    fn machine_report_has_stable_fields() {
        let results = vec![formatted(false, vec![violation(Severity::Warn)])];
        let json = render_machine(&results);
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        let file = &parsed[0];
        assert_eq!(file["path"], "A.java");
        let v = &file["violations"][0];
        assert_eq!(v["rule_id"], "line-length");
        assert_eq!(v["severity"], "warn");
        assert_eq!(v["start"]["line"], 1);
        assert_eq!(v["start"]["col"], 1);
        assert_eq!(v["start"]["offset"], 0);
        assert_eq!(v["end"]["offset"], 5);
        assert!(file["stats"]["duration_ms"].is_number());
    }

    #[test]
    fn human_report_groups_errors_first() {
        let results = vec![formatted(
            false,
            vec![violation(Severity::Info), violation(Severity::Error)],
        )];
        let text = render_human(&results);
        let error_pos = text.find("error").unwrap();
        let info_pos = text.find("info").unwrap();
        assert!(error_pos < info_pos, "{text}");
        assert!(text.contains("A.java (2 violations)"));
    }

    #[test]
    fn audience_detection() {
        assert_eq!(
            detect_audience(ReportMode::Auto, true),
            Audience::Human
        );
        assert_eq!(
            detect_audience(ReportMode::Auto, false),
            Audience::Machine
        );
        assert_eq!(
            detect_audience(ReportMode::Machine, true),
            Audience::Machine
        );
        assert_eq!(detect_audience(ReportMode::Human, false), Audience::Human);
    }

    #[test]
    fn exit_codes() {
        assert_eq!(
            ExitStatus::from_results(&[formatted(false, vec![])]),
            ExitStatus::Clean
        );
        assert_eq!(
            ExitStatus::from_results(&[formatted(true, vec![])]),
            ExitStatus::Changed
        );
        assert_eq!(
            ExitStatus::from_results(&[formatted(false, vec![violation(Severity::Error)])]),
            ExitStatus::ErrorViolations
        );
        // A single rejected file does not mask the outcome of the rest.
        let error_result = FileResult {
            path: PathBuf::from("Huge.java"),
            outcome: FileOutcome::Error {
                kind: ErrorKind::FileTooLarge,
                message: "too big".into(),
            },
        };
        assert_eq!(
            ExitStatus::from_results(&[error_result, formatted(false, vec![])]),
            ExitStatus::Clean
        );
    }
}
