//! The per-file pipeline: security gate → source buffer → lex/parse →
//! rules → conflict resolution → edit application → line-terminator
//! normalization. Failures inside parsing and rule application are
//! recovered into violations; failures at the file boundary produce an
//! [`FileOutcome::Error`] and never propagate past the file.

use crate::config::EffectiveConfig;
use crate::edit::{apply_edits, resolve_conflicts};
use crate::rules::{RuleContext, RuleError, RuleRegistry};
use crate::security::SecurityGate;
use crate::violation::{Severity, Violation};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use styler_parser::{LineEnding, Parser, SourceBuffer};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Rewrite files in place (atomic replace).
    Format,
    /// Report only; never touch the disk.
    Check,
    /// Like check, but callers render unified diffs from the outcome.
    Diff,
}

#[derive(Debug, Clone, Default)]
pub struct FileStats {
    pub tokens: usize,
    pub nodes: usize,
    pub duration: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidEncoding,
    FileTooLarge,
    PathDenied,
    FileNotFound,
    Io,
    Timeout,
    Cancelled,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidEncoding => "invalid-encoding",
            ErrorKind::FileTooLarge => "file-too-large",
            ErrorKind::PathDenied => "path-denied",
            ErrorKind::FileNotFound => "file-not-found",
            ErrorKind::Io => "io",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
        }
    }
}

/// The result of processing one file.
#[derive(Debug)]
pub enum FileOutcome {
    /// The pipeline ran to completion; `output` holds the formatted text
    /// (byte-identical to the input when the file was already clean).
    Formatted {
        output: String,
        changed: bool,
        violations: Vec<Violation>,
        stats: FileStats,
    },
    /// Check failed: an `error`-severity violation, or a substantive
    /// (non-whitespace) edit was required.
    CheckFailed {
        violations: Vec<Violation>,
        stats: FileStats,
    },
    Error {
        kind: ErrorKind,
        message: String,
    },
}

impl FileOutcome {
    pub fn violations(&self) -> &[Violation] {
        match self {
            FileOutcome::Formatted { violations, .. }
            | FileOutcome::CheckFailed { violations, .. } => violations,
            FileOutcome::Error { .. } => &[],
        }
    }

    pub fn stats(&self) -> Option<&FileStats> {
        match self {
            FileOutcome::Formatted { stats, .. } | FileOutcome::CheckFailed { stats, .. } => {
                Some(stats)
            }
            FileOutcome::Error { .. } => None,
        }
    }
}

/// Cooperative cancellation/deadline guard, polled at coarse points:
/// before parsing, before each rule, and periodically inside rule
/// traversals.
pub struct Checkpoint {
    cancel: Arc<AtomicBool>,
    deadline: Instant,
}

impl Checkpoint {
    pub fn new(cancel: Arc<AtomicBool>, budget: Duration) -> Self {
        Self {
            cancel,
            deadline: Instant::now() + budget,
        }
    }

    pub fn poll(&self) -> Option<RuleError> {
        if self.cancel.load(Ordering::Relaxed) {
            Some(RuleError::Cancelled)
        } else if Instant::now() > self.deadline {
            Some(RuleError::TimedOut)
        } else {
            None
        }
    }
}

/// Runs the full in-memory pipeline over one source buffer.
pub fn process_source(
    source: &SourceBuffer,
    config: &EffectiveConfig,
    registry: &RuleRegistry,
    mode: Mode,
    checkpoint: &Checkpoint,
) -> FileOutcome {
    let started = Instant::now();
    if let Some(interrupt) = checkpoint.poll() {
        return interrupted(interrupt);
    }

    let parse = Parser::new(source).parse();
    let stats_base = (parse.tokens.len(), parse.arena.node_count());
    debug!(tokens = stats_base.0, nodes = stats_base.1, "parsed");

    let mut violations: Vec<Violation> = Vec::new();
    for error in &parse.errors {
        let mut violation = Violation::new(
            source,
            "parse",
            Severity::Error,
            error.span,
            error.message.clone(),
        );
        if error.is_lex_error() {
            violation.message = format!("lex-level: {}", violation.message);
        }
        violations.push(violation);
    }

    // A file that does not parse cleanly is never reformatted; the
    // original source is preserved and the diagnostics speak.
    if !parse.errors.is_empty() {
        return FileOutcome::CheckFailed {
            violations,
            stats: stats(stats_base, started),
        };
    }

    let mut edits = Vec::new();
    for (rule_id, options) in config.enabled_rules() {
        if let Some(interrupt) = checkpoint.poll() {
            return interrupted(interrupt);
        }
        let Some(rule) = registry.get(rule_id) else {
            // The resolver guarantees registration; a missing rule here is
            // an embedder registry mismatch.
            warn!(rule = rule_id, "enabled rule not in registry; skipping");
            continue;
        };
        let interrupt_fn = || checkpoint.poll();
        let ctx = RuleContext::new(
            source,
            &parse.tokens,
            &parse.trivia,
            &parse.arena,
            parse.root,
            options,
            &interrupt_fn,
        );
        match rule.apply(&ctx) {
            Ok(output) => {
                edits.extend(output.edits);
                violations.extend(output.violations);
            }
            Err(RuleError::Cancelled) => return interrupted(RuleError::Cancelled),
            Err(RuleError::TimedOut) => return interrupted(RuleError::TimedOut),
            Err(RuleError::Failed(message)) => {
                warn!(rule = rule_id, message, "rule failed; skipped");
                violations.push(Violation::new(
                    source,
                    rule_id,
                    Severity::Error,
                    styler_parser::Span::empty(0),
                    format!("rule failed to apply: {message}"),
                ));
            }
        }
    }

    let (surviving, conflict_violations) = resolve_conflicts(edits, source);
    violations.extend(conflict_violations);

    let substantive = surviving.iter().any(|e| !e.is_whitespace_only(source));
    let mut output = apply_edits(source.text(), &surviving);
    normalize_line_endings(&mut output, source.line_ending());
    if source.had_bom() {
        output.insert(0, '\u{feff}');
    }

    let original = if source.had_bom() {
        format!("\u{feff}{}", source.text())
    } else {
        source.text().to_owned()
    };
    let changed = output != original;
    let has_error_violation = violations.iter().any(|v| v.severity == Severity::Error);

    let stats = stats(stats_base, started);
    match mode {
        Mode::Check | Mode::Diff if has_error_violation || substantive => FileOutcome::CheckFailed {
            violations,
            stats,
        },
        _ => FileOutcome::Formatted {
            output,
            changed,
            violations,
            stats,
        },
    }
}

/// Security-gates, reads, processes, and (in format mode) atomically
/// rewrites one file.
pub fn process_file(
    path: &Path,
    gate: &SecurityGate,
    config: &EffectiveConfig,
    registry: &RuleRegistry,
    mode: Mode,
    checkpoint: &Checkpoint,
) -> FileOutcome {
    let canonical = match gate.check_input(path) {
        Ok(canonical) => canonical,
        Err(err) => {
            return FileOutcome::Error {
                kind: err.kind,
                message: err.message,
            }
        }
    };
    let bytes = match std::fs::read(&canonical) {
        Ok(bytes) => bytes,
        Err(err) => {
            return FileOutcome::Error {
                kind: ErrorKind::Io,
                message: format!("failed to read file: {err}"),
            }
        }
    };
    let source = match SourceBuffer::from_bytes(bytes) {
        Ok(source) => source,
        Err(err) => {
            return FileOutcome::Error {
                kind: ErrorKind::InvalidEncoding,
                message: err.to_string(),
            }
        }
    };

    let outcome = process_source(&source, config, registry, mode, checkpoint);

    if mode == Mode::Format {
        if let FileOutcome::Formatted {
            output,
            changed: true,
            ..
        } = &outcome
        {
            if let Err(err) = gate.write_atomic(&canonical, output.as_bytes()) {
                return FileOutcome::Error {
                    kind: ErrorKind::Io,
                    message: format!("failed to write output: {err}"),
                };
            }
        }
    }
    outcome
}

fn interrupted(err: RuleError) -> FileOutcome {
    match err {
        RuleError::Cancelled => FileOutcome::Error {
            kind: ErrorKind::Cancelled,
            message: "cancelled".into(),
        },
        RuleError::TimedOut => FileOutcome::Error {
            kind: ErrorKind::Timeout,
            message: "per-file time budget exhausted".into(),
        },
        RuleError::Failed(message) => FileOutcome::Error {
            kind: ErrorKind::Internal,
            message,
        },
    }
}

fn stats(base: (usize, usize), started: Instant) -> FileStats {
    FileStats {
        tokens: base.0,
        nodes: base.1,
        duration: started.elapsed(),
    }
}

/// The output uses the input's dominant terminator style (CRLF if any
/// CRLF was present, LF otherwise) and always ends with a terminator.
fn normalize_line_endings(text: &mut String, style: LineEnding) {
    let normalized_lf: String = {
        let mut out = String::with_capacity(text.len());
        let mut chars = text.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\r' => {
                    if chars.peek() == Some(&'\n') {
                        chars.next();
                    }
                    out.push('\n');
                }
                c => out.push(c),
            }
        }
        out
    };
    let mut result = match style {
        LineEnding::Lf => normalized_lf,
        LineEnding::CrLf => normalized_lf.replace('\n', "\r\n"),
    };
    if !result.is_empty() && !result.ends_with('\n') {
        result.push_str(style.as_str());
    }
    *text = result;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lf_stays_lf_with_trailing_newline() {
        let mut text = "class A {}".to_owned();
        normalize_line_endings(&mut text, LineEnding::Lf);
        assert_eq!(text, "class A {}\n");
    }

    #[test]
    fn mixed_endings_normalize_to_crlf_when_any_crlf() {
        let mut text = "a\r\nb\nc\r".to_owned();
        normalize_line_endings(&mut text, LineEnding::CrLf);
        assert_eq!(text, "a\r\nb\r\nc\r\n");
    }

    #[test]
    fn empty_stays_empty() {
        let mut text = String::new();
        normalize_line_endings(&mut text, LineEnding::Lf);
        assert_eq!(text, "");
    }
}
