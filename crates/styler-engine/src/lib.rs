//! The formatting engine for styler: configuration resolution, the rule
//! registry with its built-in rules, text-edit conflict resolution, the
//! per-file pipeline, a bounded worker pool, violation reporting, and the
//! path security gate.
//!
//! The engine consumes already-parsed configuration documents
//! (`serde_json` values) and `.java` source files, and produces formatted
//! output plus machine- or human-readable violation reports. Parsing lives
//! in [`styler_parser`]; nothing here mutates a syntax tree — rules
//! propose [`TextEdit`]s which the engine reconciles and applies.

pub mod config;
pub mod diff;
pub mod edit;
pub mod engine;
pub mod parallel;
pub mod report;
pub mod rules;
pub mod security;
mod violation;

#[cfg(test)]
mod tests;

pub use crate::config::{
    ConfigDocument, ConfigError, EffectiveConfig, ProcessingLimits, ReportMode, SecurityPolicy,
};
pub use crate::edit::{apply_edits, resolve_conflicts, EditIntent, TextEdit};
pub use crate::engine::{
    process_file, process_source, Checkpoint, ErrorKind, FileOutcome, FileStats, Mode,
};
pub use crate::parallel::{CancelFlag, FileResult, ParallelEngine, Progress};
pub use crate::report::ExitStatus;
pub use crate::rules::{Rule, RuleContext, RuleError, RuleOutput, RuleRegistry};
pub use crate::violation::{Severity, Violation};
