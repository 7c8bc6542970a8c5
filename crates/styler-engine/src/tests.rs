//! End-to-end pipeline tests over the in-memory engine and the worker
//! pool, including the concrete formatting scenarios the engine must
//! reproduce exactly.

use crate::config::EffectiveConfig;
use crate::engine::{process_source, Checkpoint, ErrorKind, FileOutcome, Mode};
use crate::parallel::{CancelFlag, ParallelEngine};
use crate::rules::RuleRegistry;
use crate::security::SecurityGate;
use crate::violation::{Severity, Violation};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use styler_parser::{Lexer, SourceBuffer, TokenKind};

fn checkpoint() -> Checkpoint {
    Checkpoint::new(CancelFlag::new().inner(), Duration::from_secs(30))
}

fn run_with_config(input: &str, config: &EffectiveConfig, mode: Mode) -> FileOutcome {
    let registry = RuleRegistry::with_builtins();
    let source = SourceBuffer::new(input.to_owned());
    process_source(&source, config, &registry, mode, &checkpoint())
}

fn format(input: &str) -> (String, Vec<Violation>) {
    let registry = RuleRegistry::with_builtins();
    let config = EffectiveConfig::default_for(&registry);
    match run_with_config(input, &config, Mode::Format) {
        FileOutcome::Formatted {
            output, violations, ..
        } => (output, violations),
        other => panic!("expected Formatted, got {other:?}"),
    }
}

fn config_with(rules: serde_json::Value) -> EffectiveConfig {
    let registry = RuleRegistry::with_builtins();
    let doc = json!({ "rules": rules }).as_object().cloned().unwrap();
    crate::config::resolve(&[doc], &registry).unwrap()
}

#[test]
fn formats_minimal_class() {
    let (output, violations) = format("class A{int x ;}");
    assert_eq!(output, "class A {\n    int x;\n}\n");
    assert!(violations.is_empty(), "{violations:?}");
}

#[test]
fn formatting_is_idempotent() {
    for input in [
        "class A{int x ;}",
        "class B{void f(){if(x>1){g( 1,2 );}}}",
        "interface I{int f();}",
        "class C{int[] a={1,2};}",
    ] {
        let (once, _) = format(input);
        let (twice, _) = format(&once);
        assert_eq!(twice, once, "not idempotent for {input:?}");
    }
}

/// Formatting preserves the token stream (trivia excluded).
#[test]
fn formatting_preserves_tokens() {
    for input in [
        "class A{int x ;}",
        "class B{void f(){for(int i=0;i<10;i++){g(i);}}}",
        "class C{String s=\"a b  c\";char c='x';}",
    ] {
        let (output, _) = format(input);
        let lex = |text: &str| -> Vec<(TokenKind, String)> {
            let source = SourceBuffer::new(text.to_owned());
            Lexer::new(&source)
                .lex()
                .tokens
                .iter()
                .filter(|t| t.kind != TokenKind::Eof)
                .map(|t| (t.kind, source.slice(t.span).to_owned()))
                .collect()
        };
        assert_eq!(lex(input), lex(&output), "token stream changed for {input:?}");
    }
}

#[test]
fn sorted_imports_stay_put_with_blank_line_after_block() {
    let input = "import java.util.*;\nimport java.util.List;\nclass A{List<Integer> f(){return null;}}";
    let (output, violations) = format(input);
    assert_eq!(
        output,
        "import java.util.*;\nimport java.util.List;\n\nclass A {\n    List<Integer> f() {\n        return null;\n    }\n}\n"
    );
    assert!(violations.is_empty(), "{violations:?}");
}

#[test]
fn unsorted_imports_are_reordered_with_a_warning() {
    let input = "import b.Second;\nimport a.First;\nclass A {\n}\n";
    let (output, violations) = format(input);
    assert!(output.starts_with("import a.First;\nimport b.Second;\n"));
    assert!(violations
        .iter()
        .any(|v| v.rule_id == "import-organizer" && v.severity == Severity::Warn));
}

#[test]
fn unused_imports_are_removed_when_enabled() {
    let config = config_with(json!({
        "import-organizer": { "remove_unused": true }
    }));
    let input = "import a.Used;\nimport b.Unused;\nclass A {\n    Used u;\n}\n";
    let outcome = run_with_config(input, &config, Mode::Format);
    let FileOutcome::Formatted {
        output, violations, ..
    } = outcome
    else {
        panic!("expected Formatted");
    };
    assert!(output.contains("import a.Used;"));
    assert!(!output.contains("Unused"));
    assert!(violations
        .iter()
        .any(|v| v.rule_id == "import-organizer" && v.message.contains("unused import")));
}

#[test]
fn wildcard_imports_survive_unused_removal() {
    let config = config_with(json!({
        "import-organizer": { "remove_unused": true }
    }));
    let input = "import java.util.*;\nclass A {\n}\n";
    let outcome = run_with_config(input, &config, Mode::Format);
    let FileOutcome::Formatted { output, .. } = outcome else {
        panic!("expected Formatted");
    };
    assert!(output.contains("import java.util.*;"));
}

#[test]
fn scientific_literal_survives_formatting() {
    let (output, violations) = format("double x = 1.5e10;");
    assert_eq!(output, "double x = 1.5e10;\n");
    assert!(violations.is_empty(), "{violations:?}");
}

#[test]
fn unterminated_comment_declines_to_format() {
    let input = "class A {\n    int x;\n    /* started on line 3\n";
    let outcome = run_with_config(
        input,
        &EffectiveConfig::default_for(&RuleRegistry::with_builtins()),
        Mode::Format,
    );
    let FileOutcome::CheckFailed { violations, .. } = outcome else {
        panic!("expected CheckFailed, got a formatted result");
    };
    assert!(violations
        .iter()
        .any(|v| v.rule_id == "parse" && v.severity == Severity::Error));
}

#[test]
fn crlf_input_produces_crlf_output() {
    let (output, _) = format("class A{int x ;}\r\n");
    assert_eq!(output, "class A {\r\n    int x;\r\n}\r\n");
}

#[test]
fn bom_is_preserved() {
    let (output, _) = format("\u{feff}class A{}\n");
    assert!(output.starts_with('\u{feff}'));
}

#[test]
fn check_mode_passes_on_whitespace_only_drift() {
    let config = EffectiveConfig::default_for(&RuleRegistry::with_builtins());
    // Needs only spacing fixes, no substantive change.
    let outcome = run_with_config("class A{int x ;}", &config, Mode::Check);
    assert!(matches!(outcome, FileOutcome::Formatted { .. }));
}

#[test]
fn check_mode_fails_on_substantive_change() {
    let config = EffectiveConfig::default_for(&RuleRegistry::with_builtins());
    let input = "import b.B;\nimport a.A;\nclass C {\n    A a;\n    B b;\n}\n";
    let outcome = run_with_config(input, &config, Mode::Check);
    assert!(matches!(outcome, FileOutcome::CheckFailed { .. }));
}

#[test]
fn smart_wrap_fans_out_long_argument_lists() {
    let config = config_with(json!({
        "line-length": { "max_length": 40, "smart_wrap": true }
    }));
    let input = "class A {\n    void f() {\n        longMethodName(alphaParam, betaParam, gammaParam, deltaParam);\n    }\n}\n";
    let outcome = run_with_config(input, &config, Mode::Format);
    let FileOutcome::Formatted {
        output, violations, ..
    } = outcome
    else {
        panic!("expected Formatted");
    };
    // `longMethodName(` spans columns 9..=23, so the closing paren lands
    // in column 23.
    assert_eq!(
        output,
        format!(
            "class A {{\n    void f() {{\n        longMethodName(\n            alphaParam,\n            betaParam,\n            gammaParam,\n            deltaParam\n{});\n    }}\n}}\n",
            " ".repeat(22)
        )
    );
    assert!(
        !violations.iter().any(|v| v.rule_id == "line-length"),
        "wrapping fixed the line, no violation expected: {violations:?}"
    );
}

/// The call need not start its line: the wrapper fires whenever the line
/// is over the limit, and the closing paren aligns with the call's own
/// opening parenthesis rather than the line indent.
#[test]
fn smart_wrap_aligns_closing_paren_with_mid_line_calls() {
    let config = config_with(json!({
        "line-length": { "max_length": 40, "smart_wrap": true }
    }));
    let input = "class A {\n    void f() {\n        int total = accumulate(alphaValue, betaValue, gammaValue);\n    }\n}\n";
    let outcome = run_with_config(input, &config, Mode::Format);
    let FileOutcome::Formatted {
        output, violations, ..
    } = outcome
    else {
        panic!("expected Formatted");
    };
    // `accumulate(` opens in column 31; the argument list itself ends
    // under the limit, but the whole line does not.
    assert_eq!(
        output,
        format!(
            "class A {{\n    void f() {{\n        int total = accumulate(\n            alphaValue,\n            betaValue,\n            gammaValue\n{});\n    }}\n}}\n",
            " ".repeat(30)
        )
    );
    assert!(
        !violations.iter().any(|v| v.rule_id == "line-length"),
        "wrapping fixed the line, no violation expected: {violations:?}"
    );
}

#[test]
fn unwrappable_long_line_reports_a_violation() {
    let config = config_with(json!({
        "line-length": { "max_length": 40, "smart_wrap": true }
    }));
    let input = "class A {\n    int aVeryVeryVeryLongIdentifierThatNothingCanShorten_AtAll = 1;\n}\n";
    let outcome = run_with_config(input, &config, Mode::Format);
    let FileOutcome::Formatted { violations, .. } = outcome else {
        panic!("expected Formatted");
    };
    assert!(violations
        .iter()
        .any(|v| v.rule_id == "line-length" && v.severity == Severity::Warn));
}

#[test]
fn next_line_braces_are_supported() {
    let config = config_with(json!({
        "braces": { "classes": "next_line", "methods": "next_line" }
    }));
    let outcome = run_with_config("class A { void f() { g(); } }", &config, Mode::Format);
    let FileOutcome::Formatted { output, .. } = outcome else {
        panic!("expected Formatted");
    };
    assert!(
        output.starts_with("class A\n{\n"),
        "class brace should move to its own line: {output:?}"
    );
    assert!(output.contains("void f()\n    {\n"), "{output:?}");
}

#[test]
fn timeout_yields_error_outcome() {
    let registry = RuleRegistry::with_builtins();
    let config = EffectiveConfig::default_for(&registry);
    let source = SourceBuffer::new("class A {}".to_owned());
    let expired = Checkpoint::new(CancelFlag::new().inner(), Duration::ZERO);
    let outcome = process_source(&source, &config, &registry, Mode::Format, &expired);
    assert!(matches!(
        outcome,
        FileOutcome::Error {
            kind: ErrorKind::Timeout,
            ..
        }
    ));
}

// ----------------------------------------------------------------------
// Parallel engine
// ----------------------------------------------------------------------

fn outcome_fingerprint(outcome: &FileOutcome) -> String {
    match outcome {
        FileOutcome::Formatted {
            output, changed, ..
        } => format!("formatted:{changed}:{output}"),
        FileOutcome::CheckFailed { violations, .. } => {
            format!("check-failed:{}", violations.len())
        }
        FileOutcome::Error { kind, .. } => format!("error:{}", kind.as_str()),
    }
}

#[test]
fn result_multiset_is_independent_of_thread_count() {
    let dir = tempfile::tempdir().unwrap();
    let mut paths = Vec::new();
    for i in 0..24 {
        let path = dir.path().join(format!("File{i}.java"));
        std::fs::write(&path, format!("class File{i}{{int x{i} ;}}")).unwrap();
        paths.push(path);
    }
    // One file over the size limit.
    let big = dir.path().join("Big.java");
    std::fs::write(&big, format!("// {}\nclass Big {{}}\n", "x".repeat(4096))).unwrap();
    paths.push(big);

    let registry = Arc::new(RuleRegistry::with_builtins());
    let mut fingerprints = Vec::new();
    for threads in [1usize, 4] {
        let mut config = EffectiveConfig::default_for(&registry);
        config.processing.thread_pool_size = threads;
        config.processing.max_file_size = 2048;
        config.security.allowed_roots = vec![dir.path().to_path_buf()];
        let gate = Arc::new(SecurityGate::new(&config.security, 2048).unwrap());
        let engine = ParallelEngine::new(Arc::new(config), registry.clone(), gate);

        let results = engine.run(paths.clone(), Mode::Check, &CancelFlag::new(), None);
        assert_eq!(results.len(), paths.len());
        let mut summary: Vec<(String, String)> = results
            .iter()
            .map(|r| {
                (
                    r.path.display().to_string(),
                    outcome_fingerprint(&r.outcome),
                )
            })
            .collect();
        summary.sort();
        fingerprints.push(summary);
    }
    assert_eq!(fingerprints[0], fingerprints[1]);
    assert_eq!(
        fingerprints[0]
            .iter()
            .filter(|(_, f)| f == "error:file-too-large")
            .count(),
        1
    );
}

#[test]
fn cancelled_run_reports_cancelled_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut paths = Vec::new();
    for i in 0..8 {
        let path = dir.path().join(format!("C{i}.java"));
        std::fs::write(&path, "class C {}").unwrap();
        paths.push(path);
    }
    let registry = Arc::new(RuleRegistry::with_builtins());
    let mut config = EffectiveConfig::default_for(&registry);
    config.processing.thread_pool_size = 2;
    config.security.allowed_roots = vec![dir.path().to_path_buf()];
    let gate = Arc::new(SecurityGate::new(&config.security, 1024 * 1024).unwrap());
    let engine = ParallelEngine::new(Arc::new(config), registry, gate);

    let cancel = CancelFlag::new();
    cancel.cancel();
    let results = engine.run(paths, Mode::Check, &cancel, None);
    assert!(results.iter().all(|r| matches!(
        r.outcome,
        FileOutcome::Error {
            kind: ErrorKind::Cancelled,
            ..
        }
    )));
}

#[test]
fn format_mode_rewrites_only_changed_files_atomically() {
    let dir = tempfile::tempdir().unwrap();
    let messy = dir.path().join("Messy.java");
    std::fs::write(&messy, "class Messy{int x ;}").unwrap();
    let clean = dir.path().join("Clean.java");
    std::fs::write(&clean, "class Clean {\n    int x;\n}\n").unwrap();

    let registry = Arc::new(RuleRegistry::with_builtins());
    let mut config = EffectiveConfig::default_for(&registry);
    config.security.allowed_roots = vec![dir.path().to_path_buf()];
    config.processing.thread_pool_size = 1;
    let gate = Arc::new(SecurityGate::new(&config.security, 1024 * 1024).unwrap());
    let engine = ParallelEngine::new(Arc::new(config), registry, gate);

    let results = engine.run(
        vec![messy.clone(), clean.clone()],
        Mode::Format,
        &CancelFlag::new(),
        None,
    );
    assert_eq!(results.len(), 2);
    assert_eq!(
        std::fs::read_to_string(&messy).unwrap(),
        "class Messy {\n    int x;\n}\n"
    );
    assert_eq!(
        std::fs::read_to_string(&clean).unwrap(),
        "class Clean {\n    int x;\n}\n"
    );
}

#[test]
fn progress_events_are_emitted_and_monotonic() {
    let dir = tempfile::tempdir().unwrap();
    let mut paths = Vec::new();
    for i in 0..16 {
        let path = dir.path().join(format!("P{i}.java"));
        std::fs::write(&path, "class P {}").unwrap();
        paths.push(path);
    }
    let registry = Arc::new(RuleRegistry::with_builtins());
    let mut config = EffectiveConfig::default_for(&registry);
    config.security.allowed_roots = vec![dir.path().to_path_buf()];
    config.processing.thread_pool_size = 2;
    let gate = Arc::new(SecurityGate::new(&config.security, 1024 * 1024).unwrap());
    let engine = ParallelEngine::new(Arc::new(config), registry, gate);

    let (tx, rx) = crossbeam_channel::unbounded();
    engine.run(paths, Mode::Check, &CancelFlag::new(), Some(tx));
    let events: Vec<_> = rx.try_iter().collect();
    assert!(!events.is_empty());
    let mut last = 0;
    for event in &events {
        assert!(event.files_completed >= last, "progress went backwards");
        last = event.files_completed;
        assert!(event.files_completed <= event.files_seen.max(16));
    }
}
