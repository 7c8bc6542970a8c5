//! Layered configuration resolution.
//!
//! The resolver consumes an ordered list of already-parsed configuration
//! documents (`serde_json` maps; YAML/JSON parsing is the caller's job)
//! and produces an immutable [`EffectiveConfig`] shared across worker
//! threads. Precedence, low to high: built-in defaults, the active
//! profile's `extends` chain, then each supplied document in order.

use crate::rules::RuleRegistry;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::time::Duration;

pub type ConfigDocument = Map<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown configuration key `{key}`")]
    UnknownKey { key: String },
    #[error("unknown rule `{rule}`")]
    UnknownRule { rule: String },
    #[error("profile `{name}` is not defined")]
    UnknownProfile { name: String },
    #[error("profile inheritance cycle: {chain}")]
    ProfileCycle { chain: String },
    #[error("invalid options for rule `{rule}`: {}", reasons.join("; "))]
    InvalidOptions { rule: String, reasons: Vec<String> },
    #[error("invalid value for `{path}`: {message}")]
    InvalidValue { path: String, message: String },
}

/// Worker pool and per-file resource limits.
#[derive(Debug, Clone)]
pub struct ProcessingLimits {
    /// Worker count; `0` means use the host's available parallelism.
    pub thread_pool_size: usize,
    /// Bounded task queue capacity; `0` means `4 × workers`.
    pub queue_depth: usize,
    pub per_file_timeout: Duration,
    pub max_file_size: u64,
}

impl Default for ProcessingLimits {
    fn default() -> Self {
        Self {
            thread_pool_size: 0,
            queue_depth: 0,
            per_file_timeout: Duration::from_secs(30),
            max_file_size: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SecurityPolicy {
    /// Canonical roots input and output paths must live under. Empty means
    /// "current directory only", filled in by the resolver.
    pub allowed_roots: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportMode {
    /// Decide by whether the output stream is a terminal.
    #[default]
    Auto,
    Human,
    Machine,
}

#[derive(Debug, Clone)]
pub struct RuleEntry {
    pub enabled: bool,
    /// Validated rule options, defaults already merged in.
    pub options: Value,
}

/// The immutable merged view of all configuration documents. Safe to share
/// across threads behind an `Arc`.
#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub java_version: String,
    pub processing: ProcessingLimits,
    pub security: SecurityPolicy,
    pub rules: IndexMap<String, RuleEntry>,
    /// Resolved profile names, ancestors first; for diagnostics.
    pub profile_chain: Vec<String>,
    pub report_mode: ReportMode,
}

impl EffectiveConfig {
    /// Resolve with built-in defaults only.
    pub fn default_for(registry: &RuleRegistry) -> Self {
        resolve(&[], registry).expect("built-in defaults always resolve")
    }

    pub fn enabled_rules(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.rules
            .iter()
            .filter(|(_, entry)| entry.enabled)
            .map(|(id, entry)| (id.as_str(), &entry.options))
    }
}

const KNOWN_KEYS: &[&str] = &[
    "language_version",
    "processing",
    "security",
    "rules",
    "report",
    "profiles",
    "active_profile",
];

/// Merge the document layers and produce a validated configuration.
pub fn resolve(
    documents: &[ConfigDocument],
    registry: &RuleRegistry,
) -> Result<EffectiveConfig, ConfigError> {
    for doc in documents {
        for key in doc.keys() {
            if !KNOWN_KEYS.contains(&key.as_str()) {
                return Err(ConfigError::UnknownKey { key: key.clone() });
            }
        }
    }

    // Profiles and the active selection come from the merged view of all
    // documents, so a later layer can activate a profile an earlier layer
    // defined.
    let mut merged_for_profiles = Map::new();
    for doc in documents {
        deep_merge(&mut merged_for_profiles, doc);
    }
    let profiles = merged_for_profiles
        .get("profiles")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let active = merged_for_profiles
        .get("active_profile")
        .and_then(Value::as_str)
        .map(str::to_owned);

    let profile_chain = match &active {
        Some(name) => resolve_profile_chain(&profiles, name)?,
        None => Vec::new(),
    };

    let mut base = Map::new();
    for name in &profile_chain {
        let fragment = profiles
            .get(name)
            .and_then(Value::as_object)
            .expect("chain members exist");
        let mut fragment = fragment.clone();
        fragment.remove("extends");
        deep_merge(&mut base, &fragment);
    }
    for doc in documents {
        let mut doc = doc.clone();
        doc.remove("profiles");
        doc.remove("active_profile");
        deep_merge(&mut base, &doc);
    }

    let java_version = match base.get("language_version") {
        None => "25".to_owned(),
        Some(Value::String(v)) => v.clone(),
        Some(Value::Number(v)) => v.to_string(),
        Some(other) => {
            return Err(ConfigError::InvalidValue {
                path: "language_version".into(),
                message: format!("expected a version string, got {other}"),
            })
        }
    };

    let processing = parse_processing(base.get("processing"))?;
    let security = parse_security(base.get("security"))?;
    let report_mode = parse_report_mode(base.get("report"))?;
    let rules = parse_rules(base.get("rules"), registry)?;

    Ok(EffectiveConfig {
        java_version,
        processing,
        security,
        rules,
        profile_chain,
        report_mode,
    })
}

/// Depth-first `extends` resolution with cycle detection. Returns the
/// chain ancestors-first, ending with `name` itself.
fn resolve_profile_chain(
    profiles: &Map<String, Value>,
    name: &str,
) -> Result<Vec<String>, ConfigError> {
    let mut chain = Vec::new();
    let mut current = name.to_owned();
    loop {
        if chain.contains(&current) {
            chain.push(current);
            return Err(ConfigError::ProfileCycle {
                chain: chain.join(" -> "),
            });
        }
        let fragment = profiles
            .get(&current)
            .and_then(Value::as_object)
            .ok_or_else(|| ConfigError::UnknownProfile {
                name: current.clone(),
            })?;
        chain.push(current.clone());
        match fragment.get("extends").and_then(Value::as_str) {
            Some(parent) => current = parent.to_owned(),
            None => break,
        }
    }
    chain.reverse();
    Ok(chain)
}

/// Later values override earlier ones at the leaf level; objects merge
/// recursively.
fn deep_merge(into: &mut Map<String, Value>, from: &Map<String, Value>) {
    for (key, value) in from {
        match (into.get_mut(key), value) {
            (Some(Value::Object(dst)), Value::Object(src)) => deep_merge(dst, src),
            (_, value) => {
                into.insert(key.clone(), value.clone());
            }
        }
    }
}

fn parse_processing(value: Option<&Value>) -> Result<ProcessingLimits, ConfigError> {
    let mut limits = ProcessingLimits::default();
    let Some(value) = value else {
        return Ok(limits);
    };
    let obj = value
        .as_object()
        .ok_or_else(|| ConfigError::InvalidValue {
            path: "processing".into(),
            message: "expected a mapping".into(),
        })?;
    for (key, value) in obj {
        match key.as_str() {
            "thread_pool_size" => {
                limits.thread_pool_size = match value {
                    Value::String(s) if s == "auto" => 0,
                    Value::Number(n) if n.as_u64().is_some_and(|v| v > 0) => {
                        n.as_u64().unwrap() as usize
                    }
                    _ => {
                        return Err(ConfigError::InvalidValue {
                            path: "processing.thread_pool_size".into(),
                            message: "expected \"auto\" or a positive integer".into(),
                        })
                    }
                };
            }
            "queue_depth" => {
                limits.queue_depth = expect_u64(value, "processing.queue_depth")? as usize;
            }
            "per_file_timeout_ms" => {
                limits.per_file_timeout =
                    Duration::from_millis(expect_u64(value, "processing.per_file_timeout_ms")?);
            }
            "max_file_size" => {
                limits.max_file_size = expect_u64(value, "processing.max_file_size")?;
            }
            // A sizing hint only; the engine bounds memory through the
            // queue depth and per-file arenas.
            "memory_limit" => {
                expect_u64(value, "processing.memory_limit")?;
            }
            _ => {
                return Err(ConfigError::UnknownKey {
                    key: format!("processing.{key}"),
                })
            }
        }
    }
    Ok(limits)
}

fn parse_security(value: Option<&Value>) -> Result<SecurityPolicy, ConfigError> {
    let mut policy = SecurityPolicy::default();
    let Some(value) = value else {
        return Ok(policy);
    };
    let obj = value
        .as_object()
        .ok_or_else(|| ConfigError::InvalidValue {
            path: "security".into(),
            message: "expected a mapping".into(),
        })?;
    for (key, value) in obj {
        match key.as_str() {
            "allowed_directories" => {
                let list = value.as_array().ok_or_else(|| ConfigError::InvalidValue {
                    path: "security.allowed_directories".into(),
                    message: "expected a list of paths".into(),
                })?;
                for entry in list {
                    let path = entry.as_str().ok_or_else(|| ConfigError::InvalidValue {
                        path: "security.allowed_directories".into(),
                        message: "expected a list of paths".into(),
                    })?;
                    policy.allowed_roots.push(PathBuf::from(path));
                }
            }
            "temp_dir_permissions" => {
                expect_u64(value, "security.temp_dir_permissions")?;
            }
            _ => {
                return Err(ConfigError::UnknownKey {
                    key: format!("security.{key}"),
                })
            }
        }
    }
    Ok(policy)
}

fn parse_report_mode(value: Option<&Value>) -> Result<ReportMode, ConfigError> {
    let Some(value) = value else {
        return Ok(ReportMode::Auto);
    };
    let mode = value.get("mode").and_then(Value::as_str);
    match mode {
        None | Some("auto") => Ok(ReportMode::Auto),
        Some("human") => Ok(ReportMode::Human),
        Some("machine") => Ok(ReportMode::Machine),
        Some(other) => Err(ConfigError::InvalidValue {
            path: "report.mode".into(),
            message: format!("expected auto|human|machine, got `{other}`"),
        }),
    }
}

/// Every registered rule starts enabled with its default options; the
/// `rules` section then overrides per rule. Referencing an unregistered
/// rule fails, and each enabled rule validates its merged options.
fn parse_rules(
    value: Option<&Value>,
    registry: &RuleRegistry,
) -> Result<IndexMap<String, RuleEntry>, ConfigError> {
    let mut rules: IndexMap<String, RuleEntry> = IndexMap::new();
    for rule in registry.rules() {
        rules.insert(
            rule.id().to_owned(),
            RuleEntry {
                enabled: true,
                options: rule.default_options(),
            },
        );
    }

    if let Some(value) = value {
        let obj = value.as_object().ok_or_else(|| ConfigError::InvalidValue {
            path: "rules".into(),
            message: "expected a mapping of rule ids".into(),
        })?;
        for (id, settings) in obj {
            let rule = registry
                .get(id)
                .ok_or_else(|| ConfigError::UnknownRule { rule: id.clone() })?;
            let entry = rules.get_mut(id).expect("registry rules pre-populated");
            let settings = settings
                .as_object()
                .ok_or_else(|| ConfigError::InvalidValue {
                    path: format!("rules.{id}"),
                    message: "expected a mapping".into(),
                })?;
            let mut merged = entry
                .options
                .as_object()
                .cloned()
                .unwrap_or_default();
            for (key, value) in settings {
                if key == "enabled" {
                    entry.enabled =
                        value.as_bool().ok_or_else(|| ConfigError::InvalidValue {
                            path: format!("rules.{id}.enabled"),
                            message: "expected a boolean".into(),
                        })?;
                } else {
                    merged.insert(key.clone(), value.clone());
                }
            }
            entry.options = Value::Object(merged);
            if entry.enabled {
                rule.validate(&entry.options)
                    .map_err(|reasons| ConfigError::InvalidOptions {
                        rule: id.clone(),
                        reasons,
                    })?;
            }
        }
    }

    Ok(rules)
}

fn expect_u64(value: &Value, path: &str) -> Result<u64, ConfigError> {
    value.as_u64().ok_or_else(|| ConfigError::InvalidValue {
        path: path.into(),
        message: "expected a non-negative integer".into(),
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn registry() -> RuleRegistry {
        RuleRegistry::with_builtins()
    }

    fn doc(value: Value) -> ConfigDocument {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn defaults_resolve_with_all_builtins_enabled() {
        let config = EffectiveConfig::default_for(&registry());
        assert_eq!(config.java_version, "25");
        assert!(config.rules.len() >= 5);
        assert!(config.rules.values().all(|entry| entry.enabled));
        assert_eq!(config.processing.max_file_size, 10 * 1024 * 1024);
    }

    #[test]
    fn later_documents_override_leaves() {
        let docs = vec![
            doc(json!({"processing": {"thread_pool_size": 2, "max_file_size": 100}})),
            doc(json!({"processing": {"thread_pool_size": 8}})),
        ];
        let config = resolve(&docs, &registry()).unwrap();
        assert_eq!(config.processing.thread_pool_size, 8);
        assert_eq!(config.processing.max_file_size, 100);
    }

    #[test]
    fn unknown_top_level_key_is_rejected() {
        let docs = vec![doc(json!({"rulez": {}}))];
        assert!(matches!(
            resolve(&docs, &registry()),
            Err(ConfigError::UnknownKey { .. })
        ));
    }

    #[test]
    fn unknown_rule_is_rejected() {
        let docs = vec![doc(json!({"rules": {"no-such-rule": {"enabled": true}}}))];
        assert!(matches!(
            resolve(&docs, &registry()),
            Err(ConfigError::UnknownRule { .. })
        ));
    }

    #[test]
    fn invalid_rule_options_are_rejected() {
        let docs = vec![doc(json!({"rules": {"line-length": {"max_length": 5}}}))];
        assert!(matches!(
            resolve(&docs, &registry()),
            Err(ConfigError::InvalidOptions { .. })
        ));
    }

    #[test]
    fn disabled_rules_skip_option_validation() {
        let docs = vec![doc(
            json!({"rules": {"line-length": {"enabled": false, "max_length": 5}}}),
        )];
        let config = resolve(&docs, &registry()).unwrap();
        assert!(!config.rules["line-length"].enabled);
    }

    #[test]
    fn profiles_resolve_with_inheritance() {
        let docs = vec![doc(json!({
            "profiles": {
                "base": {"processing": {"thread_pool_size": 2}},
                "strict": {
                    "extends": "base",
                    "rules": {"line-length": {"max_length": 80}}
                }
            },
            "active_profile": "strict"
        }))];
        let config = resolve(&docs, &registry()).unwrap();
        assert_eq!(config.profile_chain, vec!["base", "strict"]);
        assert_eq!(config.processing.thread_pool_size, 2);
        assert_eq!(
            config.rules["line-length"].options["max_length"],
            json!(80)
        );
    }

    #[test]
    fn profile_cycles_are_detected() {
        let docs = vec![doc(json!({
            "profiles": {
                "a": {"extends": "b"},
                "b": {"extends": "a"}
            },
            "active_profile": "a"
        }))];
        assert!(matches!(
            resolve(&docs, &registry()),
            Err(ConfigError::ProfileCycle { .. })
        ));
    }

    #[test]
    fn unknown_profile_is_rejected() {
        let docs = vec![doc(json!({"active_profile": "nope"}))];
        assert!(matches!(
            resolve(&docs, &registry()),
            Err(ConfigError::UnknownProfile { .. })
        ));
    }

    #[test]
    fn explicit_document_beats_profile() {
        let docs = vec![
            doc(json!({
                "profiles": {"p": {"language_version": "17"}},
                "active_profile": "p"
            })),
            doc(json!({"language_version": "21"})),
        ];
        let config = resolve(&docs, &registry()).unwrap();
        assert_eq!(config.java_version, "21");
    }
}
