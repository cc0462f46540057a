//! Configuration validation.
//!
//! Checks TOML syntax, flags unknown or misspelled fields, and reports
//! settings that would make the submission step misbehave.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use crate::schema::{DialtoneConfig, ResultSource};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// One of "syntax", "unknown-field", "type-error", "endpoint", "timing",
    /// "file-ref".
    pub category: &'static str,
    /// Dotted path, e.g. "submission.endpoint"
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn new(
        severity: Severity,
        category: &'static str,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result of validating a configuration file.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

/// Delays above this are almost certainly a unit mistake (seconds vs ms).
const MAX_REASONABLE_DELAY_MS: u64 = 30_000;

// ── Known keys ──────────────────────────────────────────────────────────────

/// Expected shape of the configuration tree.
enum KnownKeys {
    Table(HashMap<&'static str, KnownKeys>),
    Leaf,
}

fn build_schema_map() -> KnownKeys {
    use KnownKeys::{Leaf, Table};

    Table(HashMap::from([
        (
            "submission",
            Table(HashMap::from([
                ("endpoint", Leaf),
                ("timeout_secs", Leaf),
                ("submit_delay_ms", Leaf),
                ("settle_delay_ms", Leaf),
                ("result_source", Leaf),
                ("agent_name", Leaf),
            ])),
        ),
        ("ui", Table(HashMap::from([("theme", Leaf)]))),
    ]))
}

// ── Suggestions ─────────────────────────────────────────────────────────────

/// Levenshtein edit distance, computed over chars with a single rolling row.
fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();

    for (i, ca) in a.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let above = row[j + 1];
            let substitution = diagonal + usize::from(ca != cb);
            row[j + 1] = substitution.min(above + 1).min(row[j] + 1);
            diagonal = above;
        }
    }
    row[b.len()]
}

/// Closest candidate within `max_distance` edits, if any.
fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    candidates
        .iter()
        .map(|&c| (c, edit_distance(needle, c)))
        .filter(|&(_, d)| d > 0 && d <= max_distance)
        .min_by_key(|&(_, d)| d)
        .map(|(c, _)| c)
}

// ── Core validation ─────────────────────────────────────────────────────────

/// Validate the config file at `path`, or the discovered one when `None`.
#[must_use]
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => crate::loader::find_config_file(),
    };

    let Some(actual_path) = config_path else {
        return ValidationResult {
            diagnostics: vec![Diagnostic::new(
                Severity::Info,
                "file-ref",
                "",
                "no config file found; using defaults",
            )],
            config_path: None,
        };
    };

    let is_toml = actual_path
        .extension()
        .and_then(|e| e.to_str())
        .is_none_or(|ext| ext == "toml");

    match std::fs::read_to_string(&actual_path) {
        Ok(_) if !is_toml => match crate::loader::load_config(&actual_path) {
            Ok(config) => {
                let mut diagnostics = Vec::new();
                check_semantics(&config, &mut diagnostics);
                ValidationResult {
                    diagnostics,
                    config_path: Some(actual_path),
                }
            },
            Err(e) => ValidationResult {
                diagnostics: vec![Diagnostic::new(
                    Severity::Error,
                    "type-error",
                    "",
                    e.to_string(),
                )],
                config_path: Some(actual_path),
            },
        },
        Ok(content) => {
            let mut result = validate_toml_str(&crate::env_subst::substitute_env(&content));
            result.config_path = Some(actual_path);
            result
        },
        Err(e) => ValidationResult {
            diagnostics: vec![Diagnostic::new(
                Severity::Error,
                "syntax",
                "",
                format!("failed to read config file: {e}"),
            )],
            config_path: Some(actual_path),
        },
    }
}

/// Validate a TOML string without touching the file system.
#[must_use]
pub fn validate_toml_str(toml_str: &str) -> ValidationResult {
    let mut diagnostics = Vec::new();

    let value: toml::Value = match toml::from_str(toml_str) {
        Ok(v) => v,
        Err(e) => {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "syntax",
                "",
                format!("TOML syntax error: {e}"),
            ));
            return ValidationResult {
                diagnostics,
                config_path: None,
            };
        },
    };

    check_unknown_fields(&value, &build_schema_map(), "", &mut diagnostics);

    match toml::from_str::<DialtoneConfig>(toml_str) {
        Ok(config) => check_semantics(&config, &mut diagnostics),
        Err(e) => diagnostics.push(Diagnostic::new(
            Severity::Error,
            "type-error",
            "",
            format!("type error: {e}"),
        )),
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

fn check_unknown_fields(
    value: &toml::Value,
    schema: &KnownKeys,
    prefix: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let (toml::Value::Table(table), KnownKeys::Table(fields)) = (value, schema) else {
        return;
    };

    let known: Vec<&str> = fields.keys().copied().collect();
    for (key, child) in table {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match fields.get(key.as_str()) {
            Some(child_schema) => check_unknown_fields(child, child_schema, &path, diagnostics),
            None => {
                let message = match suggest(key, &known, 3) {
                    Some(s) => format!("unknown field (did you mean \"{s}\"?)"),
                    None => "unknown field".to_string(),
                };
                diagnostics.push(Diagnostic::new(
                    Severity::Error,
                    "unknown-field",
                    path,
                    message,
                ));
            },
        }
    }
}

fn check_semantics(config: &DialtoneConfig, diagnostics: &mut Vec<Diagnostic>) {
    let submission = &config.submission;

    match url::Url::parse(&submission.endpoint) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {
            if url.scheme() == "http"
                && !matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "::1" | "[::1]"))
            {
                diagnostics.push(Diagnostic::new(
                    Severity::Warning,
                    "endpoint",
                    "submission.endpoint",
                    "form data is sent unencrypted to a non-local host",
                ));
            }
        },
        Ok(url) => diagnostics.push(Diagnostic::new(
            Severity::Error,
            "endpoint",
            "submission.endpoint",
            format!("unsupported scheme \"{}\" (expected http or https)", url.scheme()),
        )),
        Err(e) => diagnostics.push(Diagnostic::new(
            Severity::Error,
            "endpoint",
            "submission.endpoint",
            format!("invalid URL: {e}"),
        )),
    }

    if submission.timeout_secs == Some(0) {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "timing",
            "submission.timeout_secs",
            "timeout must be greater than zero",
        ));
    }

    for (path, value) in [
        ("submission.submit_delay_ms", submission.submit_delay_ms),
        ("submission.settle_delay_ms", submission.settle_delay_ms),
    ] {
        if value > MAX_REASONABLE_DELAY_MS {
            diagnostics.push(Diagnostic::new(
                Severity::Warning,
                "timing",
                path,
                format!("{value} ms is unusually long (values are in milliseconds)"),
            ));
        }
    }

    if submission.result_source != ResultSource::Response && submission.agent_name.trim().is_empty()
    {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "type-error",
            "submission.agent_name",
            "agent name must not be empty when results can be synthesized",
        ));
    }
}
