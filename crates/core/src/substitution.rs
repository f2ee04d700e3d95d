//! `{{KEY}}` placeholder substitution for template files
//!
//! Substitution is cosmetic, not correctness-critical: unknown keys are left
//! untouched, and a file that cannot be rendered (unreadable, not UTF-8) is
//! reported as a [`SubstitutionFailure`] while the caller carries on.
//!
//! Values are encoded for the file they land in. In `.json`/`.jsonc` files
//! placeholders sit inside string literals, so values are JSON-escaped there;
//! keys ending in `_JSON` hold ready-made JSON and are inserted as-is.

use crate::config::InstallationConfig;
use crate::errors::SubstitutionFailure;
use crate::semver_utils::installer_version;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

/// Placeholder syntax: `{{KEY}}` with an identifier-like key
const PLACEHOLDER_PATTERN: &str = r"\{\{([A-Za-z_][A-Za-z0-9_]*)\}\}";

static PLACEHOLDER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(PLACEHOLDER_PATTERN).expect("Placeholder regex should be valid"));

/// Extensions whose content is rendered; everything else is copied verbatim
const TEXT_EXTENSIONS: &[&str] = &[
    "md", "markdown", "txt", "json", "jsonc", "yaml", "yml", "toml", "sh", "bash", "zsh", "py",
    "js", "cjs", "mjs", "ts", "rs",
];

/// Extensions whose placeholders sit inside JSON string literals
const JSON_EXTENSIONS: &[&str] = &["json", "jsonc"];

/// Suffix of keys whose value is already a JSON fragment
const JSON_FRAGMENT_SUFFIX: &str = "_JSON";

/// Extension-less file names that are still treated as text
const TEXT_FILE_NAMES: &[&str] = &[".gitignore", "readme", "makefile"];

/// Default project version written into new projects
pub const DEFAULT_PROJECT_VERSION: &str = "0.1.0";

/// Flat key/value map used to render placeholders
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TemplateContext {
    values: IndexMap<String, String>,
}

impl TemplateContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the context for one installation run
    ///
    /// `template_version` comes from the template manifest; `timestamp` is the
    /// run start time in RFC 3339.
    pub fn from_config(
        config: &InstallationConfig,
        template_version: &str,
        timestamp: &str,
    ) -> Self {
        let mut context = Self::new();
        context.insert("PROJECT_NAME", config.project_name.clone());
        context.insert(
            "PROJECT_DESCRIPTION",
            format!("{} - MoAI spec-driven development project", config.project_name),
        );
        context.insert("PROJECT_VERSION", DEFAULT_PROJECT_VERSION);
        context.insert("PROJECT_MODE", config.mode.as_str());
        context.insert("MOAI_VERSION", installer_version());
        context.insert("TEMPLATE_VERSION", template_version);
        context.insert("TIMESTAMP", timestamp);
        context.insert("FEATURES", config.additional_features.join(", "));
        context.insert(
            "FEATURES_JSON",
            serde_json::to_string(&config.additional_features).unwrap_or_else(|_| "[]".into()),
        );
        context
    }

    /// Insert or replace a value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Look up a value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the context has no keys
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TemplateContext {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut context = Self::new();
        for (key, value) in iter {
            context.insert(key, value);
        }
        context
    }
}

/// How substituted values are written into the destination content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueEncoding {
    /// Value inserted unchanged
    #[default]
    Plain,
    /// Value escaped for use inside a JSON string literal
    JsonString,
}

impl ValueEncoding {
    /// Encoding matching the file format at `path`
    pub fn for_path(path: &Path) -> Self {
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| JSON_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false);
        if is_json {
            ValueEncoding::JsonString
        } else {
            ValueEncoding::Plain
        }
    }

    fn encode(self, key: &str, value: &str) -> String {
        match self {
            ValueEncoding::JsonString if !key.ends_with(JSON_FRAGMENT_SUFFIX) => {
                let quoted = serde_json::Value::String(value.to_string()).to_string();
                quoted[1..quoted.len() - 1].to_string()
            }
            _ => value.to_string(),
        }
    }
}

/// Record of what a substitution pass did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubstitutionReport {
    /// Keys that were replaced, with the value used
    pub replacements: IndexMap<String, String>,
    /// Keys found in content but missing from the context (deduplicated)
    pub unknown_keys: Vec<String>,
    /// Number of files rendered
    pub files_rendered: usize,
}

impl SubstitutionReport {
    /// Create a new empty report
    pub fn new() -> Self {
        Self::default()
    }

    fn add_replacement(&mut self, key: &str, value: &str) {
        self.replacements
            .entry(key.to_string())
            .or_insert_with(|| value.to_string());
    }

    fn add_unknown_key(&mut self, key: &str) {
        if !self.unknown_keys.iter().any(|k| k == key) {
            self.unknown_keys.push(key.to_string());
        }
    }

    /// Check if any placeholder was seen
    pub fn has_substitutions(&self) -> bool {
        !self.replacements.is_empty() || !self.unknown_keys.is_empty()
    }

    /// Fold another report into this one
    pub fn merge(&mut self, other: SubstitutionReport) {
        for (key, value) in other.replacements {
            self.replacements.entry(key).or_insert(value);
        }
        for key in other.unknown_keys {
            self.add_unknown_key(&key);
        }
        self.files_rendered += other.files_rendered;
    }
}

/// Result of rendering many files at once
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Aggregated substitution report
    pub report: SubstitutionReport,
    /// Files that could not be rendered; they keep their original bytes
    pub failures: Vec<SubstitutionFailure>,
}

/// Renders `{{KEY}}` placeholders using a [`TemplateContext`]
#[derive(Debug, Clone)]
pub struct TemplateSubstitutor {
    context: TemplateContext,
}

impl TemplateSubstitutor {
    /// Create a substitutor for the given context
    pub fn new(context: TemplateContext) -> Self {
        Self { context }
    }

    /// The context used for rendering
    pub fn context(&self) -> &TemplateContext {
        &self.context
    }

    /// Replace every known `{{KEY}}` in `content`; unknown keys stay as-is
    pub fn substitute(
        &self,
        content: &str,
        encoding: ValueEncoding,
        report: &mut SubstitutionReport,
    ) -> String {
        PLACEHOLDER_REGEX
            .replace_all(content, |caps: &Captures| {
                let key = &caps[1];
                match self.context.get(key) {
                    Some(value) => {
                        report.add_replacement(key, value);
                        encoding.encode(key, value)
                    }
                    None => {
                        report.add_unknown_key(key);
                        caps[0].to_string()
                    }
                }
            })
            .into_owned()
    }

    /// Whether files at `path` are rendered (text allow-list) or copied verbatim
    pub fn is_substitutable(path: &Path) -> bool {
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            let extension = extension.to_lowercase();
            return TEXT_EXTENSIONS.contains(&extension.as_str());
        }

        path.file_name()
            .and_then(|name| name.to_str())
            .map(|name| TEXT_FILE_NAMES.contains(&name.to_lowercase().as_str()))
            .unwrap_or(false)
    }

    /// Render a file and write it back if anything changed
    ///
    /// Returns whether the file was rewritten.
    pub fn substitute_in_place(
        &self,
        path: &Path,
        report: &mut SubstitutionReport,
    ) -> Result<bool, SubstitutionFailure> {
        let original = fs::read_to_string(path).map_err(|e| SubstitutionFailure {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let rendered = self.substitute(&original, ValueEncoding::for_path(path), report);
        report.files_rendered += 1;

        if rendered == original {
            return Ok(false);
        }

        fs::write(path, rendered).map_err(|e| SubstitutionFailure {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(true)
    }

    /// Render many files in place, tolerating per-file failures
    ///
    /// Paths outside the text allow-list are ignored.
    #[instrument(level = "debug", skip_all, fields(files = paths.len()))]
    pub fn substitute_batch(&self, paths: &[PathBuf]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        for path in paths.iter().filter(|p| Self::is_substitutable(p)) {
            let mut report = SubstitutionReport::new();
            match self.substitute_in_place(path, &mut report) {
                Ok(changed) => {
                    debug!("Rendered {} (changed: {})", path.display(), changed);
                    outcome.report.merge(report);
                }
                Err(failure) => {
                    warn!("{}", failure);
                    outcome.failures.push(failure);
                }
            }
        }

        outcome
    }
}
