//! Typed project configuration files
//!
//! Two JSON files define an installed project:
//! - `.moai/config.json` ([`ProjectConfig`]), owned entirely by the installer
//!   and therefore strict about unknown fields
//! - `.claude/settings.json` ([`ClaudeSettings`]), shared with the user and
//!   other tools, so unknown top-level keys are preserved as-is
//!
//! Both are generated only when absent; post-install validation parses both.

use crate::config::{InstallMode, InstallationConfig};
use crate::errors::{DeployError, Result, ValidationError};
use crate::semver_utils::installer_version;
use crate::substitution::DEFAULT_PROJECT_VERSION;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// `.moai/config.json`, relative to the project root
pub const PROJECT_CONFIG_PATH: &str = ".moai/config.json";

/// `.claude/settings.json`, relative to the project root
pub const CLAUDE_SETTINGS_PATH: &str = ".claude/settings.json";

/// VCS ignore file written in team mode
pub const GITIGNORE_PATH: &str = ".gitignore";

/// Content of the team-mode `.gitignore`
pub const GITIGNORE_CONTENT: &str = "\
# MoAI
.moai-backup-*/
.moai/backups/
.moai/reports/
.claude/logs/
.claude/settings.local.json

# OS
.DS_Store
Thumbs.db

# Editors
.idea/
.vscode/
*.swp
";

/// Project section of `.moai/config.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectSection {
    pub name: String,
    pub description: String,
    pub version: String,
    pub mode: InstallMode,
    pub created_at: String,
}

/// Installer section of `.moai/config.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MoaiSection {
    /// Installer version that created the project
    pub version: String,
}

/// `.moai/config.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    pub project: ProjectSection,
    pub moai: MoaiSection,
    #[serde(default)]
    pub features: Vec<String>,
}

impl ProjectConfig {
    /// Build the configuration written for a new project
    pub fn from_installation(config: &InstallationConfig, created_at: &str) -> Self {
        Self {
            project: ProjectSection {
                name: config.project_name.clone(),
                description: format!(
                    "{} - MoAI spec-driven development project",
                    config.project_name
                ),
                version: DEFAULT_PROJECT_VERSION.to_string(),
                mode: config.mode,
                created_at: created_at.to_string(),
            },
            moai: MoaiSection {
                version: installer_version().to_string(),
            },
            features: config.additional_features.clone(),
        }
    }
}

/// `permissions` section of `.claude/settings.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allow: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ask: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deny: Vec<String>,
    /// Keys such as `defaultMode`
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

/// `.claude/settings.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClaudeSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Permissions>,
    /// Hook event name to hook matcher list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hooks: Option<IndexMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<IndexMap<String, String>>,
    /// User keys the installer does not manage
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl ClaudeSettings {
    /// Settings generated when neither the templates nor the user provided any
    pub fn generated(config: &InstallationConfig) -> Self {
        let mut env = IndexMap::new();
        env.insert("MOAI_PROJECT_NAME".to_string(), config.project_name.clone());
        env.insert("MOAI_MODE".to_string(), config.mode.as_str().to_string());

        Self {
            permissions: Some(Permissions {
                allow: vec![
                    "Read".to_string(),
                    "Edit".to_string(),
                    "Write".to_string(),
                    "Bash(git status:*)".to_string(),
                    "Bash(git diff:*)".to_string(),
                ],
                ask: Vec::new(),
                deny: vec!["Read(./.env)".to_string(), "Read(./secrets/**)".to_string()],
                extra: IndexMap::new(),
            }),
            hooks: None,
            env: Some(env),
            extra: IndexMap::new(),
        }
    }
}

/// Serialize `value` to `path` unless the file exists
///
/// Returns the path if it was written.
pub fn write_json_if_absent<T: Serialize>(path: &Path, value: &T) -> Result<Option<PathBuf>> {
    if path.exists() {
        debug!("Keeping existing {}", path.display());
        return Ok(None);
    }

    let write_err = |e: std::io::Error| DeployError::Write {
        path: path.display().to_string(),
        source: e,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| DeployError::CreateDir {
            path: parent.display().to_string(),
            source: e,
        })?;
    }
    let content = serde_json::to_string_pretty(value)
        .map_err(|e| write_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
    fs::write(path, format!("{}\n", content)).map_err(write_err)?;

    debug!("Generated {}", path.display());
    Ok(Some(path.to_path_buf()))
}

/// Write `content` to `path` unless the file exists
pub fn write_text_if_absent(path: &Path, content: &str) -> Result<Option<PathBuf>> {
    if path.exists() {
        debug!("Keeping existing {}", path.display());
        return Ok(None);
    }
    fs::write(path, content).map_err(|e| DeployError::Write {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(Some(path.to_path_buf()))
}

fn read_json_file(path: &Path) -> std::result::Result<String, ValidationError> {
    if !path.is_file() {
        return Err(ValidationError::MissingPath {
            path: path.display().to_string(),
        });
    }
    fs::read_to_string(path).map_err(|e| ValidationError::InvalidJson {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Parse `.moai/config.json`
pub fn load_project_config(path: &Path) -> std::result::Result<ProjectConfig, ValidationError> {
    let content = read_json_file(path)?;
    serde_json::from_str(&content).map_err(|e| ValidationError::InvalidJson {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Parse `.claude/settings.json`; the document must be a JSON object
pub fn load_claude_settings(path: &Path) -> std::result::Result<ClaudeSettings, ValidationError> {
    let content = read_json_file(path)?;
    let invalid = |message: String| ValidationError::InvalidJson {
        path: path.display().to_string(),
        message,
    };

    let value: Value = serde_json::from_str(&content).map_err(|e| invalid(e.to_string()))?;
    if !value.is_object() {
        return Err(invalid("expected a JSON object".to_string()));
    }
    serde_json::from_value(value).map_err(|e| invalid(e.to_string()))
}
