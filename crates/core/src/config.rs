//! Installation configuration
//!
//! [`InstallationConfig`] is the immutable, caller-supplied description of one
//! installation run. It is built once (from CLI flags or a JSON file) and is
//! never mutated by the pipeline; the orchestrator only reads it.

use crate::errors::{ConfigError, MoaiError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable overriding the bundled template source
pub const TEMPLATES_DIR_ENV: &str = "MOAI_TEMPLATES_DIR";

/// Installation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallMode {
    /// Single developer; no VCS scaffolding
    #[default]
    Personal,
    /// Shared repository; adds `.gitignore` and an initial commit
    Team,
}

impl InstallMode {
    /// Get the mode name as string
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallMode::Personal => "personal",
            InstallMode::Team => "team",
        }
    }
}

impl fmt::Display for InstallMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied installation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InstallationConfig {
    /// Target project directory
    pub project_path: PathBuf,

    /// Project name, used for `{{PROJECT_NAME}}`
    pub project_name: String,

    /// Installation mode
    pub mode: InstallMode,

    /// Snapshot pre-existing MoAI artifacts before installing
    pub backup_enabled: bool,

    /// Replace files that already exist in the target
    pub overwrite_existing: bool,

    /// Template source override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_path: Option<PathBuf>,

    /// Additional feature names recorded in the generated configuration
    #[serde(default)]
    pub additional_features: Vec<String>,
}

impl InstallationConfig {
    /// Create a configuration with defaults for everything but path and name
    pub fn new(project_path: impl Into<PathBuf>, project_name: impl Into<String>) -> Self {
        Self {
            project_path: project_path.into(),
            project_name: project_name.into(),
            mode: InstallMode::default(),
            backup_enabled: true,
            overwrite_existing: false,
            template_path: None,
            additional_features: Vec::new(),
        }
    }

    /// Load a configuration from a JSON file
    ///
    /// Unknown fields are rejected.
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading installation configuration from {}", path.display());

        if !path.exists() {
            return Err(MoaiError::Config(ConfigError::NotFound {
                path: path.display().to_string(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        let config: InstallationConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parsing {
                message: e.to_string(),
            })?;
        config.validate()?;

        Ok(config)
    }

    /// Validate fields that can be checked without touching the filesystem
    ///
    /// An empty project path is not rejected here: the preparation phase
    /// rejects it so that the run still produces a structured result.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.project_name.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: "Project name is required and cannot be empty".to_string(),
            });
        }

        if let Some(feature) = self
            .additional_features
            .iter()
            .find(|f| f.trim().is_empty())
        {
            return Err(ConfigError::Validation {
                message: format!("Invalid feature name: '{}'", feature),
            });
        }

        Ok(())
    }

    /// Resolve the template source directory for this run
    ///
    /// Order: explicit `templatePath`, then `MOAI_TEMPLATES_DIR`, then the
    /// tree bundled with this crate.
    pub fn template_root(&self) -> PathBuf {
        if let Some(path) = &self.template_path {
            return path.clone();
        }
        if let Some(dir) = std::env::var_os(TEMPLATES_DIR_ENV) {
            if !dir.is_empty() {
                return PathBuf::from(dir);
            }
        }
        bundled_template_root()
    }
}

/// Template tree shipped alongside this crate
pub fn bundled_template_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("templates")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = InstallationConfig::new("/tmp/p", "p");
        assert_eq!(config.mode, InstallMode::Personal);
        assert!(config.backup_enabled);
        assert!(!config.overwrite_existing);
        assert!(config.template_path.is_none());
        assert!(config.additional_features.is_empty());
    }

    #[test]
    fn test_parse_camel_case_config() {
        let json = r#"
        {
            "projectPath": "/tmp/p",
            "projectName": "p",
            "mode": "team",
            "backupEnabled": false,
            "overwriteExisting": true,
            "additionalFeatures": ["tdd", "docs"]
        }
        "#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = InstallationConfig::from_file(file.path()).unwrap();
        assert_eq!(config.project_path, PathBuf::from("/tmp/p"));
        assert_eq!(config.mode, InstallMode::Team);
        assert!(!config.backup_enabled);
        assert!(config.overwrite_existing);
        assert_eq!(config.additional_features, vec!["tdd", "docs"]);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let json = r#"{
            "projectPath": "/tmp/p",
            "projectName": "p",
            "mode": "personal",
            "backupEnabled": true,
            "overwriteExisting": false,
            "colour": "blue"
        }"#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let err = InstallationConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, MoaiError::Config(ConfigError::Parsing { .. })));
    }

    #[test]
    fn test_required_fields_enforced() {
        let json = r#"{"projectPath": "/tmp/p", "projectName": "p"}"#;
        let result: std::result::Result<InstallationConfig, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_mode_rejected() {
        let json = r#"{
            "projectPath": "/tmp/p",
            "projectName": "p",
            "mode": "enterprise",
            "backupEnabled": true,
            "overwriteExisting": false
        }"#;
        let result: std::result::Result<InstallationConfig, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = InstallationConfig::from_file(Path::new("/nonexistent/moai.json")).unwrap_err();
        assert!(matches!(err, MoaiError::Config(ConfigError::NotFound { .. })));
    }

    #[test]
    fn test_validate_rejects_empty_name() {
        let config = InstallationConfig::new("/tmp/p", "  ");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn test_mode_serialization() {
        assert_eq!(serde_json::to_string(&InstallMode::Team).unwrap(), "\"team\"");
        assert_eq!(InstallMode::Personal.to_string(), "personal");
    }

    #[test]
    #[serial]
    fn test_template_root_resolution_order() {
        std::env::remove_var(TEMPLATES_DIR_ENV);
        let mut config = InstallationConfig::new("/tmp/p", "p");
        assert_eq!(config.template_root(), bundled_template_root());

        std::env::set_var(TEMPLATES_DIR_ENV, "/opt/moai/templates");
        assert_eq!(
            config.template_root(),
            PathBuf::from("/opt/moai/templates")
        );

        config.template_path = Some(PathBuf::from("/custom"));
        assert_eq!(config.template_root(), PathBuf::from("/custom"));
        std::env::remove_var(TEMPLATES_DIR_ENV);
    }
}
