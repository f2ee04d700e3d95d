//! Pre-flight and post-install checks

use crate::errors::{PreflightError, Result, ValidationError};
use crate::project_config::{
    load_claude_settings, load_project_config, CLAUDE_SETTINGS_PATH, PROJECT_CONFIG_PATH,
};
use crate::semver_utils::{installer_version, meets_minimum};
use crate::templates::TemplateManifest;
use std::fs;
use std::path::Path;
use tracing::{debug, instrument};

/// Paths that must exist after a successful installation
pub const REQUIRED_PATHS: &[&str] = &[
    ".claude",
    ".moai",
    "CLAUDE.md",
    PROJECT_CONFIG_PATH,
    CLAUDE_SETTINGS_PATH,
];

const WRITE_CHECK_NAME: &str = ".moai-write-check";

/// Stateless condition checks used by the preparation and validation phases
#[derive(Debug, Default, Clone, Copy)]
pub struct PhaseValidator;

impl PhaseValidator {
    /// Check system preconditions before anything is written
    ///
    /// Creates the project directory if needed so the write check has
    /// somewhere to land.
    #[instrument(level = "debug", skip(manifest))]
    pub fn preflight(project_path: &Path, manifest: Option<&TemplateManifest>) -> Result<()> {
        Self::check_installer_version(installer_version(), manifest)?;
        Self::check_writable(project_path)?;
        Ok(())
    }

    /// Running installer must satisfy the templates' minimum version
    pub fn check_installer_version(
        current: &str,
        manifest: Option<&TemplateManifest>,
    ) -> std::result::Result<(), PreflightError> {
        let Some(minimum) = manifest.and_then(|m| m.minimum_installer_version.as_deref()) else {
            debug!("Templates declare no minimum installer version");
            return Ok(());
        };

        if meets_minimum(current, minimum)? {
            Ok(())
        } else {
            Err(PreflightError::VersionTooOld {
                current: current.to_string(),
                required: minimum.to_string(),
            })
        }
    }

    /// Create and delete a sentinel file in `project_path`
    pub fn check_writable(project_path: &Path) -> std::result::Result<(), PreflightError> {
        let not_writable = |e| PreflightError::NotWritable {
            path: project_path.display().to_string(),
            source: e,
        };

        fs::create_dir_all(project_path).map_err(not_writable)?;
        let check_file = project_path.join(WRITE_CHECK_NAME);
        fs::write(&check_file, b"check").map_err(not_writable)?;
        fs::remove_file(&check_file).map_err(not_writable)?;

        debug!("Write check succeeded in {}", project_path.display());
        Ok(())
    }

    /// Assert the installed tree is complete and its JSON files parse
    #[instrument(level = "debug")]
    pub fn validate_installation(project_path: &Path) -> Result<()> {
        for relative in REQUIRED_PATHS {
            let path = project_path.join(relative);
            if !path.exists() {
                return Err(ValidationError::MissingPath {
                    path: relative.to_string(),
                }
                .into());
            }
        }

        load_project_config(&project_path.join(PROJECT_CONFIG_PATH))?;
        load_claude_settings(&project_path.join(CLAUDE_SETTINGS_PATH))?;
        Ok(())
    }
}
