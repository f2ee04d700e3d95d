//! Error types and handling
//!
//! The error taxonomy follows the installation pipeline: each domain
//! (path safety, preflight, backup, deployment, configuration, post-install
//! validation) has its own enum, and all of them are wrapped in [`MoaiError`]
//! for unified propagation through the phase runner.
//!
//! Recoverable problems are modelled separately by [`SubstitutionFailure`].
//! It deliberately has no conversion into [`MoaiError`]: a substitution
//! failure can only ever be collected as a warning, never propagated as a
//! fatal error.

use std::path::PathBuf;
use thiserror::Error;

/// Path safety errors raised before any mutation of the target
#[derive(Error, Debug)]
pub enum PathSafetyError {
    /// The project path failed the traversal or deny-list checks
    #[error("Unsafe project path: '{path}'")]
    Unsafe { path: String },
}

/// Preflight (system precondition) errors
#[derive(Error, Debug)]
pub enum PreflightError {
    /// Write check in the target directory failed
    #[error("Project path is not writable: {path} ({source})")]
    NotWritable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Running installer is older than the templates require
    #[error("Installer version {current} is older than the minimum {required} required by the templates")]
    VersionTooOld { current: String, required: String },

    /// Version string could not be parsed as a semantic version
    #[error("Invalid version string: {value}")]
    InvalidVersion { value: String },
}

/// Backup-related errors
///
/// Every variant is fatal: a partial backup must never be reported as success.
#[derive(Error, Debug)]
pub enum BackupError {
    /// Target path lies inside the packaged template source
    #[error("Refusing to back up {path}: it is inside the template source {template_root}")]
    InsideTemplateSource { path: String, template_root: String },

    /// Copying a protected artifact failed
    #[error("Failed to copy {from} into backup: {source}")]
    Copy {
        from: String,
        #[source]
        source: std::io::Error,
    },

    /// Writing or reading the metadata record failed
    #[error("Backup metadata error for {path}: {message}")]
    Metadata { path: String, message: String },

    /// Backup metadata file not found
    #[error("Backup metadata not found: {path}")]
    NotFound { path: String },
}

/// Structural deployment errors (always fatal)
#[derive(Error, Debug)]
pub enum DeployError {
    /// Template source directory could not be read
    #[error("Failed to read template directory {path}: {source}")]
    ReadSource {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Destination directory could not be created
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// File copy failed
    #[error("Failed to copy {src} to {dest}: {source}")]
    Copy {
        src: String,
        dest: String,
        #[source]
        source: std::io::Error,
    },

    /// Writing a generated file failed
    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Setting the executable bit on a deployed script failed
    #[error("Failed to set permissions on {path}: {source}")]
    Permissions {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Relative path computation failed while walking a template tree
    #[error("Failed to calculate relative path for {path}")]
    RelativePath { path: String },
}

/// Template manifest errors
#[derive(Error, Debug)]
pub enum TemplateError {
    /// Manifest parsing error
    #[error("Failed to parse template manifest: {message}")]
    Parsing { message: String },

    /// Manifest validation error
    #[error("Template manifest validation error: {message}")]
    Validation { message: String },

    /// Manifest file I/O error
    #[error("Failed to read template manifest file")]
    Io(#[from] std::io::Error),
}

/// Installation configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file parsing error
    #[error("Failed to parse configuration file: {message}")]
    Parsing { message: String },

    /// Configuration validation error
    #[error("Configuration validation error: {message}")]
    Validation { message: String },

    /// Configuration file I/O error
    #[error("Failed to read configuration file")]
    Io(#[from] std::io::Error),

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: String },
}

/// Post-install validation errors; any of these signals a corrupted install
#[derive(Error, Debug)]
pub enum ValidationError {
    /// A required path does not exist after installation
    #[error("Required path is missing: {path}")]
    MissingPath { path: String },

    /// A generated JSON file does not parse into its schema
    #[error("Invalid JSON in {path}: {message}")]
    InvalidJson { path: String, message: String },
}

/// Version control errors (best-effort, logged by the caller)
#[derive(Error, Debug)]
pub enum GitError {
    /// Git is not installed or not accessible
    #[error("Git is not installed or not accessible")]
    NotInstalled,

    /// A git command exited unsuccessfully
    #[error("git {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
}

/// A recoverable, per-file substitution failure
///
/// The affected file is still copied byte-for-byte; the failure is only
/// reported as a warning.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Substitution skipped for {}: {reason}", path.display())]
pub struct SubstitutionFailure {
    /// File whose placeholders were not rendered
    pub path: PathBuf,
    /// Human-readable cause
    pub reason: String,
}

/// Main error enum wrapping all domain-specific errors
#[derive(Error, Debug)]
pub enum MoaiError {
    /// Path safety errors
    #[error(transparent)]
    PathSafety(#[from] PathSafetyError),

    /// Preflight errors
    #[error(transparent)]
    Preflight(#[from] PreflightError),

    /// Backup errors
    #[error("Backup error: {0}")]
    Backup(#[from] BackupError),

    /// Deployment errors
    #[error("Deploy error: {0}")]
    Deploy(#[from] DeployError),

    /// Template manifest errors
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Post-install validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Git errors
    #[error("Git error: {0}")]
    Git(#[from] GitError),

    /// A pipeline phase failed; carries the phase name and the cause
    #[error("{phase} failed: {source}")]
    PhaseFailed {
        phase: String,
        #[source]
        source: Box<MoaiError>,
    },
}

impl MoaiError {
    /// Name of the failed phase, if this error came out of the phase runner
    pub fn failed_phase(&self) -> Option<&str> {
        match self {
            MoaiError::PhaseFailed { phase, .. } => Some(phase),
            _ => None,
        }
    }
}

/// Convenience type alias for Results with MoaiError
pub type Result<T> = std::result::Result<T, MoaiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_path_safety_error_display() {
        let error = PathSafetyError::Unsafe {
            path: "../../etc".to_string(),
        };
        assert_eq!(format!("{}", error), "Unsafe project path: '../../etc'");
    }

    #[test]
    fn test_backup_error_display() {
        let error = BackupError::InsideTemplateSource {
            path: "/opt/moai/templates/x".to_string(),
            template_root: "/opt/moai/templates".to_string(),
        };
        assert_eq!(
            format!("{}", error),
            "Refusing to back up /opt/moai/templates/x: it is inside the template source /opt/moai/templates"
        );
    }

    #[test]
    fn test_validation_error_display() {
        let error = ValidationError::MissingPath {
            path: ".moai/config.json".to_string(),
        };
        assert_eq!(
            format!("{}", error),
            "Required path is missing: .moai/config.json"
        );
    }

    #[test]
    fn test_substitution_failure_display() {
        let failure = SubstitutionFailure {
            path: PathBuf::from("docs/guide.md"),
            reason: "stream did not contain valid UTF-8".to_string(),
        };
        assert_eq!(
            format!("{}", failure),
            "Substitution skipped for docs/guide.md: stream did not contain valid UTF-8"
        );
    }

    #[test]
    fn test_phase_failed_display_and_source() {
        let inner: MoaiError = PathSafetyError::Unsafe {
            path: String::new(),
        }
        .into();
        let error = MoaiError::PhaseFailed {
            phase: "preparation".to_string(),
            source: Box::new(inner),
        };

        assert_eq!(error.failed_phase(), Some("preparation"));
        assert_eq!(
            format!("{}", error),
            "preparation failed: Unsafe project path: ''"
        );
        assert!(error.source().is_some());
    }

    #[test]
    fn test_moai_error_from_domain_errors() {
        let error: MoaiError = ConfigError::Validation {
            message: "Test".to_string(),
        }
        .into();
        assert!(matches!(error, MoaiError::Config(_)));

        let error: MoaiError = DeployError::RelativePath {
            path: "x".to_string(),
        }
        .into();
        assert!(matches!(error, MoaiError::Deploy(_)));

        let error: MoaiError = GitError::NotInstalled.into();
        assert!(matches!(error, MoaiError::Git(_)));
        assert!(error.failed_phase().is_none());
    }

    #[test]
    fn test_anyhow_conversions() {
        let error = MoaiError::Backup(BackupError::NotFound {
            path: "latest.json".to_string(),
        });
        let anyhow_error = anyhow::Error::from(error);
        assert!(anyhow_error.to_string().contains("Backup error"));
    }

    #[test]
    fn test_error_source_chain() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error = MoaiError::Deploy(DeployError::CreateDir {
            path: "/x".to_string(),
            source: io_error,
        });

        assert!(error.source().is_some());
        if let Some(source) = error.source() {
            assert!(source.source().is_some());
        }
    }
}
