//! Pre-install backup of existing MoAI artifacts
//!
//! Before an installation touches a project that already contains any of the
//! protected artifacts (`.claude/`, `.moai/`, `CLAUDE.md`), the artifacts are
//! copied into a timestamped `.moai-backup-*` directory next to them and a
//! [`BackupMetadata`] record is written with status `pending`.
//!
//! Backups are all-or-nothing: the first copy failure aborts the backup, the
//! partial backup directory is removed and the error is propagated, so a
//! partial snapshot is never reported as success. Symbolic links are copied
//! as links and never followed.

use crate::config::InstallationConfig;
use crate::errors::{BackupError, Result};
use crate::observability::{backup_span, TimedSpan};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Artifacts whose presence marks a prior installation
pub const PROTECTED_ARTIFACTS: &[&str] = &[".claude", ".moai", "CLAUDE.md"];

/// Prefix of backup directory names
pub const BACKUP_DIR_PREFIX: &str = ".moai-backup-";

/// Metadata location relative to the project root
pub const METADATA_RELATIVE_PATH: &str = ".moai/backups/latest.json";

/// Creator tag written into every metadata record
pub const CREATED_BY: &str = "moai-core";

/// Lifecycle status of a backup
///
/// Only `Pending` is ever written here; the other states are set by
/// downstream tooling after the user reviews the backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupStatus {
    Pending,
    Merged,
    Ignored,
}

/// Persisted record describing one backup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackupMetadata {
    /// ISO-8601 creation time
    pub timestamp: String,
    /// Backup directory name, relative to the project root
    pub backup_path: String,
    /// Protected artifacts that were copied, relative to the project root
    pub backed_up_files: Vec<String>,
    /// Lifecycle status
    pub status: BackupStatus,
    /// Creator tag
    pub created_by: String,
}

/// What a successful backup produced
#[derive(Debug, Clone)]
pub struct BackupOutcome {
    /// Absolute path of the backup directory
    pub backup_dir: PathBuf,
    /// Absolute path of the metadata file
    pub metadata_path: PathBuf,
    /// The metadata record that was written
    pub metadata: BackupMetadata,
}

/// Detects prior installations and snapshots them
#[derive(Debug, Clone)]
pub struct BackupManager {
    template_root: PathBuf,
}

impl BackupManager {
    /// Create a manager guarding the given template source
    pub fn new(template_root: impl Into<PathBuf>) -> Self {
        Self {
            template_root: template_root.into(),
        }
    }

    /// True if any protected artifact exists in `project_path`
    pub fn needs_backup(project_path: &Path) -> bool {
        PROTECTED_ARTIFACTS
            .iter()
            .any(|artifact| entry_exists(&project_path.join(artifact)))
    }

    /// Snapshot the protected artifacts of `config.project_path`
    ///
    /// Returns `Ok(None)` when there is nothing to back up.
    #[instrument(level = "info", skip_all, fields(path = %config.project_path.display()))]
    pub fn create_backup(&self, config: &InstallationConfig) -> Result<Option<BackupOutcome>> {
        let project_path = config.project_path.as_path();
        let timed = TimedSpan::new(backup_span(project_path));
        let _guard = timed.span().enter();

        self.ensure_outside_template_source(project_path)?;

        if !Self::needs_backup(project_path) {
            debug!("No existing artifacts in {}, skipping backup", project_path.display());
            return Ok(None);
        }

        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let backup_dir = unique_backup_dir(project_path, &timestamp);
        let backup_name = backup_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        fs::create_dir_all(&backup_dir).map_err(|e| BackupError::Copy {
            from: project_path.display().to_string(),
            source: e,
        })?;

        let metadata_path = project_path.join(METADATA_RELATIVE_PATH);
        let metadata = match snapshot(project_path, &backup_dir, backup_name, timestamp)
            .and_then(|metadata| write_metadata(&metadata_path, &metadata).map(|()| metadata))
        {
            Ok(metadata) => metadata,
            Err(e) => {
                discard_partial_backup(&backup_dir);
                return Err(e);
            }
        };

        info!(
            "Backed up {} artifacts to {}",
            metadata.backed_up_files.len(),
            backup_dir.display()
        );

        Ok(Some(BackupOutcome {
            backup_dir,
            metadata_path,
            metadata,
        }))
    }

    /// Read the latest backup metadata of a project
    pub fn load_metadata(project_path: &Path) -> Result<BackupMetadata> {
        let path = project_path.join(METADATA_RELATIVE_PATH);
        if !path.is_file() {
            return Err(BackupError::NotFound {
                path: path.display().to_string(),
            }
            .into());
        }

        let content = fs::read_to_string(&path).map_err(|e| BackupError::Metadata {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let metadata = serde_json::from_str(&content).map_err(|e| BackupError::Metadata {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(metadata)
    }

    /// Refuse to operate on anything inside the bundled template tree
    fn ensure_outside_template_source(&self, project_path: &Path) -> Result<()> {
        let project = absolute(project_path);
        let template_root = absolute(&self.template_root);

        if project.starts_with(&template_root) {
            return Err(BackupError::InsideTemplateSource {
                path: project.display().to_string(),
                template_root: template_root.display().to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// Canonical form when the path exists, otherwise joined onto the cwd
fn absolute(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// True for any directory entry, including dangling symbolic links
fn entry_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Copy every existing protected artifact into `backup_dir`
fn snapshot(
    project_path: &Path,
    backup_dir: &Path,
    backup_name: String,
    timestamp: String,
) -> Result<BackupMetadata> {
    let mut backed_up_files = Vec::new();
    for artifact in PROTECTED_ARTIFACTS {
        let source = project_path.join(artifact);
        if !entry_exists(&source) {
            continue;
        }
        copy_recursive(&source, &backup_dir.join(artifact))?;
        debug!("Backed up {}", source.display());
        backed_up_files.push((*artifact).to_string());
    }

    Ok(BackupMetadata {
        timestamp,
        backup_path: backup_name,
        backed_up_files,
        status: BackupStatus::Pending,
        created_by: CREATED_BY.to_string(),
    })
}

fn discard_partial_backup(backup_dir: &Path) {
    if let Err(e) = fs::remove_dir_all(backup_dir) {
        warn!(
            "Failed to remove partial backup {}: {}",
            backup_dir.display(),
            e
        );
    } else {
        debug!("Removed partial backup {}", backup_dir.display());
    }
}

/// Filesystem-safe backup directory that does not exist yet
fn unique_backup_dir(project_path: &Path, timestamp: &str) -> PathBuf {
    let sanitized = timestamp.replace([':', '.'], "-");
    let base = project_path.join(format!("{}{}", BACKUP_DIR_PREFIX, sanitized));
    if !base.exists() {
        return base;
    }

    let mut counter = 1;
    loop {
        let candidate = project_path.join(format!("{}{}-{}", BACKUP_DIR_PREFIX, sanitized, counter));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

fn copy_recursive(from: &Path, to: &Path) -> Result<()> {
    let copy_err = |e| BackupError::Copy {
        from: from.display().to_string(),
        source: e,
    };

    let file_type = fs::symlink_metadata(from).map_err(copy_err)?.file_type();

    if file_type.is_symlink() {
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).map_err(copy_err)?;
        }
        copy_symlink(from, to).map_err(copy_err)?;
    } else if file_type.is_dir() {
        fs::create_dir_all(to).map_err(copy_err)?;
        let mut entries = fs::read_dir(from)
            .map_err(copy_err)?
            .collect::<std::io::Result<Vec<_>>>()
            .map_err(copy_err)?;
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            copy_recursive(&entry.path(), &to.join(entry.file_name()))?;
        }
    } else {
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).map_err(copy_err)?;
        }
        fs::copy(from, to).map_err(copy_err)?;
    }
    Ok(())
}

/// Recreate the link at `from` as `to`, pointing at the same target
#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> std::io::Result<()> {
    let target = fs::read_link(from)?;
    std::os::unix::fs::symlink(target, to)
}

#[cfg(windows)]
fn copy_symlink(from: &Path, to: &Path) -> std::io::Result<()> {
    let target = fs::read_link(from)?;
    if fs::metadata(from).map(|m| m.is_dir()).unwrap_or(false) {
        std::os::windows::fs::symlink_dir(target, to)
    } else {
        std::os::windows::fs::symlink_file(target, to)
    }
}

#[cfg(not(any(unix, windows)))]
fn copy_symlink(from: &Path, to: &Path) -> std::io::Result<()> {
    fs::copy(from, to).map(|_| ())
}

/// Write the metadata record via temp file + rename
fn write_metadata(path: &Path, metadata: &BackupMetadata) -> Result<()> {
    let metadata_err = |message: String| BackupError::Metadata {
        path: path.display().to_string(),
        message,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| metadata_err(e.to_string()))?;
    }

    let content =
        serde_json::to_string_pretty(metadata).map_err(|e| metadata_err(e.to_string()))?;
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, content).map_err(|e| metadata_err(e.to_string()))?;
    fs::rename(&temp_path, path).map_err(|e| metadata_err(e.to_string()))?;

    debug!("Wrote backup metadata to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::MoaiError;
    use tempfile::TempDir;

    fn backup_dirs(project: &Path) -> Vec<PathBuf> {
        fs::read_dir(project)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .map(|n| n.to_string_lossy().starts_with(BACKUP_DIR_PREFIX))
                    .unwrap_or(false)
            })
            .collect()
    }

    #[test]
    fn test_needs_backup_is_or_condition() {
        let temp = TempDir::new().unwrap();
        assert!(!BackupManager::needs_backup(temp.path()));

        fs::write(temp.path().join("CLAUDE.md"), "# memory").unwrap();
        assert!(BackupManager::needs_backup(temp.path()));
    }

    #[test]
    fn test_create_backup_noop_without_artifacts() {
        let temp = TempDir::new().unwrap();
        let templates = TempDir::new().unwrap();
        let config = InstallationConfig::new(temp.path(), "p");

        let outcome = BackupManager::new(templates.path())
            .create_backup(&config)
            .unwrap();

        assert!(outcome.is_none());
        assert!(backup_dirs(temp.path()).is_empty());
    }

    #[test]
    fn test_create_backup_copies_existing_artifacts() {
        let temp = TempDir::new().unwrap();
        let templates = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join(".moai/specs")).unwrap();
        fs::write(temp.path().join(".moai/specs/SPEC-001.md"), "spec").unwrap();
        let config = InstallationConfig::new(temp.path(), "p");

        let outcome = BackupManager::new(templates.path())
            .create_backup(&config)
            .unwrap()
            .unwrap();

        assert_eq!(outcome.metadata.backed_up_files, vec![".moai"]);
        assert_eq!(outcome.metadata.status, BackupStatus::Pending);
        assert_eq!(outcome.metadata.created_by, CREATED_BY);
        assert_eq!(
            fs::read_to_string(outcome.backup_dir.join(".moai/specs/SPEC-001.md")).unwrap(),
            "spec"
        );
        assert!(outcome.metadata.backup_path.starts_with(BACKUP_DIR_PREFIX));
        assert!(!outcome.metadata.backup_path.contains(':'));

        let loaded = BackupManager::load_metadata(temp.path()).unwrap();
        assert_eq!(loaded, outcome.metadata);
    }

    #[test]
    fn test_metadata_status_serialization() {
        let metadata = BackupMetadata {
            timestamp: "2026-01-01T00:00:00.000Z".to_string(),
            backup_path: ".moai-backup-x".to_string(),
            backed_up_files: vec!["CLAUDE.md".to_string()],
            status: BackupStatus::Pending,
            created_by: CREATED_BY.to_string(),
        };
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["backed_up_files"][0], "CLAUDE.md");

        let merged: BackupStatus = serde_json::from_str("\"merged\"").unwrap();
        assert_eq!(merged, BackupStatus::Merged);
    }

    #[test]
    fn test_refuses_template_source() {
        let templates = TempDir::new().unwrap();
        let inside = templates.path().join("nested");
        fs::create_dir_all(inside.join(".claude")).unwrap();
        let config = InstallationConfig::new(&inside, "p");

        let err = BackupManager::new(templates.path())
            .create_backup(&config)
            .unwrap_err();

        assert!(matches!(
            err,
            MoaiError::Backup(BackupError::InsideTemplateSource { .. })
        ));
        assert!(backup_dirs(&inside).is_empty());
    }

    #[test]
    fn test_unique_backup_dir_appends_suffix() {
        let temp = TempDir::new().unwrap();
        let first = unique_backup_dir(temp.path(), "2026-01-01T00:00:00.000Z");
        assert!(first.ends_with(".moai-backup-2026-01-01T00-00-00-000Z"));

        fs::create_dir_all(&first).unwrap();
        let second = unique_backup_dir(temp.path(), "2026-01-01T00:00:00.000Z");
        assert!(second.ends_with(".moai-backup-2026-01-01T00-00-00-000Z-1"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_copied_as_links() {
        use std::os::unix::fs::symlink;

        let temp = TempDir::new().unwrap();
        let templates = TempDir::new().unwrap();
        let claude = temp.path().join(".claude");
        fs::create_dir_all(&claude).unwrap();
        fs::write(claude.join("settings.json"), "{}").unwrap();
        symlink("does-not-exist", claude.join("dangling")).unwrap();
        symlink("..", claude.join("up")).unwrap();
        let config = InstallationConfig::new(temp.path(), "p");

        let outcome = BackupManager::new(templates.path())
            .create_backup(&config)
            .unwrap()
            .unwrap();

        let copied = outcome.backup_dir.join(".claude");
        assert_eq!(
            fs::read_link(copied.join("dangling")).unwrap(),
            PathBuf::from("does-not-exist")
        );
        assert_eq!(fs::read_link(copied.join("up")).unwrap(), PathBuf::from(".."));
        assert_eq!(fs::read_to_string(copied.join("settings.json")).unwrap(), "{}");
        assert_eq!(backup_dirs(temp.path()).len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_needs_backup_sees_dangling_link() {
        let temp = TempDir::new().unwrap();
        std::os::unix::fs::symlink("missing-target", temp.path().join("CLAUDE.md")).unwrap();
        assert!(BackupManager::needs_backup(temp.path()));
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_failure_removes_partial_backup() {
        let temp = TempDir::new().unwrap();
        let templates = TempDir::new().unwrap();
        fs::write(temp.path().join("CLAUDE.md"), "# memory").unwrap();
        fs::create_dir_all(temp.path().join(".moai")).unwrap();
        // Sockets cannot be opened for reading, even by privileged users
        let _listener =
            std::os::unix::net::UnixListener::bind(temp.path().join(".moai/agent.sock")).unwrap();
        let config = InstallationConfig::new(temp.path(), "p");

        let err = BackupManager::new(templates.path())
            .create_backup(&config)
            .unwrap_err();

        assert!(matches!(err, MoaiError::Backup(BackupError::Copy { .. })));
        assert!(backup_dirs(temp.path()).is_empty());
        assert!(!temp.path().join(METADATA_RELATIVE_PATH).exists());
    }

    #[test]
    fn test_load_metadata_missing() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            BackupManager::load_metadata(temp.path()),
            Err(MoaiError::Backup(BackupError::NotFound { .. }))
        ));
    }
}
