//! Template tree deployment
//!
//! This module mirrors bundled template trees into a project:
//! - Template manifest parsing from `moai-template.json`
//! - Planning copy/overwrite/skip actions per file
//! - Name-based exclusion (user-owned data) and verbatim directories
//!   (documentation containing literal `{{...}}` examples)
//! - Best-effort placeholder rendering of the files that were written
//! - A hard-coded minimal structure when the template tree is missing
//!
//! Structural failures (cannot read the source, cannot create or write a
//! destination) abort the deployment. Rendering failures do not: they are
//! collected as warnings and the affected file keeps its template bytes.
//!
//! Every deployment records into a caller-owned [`DeployReport`] as it goes,
//! so files written before a structural failure are still accounted for.

use crate::errors::{DeployError, Result, SubstitutionFailure, TemplateError};
use crate::observability::{template_deploy_span, TimedSpan};
use crate::platform::{is_executable_script, set_executable};
use crate::semver_utils::parse_version;
use crate::substitution::{SubstitutionReport, TemplateSubstitutor};
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Manifest file name at the template root; never copied into projects
pub const MANIFEST_FILE: &str = "moai-template.json";

/// Template manifest structure representing `moai-template.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TemplateManifest {
    /// Template identifier
    pub id: String,

    /// Template bundle version
    pub version: String,

    /// Oldest installer able to deploy this bundle
    #[serde(default)]
    pub minimum_installer_version: Option<String>,

    /// Human-readable description
    #[serde(default)]
    pub description: Option<String>,
}

impl TemplateManifest {
    /// Validate the manifest
    pub fn validate(&self) -> std::result::Result<(), TemplateError> {
        if self.id.trim().is_empty() {
            return Err(TemplateError::Validation {
                message: "Template id is required and cannot be empty".to_string(),
            });
        }

        if parse_version(&self.version).is_none() {
            return Err(TemplateError::Validation {
                message: format!("Template version '{}' is not a semantic version", self.version),
            });
        }

        if let Some(minimum) = &self.minimum_installer_version {
            if parse_version(minimum).is_none() {
                return Err(TemplateError::Validation {
                    message: format!(
                        "minimumInstallerVersion '{}' is not a semantic version",
                        minimum
                    ),
                });
            }
        }

        Ok(())
    }
}

/// Parse a template manifest file
#[instrument(level = "debug")]
pub fn parse_template_manifest(path: &Path) -> Result<TemplateManifest> {
    debug!("Parsing template manifest from: {}", path.display());

    let content = fs::read_to_string(path).map_err(TemplateError::Io)?;
    let manifest: TemplateManifest =
        serde_json::from_str(&content).map_err(|e| TemplateError::Parsing {
            message: e.to_string(),
        })?;
    manifest.validate()?;

    debug!(
        "Parsed template manifest: id={}, version={}",
        manifest.id, manifest.version
    );
    Ok(manifest)
}

/// Load the manifest at `template_root`, if there is one
pub fn load_manifest(template_root: &Path) -> Result<Option<TemplateManifest>> {
    let path = template_root.join(MANIFEST_FILE);
    if !path.is_file() {
        debug!("No template manifest at {}", path.display());
        return Ok(None);
    }
    parse_template_manifest(&path).map(Some)
}

/// A file written when the template tree is missing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackFile {
    /// Path relative to the deployment target
    pub relative_path: PathBuf,
    /// File content (rendered like any template file)
    pub contents: String,
}

impl FallbackFile {
    pub fn new(relative_path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        Self {
            relative_path: relative_path.into(),
            contents: contents.into(),
        }
    }
}

/// Deployment options
#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    /// Replace existing destination files (default: false)
    pub overwrite: bool,
    /// Entry names skipped entirely (case-insensitive)
    pub exclude: Vec<String>,
    /// Directory names copied without placeholder rendering (case-insensitive)
    pub verbatim: Vec<String>,
    /// Minimal structure written when the template root does not exist
    pub fallback: Vec<FallbackFile>,
}

impl DeployOptions {
    fn is_excluded(&self, name: &OsStr) -> bool {
        matches_name(&self.exclude, name)
    }

    fn is_verbatim(&self, name: &OsStr) -> bool {
        matches_name(&self.verbatim, name)
    }
}

fn matches_name(names: &[String], name: &OsStr) -> bool {
    let name = name.to_string_lossy();
    names.iter().any(|candidate| candidate.eq_ignore_ascii_case(&name))
}

/// Planned action for one template file
#[derive(Debug, Clone, PartialEq)]
pub enum PlannedAction {
    /// Copy a file to a destination that does not exist yet
    CopyFile {
        src: PathBuf,
        dest: PathBuf,
        substitute: bool,
    },
    /// Replace an existing destination file
    OverwriteFile {
        src: PathBuf,
        dest: PathBuf,
        substitute: bool,
    },
    /// Leave an existing destination file in place
    SkipExistingFile { dest: PathBuf },
}

impl PlannedAction {
    /// Destination path of the action
    pub fn dest(&self) -> &Path {
        match self {
            PlannedAction::CopyFile { dest, .. }
            | PlannedAction::OverwriteFile { dest, .. }
            | PlannedAction::SkipExistingFile { dest } => dest,
        }
    }
}

/// Running record of one or more deployments
#[derive(Debug, Default)]
pub struct DeployReport {
    /// Actions that were executed, in traversal order
    pub actions: Vec<PlannedAction>,
    /// Every destination path touched (written or left in place)
    pub files: Vec<PathBuf>,
    /// Number of files written
    pub files_written: usize,
    /// Number of existing files left untouched
    pub files_skipped: usize,
    /// Placeholder rendering report
    pub substitution: SubstitutionReport,
    /// Recoverable rendering failures
    pub warnings: Vec<SubstitutionFailure>,
    /// Whether the minimal fallback structure was written
    pub used_fallback: bool,
}

/// Copies template trees into a project
#[derive(Debug, Clone)]
pub struct ResourceDeployer {
    substitutor: TemplateSubstitutor,
}

impl ResourceDeployer {
    /// Create a deployer rendering with the given substitutor
    pub fn new(substitutor: TemplateSubstitutor) -> Self {
        Self { substitutor }
    }

    /// Mirror `template_root` into `target_root`
    ///
    /// Falls back to `options.fallback` when `template_root` does not exist.
    #[instrument(level = "info", skip(self, options, report))]
    pub fn deploy(
        &self,
        template_root: &Path,
        target_root: &Path,
        options: &DeployOptions,
        report: &mut DeployReport,
    ) -> Result<()> {
        let timed = TimedSpan::new(template_deploy_span(template_root));
        let _guard = timed.span().enter();

        if !template_root.exists() {
            warn!(
                "Template source {} not found, writing minimal structure",
                template_root.display()
            );
            return self.deploy_fallback(target_root, options, report);
        }

        info!(
            "Deploying templates from {} to {}",
            template_root.display(),
            target_root.display()
        );

        let mut actions = Vec::new();
        plan_deployment(
            template_root,
            target_root,
            template_root,
            options,
            false,
            &mut actions,
        )?;

        let (written, skipped) = (report.files_written, report.files_skipped);
        self.execute(actions, report)?;
        info!(
            "Deployed {} files ({} written, {} skipped)",
            report.files_written + report.files_skipped - written - skipped,
            report.files_written - written,
            report.files_skipped - skipped
        );
        Ok(())
    }

    /// Deploy a single template file (e.g. the top-level memory file)
    #[instrument(level = "debug", skip(self, report))]
    pub fn deploy_file(
        &self,
        src: &Path,
        dest: &Path,
        overwrite: bool,
        report: &mut DeployReport,
    ) -> Result<()> {
        let substitute = TemplateSubstitutor::is_substitutable(src);
        let action = plan_file(src, dest, overwrite, substitute);
        self.execute(vec![action], report)
    }

    /// Write the hard-coded minimal structure from `options.fallback`
    pub fn deploy_fallback(
        &self,
        target_root: &Path,
        options: &DeployOptions,
        report: &mut DeployReport,
    ) -> Result<()> {
        report.used_fallback = true;
        let mut written = Vec::new();
        let outcome = options.fallback.iter().try_for_each(|file| -> Result<()> {
            let dest = target_root.join(&file.relative_path);
            if dest.exists() && !options.overwrite {
                debug!("Skipped existing file: {}", dest.display());
                report.files_skipped += 1;
                report.files.push(dest.clone());
                report.actions.push(PlannedAction::SkipExistingFile { dest });
                return Ok(());
            }

            ensure_parent(&dest)?;
            fs::write(&dest, &file.contents).map_err(|e| DeployError::Write {
                path: dest.display().to_string(),
                source: e,
            })?;
            debug!("Wrote fallback file: {}", dest.display());

            report.files_written += 1;
            report.files.push(dest.clone());
            written.push(dest);
            Ok(())
        });

        self.render_written(&written, report);
        outcome
    }

    /// Execute planned actions in order, then render what was written
    ///
    /// Stops at the first structural failure; files written up to that point
    /// are still recorded and rendered.
    fn execute(&self, actions: Vec<PlannedAction>, report: &mut DeployReport) -> Result<()> {
        let mut to_render = Vec::new();
        let mut outcome = Ok(());

        for action in actions {
            if let Err(e) = execute_action(&action, report, &mut to_render) {
                outcome = Err(e);
                break;
            }
            report.actions.push(action);
        }

        self.render_written(&to_render, report);
        outcome
    }

    fn render_written(&self, written: &[PathBuf], report: &mut DeployReport) {
        let outcome = self.substitutor.substitute_batch(written);
        report.substitution.merge(outcome.report);
        report.warnings.extend(outcome.failures);
    }
}

/// Run one action, recording its destination once something exists there
fn execute_action(
    action: &PlannedAction,
    report: &mut DeployReport,
    to_render: &mut Vec<PathBuf>,
) -> Result<()> {
    match action {
        PlannedAction::CopyFile {
            src,
            dest,
            substitute,
        }
        | PlannedAction::OverwriteFile {
            src,
            dest,
            substitute,
        } => {
            copy_bytes(src, dest)?;
            report.files_written += 1;
            report.files.push(dest.clone());
            if *substitute {
                to_render.push(dest.clone());
            }
            debug!("Copied file: {} -> {}", src.display(), dest.display());
            apply_script_permissions(dest)
        }
        PlannedAction::SkipExistingFile { dest } => {
            report.files_skipped += 1;
            report.files.push(dest.clone());
            debug!("Skipped existing file: {}", dest.display());
            Ok(())
        }
    }
}

/// Recursively plan deployment actions, depth-first in name order
fn plan_deployment(
    current_src: &Path,
    target_root: &Path,
    src_root: &Path,
    options: &DeployOptions,
    verbatim: bool,
    actions: &mut Vec<PlannedAction>,
) -> Result<()> {
    let read_err = |e| DeployError::ReadSource {
        path: current_src.display().to_string(),
        source: e,
    };
    let mut entries = fs::read_dir(current_src)
        .map_err(read_err)?
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(read_err)?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let src_path = entry.path();
        let name = entry.file_name();

        if options.is_excluded(&name) {
            debug!("Excluded from deployment: {}", src_path.display());
            continue;
        }

        if name == OsStr::new(MANIFEST_FILE) {
            debug!("Skipping template manifest: {}", src_path.display());
            continue;
        }

        let relative_path =
            src_path
                .strip_prefix(src_root)
                .map_err(|_| DeployError::RelativePath {
                    path: src_path.display().to_string(),
                })?;
        let dest_path = target_root.join(relative_path);

        if src_path.is_dir() {
            if !dest_path.exists() {
                fs::create_dir_all(&dest_path).map_err(|e| DeployError::CreateDir {
                    path: dest_path.display().to_string(),
                    source: e,
                })?;
                debug!("Created directory: {}", dest_path.display());
            }

            plan_deployment(
                &src_path,
                target_root,
                src_root,
                options,
                verbatim || options.is_verbatim(&name),
                actions,
            )?;
        } else {
            let substitute = !verbatim && TemplateSubstitutor::is_substitutable(&src_path);
            actions.push(plan_file(&src_path, &dest_path, options.overwrite, substitute));
        }
    }

    Ok(())
}

fn plan_file(src: &Path, dest: &Path, overwrite: bool, substitute: bool) -> PlannedAction {
    if dest.exists() {
        if overwrite {
            PlannedAction::OverwriteFile {
                src: src.to_path_buf(),
                dest: dest.to_path_buf(),
                substitute,
            }
        } else {
            PlannedAction::SkipExistingFile {
                dest: dest.to_path_buf(),
            }
        }
    } else {
        PlannedAction::CopyFile {
            src: src.to_path_buf(),
            dest: dest.to_path_buf(),
            substitute,
        }
    }
}

fn ensure_parent(dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| DeployError::CreateDir {
            path: parent.display().to_string(),
            source: e,
        })?;
    }
    Ok(())
}

fn copy_bytes(src: &Path, dest: &Path) -> Result<()> {
    ensure_parent(dest)?;
    fs::copy(src, dest).map_err(|e| DeployError::Copy {
        src: src.display().to_string(),
        dest: dest.display().to_string(),
        source: e,
    })?;
    Ok(())
}

/// Apply the executable bit to script-like files
fn apply_script_permissions(dest: &Path) -> Result<()> {
    if is_executable_script(dest) {
        set_executable(dest).map_err(|e| DeployError::Permissions {
            path: dest.display().to_string(),
            source: e,
        })?;
    }
    Ok(())
}
