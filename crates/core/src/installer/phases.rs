//! Handlers for the five installation phases
//!
//! [`InstallSession`] carries what phases hand to each other: the resolved
//! project path and the template manifest found during preparation, plus
//! recoverable warnings collected along the way.

use super::phase::InstallPhase;
use super::validator::PhaseValidator;
use crate::backup::BackupManager;
use crate::config::{InstallMode, InstallationConfig};
use crate::errors::{DeployError, PathSafetyError, Result};
use crate::path_safety::PathValidator;
use crate::platform::{mark_shell_scripts_executable, Platform};
use crate::project_config::{
    write_json_if_absent, write_text_if_absent, ClaudeSettings, ProjectConfig,
    CLAUDE_SETTINGS_PATH, GITIGNORE_CONTENT, GITIGNORE_PATH, PROJECT_CONFIG_PATH,
};
use crate::substitution::{TemplateContext, TemplateSubstitutor};
use crate::templates::{
    load_manifest, DeployOptions, DeployReport, FallbackFile, ResourceDeployer, TemplateManifest,
};
use crate::vcs::{init_repository, GitInitOutcome};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Directories created by the directories phase
pub const DIRECTORY_SKELETON: &[&str] = &[
    ".claude",
    ".claude/logs",
    ".moai",
    ".moai/specs",
    ".moai/reports",
    ".moai/memory",
    ".moai/project",
];

/// `.moai` template entries never deployed over user data
pub const MOAI_EXCLUDES: &[&str] = &["specs", "reports", "backups"];

/// `.moai` template directories copied without substitution
pub const MOAI_VERBATIM: &[&str] = &["memory"];

/// Template version used when the template tree has no manifest
const UNKNOWN_TEMPLATE_VERSION: &str = "0.0.0";

fn claude_fallback() -> Vec<FallbackFile> {
    vec![FallbackFile::new(
        "commands/moai/README.md",
        "# MoAI commands\n\nCommands for {{PROJECT_NAME}} will appear here after a template refresh.\n",
    )]
}

fn moai_fallback() -> Vec<FallbackFile> {
    vec![
        FallbackFile::new(
            "project/product.md",
            "# {{PROJECT_NAME}}\n\n{{PROJECT_DESCRIPTION}}\n\n## Mission\n\nTBD\n",
        ),
        FallbackFile::new(
            "memory/development-guide.md",
            "# Development guide\n\nWrite a SPEC before code. Keep tests green.\n",
        ),
    ]
}

fn memory_file_fallback() -> Vec<FallbackFile> {
    vec![FallbackFile::new(
        "CLAUDE.md",
        "# {{PROJECT_NAME}}\n\nSpec-driven development project ({{PROJECT_MODE}} mode).\n\n\
         See .moai/memory/development-guide.md for the workflow.\n",
    )]
}

/// State shared between phase handlers of one run
#[derive(Debug)]
pub struct InstallSession<'a> {
    config: &'a InstallationConfig,
    path_validator: &'a PathValidator,
    template_root: PathBuf,
    timestamp: String,
    project_path: PathBuf,
    manifest: Option<TemplateManifest>,
    warnings: Vec<String>,
}

impl<'a> InstallSession<'a> {
    pub fn new(
        config: &'a InstallationConfig,
        path_validator: &'a PathValidator,
        timestamp: String,
    ) -> Self {
        Self {
            config,
            path_validator,
            template_root: config.template_root(),
            timestamp,
            project_path: config.project_path.clone(),
            manifest: None,
            warnings: Vec::new(),
        }
    }

    /// Template tree this run deploys from
    pub fn template_root(&self) -> &Path {
        &self.template_root
    }

    /// Drain the recoverable warnings collected so far
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    /// Dispatch to the handler of `phase`
    pub fn run_phase(&mut self, phase: InstallPhase, files: &mut Vec<PathBuf>) -> Result<()> {
        match phase {
            InstallPhase::Preparation => self.prepare(files),
            InstallPhase::Directories => self.create_directories(files),
            InstallPhase::Resources => self.deploy_resources(files),
            InstallPhase::Configuration => self.generate_configuration(files),
            InstallPhase::Validation => self.validate(files),
        }
    }

    fn prepare(&mut self, files: &mut Vec<PathBuf>) -> Result<()> {
        if self.config.project_path.as_os_str().is_empty() {
            return Err(PathSafetyError::Unsafe {
                path: String::new(),
            }
            .into());
        }
        self.config.validate()?;
        self.project_path = self.path_validator.check(&self.config.project_path)?;
        debug!("Resolved project path: {}", self.project_path.display());

        self.manifest = if self.template_root.is_dir() {
            load_manifest(&self.template_root)?
        } else {
            None
        };
        PhaseValidator::preflight(&self.project_path, self.manifest.as_ref())?;

        if self.config.backup_enabled {
            let manager = BackupManager::new(&self.template_root);
            if let Some(outcome) = manager.create_backup(self.config)? {
                files.push(outcome.backup_dir);
                files.push(outcome.metadata_path);
            }
        } else {
            debug!("Backup disabled");
        }
        Ok(())
    }

    fn create_directories(&mut self, files: &mut Vec<PathBuf>) -> Result<()> {
        for relative in DIRECTORY_SKELETON {
            let dir = self.project_path.join(relative);
            if dir.is_dir() {
                continue;
            }
            fs::create_dir_all(&dir).map_err(|e| DeployError::CreateDir {
                path: dir.display().to_string(),
                source: e,
            })?;
            debug!("Created directory: {}", dir.display());
            files.push(dir);
        }
        Ok(())
    }

    fn deploy_resources(&mut self, files: &mut Vec<PathBuf>) -> Result<()> {
        let template_version = self
            .manifest
            .as_ref()
            .map(|m| m.version.as_str())
            .unwrap_or(UNKNOWN_TEMPLATE_VERSION);
        let context = TemplateContext::from_config(self.config, template_version, &self.timestamp);
        let deployer = ResourceDeployer::new(TemplateSubstitutor::new(context));
        let overwrite = self.config.overwrite_existing;

        let mut report = DeployReport::default();
        let outcome = self.deploy_trees(&deployer, overwrite, &mut report);
        self.absorb(report, files);
        outcome
    }

    /// Deploy `.claude`, `.moai` and the memory file into one shared report
    fn deploy_trees(
        &self,
        deployer: &ResourceDeployer,
        overwrite: bool,
        report: &mut DeployReport,
    ) -> Result<()> {
        deployer.deploy(
            &self.template_root.join(".claude"),
            &self.project_path.join(".claude"),
            &DeployOptions {
                overwrite,
                fallback: claude_fallback(),
                ..Default::default()
            },
            report,
        )?;

        deployer.deploy(
            &self.template_root.join(".moai"),
            &self.project_path.join(".moai"),
            &DeployOptions {
                overwrite,
                exclude: MOAI_EXCLUDES.iter().map(|s| s.to_string()).collect(),
                verbatim: MOAI_VERBATIM.iter().map(|s| s.to_string()).collect(),
                fallback: moai_fallback(),
            },
            report,
        )?;

        let memory_src = self.template_root.join("CLAUDE.md");
        if memory_src.is_file() {
            deployer.deploy_file(
                &memory_src,
                &self.project_path.join("CLAUDE.md"),
                overwrite,
                report,
            )
        } else {
            warn!("Template memory file {} not found", memory_src.display());
            deployer.deploy_fallback(
                &self.project_path,
                &DeployOptions {
                    overwrite,
                    fallback: memory_file_fallback(),
                    ..Default::default()
                },
                report,
            )
        }
    }

    /// Record deployed files and rendering warnings, even from a failed deploy
    fn absorb(&mut self, report: DeployReport, files: &mut Vec<PathBuf>) {
        self.warnings
            .extend(report.warnings.iter().map(|failure| failure.to_string()));
        files.extend(report.files);
    }

    fn generate_configuration(&mut self, files: &mut Vec<PathBuf>) -> Result<()> {
        let project_config = ProjectConfig::from_installation(self.config, &self.timestamp);
        files.extend(write_json_if_absent(
            &self.project_path.join(PROJECT_CONFIG_PATH),
            &project_config,
        )?);

        let settings = ClaudeSettings::generated(self.config);
        files.extend(write_json_if_absent(
            &self.project_path.join(CLAUDE_SETTINGS_PATH),
            &settings,
        )?);

        if self.config.mode == InstallMode::Team {
            files.extend(write_text_if_absent(
                &self.project_path.join(GITIGNORE_PATH),
                GITIGNORE_CONTENT,
            )?);
        }
        Ok(())
    }

    fn validate(&mut self, files: &mut Vec<PathBuf>) -> Result<()> {
        PhaseValidator::validate_installation(&self.project_path)?;

        if Platform::detect().supports_posix_permissions() {
            for root in [".claude", ".moai"] {
                let root = self.project_path.join(root);
                match mark_shell_scripts_executable(&root) {
                    Ok(scripts) => debug!("Marked {} scripts executable", scripts.len()),
                    Err(e) => {
                        let message = format!(
                            "Could not set executable permissions under {}: {}",
                            root.display(),
                            e
                        );
                        warn!("{}", message);
                        self.warnings.push(message);
                    }
                }
            }
        }

        if self.config.mode == InstallMode::Team {
            match init_repository(&self.project_path) {
                Ok(GitInitOutcome::Initialized) => {
                    info!("Created initial commit");
                    files.push(self.project_path.join(".git"));
                }
                Ok(GitInitOutcome::AlreadyRepository) => {}
                Err(e) => {
                    let message = format!("Git initialization skipped: {}", e);
                    warn!("{}", message);
                    self.warnings.push(message);
                }
            }
        }
        Ok(())
    }
}
