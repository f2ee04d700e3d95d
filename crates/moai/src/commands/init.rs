//! Init command implementation
//!
//! Builds an [`InstallationConfig`] from flags or a JSON file, runs the
//! installer and prints the result.

use crate::ui::progress::InstallProgress;
use crate::ui::summary::render_summary;
use anyhow::{Context, Result};
use moai_core::config::{InstallMode, InstallationConfig};
use moai_core::installer::ProgressCallback;
use moai_core::{InstallationResult, Orchestrator};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Signals a completed run that reported `success: false`
///
/// The result has already been printed; `main` maps this to exit code 1.
#[derive(Debug)]
pub struct InstallFailed;

impl std::fmt::Display for InstallFailed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Installation failed")
    }
}

impl std::error::Error for InstallFailed {}

/// Init command arguments
#[derive(Debug, Clone)]
pub struct InitArgs {
    pub path: Option<PathBuf>,
    pub name: Option<String>,
    pub mode: InstallMode,
    pub no_backup: bool,
    pub force: bool,
    pub template_path: Option<PathBuf>,
    pub features: Vec<String>,
    pub config: Option<PathBuf>,
    pub json: bool,
    pub progress_bar: bool,
}

/// Execute the init command
#[instrument(level = "debug", skip(args), fields(json = args.json))]
pub async fn execute_init(args: InitArgs) -> Result<()> {
    let config = build_config(&args)?;
    debug!(
        "Installing into {} as '{}' ({})",
        config.project_path.display(),
        config.project_name,
        config.mode
    );

    let interactive = args.progress_bar;
    let quiet = args.json;
    let result = tokio::task::spawn_blocking(move || {
        let progress = InstallProgress::new(interactive, quiet);
        let callback: ProgressCallback<'_> = &|message: &str, current: usize, total: usize| {
            progress.update(message, current, total);
        };
        let result = Orchestrator::new().execute_installation(&config, Some(callback));
        progress.finish(result.success);
        result
    })
    .await
    .context("Installation task panicked")?;

    print_result(&result, args.json)?;

    if result.success {
        Ok(())
    } else {
        Err(InstallFailed.into())
    }
}

fn print_result(result: &InstallationResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        print!("{}", render_summary(result));
    }
    Ok(())
}

/// Resolve the installation config for this invocation
///
/// A `--config` file is taken as-is; otherwise flags are mapped onto a
/// config whose name defaults to the target directory's name.
fn build_config(args: &InitArgs) -> Result<InstallationConfig> {
    if let Some(file) = &args.config {
        return InstallationConfig::from_file(file)
            .with_context(|| format!("Failed to load config from {}", file.display()));
    }

    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    let project_path = args.path.clone().unwrap_or_else(|| cwd.clone());
    let name = match &args.name {
        Some(name) => name.clone(),
        None => default_project_name(&cwd, &project_path),
    };

    let mut config = InstallationConfig::new(project_path, name);
    config.mode = args.mode;
    config.backup_enabled = !args.no_backup;
    config.overwrite_existing = args.force;
    config.template_path = args.template_path.clone();
    config.additional_features = args.features.clone();
    Ok(config)
}

fn default_project_name(cwd: &Path, project_path: &Path) -> String {
    let absolute = if project_path.is_absolute() {
        project_path.to_path_buf()
    } else {
        cwd.join(project_path)
    };
    absolute
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty() && n != "..")
        .unwrap_or_else(|| "project".to_string())
}
