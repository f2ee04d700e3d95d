//! Final, reportable outcome of an installation run

use super::context::{InstallationContext, PhaseStatus};
use crate::config::{InstallMode, InstallationConfig};
use crate::errors::MoaiError;
use chrono::SecondsFormat;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;

/// Remediation step attached to every failed run
pub const RETRY_STEP: &str = "Fix the errors above and run the installation again";

/// Result of [`Orchestrator::execute_installation`](super::Orchestrator::execute_installation)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallationResult {
    pub success: bool,
    pub project_path: PathBuf,
    pub files_created: Vec<PathBuf>,
    pub errors: Vec<String>,
    /// Recoverable problems that did not fail the run
    pub warnings: Vec<String>,
    pub next_steps: Vec<String>,
    pub config: InstallationConfig,
    pub phases: Vec<PhaseStatus>,
    /// Run start, RFC 3339
    pub timestamp: String,
    /// Wall-clock duration in milliseconds
    #[serde(rename = "duration")]
    pub duration_ms: u64,
}

/// Builds an [`InstallationResult`] from the final run context
#[derive(Debug, Default, Clone, Copy)]
pub struct ResultBuilder;

impl ResultBuilder {
    /// Result of a run where every phase completed
    pub fn success(context: InstallationContext, started: Instant) -> InstallationResult {
        let next_steps = success_steps(context.config().mode);
        Self::build(context, started, true, None, next_steps)
    }

    /// Result of a run aborted by `error`
    pub fn failure(
        context: InstallationContext,
        error: &MoaiError,
        started: Instant,
    ) -> InstallationResult {
        Self::build(
            context,
            started,
            false,
            Some(format!("Installation failed: {}", error)),
            vec![RETRY_STEP.to_string()],
        )
    }

    fn build(
        context: InstallationContext,
        started: Instant,
        success: bool,
        failure: Option<String>,
        next_steps: Vec<String>,
    ) -> InstallationResult {
        let mut errors = context.all_errors().to_vec();
        errors.extend(failure);

        InstallationResult {
            success,
            project_path: context.config().project_path.clone(),
            files_created: context.all_files_created().to_vec(),
            errors,
            warnings: context.warnings().to_vec(),
            next_steps,
            config: context.config().clone(),
            phases: context.phases().to_vec(),
            timestamp: context
                .started_at()
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }
}

fn success_steps(mode: InstallMode) -> Vec<String> {
    let mut steps = vec![
        "Describe your product in .moai/project/product.md".to_string(),
        "Review CLAUDE.md and adjust the project guidelines".to_string(),
        "Start your first SPEC with /moai:1-spec".to_string(),
    ];
    if mode == InstallMode::Team {
        steps.push("Push the initial commit and share the repository with your team".to_string());
    }
    steps
}
