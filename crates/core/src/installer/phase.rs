//! Pipeline phases and the phase runner
//!
//! Every phase goes through [`PhaseRunner::run`], which times it, reports
//! progress, and appends exactly one [`PhaseStatus`] to the run context,
//! whether the handler succeeds or fails. A handler failure is wrapped in
//! [`MoaiError::PhaseFailed`] and returned; the pipeline never continues past
//! a failed phase.

use super::context::{ContextManager, PhaseStatus};
use crate::errors::{MoaiError, Result};
use crate::observability::{phase_span, TimedSpan};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info};

/// Number of phases in a run
pub const TOTAL_PHASES: usize = 5;

/// One step of the installation pipeline, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallPhase {
    /// Path safety, preconditions and backup
    Preparation,
    /// Directory skeleton
    Directories,
    /// Template deployment
    Resources,
    /// Generated configuration files
    Configuration,
    /// Post-install checks and VCS bootstrap
    Validation,
}

impl InstallPhase {
    /// All phases in execution order
    pub const ALL: [InstallPhase; TOTAL_PHASES] = [
        InstallPhase::Preparation,
        InstallPhase::Directories,
        InstallPhase::Resources,
        InstallPhase::Configuration,
        InstallPhase::Validation,
    ];

    /// Get the phase name as string
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallPhase::Preparation => "preparation",
            InstallPhase::Directories => "directories",
            InstallPhase::Resources => "resources",
            InstallPhase::Configuration => "configuration",
            InstallPhase::Validation => "validation",
        }
    }

    /// Progress message shown when the phase starts
    pub fn label(&self) -> &'static str {
        match self {
            InstallPhase::Preparation => "Preparing installation",
            InstallPhase::Directories => "Creating directory structure",
            InstallPhase::Resources => "Deploying templates",
            InstallPhase::Configuration => "Generating configuration",
            InstallPhase::Validation => "Validating installation",
        }
    }
}

impl fmt::Display for InstallPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runs a single phase and records its outcome
#[derive(Debug, Default, Clone, Copy)]
pub struct PhaseRunner;

impl PhaseRunner {
    /// Execute `handler` as `phase`
    ///
    /// The handler pushes every path it creates into the accumulator it is
    /// given; on failure, whatever it pushed before failing is still
    /// recorded on the failed [`PhaseStatus`].
    pub fn run<F>(phase: InstallPhase, manager: &mut ContextManager<'_>, handler: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<PathBuf>) -> Result<()>,
    {
        let timed = TimedSpan::new(phase_span(phase.as_str()));
        let _guard = timed.span().enter();

        manager.notify_progress(phase.label(), manager.completed_phases());
        info!("Starting phase: {}", phase);

        let start = Instant::now();
        let mut files = Vec::new();
        let outcome = handler(&mut files);
        let duration = start.elapsed();

        match outcome {
            Ok(()) => {
                info!(
                    "Completed phase: {} ({} paths, {}ms)",
                    phase,
                    files.len(),
                    duration.as_millis()
                );
                manager.record_phase(PhaseStatus::completed(phase, duration, files));
                Ok(())
            }
            Err(source) => {
                let err = MoaiError::PhaseFailed {
                    phase: phase.as_str().to_string(),
                    source: Box::new(source),
                };
                error!("{}", err);
                manager.record_phase(PhaseStatus::failed(
                    phase,
                    duration,
                    vec![err.to_string()],
                    files,
                ));
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InstallationConfig;
    use crate::errors::ValidationError;
    use std::cell::RefCell;

    #[test]
    fn test_phase_order_and_names() {
        let names: Vec<_> = InstallPhase::ALL.iter().map(|p| p.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "preparation",
                "directories",
                "resources",
                "configuration",
                "validation"
            ]
        );
        assert_eq!(
            serde_json::to_string(&InstallPhase::Resources).unwrap(),
            "\"resources\""
        );
    }

    #[test]
    fn test_run_success_records_completed_status() {
        let config = InstallationConfig::new("/tmp/p", "p");
        let mut manager = ContextManager::new(config, None);

        PhaseRunner::run(InstallPhase::Directories, &mut manager, |files| {
            files.push(PathBuf::from("/tmp/p/.moai"));
            Ok(())
        })
        .unwrap();

        let context = manager.context();
        assert_eq!(context.phases().len(), 1);
        assert!(context.phases()[0].completed);
        assert!(context.phases()[0].errors.is_empty());
        assert_eq!(context.all_files_created(), &[PathBuf::from("/tmp/p/.moai")]);
    }

    #[test]
    fn test_run_failure_keeps_partial_files_and_rethrows() {
        let config = InstallationConfig::new("/tmp/p", "p");
        let mut manager = ContextManager::new(config, None);

        let err = PhaseRunner::run(InstallPhase::Validation, &mut manager, |files| {
            files.push(PathBuf::from("/tmp/p/CLAUDE.md"));
            Err(ValidationError::MissingPath {
                path: ".moai/config.json".to_string(),
            }
            .into())
        })
        .unwrap_err();

        assert_eq!(err.failed_phase(), Some("validation"));
        let status = &manager.context().phases()[0];
        assert!(!status.completed);
        assert_eq!(status.files_created, vec![PathBuf::from("/tmp/p/CLAUDE.md")]);
        assert_eq!(
            status.errors,
            vec!["validation failed: Validation error: Required path is missing: .moai/config.json"]
        );
        assert_eq!(manager.context().all_errors(), status.errors.as_slice());
    }

    #[test]
    fn test_run_reports_progress_before_handler() {
        let calls = RefCell::new(Vec::new());
        let callback = |message: &str, current: usize, total: usize| {
            calls.borrow_mut().push((message.to_string(), current, total));
        };
        let config = InstallationConfig::new("/tmp/p", "p");
        let mut manager = ContextManager::new(config, Some(&callback));

        PhaseRunner::run(InstallPhase::Preparation, &mut manager, |_| Ok(())).unwrap();
        PhaseRunner::run(InstallPhase::Directories, &mut manager, |_| Ok(())).unwrap();

        assert_eq!(
            calls.into_inner(),
            vec![
                ("Preparing installation".to_string(), 0, TOTAL_PHASES),
                ("Creating directory structure".to_string(), 1, TOTAL_PHASES),
            ]
        );
    }
}
