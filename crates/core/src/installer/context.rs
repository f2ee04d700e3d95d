//! Run state for one installation
//!
//! [`InstallationContext`] is owned by a single orchestrator run and only
//! mutated through [`ContextManager`]. Phase outcomes are an append-only log:
//! the cumulative file and error lists are exactly the concatenation of the
//! per-phase lists.

use super::phase::{InstallPhase, TOTAL_PHASES};
use crate::config::InstallationConfig;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Progress callback: `(message, phases completed so far, total phases)`
pub type ProgressCallback<'a> = &'a dyn Fn(&str, usize, usize);

/// Outcome of one phase
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseStatus {
    pub phase: InstallPhase,
    pub completed: bool,
    #[serde(rename = "durationMs", serialize_with = "serialize_millis")]
    pub duration: Duration,
    pub errors: Vec<String>,
    pub files_created: Vec<PathBuf>,
}

fn serialize_millis<S: serde::Serializer>(
    duration: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

impl PhaseStatus {
    /// Status of a phase whose handler succeeded
    pub fn completed(phase: InstallPhase, duration: Duration, files_created: Vec<PathBuf>) -> Self {
        Self {
            phase,
            completed: true,
            duration,
            errors: Vec::new(),
            files_created,
        }
    }

    /// Status of a phase whose handler failed
    pub fn failed(
        phase: InstallPhase,
        duration: Duration,
        errors: Vec<String>,
        files_created: Vec<PathBuf>,
    ) -> Self {
        Self {
            phase,
            completed: false,
            duration,
            errors,
            files_created,
        }
    }
}

/// Mutable state of one run
#[derive(Debug, Clone)]
pub struct InstallationContext {
    config: InstallationConfig,
    started_at: DateTime<Utc>,
    phases: Vec<PhaseStatus>,
    all_files_created: Vec<PathBuf>,
    all_errors: Vec<String>,
    warnings: Vec<String>,
}

impl InstallationContext {
    pub fn config(&self) -> &InstallationConfig {
        &self.config
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn phases(&self) -> &[PhaseStatus] {
        &self.phases
    }

    pub fn all_files_created(&self) -> &[PathBuf] {
        &self.all_files_created
    }

    pub fn all_errors(&self) -> &[String] {
        &self.all_errors
    }

    /// Recoverable problems (e.g. skipped substitutions)
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Number of phases that completed successfully
    pub fn completed_phases(&self) -> usize {
        self.phases.iter().filter(|p| p.completed).count()
    }
}

/// Owns the run context and forwards progress notifications
pub struct ContextManager<'a> {
    context: InstallationContext,
    progress: Option<ProgressCallback<'a>>,
}

impl<'a> ContextManager<'a> {
    /// Create a manager around a fresh context
    pub fn new(config: InstallationConfig, progress: Option<ProgressCallback<'a>>) -> Self {
        Self {
            context: Self::create_initial_context(config),
            progress,
        }
    }

    /// Fresh context stamped with the current time
    pub fn create_initial_context(config: InstallationConfig) -> InstallationContext {
        InstallationContext {
            config,
            started_at: Utc::now(),
            phases: Vec::with_capacity(TOTAL_PHASES),
            all_files_created: Vec::new(),
            all_errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn context(&self) -> &InstallationContext {
        &self.context
    }

    pub fn into_context(self) -> InstallationContext {
        self.context
    }

    pub fn completed_phases(&self) -> usize {
        self.context.completed_phases()
    }

    /// Append a phase outcome and fold it into the cumulative lists
    ///
    /// A status beyond the fixed phase count is dropped.
    pub fn record_phase(&mut self, status: PhaseStatus) {
        if self.context.phases.len() >= TOTAL_PHASES {
            warn!(
                "Ignoring status for phase {}: all {} phases already recorded",
                status.phase, TOTAL_PHASES
            );
            return;
        }

        self.context
            .all_files_created
            .extend(status.files_created.iter().cloned());
        self.context.all_errors.extend(status.errors.iter().cloned());
        self.context.phases.push(status);
    }

    /// Record recoverable problems collected during the run
    pub fn record_warnings<I>(&mut self, warnings: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.context.warnings.extend(warnings);
    }

    /// Invoke the progress callback, if any
    pub fn notify_progress(&self, message: &str, current: usize) {
        if let Some(callback) = self.progress {
            callback(message, current, TOTAL_PHASES);
        }
    }
}

impl std::fmt::Debug for ContextManager<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextManager")
            .field("context", &self.context)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(phase: InstallPhase, file: &str) -> PhaseStatus {
        PhaseStatus::completed(phase, Duration::from_millis(3), vec![PathBuf::from(file)])
    }

    #[test]
    fn test_initial_context_is_empty() {
        let context = ContextManager::create_initial_context(InstallationConfig::new("/p", "p"));
        assert!(context.phases().is_empty());
        assert!(context.all_files_created().is_empty());
        assert!(context.all_errors().is_empty());
        assert_eq!(context.config().project_name, "p");
    }

    #[test]
    fn test_cumulative_lists_are_union_of_phase_lists() {
        let mut manager = ContextManager::new(InstallationConfig::new("/p", "p"), None);
        manager.record_phase(status(InstallPhase::Preparation, "/p/a"));
        manager.record_phase(PhaseStatus::failed(
            InstallPhase::Directories,
            Duration::ZERO,
            vec!["directories failed: boom".to_string()],
            vec![PathBuf::from("/p/b")],
        ));

        let context = manager.context();
        let from_phases: Vec<PathBuf> = context
            .phases()
            .iter()
            .flat_map(|p| p.files_created.clone())
            .collect();
        assert_eq!(context.all_files_created(), from_phases.as_slice());
        assert_eq!(context.all_errors(), &["directories failed: boom".to_string()]);
        assert_eq!(context.completed_phases(), 1);
    }

    #[test]
    fn test_phase_log_is_bounded() {
        let mut manager = ContextManager::new(InstallationConfig::new("/p", "p"), None);
        for phase in InstallPhase::ALL {
            manager.record_phase(status(phase, "/p/x"));
        }
        manager.record_phase(status(InstallPhase::Validation, "/p/extra"));

        assert_eq!(manager.context().phases().len(), TOTAL_PHASES);
        assert_eq!(manager.context().all_files_created().len(), TOTAL_PHASES);
    }

    #[test]
    fn test_phase_status_serialization() {
        let json = serde_json::to_value(status(InstallPhase::Resources, "/p/CLAUDE.md")).unwrap();
        assert_eq!(json["phase"], "resources");
        assert_eq!(json["completed"], true);
        assert_eq!(json["durationMs"], 3);
        assert_eq!(json["filesCreated"][0], "/p/CLAUDE.md");
    }
}
