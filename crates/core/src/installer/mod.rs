//! Installation pipeline
//!
//! [`Orchestrator::execute_installation`] is the single entry point. It runs
//! the five phases strictly in order through [`PhaseRunner`], stops at the
//! first failure, and always returns an [`InstallationResult`] instead of an
//! error.
//!
//! ```no_run
//! use moai_core::config::InstallationConfig;
//! use moai_core::installer::Orchestrator;
//!
//! let config = InstallationConfig::new("./my-project", "my-project");
//! let result = Orchestrator::new().execute_installation(&config, None);
//! println!("success: {}", result.success);
//! ```
//!
//! Two runs must not target the same project path at the same time; no
//! locking is performed.

pub mod context;
pub mod phase;
pub mod phases;
pub mod result;
pub mod validator;

pub use context::{ContextManager, InstallationContext, PhaseStatus, ProgressCallback};
pub use phase::{InstallPhase, PhaseRunner, TOTAL_PHASES};
pub use result::{InstallationResult, ResultBuilder};
pub use validator::PhaseValidator;

use crate::config::InstallationConfig;
use crate::errors::Result;
use crate::observability::{install_run_span, TimedSpan};
use crate::path_safety::PathValidator;
use chrono::SecondsFormat;
use phases::InstallSession;
use std::time::Instant;
use tracing::{error, info};

/// Composes the installation phases
#[derive(Debug, Clone, Default)]
pub struct Orchestrator {
    path_validator: PathValidator,
}

impl Orchestrator {
    /// Orchestrator with the default path validator
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the full pipeline for `config`
    ///
    /// `progress` is called at every phase boundary with the number of
    /// completed phases and [`TOTAL_PHASES`].
    pub fn execute_installation(
        &self,
        config: &InstallationConfig,
        progress: Option<ProgressCallback<'_>>,
    ) -> InstallationResult {
        let started = Instant::now();
        let timed = TimedSpan::new(install_run_span(&config.project_path, config.mode.as_str()));
        let _guard = timed.span().enter();

        let mut manager = ContextManager::new(config.clone(), progress);
        let timestamp = manager
            .context()
            .started_at()
            .to_rfc3339_opts(SecondsFormat::Millis, true);
        let mut session = InstallSession::new(config, &self.path_validator, timestamp);

        info!(
            "Installing into {} ({} mode, templates: {})",
            config.project_path.display(),
            config.mode,
            session.template_root().display()
        );

        let outcome = Self::run_phases(&mut session, &mut manager);
        manager.record_warnings(session.take_warnings());

        match outcome {
            Ok(()) => {
                manager.notify_progress("Installation complete", TOTAL_PHASES);
                info!("Installation completed in {}ms", started.elapsed().as_millis());
                ResultBuilder::success(manager.into_context(), started)
            }
            Err(err) => {
                error!("Installation failed: {}", err);
                ResultBuilder::failure(manager.into_context(), &err, started)
            }
        }
    }

    fn run_phases(session: &mut InstallSession<'_>, manager: &mut ContextManager<'_>) -> Result<()> {
        for phase in InstallPhase::ALL {
            PhaseRunner::run(phase, manager, |files| session.run_phase(phase, files))?;
        }
        Ok(())
    }
}
