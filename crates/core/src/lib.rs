//! Core library for the MoAI installer
//!
//! This crate contains the installation pipeline, template deployment,
//! backup lifecycle, path safety checks, logging, and error handling.

pub mod backup;
pub mod config;
pub mod errors;
pub mod installer;
pub mod logging;
pub mod observability;
pub mod path_safety;
pub mod platform;
pub mod project_config;
pub mod semver_utils;
pub mod substitution;
pub mod templates;
pub mod vcs;

pub use config::{InstallMode, InstallationConfig};
pub use errors::{MoaiError, Result};
pub use installer::{InstallationResult, Orchestrator};

/// Get the version of the core library
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let version = version();
        assert!(!version.is_empty());
        assert!(version.contains('.'));
    }
}
