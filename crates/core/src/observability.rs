//! Observability utilities for standardized tracing spans and structured fields
//!
//! Every installation run opens one `install.run` span; each phase, backup
//! and template deployment nests its own span beneath it so log consumers can
//! attribute events without parsing messages.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::time::Instant;
use tracing::{span, Span};

/// Canonical span names
pub mod spans {
    pub const INSTALL_RUN: &str = "install.run";
    pub const INSTALL_PHASE: &str = "install.phase";
    pub const BACKUP_CREATE: &str = "backup.create";
    pub const TEMPLATE_DEPLOY: &str = "template.deploy";
}

/// Common field names for structured logging
pub mod fields {
    pub const PROJECT_ID: &str = "project_id";
    pub const PHASE: &str = "phase";
    pub const DURATION_MS: &str = "duration_ms";
}

/// Generate a deterministic project ID from a path
///
/// 8 hex characters hashed from the canonical path (or the path as given
/// when it does not exist yet).
pub fn project_id(project_path: &Path) -> String {
    let canonical_path = project_path
        .canonicalize()
        .unwrap_or_else(|_| project_path.to_path_buf());

    let mut hasher = DefaultHasher::new();
    canonical_path.hash(&mut hasher);
    let hex = format!("{:016x}", hasher.finish());
    hex[..8].to_string()
}

/// Start the top-level span for one orchestrator run
pub fn install_run_span(project_path: &Path, mode: &str) -> Span {
    let project_id = project_id(project_path);

    span!(
        target: "moai_core::observability",
        tracing::Level::INFO,
        spans::INSTALL_RUN,
        duration_ms = tracing::field::Empty,
        project_id = %project_id,
        mode = %mode
    )
}

/// Start a span for a single pipeline phase
pub fn phase_span(phase: &str) -> Span {
    span!(
        target: "moai_core::observability",
        tracing::Level::INFO,
        spans::INSTALL_PHASE,
        duration_ms = tracing::field::Empty,
        phase = %phase
    )
}

/// Start a span for backup creation
pub fn backup_span(project_path: &Path) -> Span {
    let project_id = project_id(project_path);

    span!(
        target: "moai_core::observability",
        tracing::Level::INFO,
        spans::BACKUP_CREATE,
        duration_ms = tracing::field::Empty,
        project_id = %project_id
    )
}

/// Start a span for deploying one template tree
pub fn template_deploy_span(template_root: &Path) -> Span {
    span!(
        target: "moai_core::observability",
        tracing::Level::DEBUG,
        spans::TEMPLATE_DEPLOY,
        duration_ms = tracing::field::Empty,
        template_root = %template_root.display()
    )
}

/// Timer that records `duration_ms` on a span when dropped
pub struct TimedSpan {
    span: Span,
    start: Instant,
}

impl TimedSpan {
    /// Wrap a span and start timing
    pub fn new(span: Span) -> Self {
        Self {
            span,
            start: Instant::now(),
        }
    }

    /// Access the wrapped span (e.g. to enter it)
    pub fn span(&self) -> &Span {
        &self.span
    }
}

impl Drop for TimedSpan {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed().as_millis() as u64;
        self.span.record(fields::DURATION_MS, elapsed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_project_id_is_stable_and_short() {
        let temp = TempDir::new().unwrap();
        let first = project_id(temp.path());
        let second = project_id(temp.path());

        assert_eq!(first, second);
        assert_eq!(first.len(), 8);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_project_id_differs_between_paths() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        assert_ne!(project_id(a.path()), project_id(b.path()));
    }

    #[test]
    fn test_timed_span_records_on_drop() {
        let timed = TimedSpan::new(phase_span("directories"));
        let _guard = timed.span().enter();
        // Dropping must not panic even without a subscriber
    }
}
