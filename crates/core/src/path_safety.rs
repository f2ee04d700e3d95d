//! Project path safety gate
//!
//! [`PathValidator`] decides whether a target path may be written to. It is
//! a pure check: no filesystem mutation, and every internal failure (empty
//! input, unresolvable working directory) is reported as "unsafe".
//!
//! A path is safe when all of the following hold:
//! - no `..` segment appears in the raw input (including percent-encoded forms)
//! - no `..` segment remains in the resolved absolute form
//! - the resolved form is inside the system temp directory, or it is inside
//!   an allowed root (the working directory by default) and not inside a
//!   denied system directory

use crate::errors::PathSafetyError;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

#[cfg(windows)]
const DENIED_ROOTS: &[&str] = &[
    r"C:\Windows",
    r"C:\Program Files",
    r"C:\Program Files (x86)",
    r"C:\ProgramData",
];

#[cfg(target_os = "macos")]
const DENIED_ROOTS: &[&str] = &[
    "/etc",
    "/private/etc",
    "/usr/bin",
    "/usr/sbin",
    "/bin",
    "/sbin",
    "/System",
    "/Library",
    "/dev",
];

#[cfg(all(unix, not(target_os = "macos")))]
const DENIED_ROOTS: &[&str] = &[
    "/etc", "/usr/bin", "/usr/sbin", "/bin", "/sbin", "/boot", "/sys", "/proc", "/dev",
];

/// Validates installation target paths
#[derive(Debug, Clone)]
pub struct PathValidator {
    allowed_roots: Vec<PathBuf>,
    denied_roots: Vec<PathBuf>,
    temp_root: PathBuf,
}

impl Default for PathValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl PathValidator {
    /// Validator allowing the current working directory and the temp directory
    pub fn new() -> Self {
        let allowed_roots = std::env::current_dir().into_iter().collect();
        Self {
            allowed_roots,
            denied_roots: DENIED_ROOTS.iter().map(PathBuf::from).collect(),
            temp_root: std::env::temp_dir(),
        }
    }

    /// Returns true if `path` may be used as an installation target
    pub fn is_safe(&self, path: &Path) -> bool {
        self.check(path).is_ok()
    }

    /// Validate `path` and return its resolved absolute form
    pub fn check(&self, path: &Path) -> Result<PathBuf, PathSafetyError> {
        let unsafe_path = || PathSafetyError::Unsafe {
            path: path.display().to_string(),
        };

        let raw = path.to_string_lossy();
        if raw.trim().is_empty() || has_traversal_segment(&raw) {
            debug!("Rejecting path with traversal or empty input: '{}'", raw);
            return Err(unsafe_path());
        }

        let resolved = resolve(path).ok_or_else(unsafe_path)?;
        if has_traversal_segment(&resolved.to_string_lossy()) {
            debug!("Rejecting resolved path with traversal: {}", resolved.display());
            return Err(unsafe_path());
        }

        if is_within(&resolved, std::slice::from_ref(&self.temp_root)) {
            return Ok(resolved);
        }

        if is_within(&resolved, &self.denied_roots) {
            debug!("Rejecting path inside system directory: {}", resolved.display());
            return Err(unsafe_path());
        }

        if is_within(&resolved, &self.allowed_roots) {
            return Ok(resolved);
        }

        debug!(
            "Rejecting path outside allowed roots: {}",
            resolved.display()
        );
        Err(unsafe_path())
    }
}

/// Detect `..` segments, also when percent-encoded
fn has_traversal_segment(raw: &str) -> bool {
    let decoded = raw
        .replace("%2e", ".")
        .replace("%2E", ".")
        .replace("%2f", "/")
        .replace("%2F", "/")
        .replace("%5c", "\\")
        .replace("%5C", "\\");

    decoded
        .split(&['/', '\\'][..])
        .any(|segment| segment == "..")
}

/// Make `path` absolute and resolve symlinks of its longest existing prefix
///
/// Returns `None` if the working directory cannot be determined.
fn resolve(path: &Path) -> Option<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().ok()?.join(path)
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => return None,
            other => normalized.push(other.as_os_str()),
        }
    }

    // Canonicalize the deepest ancestor that exists, then re-append the rest
    let mut existing = normalized.as_path();
    let mut remainder = Vec::new();
    loop {
        if let Ok(canonical) = existing.canonicalize() {
            let mut resolved = canonical;
            for part in remainder.iter().rev() {
                resolved.push(part);
            }
            return Some(resolved);
        }
        remainder.push(existing.file_name()?.to_os_string());
        existing = existing.parent()?;
    }
}

/// Check `path` against roots in both their literal and canonical forms
fn is_within(path: &Path, roots: &[PathBuf]) -> bool {
    roots.iter().any(|root| {
        if path.starts_with(root) {
            return true;
        }
        root.canonicalize()
            .map(|canonical| path.starts_with(canonical))
            .unwrap_or(false)
    })
}
