//! Platform detection and permission helpers
//!
//! Executable bits only exist on POSIX systems; on Windows every helper here
//! is a successful no-op.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Extensions that receive the executable bit when deployed
pub const EXECUTABLE_EXTENSIONS: &[&str] = &["sh", "bash", "zsh", "py", "cjs", "mjs"];

/// Extensions treated as shell scripts by post-install validation
const SHELL_EXTENSIONS: &[&str] = &["sh", "bash", "zsh"];

/// Platform types the installer distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Linux and other Unix-like systems
    Linux,
    /// macOS
    MacOS,
    /// Native Windows
    Windows,
}

impl Platform {
    /// Detect the current platform
    pub fn detect() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOS
        } else {
            Platform::Linux
        }
    }

    /// Whether the platform has POSIX permission bits
    pub fn supports_posix_permissions(self) -> bool {
        !matches!(self, Platform::Windows)
    }
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Whether a deployed file should be executable
pub fn is_executable_script(path: &Path) -> bool {
    has_extension(path, EXECUTABLE_EXTENSIONS)
}

/// Add `u+x,g+x,o+x` to a file's permissions
#[cfg(unix)]
pub fn set_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(path)?.permissions();
    let mode = permissions.mode();
    if mode & 0o111 != 0o111 {
        permissions.set_mode(mode | 0o755);
        fs::set_permissions(path, permissions)?;
        debug!("Set executable permission on {}", path.display());
    }
    Ok(())
}

/// No-op on platforms without executable bits
#[cfg(not(unix))]
pub fn set_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Recursively mark every shell script under `root` executable
///
/// Returns the scripts that were visited. A missing root yields an empty list.
#[instrument(level = "debug")]
pub fn mark_shell_scripts_executable(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut scripts = Vec::new();
    if !root.is_dir() {
        return Ok(scripts);
    }
    collect_shell_scripts(root, &mut scripts)?;

    if Platform::detect().supports_posix_permissions() {
        for script in &scripts {
            set_executable(script)?;
        }
    }
    Ok(scripts)
}

fn collect_shell_scripts(dir: &Path, scripts: &mut Vec<PathBuf>) -> io::Result<()> {
    let mut entries = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_shell_scripts(&path, scripts)?;
        } else if file_type.is_file() && has_extension(&path, SHELL_EXTENSIONS) {
            scripts.push(path);
        }
    }
    Ok(())
}
