//! Git repository bootstrap for team-mode projects
//!
//! Everything here is best-effort: callers log a [`GitError`] as a warning and
//! carry on. No timeout is applied to the spawned commands.

use crate::errors::GitError;
use std::path::Path;
use std::process::Command;
use tracing::{debug, info, instrument};

/// Message of the commit created after installation
pub const INITIAL_COMMIT_MESSAGE: &str = "chore: initialize MoAI project structure";

/// Outcome of [`init_repository`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitInitOutcome {
    /// A new repository was created and the installed files committed
    Initialized,
    /// The project already was a repository; nothing was done
    AlreadyRepository,
}

/// Verify the git binary is available
pub fn check_git_installed() -> Result<(), GitError> {
    match Command::new("git").arg("--version").output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(output) => Err(GitError::CommandFailed {
            command: "--version".to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }),
        Err(e) => {
            debug!("git binary not found: {}", e);
            Err(GitError::NotInstalled)
        }
    }
}

/// Run `git <args>` inside `project_path`
fn run_git(project_path: &Path, args: &[&str]) -> Result<(), GitError> {
    debug!("Running git {} in {}", args.join(" "), project_path.display());

    let output = Command::new("git")
        .args(args)
        .current_dir(project_path)
        .output()
        .map_err(|_| GitError::NotInstalled)?;

    if output.status.success() {
        Ok(())
    } else {
        Err(GitError::CommandFailed {
            command: args.join(" "),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Initialize a repository and commit the installed files
///
/// Existing repositories are left untouched.
#[instrument(level = "debug")]
pub fn init_repository(project_path: &Path) -> Result<GitInitOutcome, GitError> {
    if project_path.join(".git").exists() {
        debug!("{} is already a git repository", project_path.display());
        return Ok(GitInitOutcome::AlreadyRepository);
    }

    check_git_installed()?;
    run_git(project_path, &["init"])?;
    run_git(project_path, &["add", "."])?;
    run_git(project_path, &["commit", "-m", INITIAL_COMMIT_MESSAGE])?;

    info!("Initialized git repository in {}", project_path.display());
    Ok(GitInitOutcome::Initialized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_existing_repository_untouched() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join(".git")).unwrap();

        assert_eq!(
            init_repository(temp.path()).unwrap(),
            GitInitOutcome::AlreadyRepository
        );
    }

    #[test]
    fn test_git_error_display() {
        let err = GitError::CommandFailed {
            command: "commit -m x".to_string(),
            stderr: "Please tell me who you are".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "git commit -m x failed: Please tell me who you are"
        );
    }
}
