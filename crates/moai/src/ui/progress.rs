use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use moai_core::installer::TOTAL_PHASES;

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{bar:30.green/white} {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

fn done_style() -> ProgressStyle {
    ProgressStyle::with_template("{msg}").unwrap_or_else(|_| ProgressStyle::default_bar())
}

/// Reports installation progress on stderr
///
/// On a terminal this is an indicatif bar sized to the phase count. Otherwise
/// every notification becomes a plain `[n/5] message` line.
#[derive(Debug)]
pub enum InstallProgress {
    Bar(ProgressBar),
    Lines,
    Silent,
}

impl InstallProgress {
    pub fn new(interactive: bool, quiet: bool) -> Self {
        if quiet {
            return Self::Silent;
        }
        if interactive {
            let pb = ProgressBar::new(TOTAL_PHASES as u64);
            pb.set_style(bar_style());
            Self::Bar(pb)
        } else {
            Self::Lines
        }
    }

    pub fn update(&self, message: &str, current: usize, total: usize) {
        match self {
            Self::Bar(pb) => {
                pb.set_length(total as u64);
                pb.set_position(current as u64);
                pb.set_message(style(message).yellow().to_string());
            }
            Self::Lines => eprintln!("[{}/{}] {}", current, total, message),
            Self::Silent => {}
        }
    }

    pub fn finish(&self, success: bool) {
        if let Self::Bar(pb) = self {
            pb.set_style(done_style());
            if success {
                pb.finish_with_message(style("Installation complete").green().to_string());
            } else {
                pb.finish_with_message(style("Installation failed").red().to_string());
            }
        }
    }
}

impl Drop for InstallProgress {
    fn drop(&mut self) {
        if let Self::Bar(pb) = self {
            if !pb.is_finished() {
                pb.finish_and_clear();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_wins_over_interactive() {
        assert!(matches!(
            InstallProgress::new(true, true),
            InstallProgress::Silent
        ));
        assert!(matches!(
            InstallProgress::new(false, false),
            InstallProgress::Lines
        ));
    }

    #[test]
    fn test_bar_tracks_position() {
        let progress = InstallProgress::Bar(ProgressBar::hidden());
        progress.update("Deploying templates", 2, TOTAL_PHASES);
        if let InstallProgress::Bar(pb) = &progress {
            assert_eq!(pb.position(), 2);
            assert_eq!(pb.length(), Some(TOTAL_PHASES as u64));
        }
        progress.finish(true);
    }
}
