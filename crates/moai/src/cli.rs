use crate::commands::init::{execute_init, InitArgs};
use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use moai_core::config::InstallMode;
use std::io::IsTerminal;
use std::path::PathBuf;

/// Log format options
#[derive(Debug, Clone, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    Text,
    /// JSON structured format
    Json,
}

/// Log level options
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    /// Error messages only
    Error,
    /// Warning and error messages
    Warn,
    /// Informational messages and above
    Info,
    /// Debug messages and above
    Debug,
    /// All messages including trace
    Trace,
}

impl LogLevel {
    fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Installation mode options
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ModeOption {
    /// Single developer
    Personal,
    /// Shared repository with .gitignore and an initial commit
    Team,
}

impl From<ModeOption> for InstallMode {
    fn from(mode: ModeOption) -> Self {
        match mode {
            ModeOption::Personal => InstallMode::Personal,
            ModeOption::Team => InstallMode::Team,
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Install MoAI configuration and templates into a project
    Init {
        /// Project directory (defaults to the current directory)
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,

        /// Project name (defaults to the directory name)
        #[arg(long)]
        name: Option<String>,

        /// Installation mode
        #[arg(long, value_enum, default_value = "personal")]
        mode: ModeOption,

        /// Do not back up existing .claude/, .moai/ or CLAUDE.md
        #[arg(long)]
        no_backup: bool,

        /// Overwrite files that already exist
        #[arg(long)]
        force: bool,

        /// Template directory to deploy from (overrides MOAI_TEMPLATES_DIR)
        #[arg(long, value_name = "DIR")]
        template_path: Option<PathBuf>,

        /// Additional feature to record in the project config (repeatable)
        #[arg(long = "feature", value_name = "NAME", action = clap::ArgAction::Append)]
        features: Vec<String>,

        /// Read the installation config from a JSON file instead of flags
        #[arg(
            long,
            value_name = "FILE",
            conflicts_with_all = ["path", "name", "no_backup", "force", "template_path", "features"]
        )]
        config: Option<PathBuf>,

        /// Print the installation result as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Parser, Debug)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version,
    about = "MoAI project installer",
    long_about = "MoAI project installer\n\nScaffolds spec-driven development configuration, templates and memory files into a project.",
    color = clap::ColorChoice::Auto
)]
pub struct Cli {
    /// Log format (text or json, defaults to text, can be set via MOAI_LOG_FORMAT env var)
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Log level
    #[arg(long, global = true, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Initialize logging and run the selected subcommand
    ///
    /// Without a subcommand a short hint is printed and `Ok(())` is returned.
    pub async fn dispatch(self) -> Result<()> {
        let log_format = match self.log_format {
            Some(LogFormat::Text) => Some("text"),
            Some(LogFormat::Json) => Some("json"),
            None => None,
        };

        let stderr_is_tty = std::io::stderr().is_terminal();
        let json_output = matches!(self.command, Some(Commands::Init { json: true, .. }));
        let progress_bar = stderr_is_tty && !json_output && !matches!(log_format, Some("json"));

        let mut log_level = self.log_level.as_str();
        if std::env::var_os(moai_core::logging::LOG_FILTER_ENV).is_none()
            && std::env::var_os("RUST_LOG").is_none()
        {
            // Keep the progress bar readable unless the user asked for more
            if progress_bar && matches!(self.log_level, LogLevel::Info) {
                log_level = "warn";
            }
            std::env::set_var("RUST_LOG", format!("moai={},moai_core={}", log_level, log_level));
        }
        moai_core::logging::init(log_format)?;
        tracing::debug!("CLI initialized with log level: {}", log_level);

        match self.command {
            Some(Commands::Init {
                path,
                name,
                mode,
                no_backup,
                force,
                template_path,
                features,
                config,
                json,
            }) => {
                execute_init(InitArgs {
                    path,
                    name,
                    mode: mode.into(),
                    no_backup,
                    force,
                    template_path,
                    features,
                    config,
                    json,
                    progress_bar,
                })
                .await
            }
            None => {
                println!("MoAI project installer");
                println!("Run 'moai --help' to see available commands.");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_defaults() {
        let cli = Cli::parse_from(["moai", "init"]);
        match cli.command {
            Some(Commands::Init {
                path,
                mode,
                no_backup,
                force,
                json,
                ..
            }) => {
                assert!(path.is_none());
                assert_eq!(mode, ModeOption::Personal);
                assert!(!no_backup);
                assert!(!force);
                assert!(!json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_init_repeated_features() {
        let cli = Cli::parse_from([
            "moai", "init", "proj", "--mode", "team", "--feature", "tdd", "--feature", "docs",
        ]);
        match cli.command {
            Some(Commands::Init {
                path,
                mode,
                features,
                ..
            }) => {
                assert_eq!(path, Some(PathBuf::from("proj")));
                assert_eq!(InstallMode::from(mode), InstallMode::Team);
                assert_eq!(features, vec!["tdd", "docs"]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_config_conflicts_with_flags() {
        let result = Cli::try_parse_from(["moai", "init", "--config", "moai.json", "--force"]);
        assert!(result.is_err());
    }
}
