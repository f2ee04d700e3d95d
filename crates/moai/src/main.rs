use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod ui;

#[tokio::main]
async fn main() -> Result<()> {
    let parsed = cli::Cli::parse();

    match parsed.dispatch().await {
        Ok(()) => Ok(()),
        Err(err) => {
            // The result was already printed; only the exit code is left
            if err
                .downcast_ref::<commands::init::InstallFailed>()
                .is_some()
            {
                std::process::exit(1);
            }
            Err(err)
        }
    }
}
