//! `ejabberd-admin`: administrative verbs for an ejabberd instance.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use ejabberd_admin::commands::{self, exit, Command, Context};
use ejabberd_admin::config::{self, DEFAULT_CONFIG_PATH};
use ejabberd_admin::observability::init_logging;

#[derive(Parser)]
#[command(name = "ejabberd-admin")]
#[command(about = "Configuration and lifecycle management for ejabberd", long_about = None)]
struct Cli {
    /// Tool configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match config::load_or_default(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            init_logging("info");
            tracing::error!(path = ?cli.config, error = %e, "Configuration rejected");
            eprintln!("error: {e}");
            return ExitCode::from(exit::TOOL_CONFIG_INVALID);
        }
    };
    init_logging(&config.logging.level);

    tracing::debug!(command = ?cli.command, config = ?cli.config, "Running command");
    let ctx = Context::from_config(config);

    match commands::run(&ctx, &cli.command).await {
        Ok(outcome) => {
            if let Some(output) = &outcome.output {
                println!("{output}");
            }
            for warning in &outcome.warnings {
                eprintln!("warning: {warning}");
            }
            ExitCode::from(outcome.exit_code)
        }
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}
