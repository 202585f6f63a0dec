//! Sluice - in-process streaming pipelines
//!
//! # Usage
//!
//! ```bash
//! # Count words from stdin with default settings
//! cat book.txt | sluice run
//!
//! # Tune stages and queues from a config file
//! sluice run --config configs/sluice.toml --input book.txt
//! ```

mod cmd;
mod logging;
mod wordcount;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Sluice - in-process streaming pipelines
#[derive(Parser, Debug)]
#[command(name = "sluice")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error). Overrides config file.
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the word-count pipeline
    Run(cmd::run::RunArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => {
            let config = cmd::run::load_config(args.config.as_deref())?;
            logging::init(&config.log, cli.log_level.as_deref())?;
            cmd::run::run(args, config).await
        }
    }
}
