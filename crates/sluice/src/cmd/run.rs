//! Run command - count words from a file or stdin

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use sluice_config::Config;
use sluice_protocol::CancellationToken;
use tokio::io::{AsyncBufRead, BufReader};
use tracing::{info, warn};

use crate::wordcount::{self, Report};

/// Number of words listed per route in the summary
const TOP_WORDS: usize = 10;

/// Run command arguments
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Input file (reads stdin when omitted)
    #[arg(short, long)]
    pub input: Option<PathBuf>,
}

/// Load config from file or use defaults
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(Config::default()),
    }
}

/// Run the pipeline until input ends, a stage fails, or Ctrl+C
pub async fn run(args: RunArgs, config: Config) -> Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "starting sluice");

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match &args.input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    let (pipeline, report) = wordcount::build(&config, reader)?;

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    let result = pipeline.run(cancel).await;
    print_report(&report);

    match result {
        Ok(()) => Ok(()),
        Err(err) if err.is_cancelled() => {
            warn!("interrupted, counts are partial");
            Ok(())
        }
        Err(err) => Err(err).context("pipeline failed"),
    }
}

/// Cancel `token` on Ctrl+C or SIGTERM
async fn cancel_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }

    token.cancel();
}

fn print_report(report: &Report) {
    println!(
        "long words:  {} total, {} distinct (queue peak {})",
        report.long_words.total(),
        report.long_words.distinct(),
        report.queue_peak.get()
    );
    for (word, count) in report.long_words.top(TOP_WORDS) {
        println!("  {count:>8}  {word}");
    }

    println!(
        "short words: {} total, {} distinct",
        report.short_words.total(),
        report.short_words.distinct()
    );
    for (word, count) in report.short_words.top(TOP_WORDS) {
        println!("  {count:>8}  {word}");
    }

    for (stage, m) in report.metrics() {
        info!(
            stage,
            received = m.received,
            emitted = m.emitted,
            batches = m.batches,
            failed = m.failed,
            skipped = m.skipped,
            "stage summary"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_config_defaults_without_path() {
        let config = load_config(None).unwrap();
        assert!(config.stages.is_empty());
        assert!(config.queues.is_empty());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[stages.tokenize]\nconcurrency = 3").unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.stage("tokenize").concurrency, 3);
    }

    #[test]
    fn test_load_config_reports_path() {
        let err = load_config(Some(Path::new("/nonexistent/sluice.toml"))).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/sluice.toml"));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[queues.settle]\ndriver = \"delay\"").unwrap();

        assert!(load_config(Some(file.path())).is_err());
    }

    #[test]
    fn test_sample_config_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../configs/sluice.toml");
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.stage("tokenize").concurrency, 4);
        assert_eq!(config.queue("settle").driver, sluice_config::DriverKind::Delay);
    }
}
