//! Postkeep Import
//!
//! Sends the records of a crawler dump (or a server snapshot) to a running
//! Postkeep server.

use anyhow::{Context, Result};
use clap::Parser;
use postkeep_client::{parse_dump, DumpFormat, PostsClient, RetryPolicy};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "postkeep-import")]
#[command(version, about = "Import crawler output into a Postkeep server", long_about = None)]
struct Cli {
    /// File to import
    file: PathBuf,

    /// Server base URL
    #[arg(short, long, env = "POSTKEEP_SERVER", default_value = "http://127.0.0.1:8000")]
    server: String,

    /// Column layout of the file
    #[arg(short, long, value_enum, default_value_t = DumpFormat::Crawler)]
    format: DumpFormat,

    /// Attempts per record before it is skipped
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    attempts: u32,

    /// Milliseconds before the first retry
    #[arg(long, default_value_t = 500)]
    retry_delay_ms: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(if cli.verbose {
            "postkeep_import=debug,postkeep_client=debug"
        } else {
            "postkeep_import=info,postkeep_client=info"
        })
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let content = tokio::fs::read_to_string(&cli.file)
        .await
        .with_context(|| format!("Failed to read {}", cli.file.display()))?;

    let parsed = parse_dump(&content, cli.format);
    for (line, e) in &parsed.rejected {
        warn!("{}:{}: {}", cli.file.display(), line, e);
    }
    info!(
        "Parsed {} records from {} ({} rejected)",
        parsed.records.len(),
        cli.file.display(),
        parsed.rejected.len()
    );

    let client = PostsClient::new(&cli.server).with_retry(RetryPolicy {
        max_attempts: cli.attempts,
        base_delay: Duration::from_millis(cli.retry_delay_ms),
    });
    let report = client.submit_all(&parsed.records).await;

    info!(
        "Stored {}, already present {}, skipped {}",
        report.stored,
        report.duplicates.len(),
        report.skipped.len()
    );

    if !report.skipped.is_empty() || !parsed.rejected.is_empty() {
        anyhow::bail!(
            "{} records were not imported",
            report.skipped.len() + parsed.rejected.len()
        );
    }

    Ok(())
}
