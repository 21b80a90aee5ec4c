use std::path::PathBuf;

use analysis_orchestrator::{SyncRequest, ValuationPipeline};
use anyhow::{Context, Result};

mod config;

use config::SyncConfig;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_writer(std::io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    let path: PathBuf = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: valuation-sync <batch.json>")?;

    let config = SyncConfig::from_env()?;
    tracing::info!("Configuration loaded and validated");
    tracing::info!("  Strict mode: {}", config.strict);
    tracing::info!(
        "  Years: {} required, {} max",
        config.required_years,
        config.max_years
    );
    tracing::info!("  Required return: {}%", config.required_return);
    tracing::info!("  Strategy timeout: {}ms", config.strategy_timeout_ms);

    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read batch file {}", path.display()))?;
    let requests: Vec<SyncRequest> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse batch file {}", path.display()))?;

    let pipeline = ValuationPipeline::with_env_strategies(&config.pipeline())?;
    let report = pipeline.sync_batch(&requests).await;

    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.is_clean() {
        tracing::warn!("{} of {} tickers failed", report.failed, report.total());
    }

    Ok(())
}
