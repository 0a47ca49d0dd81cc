use anyhow::{Context, Result};
use sheetquery::{config::Config, fetch::SheetsClient, server};
use std::{env, sync::Arc};
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) config (.env first, so LOG_LEVEL can come from it) ──────
    let config = Config::from_env().context("loading configuration")?;

    // ─── 2) init logging ─────────────────────────────────────────────
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(log_level.parse().unwrap_or(Level::INFO.into())),
        )
        .init();

    info!(
        spreadsheet = %config.sheets.spreadsheet_id,
        range = %config.sheets.range,
        credentials = ?config.sheets.credentials,
        "startup"
    );

    // ─── 3) upstream source ──────────────────────────────────────────
    let source = SheetsClient::new(config.sheets.clone()).context("building Sheets client")?;
    info!(url = %source.url(), "sheet source ready");

    // ─── 4) serve ────────────────────────────────────────────────────
    server::serve(Arc::new(source), &config.api_prefix, config.port).await;
    Ok(())
}
