// src/fetch/mod.rs
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};
use url::Url;

use crate::config::SheetsConfig;
use crate::table::RawTable;

pub mod auth;

/// Anything that can hand back the raw rows for one request.
#[async_trait]
pub trait SheetSource: Send + Sync {
    async fn fetch_raw_table(&self) -> Result<RawTable>;
}

/// Body of `spreadsheets.values.get`. `values` is omitted for an empty range.
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Option<String>>>,
}

/// Google Sheets v4 `values.get` for a single configured range.
pub struct SheetsClient {
    client: Client,
    config: SheetsConfig,
    url: Url,
}

impl SheetsClient {
    pub fn new(config: SheetsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("building HTTP client")?;
        Self::with_client(client, config)
    }

    /// Reuse an existing client. Its own timeout settings apply.
    pub fn with_client(client: Client, config: SheetsConfig) -> Result<Self> {
        let url = values_url(&config)?;
        Ok(Self {
            client,
            config,
            url,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn get_values_core(&self) -> Result<ValueRange> {
        debug!(url = %self.url, "fetching range");
        let req = self
            .config
            .credentials
            .authorize(&self.client, self.client.get(self.url.clone()))
            .await?;
        req.send()
            .await
            .with_context(|| format!("GET {} failed", self.url))?
            .error_for_status()
            .with_context(|| format!("Non-success status {}", self.url))?
            .json()
            .await
            .with_context(|| format!("Decoding values from {}", self.url))
    }

    async fn get_values_with_retry(&self) -> Result<ValueRange> {
        let max_retries = self.config.max_retries;
        let initial_backoff_ms = self.config.initial_backoff_ms;
        let mut attempts = 0;
        loop {
            match self.get_values_core().await {
                Ok(v) => return Ok(v),
                Err(e) if attempts < max_retries && is_transient(&e) => {
                    attempts += 1;
                    let backoff = initial_backoff_ms * 2u64.pow(attempts - 1);
                    warn!(url = %self.url, attempt = attempts, delay_ms = backoff, error = %e, "Retrying");
                    sleep(Duration::from_millis(backoff)).await;
                }
                Err(e) if is_transient(&e) => {
                    error!(url = %self.url, error = %e, "Exhausted retries");
                    return Err(e);
                }
                Err(e) => {
                    error!(url = %self.url, error = %e, "Not retrying");
                    return Err(e);
                }
            }
        }
    }
}

#[async_trait]
impl SheetSource for SheetsClient {
    #[instrument(level = "debug", skip(self), fields(range = %self.config.range))]
    async fn fetch_raw_table(&self) -> Result<RawTable> {
        let body = self.get_values_with_retry().await?;
        debug!(rows = body.values.len(), "range fetched");
        Ok(RawTable::new(body.values))
    }
}

/// Worth another attempt: connect/timeout failures, 5xx and 429.
/// Other statuses, undecodable bodies and key errors fail fast.
fn is_transient(err: &anyhow::Error) -> bool {
    let Some(e) = err.chain().find_map(|c| c.downcast_ref::<reqwest::Error>()) else {
        return false;
    };
    if e.is_timeout() || e.is_connect() {
        return true;
    }
    match e.status() {
        Some(status) => status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS,
        None => e.is_request() || e.is_body(),
    }
}

/// `{base}/v4/spreadsheets/{id}/values/{range}` with each piece percent-encoded.
fn values_url(config: &SheetsConfig) -> Result<Url> {
    let mut url = Url::parse(&config.api_base)
        .with_context(|| format!("parsing Sheets API base {}", config.api_base))?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("Sheets API base cannot be a base URL: {}", config.api_base))?
        .pop_if_empty()
        .extend(&[
            "v4",
            "spreadsheets",
            config.spreadsheet_id.as_str(),
            "values",
            config.range.as_str(),
        ]);
    Ok(url)
}
