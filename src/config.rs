// src/config.rs
use anyhow::{Context, Result};
use std::{env, str::FromStr, time::Duration};

use crate::fetch::auth::{Credentials, DEFAULT_TOKEN_URI};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_API_PREFIX: &str = "api";
pub const DEFAULT_SPREADSHEET_ID: &str = "1PoNYC6E2gaebProqvGsz7_hX7dAlld4Mh_YoCyomD48";
pub const DEFAULT_RANGE: &str = "Web-08-2025!A1:K";
pub const DEFAULT_SHEETS_API_BASE: &str = "https://sheets.googleapis.com";

/// Where the range lives and how to reach it.
#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub api_base: String,
    pub spreadsheet_id: String,
    /// A1 range, e.g. `Web-08-2025!A1:K`.
    pub range: String,
    pub credentials: Credentials,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub timeout: Duration,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_SHEETS_API_BASE.into(),
            spreadsheet_id: DEFAULT_SPREADSHEET_ID.into(),
            range: DEFAULT_RANGE.into(),
            credentials: Credentials::Anonymous,
            max_retries: 3,
            initial_backoff_ms: 200,
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// First path segment for the query routes; empty mounts them at `/`.
    pub api_prefix: String,
    pub sheets: SheetsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            api_prefix: DEFAULT_API_PREFIX.into(),
            sheets: SheetsConfig::default(),
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(v) if !v.trim().is_empty() => v
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {}: {:?}", key, v)),
        _ => Ok(default),
    }
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load `.env` (if any) then read the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|k| env::var(k).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = SheetsConfig::default();

        let credentials = match (
            non_empty(&lookup, "GOOGLE_CLIENT_EMAIL"),
            non_empty(&lookup, "GOOGLE_PRIVATE_KEY"),
        ) {
            (Some(client_email), Some(key)) => Credentials::ServiceAccount {
                client_email,
                // keys pasted into env files carry literal "\n"
                private_key: key.replace("\\n", "\n"),
                token_uri: non_empty(&lookup, "GOOGLE_TOKEN_URI")
                    .unwrap_or_else(|| DEFAULT_TOKEN_URI.into()),
            },
            (Some(_), None) | (None, Some(_)) => {
                anyhow::bail!("GOOGLE_CLIENT_EMAIL and GOOGLE_PRIVATE_KEY must be set together")
            }
            (None, None) => match non_empty(&lookup, "GOOGLE_API_KEY") {
                Some(key) => Credentials::ApiKey(key),
                None => Credentials::Anonymous,
            },
        };

        let sheets = SheetsConfig {
            api_base: non_empty(&lookup, "SHEETS_API_BASE").unwrap_or(defaults.api_base),
            spreadsheet_id: non_empty(&lookup, "GOOGLE_SPREADSHEET_ID")
                .unwrap_or(defaults.spreadsheet_id),
            range: non_empty(&lookup, "SHEET_RANGE").unwrap_or(defaults.range),
            credentials,
            max_retries: parse_or(&lookup, "FETCH_MAX_RETRIES", defaults.max_retries)?,
            initial_backoff_ms: parse_or(&lookup, "FETCH_BACKOFF_MS", defaults.initial_backoff_ms)?,
            timeout: Duration::from_secs(parse_or(
                &lookup,
                "FETCH_TIMEOUT_SECS",
                defaults.timeout.as_secs(),
            )?),
        };

        Ok(Self {
            port: parse_or(&lookup, "PORT", DEFAULT_PORT)?,
            api_prefix: lookup("API_PREFIX")
                .map(|p| p.trim().trim_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_PREFIX.into()),
            sheets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.api_prefix, "api");
        assert_eq!(cfg.sheets.range, "Web-08-2025!A1:K");
        assert_eq!(cfg.sheets.spreadsheet_id, DEFAULT_SPREADSHEET_ID);
        assert_eq!(cfg.sheets.credentials, Credentials::Anonymous);
        assert_eq!(cfg.sheets.max_retries, 3);
    }

    #[test]
    fn test_service_account_unescapes_newlines() {
        let cfg = Config::from_lookup(lookup(&[
            ("GOOGLE_CLIENT_EMAIL", "svc@example.com"),
            ("GOOGLE_PRIVATE_KEY", "-----BEGIN-----\\nabc\\n-----END-----"),
            ("GOOGLE_API_KEY", "ignored"),
        ]))
        .unwrap();
        match cfg.sheets.credentials {
            Credentials::ServiceAccount {
                client_email,
                private_key,
                token_uri,
            } => {
                assert_eq!(client_email, "svc@example.com");
                assert_eq!(private_key, "-----BEGIN-----\nabc\n-----END-----");
                assert_eq!(token_uri, DEFAULT_TOKEN_URI);
            }
            other => panic!("unexpected credentials {:?}", other),
        }
    }

    #[test]
    fn test_half_service_account_is_error() {
        let err = Config::from_lookup(lookup(&[("GOOGLE_CLIENT_EMAIL", "svc@example.com")]))
            .unwrap_err();
        assert!(err.to_string().contains("GOOGLE_PRIVATE_KEY"));
    }

    #[test]
    fn test_api_key_and_overrides() {
        let cfg = Config::from_lookup(lookup(&[
            ("GOOGLE_API_KEY", "k"),
            ("PORT", "8080"),
            ("API_PREFIX", "/v1/"),
            ("SHEET_RANGE", "Other!A1:C"),
            ("FETCH_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(cfg.sheets.credentials, Credentials::ApiKey("k".into()));
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.api_prefix, "v1");
        assert_eq!(cfg.sheets.range, "Other!A1:C");
        assert_eq!(cfg.sheets.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_bad_port_names_variable() {
        let err = Config::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }
}
