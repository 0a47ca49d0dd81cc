// src/fetch/auth.rs
use anyhow::{Context, Result};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    time::{SystemTime, UNIX_EPOCH},
};
use tracing::debug;

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const SHEETS_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets.readonly";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: u64 = 3600;

/// How requests to the Sheets API are authorized.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Service account key: a signed JWT is exchanged for a bearer token.
    ServiceAccount {
        client_email: String,
        private_key: String,
        token_uri: String,
    },
    /// Public sheets only.
    ApiKey(String),
    /// No auth at all (local stubs).
    Anonymous,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServiceAccount {
                client_email,
                token_uri,
                ..
            } => f
                .debug_struct("ServiceAccount")
                .field("client_email", client_email)
                .field("private_key", &"<redacted>")
                .field("token_uri", token_uri)
                .finish(),
            Self::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
            Self::Anonymous => f.write_str("Anonymous"),
        }
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Sign the RS256 assertion a service account presents to the token endpoint.
pub fn sign_assertion(
    client_email: &str,
    private_key: &str,
    token_uri: &str,
    issued_at: u64,
) -> Result<String> {
    let key = EncodingKey::from_rsa_pem(private_key.as_bytes())
        .context("parsing service account private key")?;
    let claims = Claims {
        iss: client_email,
        scope: SHEETS_READONLY_SCOPE,
        aud: token_uri,
        iat: issued_at,
        exp: issued_at + ASSERTION_LIFETIME_SECS,
    };
    encode(&Header::new(Algorithm::RS256), &claims, &key)
        .context("signing service account assertion")
}

async fn fetch_access_token(
    client: &Client,
    client_email: &str,
    private_key: &str,
    token_uri: &str,
) -> Result<String> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock before unix epoch")?
        .as_secs();
    let assertion = sign_assertion(client_email, private_key, token_uri, now)?;

    debug!(%token_uri, "exchanging service account assertion");
    let resp: TokenResponse = client
        .post(token_uri)
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
        .send()
        .await
        .with_context(|| format!("POST {} failed", token_uri))?
        .error_for_status()
        .with_context(|| format!("token exchange rejected by {}", token_uri))?
        .json()
        .await
        .context("decoding token response")?;
    Ok(resp.access_token)
}

impl Credentials {
    /// Attach whatever this credential needs to `req`.
    pub async fn authorize(&self, client: &Client, req: RequestBuilder) -> Result<RequestBuilder> {
        match self {
            Self::ServiceAccount {
                client_email,
                private_key,
                token_uri,
            } => {
                let token = fetch_access_token(client, client_email, private_key, token_uri).await?;
                Ok(req.bearer_auth(token))
            }
            Self::ApiKey(key) => Ok(req.query(&[("key", key)])),
            Self::Anonymous => Ok(req),
        }
    }
}
