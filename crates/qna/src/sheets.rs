use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use k9_core::config::SheetsConfig;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

const SHEETS_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets.readonly";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Cached access tokens are refreshed this long before they expire.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SheetsError {
    #[error("could not read service account key `{path}`: {reason}")]
    KeyRead { path: String, reason: String },
    #[error("service account key is invalid: {0}")]
    KeyParse(String),
    #[error("could not sign service account assertion: {0}")]
    Sign(String),
    #[error("token exchange failed: {0}")]
    Token(String),
    #[error("spreadsheet request failed: {0}")]
    Http(String),
    #[error("spreadsheet endpoint returned status {status}")]
    Status { status: u16 },
    #[error("spreadsheet response was malformed: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait SpreadsheetReader: Send + Sync {
    /// Rows of the configured range, each a list of cell texts.
    async fn read(&self) -> Result<Vec<Vec<String>>, SheetsError>;
}

#[derive(Deserialize)]
struct ServiceAccountKey {
    #[serde(default)]
    client_email: Option<String>,
    private_key: String,
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    ASSERTION_LIFETIME_SECS as u64
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// Reads a range from Google Sheets v4 using a service-account key file.
///
/// The key is read on first use, so a bot that already has a knowledge base never needs it.
pub struct GoogleSheetsReader {
    http: Client,
    key_path: PathBuf,
    client_email: Option<String>,
    spreadsheet_id: String,
    range: String,
    api_base_url: String,
    token_url: String,
    cached_token: Mutex<Option<CachedToken>>,
}

impl GoogleSheetsReader {
    pub fn from_config(config: &SheetsConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(Duration::from_secs(config.timeout_secs)).build()?;
        Ok(Self {
            http,
            key_path: config.service_account_key_path.clone(),
            client_email: config.client_email.clone(),
            spreadsheet_id: config.spreadsheet_id.clone(),
            range: config.range.clone(),
            api_base_url: config.api_base_url.clone(),
            token_url: config.token_url.clone(),
            cached_token: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> Result<String, SheetsError> {
        let mut cached = self.cached_token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() + REFRESH_MARGIN < token.expires_at {
                return Ok(token.access_token.clone());
            }
        }

        let assertion = self.sign_assertion().await?;
        let response = self
            .http
            .post(&self.token_url)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|error| SheetsError::Token(error.to_string()))?;
        if !response.status().is_success() {
            let status = response.status();
            return Err(SheetsError::Token(format!("token endpoint returned {status}")));
        }
        let token: TokenResponse =
            response.json().await.map_err(|error| SheetsError::Token(error.to_string()))?;
        if token.access_token.is_empty() {
            return Err(SheetsError::Token("token endpoint returned empty access token".to_owned()));
        }

        info!(
            event_name = "sheets.token.refreshed",
            expires_in = token.expires_in,
            "obtained spreadsheet access token"
        );
        *cached = Some(CachedToken {
            access_token: token.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(token.access_token)
    }

    async fn sign_assertion(&self) -> Result<String, SheetsError> {
        let raw = tokio::fs::read_to_string(&self.key_path).await.map_err(|error| {
            SheetsError::KeyRead {
                path: self.key_path.display().to_string(),
                reason: error.to_string(),
            }
        })?;
        let key: ServiceAccountKey =
            serde_json::from_str(&raw).map_err(|error| SheetsError::KeyParse(error.to_string()))?;
        let client_email = self
            .client_email
            .as_deref()
            .or(key.client_email.as_deref())
            .filter(|email| !email.trim().is_empty())
            .ok_or_else(|| SheetsError::KeyParse("no client_email configured".to_owned()))?;
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|error| SheetsError::KeyParse(error.to_string()))?;

        let issued_at = chrono::Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: client_email,
            scope: SHEETS_READONLY_SCOPE,
            aud: &self.token_url,
            iat: issued_at,
            exp: issued_at + ASSERTION_LIFETIME_SECS,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
            .map_err(|error| SheetsError::Sign(error.to_string()))
    }

    fn values_url(&self) -> Result<Url, SheetsError> {
        let mut url = Url::parse(&self.api_base_url)
            .map_err(|error| SheetsError::Http(format!("invalid api base url: {error}")))?;
        let segments =
            ["v4", "spreadsheets", self.spreadsheet_id.as_str(), "values", self.range.as_str()];
        url.path_segments_mut()
            .map_err(|()| SheetsError::Http("api base url cannot have a path".to_owned()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

fn cell_text(cell: Value) -> String {
    match cell {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl SpreadsheetReader for GoogleSheetsReader {
    async fn read(&self) -> Result<Vec<Vec<String>>, SheetsError> {
        let token = self.access_token().await?;
        let response = self
            .http
            .get(self.values_url()?)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|error| SheetsError::Http(error.to_string()))?;
        if !response.status().is_success() {
            return Err(SheetsError::Status { status: response.status().as_u16() });
        }

        let range: ValueRange =
            response.json().await.map_err(|error| SheetsError::Malformed(error.to_string()))?;
        let rows: Vec<Vec<String>> = range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect();
        debug!(event_name = "sheets.values.read", rows = rows.len(), "read spreadsheet range");
        Ok(rows)
    }
}
