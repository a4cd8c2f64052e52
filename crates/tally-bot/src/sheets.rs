//! Google Sheets append client authenticated with a service-account key.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tally_core::{RowSink, TallyError};
use tokio::sync::Mutex;

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Size of worksheets created on first append.
const NEW_SHEET_ROWS: u32 = 1000;
const NEW_SHEET_COLS: u32 = 20;

#[derive(Debug, thiserror::Error)]
pub enum SheetsError {
    #[error("no Google credentials configured (set GOOGLE_CREDS_B64 or GOOGLE_APPLICATION_CREDENTIALS)")]
    MissingCredentials,

    #[error("invalid service account credentials: {0}")]
    InvalidCredentials(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("token signing failed: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Google API error ({status}): {body}")]
    Api { status: u16, body: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    /// Accepts the key JSON either base64-encoded or as-is.
    pub fn from_b64_or_json(value: &str) -> Result<Self, SheetsError> {
        let value = value.trim();
        if let Ok(decoded) = STANDARD.decode(value) {
            if let Ok(key) = serde_json::from_slice(&decoded) {
                return Ok(key);
            }
        }
        serde_json::from_str(value).map_err(|e| SheetsError::InvalidCredentials(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self, SheetsError> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(|e| {
            SheetsError::InvalidCredentials(format!("{}: {e}", path.display()))
        })
    }

    /// Inline credentials win over the credentials file.
    pub fn load(b64: Option<&str>, file: Option<&Path>) -> Result<Self, SheetsError> {
        match (b64, file) {
            (Some(value), _) => Self::from_b64_or_json(value),
            (None, Some(path)) => Self::from_file(path),
            (None, None) => Err(SheetsError::MissingCredentials),
        }
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// Usable until one minute before it expires.
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::minutes(1) < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

pub struct SheetsClient {
    http: Client,
    key: ServiceAccountKey,
    spreadsheet_id: String,
    token: Mutex<Option<CachedToken>>,
    known_worksheets: Mutex<HashSet<String>>,
}

impl SheetsClient {
    pub fn new(key: ServiceAccountKey, spreadsheet_id: impl Into<String>) -> Self {
        SheetsClient {
            http: Client::new(),
            key,
            spreadsheet_id: spreadsheet_id.into(),
            token: Mutex::new(None),
            known_worksheets: Mutex::new(HashSet::new()),
        }
    }

    async fn access_token(&self) -> Result<String, SheetsError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Utc::now())) {
            return Ok(token.value.clone());
        }

        let token = self.fetch_token().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    async fn fetch_token(&self) -> Result<CachedToken, SheetsError> {
        let now = Utc::now();
        let claims = Claims {
            iss: &self.key.client_email,
            scope: SCOPE,
            aud: &self.key.token_uri,
            iat: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
        };
        let signing_key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())?;
        let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &signing_key)?;

        let resp = self
            .http
            .post(&self.key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;
        let token: TokenResponse = check(resp).await?.json().await?;

        tracing::debug!(expires_in = token.expires_in, "obtained Google access token");
        Ok(CachedToken {
            value: token.access_token,
            expires_at: now + Duration::seconds(token.expires_in),
        })
    }

    /// Create the worksheet if the spreadsheet does not have it yet.
    pub async fn ensure_worksheet(&self, title: &str) -> Result<(), SheetsError> {
        let mut known = self.known_worksheets.lock().await;
        if known.contains(title) {
            return Ok(());
        }

        let token = self.access_token().await?;
        let url = format!(
            "{SHEETS_API}/{}?fields=sheets.properties.title",
            self.spreadsheet_id
        );
        let resp = self.http.get(url).bearer_auth(&token).send().await?;
        let meta: SpreadsheetMeta = check(resp).await?.json().await?;
        known.extend(meta.sheets.into_iter().map(|s| s.properties.title));

        if !known.contains(title) {
            tracing::info!(worksheet = title, "creating missing worksheet");
            let url = format!("{SHEETS_API}/{}:batchUpdate", self.spreadsheet_id);
            let body = serde_json::json!({
                "requests": [{
                    "addSheet": {
                        "properties": {
                            "title": title,
                            "gridProperties": {
                                "rowCount": NEW_SHEET_ROWS,
                                "columnCount": NEW_SHEET_COLS,
                            }
                        }
                    }
                }]
            });
            let resp = self.http.post(url).bearer_auth(&token).json(&body).send().await?;
            check(resp).await?;
            known.insert(title.to_string());
        }
        Ok(())
    }

    pub async fn append(&self, worksheet: &str, rows: &[Vec<String>]) -> Result<(), SheetsError> {
        self.ensure_worksheet(worksheet).await?;
        let token = self.access_token().await?;

        let resp = self
            .http
            .post(append_url(&self.spreadsheet_id, worksheet))
            .bearer_auth(&token)
            .json(&serde_json::json!({ "values": rows }))
            .send()
            .await?;
        check(resp).await?;

        tracing::debug!(worksheet, rows = rows.len(), "appended rows");
        Ok(())
    }
}

#[async_trait]
impl RowSink for SheetsClient {
    async fn append_rows(&self, worksheet: &str, rows: &[Vec<String>]) -> Result<(), TallyError> {
        self.append(worksheet, rows)
            .await
            .map_err(|e| TallyError::Delivery(e.to_string()))
    }
}

async fn check(resp: reqwest::Response) -> Result<reqwest::Response, SheetsError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(SheetsError::Api {
        status: status.as_u16(),
        body,
    })
}

/// A1 range covering the whole worksheet, with the title quoted.
fn sheet_range(worksheet: &str) -> String {
    format!("'{}'!A1", worksheet.replace('\'', "''"))
}

fn append_url(spreadsheet_id: &str, worksheet: &str) -> Url {
    let mut url = Url::parse(SHEETS_API).expect("static API base URL");
    url.path_segments_mut()
        .expect("https URL has path segments")
        .push(spreadsheet_id)
        .push("values")
        .push(&format!("{}:append", sheet_range(worksheet)));
    url.query_pairs_mut()
        .append_pair("valueInputOption", "USER_ENTERED")
        .append_pair("insertDataOption", "INSERT_ROWS");
    url
}
