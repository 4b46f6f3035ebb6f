//! Google Sheets sink for regulatory updates, authenticated as a service account.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use lawbrief_core::{config::SheetsConfig, regulatory::UpdateSink, RegulatoryUpdate, StoreReport};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const SHEETS_API: &str = "https://sheets.googleapis.com/v4";
pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
/// Columns written on the first sheet.
const APPEND_RANGE: &str = "A:B";
const TOKEN_LIFETIME_SECS: i64 = 3600;

/// The fields of a service-account JSON key that the token exchange needs.
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
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading service account key {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parsing service account key {}", path.display()))
    }
}

/// JWT claims for the OAuth2 JWT-bearer grant.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Claims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

pub fn claims_for(key: &ServiceAccountKey, now: DateTime<Utc>) -> Claims {
    let iat = now.timestamp();
    Claims {
        iss: key.client_email.clone(),
        scope: SHEETS_SCOPE.to_string(),
        aud: key.token_uri.clone(),
        iat,
        exp: iat + TOKEN_LIFETIME_SECS,
    }
}

/// Request body appending one `[title, release_date]` row.
pub fn row_for(update: &RegulatoryUpdate) -> serde_json::Value {
    serde_json::json!({
        "values": [[update.title, update.release_date]],
    })
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

pub struct GoogleSheetsSink {
    key: ServiceAccountKey,
    sheet_id: String,
    api_base: String,
    http: reqwest::Client,
}

impl GoogleSheetsSink {
    pub fn new(config: &SheetsConfig) -> Result<Self> {
        let key = ServiceAccountKey::from_file(Path::new(&config.credentials_path))?;
        Self::with_key(key, &config.sheet_id)
    }

    pub fn with_key(key: ServiceAccountKey, sheet_id: &str) -> Result<Self> {
        Ok(Self {
            key,
            sheet_id: sheet_id.to_string(),
            api_base: SHEETS_API.to_string(),
            http: crate::http_client(30)?,
        })
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    pub fn append_url(&self) -> String {
        format!(
            "{}/spreadsheets/{}/values/{}:append?valueInputOption=RAW&insertDataOption=INSERT_ROWS",
            self.api_base.trim_end_matches('/'),
            urlencoding::encode(&self.sheet_id),
            urlencoding::encode(APPEND_RANGE),
        )
    }

    async fn access_token(&self) -> Result<String> {
        let claims = claims_for(&self.key, Utc::now());
        let signing_key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .context("service account private key is not a valid RSA PEM")?;
        let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &signing_key)?;

        let token: TokenResponse = self
            .http
            .post(&self.key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(token.access_token)
    }

    async fn append(&self, token: &str, update: &RegulatoryUpdate) -> Result<()> {
        self.http
            .post(self.append_url())
            .bearer_auth(token)
            .json(&row_for(update))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl UpdateSink for GoogleSheetsSink {
    async fn store(&self, updates: &[RegulatoryUpdate]) -> Result<StoreReport> {
        let mut report = StoreReport::default();
        if updates.is_empty() {
            return Ok(report);
        }

        let token = self
            .access_token()
            .await
            .context("authenticating with Google")?;

        for update in updates {
            match self.append(&token, update).await {
                Ok(()) => report.stored += 1,
                Err(e) => {
                    warn!(number = %update.number, "failed to append row: {e:#}");
                    report.failed += 1;
                    report.errors.push(format!("recital {}: {e:#}", update.number));
                },
            }
        }

        info!(
            sheet_id = %self.sheet_id,
            stored = report.stored,
            failed = report.failed,
            "updates stored in sheet"
        );
        Ok(report)
    }
}
