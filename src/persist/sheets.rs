//! Google Sheets gateway — appends one row per completed survey.
//!
//! Auth is the service-account JWT grant: sign an RS256 assertion with the
//! key from `GOOGLE_SA_KEY`, exchange it for a bearer token at the key's
//! `token_uri`, cache the token until shortly before expiry.

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::ServiceAccountKey;
use crate::error::PersistError;
use crate::persist::PersistenceGateway;

const SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const DEFAULT_API_BASE: &str = "https://sheets.googleapis.com";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Refresh this many seconds before the token's stated expiry.
const EXPIRY_SLACK_SECS: i64 = 60;

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

fn build_claims<'a>(key: &'a ServiceAccountKey, now: i64) -> Claims<'a> {
    Claims {
        iss: &key.client_email,
        scope: SCOPE,
        aud: &key.token_uri,
        iat: now,
        exp: now + ASSERTION_LIFETIME_SECS,
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

struct CachedToken {
    value: String,
    expires_at: i64,
}

impl CachedToken {
    fn is_fresh(&self, now: i64) -> bool {
        now < self.expires_at - EXPIRY_SLACK_SECS
    }
}

/// Appends rows to the first sheet of the configured spreadsheet.
pub struct SheetsGateway {
    key: ServiceAccountKey,
    spreadsheet_id: String,
    api_base: String,
    client: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

impl SheetsGateway {
    pub fn new(key: ServiceAccountKey, spreadsheet_id: impl Into<String>) -> Self {
        Self {
            key,
            spreadsheet_id: spreadsheet_id.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            client: reqwest::Client::new(),
            token: Mutex::new(None),
        }
    }

    /// Point the gateway at a different API host (tests).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    /// Pre-seed the token cache with a non-expiring token (tests).
    pub fn with_static_token(self, token: impl Into<String>) -> Self {
        *self.token.try_lock().expect("fresh gateway") = Some(CachedToken {
            value: token.into(),
            expires_at: i64::MAX,
        });
        self
    }

    fn signed_assertion(&self, now: i64) -> Result<String, PersistError> {
        let claims = build_claims(&self.key, now);
        let encoding_key =
            EncodingKey::from_rsa_pem(self.key.private_key.expose_secret().as_bytes())
                .map_err(|e| PersistError::Auth(format!("bad private key: {e}")))?;
        encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
            .map_err(|e| PersistError::Auth(format!("failed to sign assertion: {e}")))
    }

    async fn bearer_token(&self) -> Result<String, PersistError> {
        let mut cached = self.token.lock().await;
        let now = Utc::now().timestamp();
        if let Some(token) = cached.as_ref() {
            if token.is_fresh(now) {
                return Ok(token.value.clone());
            }
        }

        let assertion = self.signed_assertion(now)?;
        let resp = self
            .client
            .post(&self.key.token_uri)
            .timeout(std::time::Duration::from_secs(30))
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| PersistError::Auth(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(PersistError::Auth(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| PersistError::Auth(format!("bad token response: {e}")))?;

        let value = token.access_token.clone();
        *cached = Some(CachedToken {
            value: token.access_token,
            expires_at: now + token.expires_in,
        });
        tracing::debug!("Refreshed Sheets access token");
        Ok(value)
    }

    fn append_url(&self) -> String {
        // Range A1 targets the first sheet; append finds the end of its table.
        format!(
            "{}/v4/spreadsheets/{}/values/A1:append?valueInputOption=USER_ENTERED",
            self.api_base, self.spreadsheet_id
        )
    }
}

#[async_trait]
impl PersistenceGateway for SheetsGateway {
    async fn append_record(&self, fields: &[String]) -> Result<(), PersistError> {
        let token = self.bearer_token().await?;
        let body = serde_json::json!({ "values": [fields] });

        let resp = self
            .client
            .post(self.append_url())
            .timeout(std::time::Duration::from_secs(30))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| PersistError::Request(e.to_string()))?;

        if resp.status().is_success() {
            tracing::info!(fields = fields.len(), "Appended survey record");
            Ok(())
        } else {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            Err(PersistError::Rejected { status, body })
        }
    }
}
