//! OAuth2 access tokens for the BigQuery REST API.
//!
//! Service-account keys are exchanged for a bearer token with the JWT-bearer
//! grant: an RS256-signed assertion is posted to the key's `token_uri`. The
//! token is cached until 60 seconds before it expires.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use ecompulse_core::CredentialsSource;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::BigQueryError;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const SCOPE: &str = "https://www.googleapis.com/auth/bigquery";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Cached tokens are refreshed this many seconds before their expiry.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Supplies a bearer token for each API request.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// # Errors
    ///
    /// Returns [`BigQueryError::Auth`] if no token can be obtained.
    async fn access_token(&self) -> Result<String, BigQueryError>;
}

/// A pre-issued token used as-is and never refreshed.
pub struct StaticToken(String);

impl StaticToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String, BigQueryError> {
        Ok(self.0.clone())
    }
}

/// The fields of a Google service-account key file this client needs.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"[redacted]")
            .field("token_uri", &self.token_uri)
            .field("project_id", &self.project_id)
            .finish()
    }
}

impl ServiceAccountKey {
    /// # Errors
    ///
    /// Returns [`BigQueryError::Auth`] if `json` is not a service-account key.
    pub fn from_json(json: &str) -> Result<Self, BigQueryError> {
        serde_json::from_str(json)
            .map_err(|e| BigQueryError::Auth(format!("invalid service account JSON: {e}")))
    }

    /// # Errors
    ///
    /// Returns [`BigQueryError::Auth`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, BigQueryError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            BigQueryError::Auth(format!("cannot read key file {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }
}

#[derive(Debug, Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    sub: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: i64,
}

/// Exchanges a service-account key for short-lived access tokens.
pub struct ServiceAccountAuth {
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    http: Client,
    cache: Mutex<Option<CachedToken>>,
}

impl ServiceAccountAuth {
    /// # Errors
    ///
    /// Returns [`BigQueryError::Auth`] if the private key is not a valid RSA
    /// PEM, or [`BigQueryError::Http`] if the HTTP client cannot be built.
    pub fn new(key: ServiceAccountKey, timeout_secs: u64) -> Result<Self, BigQueryError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| BigQueryError::Auth(format!("invalid private key: {e}")))?;
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            key,
            encoding_key,
            http,
            cache: Mutex::new(None),
        })
    }

    fn signed_assertion(&self, now: i64) -> Result<String, BigQueryError> {
        let claims = JwtClaims {
            iss: &self.key.client_email,
            sub: &self.key.client_email,
            scope: SCOPE,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|e| BigQueryError::Auth(format!("failed to sign JWT: {e}")))
    }

    async fn exchange(&self) -> Result<CachedToken, BigQueryError> {
        let now = Utc::now().timestamp();
        let assertion = self.signed_assertion(now)?;
        let params = [("grant_type", JWT_BEARER_GRANT), ("assertion", &assertion)];

        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BigQueryError::Auth(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let token: GoogleTokenResponse = response.json().await.map_err(|e| {
            BigQueryError::Auth(format!("failed to parse token response: {e}"))
        })?;

        tracing::debug!(
            client_email = %self.key.client_email,
            expires_in = token.expires_in,
            "obtained BigQuery access token"
        );

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: now + token.expires_in,
        })
    }
}

#[async_trait]
impl TokenProvider for ServiceAccountAuth {
    async fn access_token(&self) -> Result<String, BigQueryError> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if cached.expires_at > Utc::now().timestamp() + EXPIRY_MARGIN_SECS {
                return Ok(cached.access_token.clone());
            }
        }

        let fresh = self.exchange().await?;
        let token = fresh.access_token.clone();
        *cache = Some(fresh);
        Ok(token)
    }
}

/// Build the token provider for a configured credentials source.
///
/// # Errors
///
/// Returns [`BigQueryError::Auth`] if a key cannot be loaded or parsed.
pub fn token_provider(
    credentials: &CredentialsSource,
    timeout_secs: u64,
) -> Result<Arc<dyn TokenProvider>, BigQueryError> {
    match credentials {
        CredentialsSource::InlineJson(json) => {
            let key = ServiceAccountKey::from_json(json)?;
            Ok(Arc::new(ServiceAccountAuth::new(key, timeout_secs)?))
        }
        CredentialsSource::KeyFile(path) => {
            let key = ServiceAccountKey::from_file(path)?;
            Ok(Arc::new(ServiceAccountAuth::new(key, timeout_secs)?))
        }
        CredentialsSource::AccessToken(token) => Ok(Arc::new(StaticToken::new(token.clone()))),
    }
}
