//! google-auth — Google service-account credentials and OAuth2 access tokens.
//!
//! Purpose
//! - Load a service-account key file (the JSON downloaded from the Cloud
//!   console, usually pointed to by `GOOGLE_APPLICATION_CREDENTIALS`).
//! - Mint OAuth2 access tokens with the JWT-bearer grant: sign an RS256
//!   assertion with the account's private key and exchange it at the account's
//!   `token_uri`.
//!
//! API
//! - `ServiceAccountKey::from_file(path)` / `ServiceAccountKey::from_json(str)`
//! - `TokenSource::new(key, scope)` then `token_source.access_token().await`
//!
//! Notes
//! - Tokens are cached in memory and refreshed shortly before they expire.
//! - The cache mutex is never held across an await; two concurrent refreshes
//!   may both hit the token endpoint, and the later one wins.

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, trace};

/// OAuth scope granting read/write access to Firestore and Datastore.
pub const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME: Duration = Duration::from_secs(60 * 60);
// Refresh this long before the server-declared expiry.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("cannot read credentials file: {0}")]
    Unreadable(String),
    #[error("invalid credentials: {0}")]
    InvalidCredentials(&'static str),
    #[error("private key rejected")]
    BadPrivateKey,
    #[error("failed to sign assertion")]
    Signing,
    #[error("token endpoint returned status {0}")]
    TokenRejected(u16),
    #[error("network or token response error")]
    Network,
}

/// The fields of a service-account key file this crate needs.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type", default)]
    pub key_type: Option<String>,
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("project_id", &self.project_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    /// Read and parse a key file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AuthError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AuthError::Unreadable(format!("{}: {e}", path.display())))?;
        Self::from_json(&raw)
    }

    /// Parse key file contents.
    pub fn from_json(raw: &str) -> Result<Self, AuthError> {
        let key: ServiceAccountKey =
            serde_json::from_str(raw).map_err(|_| AuthError::InvalidCredentials("json"))?;
        if let Some(t) = key.key_type.as_deref() {
            if t != "service_account" {
                return Err(AuthError::InvalidCredentials("type is not service_account"));
            }
        }
        if key.client_email.is_empty() {
            return Err(AuthError::InvalidCredentials("client_email"));
        }
        if key.private_key.is_empty() {
            return Err(AuthError::InvalidCredentials("private_key"));
        }
        Ok(key)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct AssertionClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: u64,
    exp: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Clone)]
struct CachedToken {
    value: String,
    expires_at: SystemTime,
}

/// Produces bearer tokens for one service account and scope.
pub struct TokenSource {
    key: ServiceAccountKey,
    signing_key: EncodingKey,
    scope: String,
    http: reqwest::Client,
    cache: Mutex<Option<CachedToken>>,
}

impl TokenSource {
    /// Validates the private key up front so a bad key fails at startup.
    pub fn new(key: ServiceAccountKey, scope: impl Into<String>) -> Result<Self, AuthError> {
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|_| AuthError::BadPrivateKey)?;
        Ok(Self {
            key,
            signing_key,
            scope: scope.into(),
            http: reqwest::Client::new(),
            cache: Mutex::new(None),
        })
    }

    /// Return a valid access token, fetching a new one when the cached token
    /// is missing or about to expire.
    pub async fn access_token(&self) -> Result<String, AuthError> {
        let now = SystemTime::now();
        {
            let cache = self.cache.lock().map_err(|_| AuthError::Network)?;
            if let Some(tok) = cache.as_ref() {
                if now + REFRESH_MARGIN < tok.expires_at {
                    trace!("google-auth: cached access token still fresh");
                    return Ok(tok.value.clone());
                }
            }
        }

        // Fetch outside the lock
        let fresh = self.fetch_token(now).await?;
        let value = fresh.value.clone();
        let mut cache = self.cache.lock().map_err(|_| AuthError::Network)?;
        *cache = Some(fresh);
        Ok(value)
    }

    fn sign_assertion(&self, now: SystemTime) -> Result<String, AuthError> {
        let iat = now
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let claims = AssertionClaims {
            iss: self.key.client_email.clone(),
            scope: self.scope.clone(),
            aud: self.key.token_uri.clone(),
            iat,
            exp: iat + ASSERTION_LIFETIME.as_secs(),
        };
        let header = Header {
            alg: Algorithm::RS256,
            kid: self.key.private_key_id.clone(),
            ..Default::default()
        };
        encode(&header, &claims, &self.signing_key).map_err(|_| AuthError::Signing)
    }

    async fn fetch_token(&self, now: SystemTime) -> Result<CachedToken, AuthError> {
        let assertion = self.sign_assertion(now)?;
        debug!(account = %self.key.client_email, "google-auth: requesting access token");
        let resp = self
            .http
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|_| AuthError::Network)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AuthError::TokenRejected(status.as_u16()));
        }
        let body: TokenResponse = resp.json().await.map_err(|_| AuthError::Network)?;
        let lifetime = body
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(ASSERTION_LIFETIME);
        Ok(CachedToken {
            value: body.access_token,
            expires_at: now + lifetime,
        })
    }
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSource")
            .field("account", &self.key.client_email)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}
