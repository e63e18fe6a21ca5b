//! Service-account credentials and OAuth2 access tokens for Firestore.
//!
//! This module provides utilities for:
//! - Loading a Google service-account key file
//! - Signing RS256 JWT bearer assertions with the key
//! - Exchanging assertions for access tokens at the key's `token_uri`
//! - Cached access tokens, refreshed shortly before they expire

use std::path::Path;

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::error::CredentialError;

/// OAuth2 scope granting Firestore access.
pub const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

/// Grant type for the JWT bearer flow.
pub const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for each assertion, in seconds.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Tokens this close to expiry are refreshed before use.
const REFRESH_MARGIN_SECS: i64 = 60;

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// Contents of a service-account key file.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    /// Project the account belongs to.
    pub project_id: String,
    /// Key id, sent as the JWT `kid` header.
    #[serde(default)]
    pub private_key_id: Option<String>,
    /// PEM-encoded RSA private key.
    pub private_key: String,
    /// Service-account email, the JWT issuer.
    pub client_email: String,
    /// OAuth2 token endpoint.
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("project_id", &self.project_id)
            .field("private_key_id", &self.private_key_id)
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    /// Read and parse a key file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CredentialError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| CredentialError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// Parse a key from its JSON text.
    pub fn from_json(raw: &str) -> Result<Self, CredentialError> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Claims of a JWT bearer assertion.
#[derive(Debug, Serialize, Deserialize)]
pub struct AssertionClaims {
    /// Issuer (service-account email).
    pub iss: String,
    /// Requested scopes, space separated.
    pub scope: String,
    /// Token endpoint.
    pub aud: String,
    /// Issued at (unix seconds).
    pub iat: i64,
    /// Expiry (unix seconds).
    pub exp: i64,
}

/// Token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: i64,
}

/// Issues and caches access tokens for one service account.
pub struct TokenProvider {
    http: reqwest::Client,
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    cache: RwLock<Option<CachedToken>>,
}

impl std::fmt::Debug for TokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenProvider")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl TokenProvider {
    /// Create a provider, parsing the key's private key up front.
    pub fn new(key: ServiceAccountKey, http: reqwest::Client) -> Result<Self, CredentialError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(CredentialError::InvalidKey)?;

        Ok(Self {
            http,
            key,
            encoding_key,
            cache: RwLock::new(None),
        })
    }

    /// The service account this provider signs for.
    pub fn key(&self) -> &ServiceAccountKey {
        &self.key
    }

    /// Build a signed assertion issued at `now` (unix seconds).
    pub fn assertion(&self, now: i64) -> Result<String, CredentialError> {
        let claims = AssertionClaims {
            iss: self.key.client_email.clone(),
            scope: DATASTORE_SCOPE.to_string(),
            aud: self.key.token_uri.clone(),
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();

        encode(&header, &claims, &self.encoding_key).map_err(CredentialError::Signing)
    }

    /// Get a valid access token, exchanging a fresh assertion when needed.
    #[instrument(skip(self), fields(account = %self.key.client_email))]
    pub async fn access_token(&self) -> Result<String, CredentialError> {
        let now = OffsetDateTime::now_utc().unix_timestamp();

        // Try read lock first (fast path)
        {
            let cache = self.cache.read().await;
            if let Some(token) = cache.as_ref() {
                if token.expires_at - REFRESH_MARGIN_SECS > now {
                    return Ok(token.value.clone());
                }
            }
        }

        let mut cache = self.cache.write().await;
        // Another request may have refreshed while we waited
        if let Some(token) = cache.as_ref() {
            if token.expires_at - REFRESH_MARGIN_SECS > now {
                return Ok(token.value.clone());
            }
        }

        let token = self.exchange(now).await?;
        let value = token.value.clone();
        *cache = Some(token);
        Ok(value)
    }

    async fn exchange(&self, now: i64) -> Result<CachedToken, CredentialError> {
        debug!(token_uri = %self.key.token_uri, "requesting access token");

        let assertion = self.assertion(now)?;
        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CredentialError::TokenRejected { status, body });
        }

        let token: TokenResponse = response.json().await?;
        debug!(expires_in = token.expires_in, "access token issued");

        Ok(CachedToken {
            value: token.access_token,
            expires_at: now + token.expires_in,
        })
    }
}
