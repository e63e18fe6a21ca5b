//! Unified error types for the case tracker.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Top-level error type for startup and wiring.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Configuration loaded but rejected by validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Service-account credential error.
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),

    /// Document store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Service-account loading and token exchange errors.
#[derive(Error, Debug)]
pub enum CredentialError {
    /// Key file could not be read.
    #[error("failed to read credential file {path}: {source}")]
    Read {
        /// Path that was read.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Key file is not a valid service-account key.
    #[error("failed to parse credential file: {0}")]
    Parse(#[from] serde_json::Error),

    /// Private key could not be loaded for signing.
    #[error("invalid private key: {0}")]
    InvalidKey(jsonwebtoken::errors::Error),

    /// JWT assertion could not be signed.
    #[error("failed to sign token assertion: {0}")]
    Signing(jsonwebtoken::errors::Error),

    /// Token endpoint could not be reached.
    #[error("token request failed: {0}")]
    TokenRequest(#[from] reqwest::Error),

    /// Token endpoint refused the assertion.
    #[error("token request rejected: HTTP {status} - {body}")]
    TokenRejected {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
}

/// Document store errors.
///
/// The `Display` text of every variant is what HTTP clients see in the
/// `error` field of a 500 response.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Transport-level failure talking to the store.
    #[error("{0}")]
    Http(#[from] reqwest::Error),

    /// Store answered with a non-success status.
    #[error("{message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message reported by the store.
        message: String,
    },

    /// Store response could not be decoded.
    #[error("failed to decode store response: {0}")]
    Decode(String),

    /// Access token could not be obtained.
    #[error("{0}")]
    Credential(#[from] CredentialError),

    /// Store is unavailable.
    #[error("{0}")]
    Unavailable(String),
}

/// Errors returned by the HTTP handlers.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Referenced case does not exist.
    #[error("Case not found")]
    NotFound,

    /// Store call failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// JSON error body: `{"error": "..."}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Human-readable message.
    pub error: String,
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let ApiError::Store(e) = &self {
            error!(error = %e, "store call failed");
        }
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, ServerError>;
