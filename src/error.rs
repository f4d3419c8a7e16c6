//! Error types for authorizer startup and infrastructure operations
//!
//! Per-request authorization failures live in [`crate::auth::AuthorizationError`];
//! this type covers configuration, specification loading and key-set fetching.

use crate::retry::Retryable;

/// Authorizer-wide error type
#[derive(Debug, thiserror::Error)]
pub enum AuthorizerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("API specification error: {0}")]
    SpecDocument(String),

    #[error("JWKS temporarily unavailable: {0}")]
    KeySetUnavailable(String),

    #[error("JWKS invalid: {0}")]
    KeySetInvalid(String),

    #[error("JWT validation error: {0}")]
    JwtValidation(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, AuthorizerError>;

impl AuthorizerError {
    /// Whether retrying the failed operation may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            AuthorizerError::KeySetUnavailable(_) => true,
            AuthorizerError::Http(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            _ => false,
        }
    }
}

impl Retryable for AuthorizerError {
    fn is_retryable(&self) -> bool {
        self.is_transient()
    }
}
