//! Common types for credential verification

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tokio::time::Instant;

/// Verified access-token claim set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    /// Issuer
    pub iss: String,
    /// Subject (end user, or the client itself for client-credentials grants)
    pub sub: String,
    /// Intended use marker (`access` or `id`)
    #[serde(default)]
    pub token_use: Option<String>,
    /// Client the token was issued to; this is the authorization principal
    pub client_id: String,
    /// Space-delimited granted scopes
    #[serde(default)]
    pub scope: String,
    /// Expiration time
    pub exp: i64,
    /// Issued at time
    #[serde(default)]
    pub iat: Option<i64>,
    /// Time the end user authenticated
    #[serde(default)]
    pub auth_time: Option<i64>,
    #[serde(default)]
    pub username: Option<String>,
    /// Additional claims
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// JWKS cache entry
#[derive(Clone)]
pub struct CachedJwks {
    /// Decoded keys mapped by key ID
    pub keys: HashMap<String, (jsonwebtoken::DecodingKey, jsonwebtoken::Algorithm)>,
    /// When the keys were fetched
    pub fetched_at: Instant,
}

impl CachedJwks {
    pub fn is_fresh(&self, ttl: std::time::Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

/// JWT validation options beyond signature, expiry and issuer
#[derive(Debug, Clone, Default)]
pub struct JwtValidationOptions {
    /// Expected `aud`; audience is not validated when unset
    pub expected_audience: Option<String>,
    /// Required `token_use` claim value; not checked when unset
    pub required_token_use: Option<String>,
}

impl JwtValidationOptions {
    /// Options for access tokens: `token_use` must be `access`
    pub fn access_tokens() -> Self {
        Self {
            expected_audience: None,
            required_token_use: Some("access".to_string()),
        }
    }
}
