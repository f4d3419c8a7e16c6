//! # Scope Authorizer
//!
//! Request-time authorization decisions for API gateways. For every call the
//! authorizer verifies the bearer JWT against the issuer's key set, resolves
//! the scopes the invoked operation requires from an OpenAPI document, and
//! checks them against both the client's stored policy and the token itself.
//!
//! ## Features
//!
//! - `axum`: HTTP surface serving `POST /authorize` and `GET /health`
//! - `dynamodb`: DynamoDB-backed policy repository
//! - `server`: the `scope-authorizer` binary (enables both of the above)

pub mod error;
pub use error::{AuthorizerError, Result};

pub mod auth;
pub mod config;
pub mod oidc;
pub mod openapi;
pub mod policy;
pub mod retry;

#[cfg(feature = "axum")]
pub mod axum_integration;

#[cfg(test)]
mod test_support;

pub use crate::auth::{AuthorizationDecision, AuthorizationError, Authorizer, Effect, TokenAuthorizerEvent};
pub use crate::config::{load_config, AuthorizerConfig, DEFAULT_SECURITY_SCHEME};
pub use crate::oidc::types::{CachedJwks, Credential, JwtValidationOptions};
pub use crate::openapi::RouteTable;
pub use crate::policy::{InMemoryPolicyRepository, PolicyKey, PolicyKeyShape, PolicyRecord, PolicyRepository};

#[cfg(test)]
mod tests {
    use crate::error::AuthorizerError;

    #[test]
    fn test_error_creation() {
        let error = AuthorizerError::SpecDocument("no paths".to_string());
        assert!(error.to_string().contains("no paths"));
    }

    #[test]
    fn test_reexports_resolve() {
        let decision = crate::AuthorizationDecision::deny(None, "arn:aws:execute-api:r:a:api/s/GET/x");
        assert_eq!(decision.effect(), crate::Effect::Deny);
        assert_eq!(crate::DEFAULT_SECURITY_SCHEME, "oauth2ClientCredentials");
    }
}
