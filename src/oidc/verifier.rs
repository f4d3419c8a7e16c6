//! Bearer-token verification against a cached key set

use std::sync::Arc;
use jsonwebtoken::{decode, decode_header, Validation};
use tracing;

use crate::auth::AuthorizationError;
use crate::error::{AuthorizerError, Result};
use super::jwks::JwksCache;
use super::types::{Credential, JwtValidationOptions};

/// Verifies signature, expiry, issuer and intended use of access tokens
#[derive(Clone)]
pub struct TokenVerifier {
    jwks: Arc<JwksCache>,
    issuer: String,
    options: JwtValidationOptions,
}

impl TokenVerifier {
    pub fn new(jwks: Arc<JwksCache>, issuer: impl Into<String>, options: JwtValidationOptions) -> Self {
        Self {
            jwks,
            issuer: issuer.into(),
            options,
        }
    }

    pub fn jwks(&self) -> &Arc<JwksCache> {
        &self.jwks
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Verify a raw token, collapsing every failure into one opaque error
    ///
    /// The underlying reason is logged, never returned.
    pub async fn verify(&self, token: &str) -> std::result::Result<Credential, AuthorizationError> {
        self.validate(token).await.map_err(|err| {
            tracing::warn!(error = %err, "Credential verification failed");
            AuthorizationError::InvalidCredential
        })
    }

    /// Validate a raw token, reporting the exact failing check
    pub async fn validate(&self, token: &str) -> Result<Credential> {
        let header = decode_header(token)
            .map_err(|e| AuthorizerError::JwtValidation(format!("Invalid JWT header: {}", e)))?;

        let kid = header.kid
            .ok_or_else(|| AuthorizerError::JwtValidation("JWT missing kid in header".to_string()))?;

        let (decoding_key, key_algorithm) = self.jwks.key(&kid).await?;

        if header.alg != key_algorithm {
            return Err(AuthorizerError::JwtValidation(format!(
                "JWT header algorithm ({:?}) doesn't match key algorithm ({:?}) for kid {}",
                header.alg, key_algorithm, kid
            )));
        }

        tracing::debug!("Validating JWT with kid: {}, algorithm: {:?}", kid, key_algorithm);

        let mut validation = Validation::new(key_algorithm);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss"]);
        match &self.options.expected_audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        let token_data = decode::<Credential>(token, &decoding_key, &validation)
            .map_err(|e| AuthorizerError::JwtValidation(format!("JWT validation failed: {}", e)))?;
        let credential = token_data.claims;

        if let Some(required) = &self.options.required_token_use {
            if credential.token_use.as_deref() != Some(required.as_str()) {
                return Err(AuthorizerError::JwtValidation(format!(
                    "token_use {:?} is not {:?}",
                    credential.token_use, required
                )));
            }
        }

        Ok(credential)
    }
}
