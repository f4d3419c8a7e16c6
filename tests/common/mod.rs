#![allow(dead_code)]

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use ring::rand::SystemRandom;
use ring::signature::{Ed25519KeyPair, KeyPair};
use scope_authorizer::{load_config, AuthorizerConfig};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};
use tempfile::NamedTempFile;

pub const ISSUER: &str = "https://cognito-idp.us-east-1.amazonaws.com/us-east-1_Integration";
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

pub const SPEC: &str = r#"
openapi: 3.0.1
info:
  title: Accounts
  version: 1.0.0
paths:
  /account:
    post:
      operationId: createAccount
      security:
        - oauth2ClientCredentials:
            - account/write
  /account/{id}:
    get:
      operationId: getAccount
      security:
        - oauth2ClientCredentials:
            - account/read
    delete:
      operationId: deleteAccount
      security:
        - oauth2ClientCredentials:
            - account/read
            - account/admin
"#;

pub fn method_arn(method: &str, path: &str) -> String {
    format!(
        "arn:aws:execute-api:us-east-1:123456789012:abcdef1234/prod/{}{}",
        method, path
    )
}

/// Ed25519 key for the integration issuer, public half encoded up front
pub struct SigningKey {
    kid: String,
    pkcs8: Vec<u8>,
    x: String,
}

impl SigningKey {
    pub fn generate(kid: &str) -> Self {
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&SystemRandom::new()).unwrap();
        let pair = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).unwrap();
        Self {
            kid: kid.to_string(),
            x: URL_SAFE_NO_PAD.encode(pair.public_key().as_ref()),
            pkcs8: pkcs8.as_ref().to_vec(),
        }
    }

    /// `Authorization` header value carrying a one-hour access token
    pub fn bearer(&self, client_id: &str, scope: &str) -> String {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs();
        let claims = json!({
            "iss": ISSUER,
            "sub": client_id,
            "token_use": "access",
            "client_id": client_id,
            "scope": scope,
            "iat": now,
            "exp": now + 3600
        });
        let mut header = Header::new(Algorithm::EdDSA);
        header.kid = Some(self.kid.clone());
        let token = jsonwebtoken::encode(&header, &claims, &EncodingKey::from_ed_der(&self.pkcs8)).unwrap();
        format!("Bearer {}", token)
    }
}

/// JWKS document publishing the given keys
pub fn jwks(keys: &[&SigningKey]) -> Value {
    let keys: Vec<Value> = keys
        .iter()
        .map(|key| json!({ "kty": "OKP", "crv": "Ed25519", "kid": key.kid, "x": key.x }))
        .collect();
    json!({ "keys": keys })
}

pub fn spec_file() -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(SPEC.as_bytes()).unwrap();
    file
}

/// Configuration pointing at a local JWKS endpoint, with fast retries
pub fn config(jwks_base_url: &str, spec: &NamedTempFile) -> AuthorizerConfig {
    let env: HashMap<String, String> = [
        ("AWS_REGION", "us-east-1".to_string()),
        ("USER_POOL_ID", "us-east-1_Integration".to_string()),
        ("CLIENT_SCOPES_TABLE", "client-scopes".to_string()),
        ("API_SPEC_PATH", spec.path().display().to_string()),
        ("ISSUER_URL", ISSUER.to_string()),
        ("JWKS_URI", format!("{}{}", jwks_base_url, JWKS_PATH)),
        ("JWKS_MIN_REFRESH_INTERVAL_SECS", "0".to_string()),
        ("RETRY_BASE_DELAY_MS", "1".to_string()),
        ("RETRY_MAX_DELAY_MS", "5".to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    let config = load_config(None, Some(env)).unwrap();
    config.validate().unwrap();
    config
}
