//! Shared fixtures for unit tests: signing keys, tokens and specifications

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use ring::rand::SystemRandom;
use ring::signature::{Ed25519KeyPair, KeyPair};
use serde_json::{json, Value};
use std::time::{SystemTime, UNIX_EPOCH};

pub const TEST_ISSUER: &str = "https://cognito-idp.us-east-1.amazonaws.com/us-east-1_Test";

pub const ACCOUNT_SPEC: &str = r#"
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
  /health:
    get:
      operationId: health
"#;

pub const ACCOUNT_METHOD_ARN: &str = "arn:aws:execute-api:us-east-1:123456789012:abcdef1234/prod/GET/account/42";

/// Ed25519 key pair able to sign tokens and publish itself as a JWK
pub struct TestKey {
    pub kid: String,
    pkcs8: Vec<u8>,
    public_key: Vec<u8>,
}

impl TestKey {
    pub fn generate(kid: &str) -> Self {
        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng).unwrap();
        let pair = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).unwrap();
        Self {
            kid: kid.to_string(),
            pkcs8: pkcs8.as_ref().to_vec(),
            public_key: pair.public_key().as_ref().to_vec(),
        }
    }

    pub fn jwk(&self) -> Value {
        json!({
            "kty": "OKP",
            "crv": "Ed25519",
            "use": "sig",
            "alg": "EdDSA",
            "kid": self.kid,
            "x": URL_SAFE_NO_PAD.encode(&self.public_key),
        })
    }

    pub fn sign(&self, claims: &Value) -> String {
        let mut header = Header::new(Algorithm::EdDSA);
        header.kid = Some(self.kid.clone());
        jsonwebtoken::encode(&header, claims, &EncodingKey::from_ed_der(&self.pkcs8)).unwrap()
    }
}

pub fn jwk_set(keys: &[&TestKey]) -> JwkSet {
    let keys: Vec<Value> = keys.iter().map(|key| key.jwk()).collect();
    serde_json::from_value(json!({ "keys": keys })).unwrap()
}

pub fn now() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() as i64
}

/// Access-token claims for a client-credentials grant
pub fn access_claims(client_id: &str, scope: &str) -> Value {
    let now = now();
    json!({
        "iss": TEST_ISSUER,
        "sub": client_id,
        "token_use": "access",
        "client_id": client_id,
        "scope": scope,
        "auth_time": now,
        "iat": now,
        "exp": now + 3600,
        "jti": "6b0e1b4e",
        "version": 2
    })
}
