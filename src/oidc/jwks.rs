//! Signing-key set sources and the shared key cache
//!
//! [`JwksCache`] is the only shared mutable state on the request path. Readers
//! take a read lock; refreshes are single-flight and build the new key map
//! before swapping it in. A failed refresh never drops a key set that is
//! already cached.

use std::{collections::HashMap, sync::{atomic::{AtomicU64, Ordering}, Arc}, time::Duration};
use async_trait::async_trait;
use jsonwebtoken::jwk::{AlgorithmParameters, EllipticCurve, Jwk, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey};
use reqwest::Client;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing;

use crate::error::{AuthorizerError, Result};
use crate::retry::{retry_with_backoff, RetryConfig};
use super::types::CachedJwks;

/// Default spacing between refetches triggered by unknown key ids or failures
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Map a JWK's algorithm parameters to a `jsonwebtoken::Algorithm`
pub fn jwk_algorithm_to_algorithm(jwk: &Jwk) -> Result<Algorithm> {
    match &jwk.algorithm {
        AlgorithmParameters::RSA(_) => Ok(Algorithm::RS256),
        AlgorithmParameters::EllipticCurve(params) => match &params.curve {
            EllipticCurve::P256 => Ok(Algorithm::ES256),
            EllipticCurve::P384 => Ok(Algorithm::ES384),
            other => Err(AuthorizerError::KeySetInvalid(format!("Unsupported elliptic curve for JWK: {:?}", other))),
        },
        AlgorithmParameters::OctetKey(_) => Err(AuthorizerError::KeySetInvalid("HMAC keys not supported for token verification".to_string())),
        AlgorithmParameters::OctetKeyPair(_) => Ok(Algorithm::EdDSA),
    }
}

/// Decode every usable signing key of a key set, indexed by key id
///
/// Keys without a `kid`, with an unsupported algorithm, or that fail to decode
/// are skipped with a warning.
pub fn decode_key_set(jwk_set: &JwkSet) -> HashMap<String, (DecodingKey, Algorithm)> {
    let mut keys = HashMap::new();
    for jwk in &jwk_set.keys {
        let Some(kid) = &jwk.common.key_id else {
            tracing::warn!("JWK missing kid field, skipping");
            continue;
        };
        let algorithm = match jwk_algorithm_to_algorithm(jwk) {
            Ok(algorithm) => algorithm,
            Err(e) => {
                tracing::warn!("Unsupported algorithm for kid {}: {}", kid, e);
                continue;
            }
        };
        match DecodingKey::from_jwk(jwk) {
            Ok(decoding_key) => {
                tracing::debug!("Parsed key {}: algorithm={:?}", kid, algorithm);
                keys.insert(kid.clone(), (decoding_key, algorithm));
            }
            Err(err) => {
                tracing::warn!("Failed to create decoding key for kid {}: {}", kid, err);
            }
        }
    }
    keys
}

/// Where a key set comes from
#[async_trait]
pub trait JwksSource: Send + Sync {
    /// Fetch the current key set
    async fn fetch(&self) -> Result<JwkSet>;

    /// Human-readable location, for logs
    fn location(&self) -> &str;
}

/// Key set published at an HTTPS endpoint
#[derive(Clone)]
pub struct HttpJwksSource {
    http_client: Client,
    jwks_uri: String,
    retry: RetryConfig,
}

impl HttpJwksSource {
    /// Create a source whose requests time out after `timeout`
    pub fn new(jwks_uri: impl Into<String>, timeout: Duration, retry: RetryConfig) -> Result<Self> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(http_client, jwks_uri, retry))
    }

    pub fn with_client(http_client: Client, jwks_uri: impl Into<String>, retry: RetryConfig) -> Self {
        Self {
            http_client,
            jwks_uri: jwks_uri.into(),
            retry,
        }
    }

    async fn fetch_once(&self) -> Result<JwkSet> {
        tracing::debug!("Fetching JWKS from: {}", self.jwks_uri);

        let response = self.http_client
            .get(&self.jwks_uri)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| AuthorizerError::KeySetUnavailable(format!("Failed to fetch JWKS: {}", e)))?;

        let status = response.status();
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AuthorizerError::KeySetUnavailable(format!("JWKS fetch failed with status: {}", status)));
        }
        if !status.is_success() {
            return Err(AuthorizerError::KeySetInvalid(format!("JWKS fetch failed with status: {}", status)));
        }

        let jwks_text = response
            .text()
            .await
            .map_err(|e| AuthorizerError::KeySetUnavailable(format!("Failed to read JWKS response: {}", e)))?;

        serde_json::from_str(&jwks_text)
            .map_err(|e| AuthorizerError::KeySetInvalid(format!("Failed to parse JWKS: {}", e)))
    }
}

#[async_trait]
impl JwksSource for HttpJwksSource {
    async fn fetch(&self) -> Result<JwkSet> {
        retry_with_backoff("jwks_fetch", &self.retry, || self.fetch_once()).await
    }

    fn location(&self) -> &str {
        &self.jwks_uri
    }
}

/// Fixed key set, for local runs and tests
#[derive(Clone)]
pub struct StaticJwksSource {
    jwk_set: JwkSet,
}

impl StaticJwksSource {
    pub fn new(jwk_set: JwkSet) -> Self {
        Self { jwk_set }
    }
}

#[async_trait]
impl JwksSource for StaticJwksSource {
    async fn fetch(&self) -> Result<JwkSet> {
        Ok(self.jwk_set.clone())
    }

    fn location(&self) -> &str {
        "static"
    }
}

/// Outcome of the most recent fetch attempt
#[derive(Default)]
struct RefreshState {
    attempted_at: Option<Instant>,
    failure: Option<RefreshFailure>,
}

/// Record of a failed fetch, replayed to callers while throttled
struct RefreshFailure {
    transient: bool,
    message: String,
}

impl RefreshFailure {
    fn from_error(err: &AuthorizerError) -> Self {
        Self {
            transient: err.is_transient(),
            message: match err {
                AuthorizerError::KeySetUnavailable(message) | AuthorizerError::KeySetInvalid(message) => message.clone(),
                other => other.to_string(),
            },
        }
    }

    fn to_error(&self) -> AuthorizerError {
        if self.transient {
            AuthorizerError::KeySetUnavailable(self.message.clone())
        } else {
            AuthorizerError::KeySetInvalid(self.message.clone())
        }
    }
}

/// Shared, lazily populated signing-key cache
pub struct JwksCache {
    source: Arc<dyn JwksSource>,
    cached: RwLock<Option<CachedJwks>>,
    /// Serializes refreshes
    refresh_state: Mutex<RefreshState>,
    /// Completed fetch attempts, successful or not
    attempts: AtomicU64,
    ttl: Duration,
    min_refresh_interval: Duration,
}

impl JwksCache {
    /// Create an empty cache; keys are fetched on first use
    pub fn new(source: Arc<dyn JwksSource>, ttl: Duration) -> Self {
        Self {
            source,
            cached: RwLock::new(None),
            refresh_state: Mutex::new(RefreshState::default()),
            attempts: AtomicU64::new(0),
            ttl,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
        }
    }

    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Find the decoding key for `kid`, refreshing the set when needed
    pub async fn key(&self, kid: &str) -> Result<(DecodingKey, Algorithm)> {
        {
            let cache = self.cached.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_fresh(self.ttl) {
                    if let Some(key) = cached.keys.get(kid) {
                        return Ok(key.clone());
                    }
                }
            }
        }

        if let Err(err) = self.refresh_for(kid).await {
            if self.cached.read().await.is_none() {
                return Err(err);
            }
        }

        let cache = self.cached.read().await;
        cache
            .as_ref()
            .and_then(|cached| cached.keys.get(kid).cloned())
            .ok_or_else(|| AuthorizerError::JwtValidation(format!("No key found for kid: {}", kid)))
    }

    /// Refetch the key set unconditionally
    pub async fn refresh(&self) -> Result<()> {
        let mut state = self.refresh_state.lock().await;
        self.fetch_and_swap(&mut state).await
    }

    /// Drop all cached keys
    pub async fn clear(&self) {
        *self.cached.write().await = None;
    }

    /// Key ids currently cached
    pub async fn key_ids(&self) -> Vec<String> {
        let cache = self.cached.read().await;
        let mut ids: Vec<String> = cache
            .as_ref()
            .map(|cached| cached.keys.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Refresh on the caller's behalf unless another task already did, or a
    /// recent attempt makes another fetch premature
    ///
    /// Callers that queued behind an in-flight fetch share its outcome. While
    /// throttled with no cached set, the last failure is replayed.
    async fn refresh_for(&self, kid: &str) -> Result<()> {
        let seen = self.attempts.load(Ordering::Acquire);
        let mut state = self.refresh_state.lock().await;
        let fetched_while_waiting = self.attempts.load(Ordering::Acquire) != seen;
        let recently_attempted = state
            .attempted_at
            .map(|at| at.elapsed() < self.min_refresh_interval)
            .unwrap_or(false);

        {
            let cache = self.cached.read().await;
            match cache.as_ref() {
                Some(cached) => {
                    if cached.is_fresh(self.ttl) && cached.keys.contains_key(kid) {
                        return Ok(());
                    }
                    if fetched_while_waiting || recently_attempted {
                        tracing::debug!(kid, "Skipping JWKS refresh, last attempt too recent");
                        return Ok(());
                    }
                }
                None => {
                    if fetched_while_waiting || recently_attempted {
                        if let Some(failure) = &state.failure {
                            tracing::debug!(kid, "Skipping JWKS refresh, replaying last failure");
                            return Err(failure.to_error());
                        }
                    }
                }
            }
        }

        self.fetch_and_swap(&mut state).await
    }

    /// Fetch and install a new key set; the caller holds the refresh lock
    async fn fetch_and_swap(&self, state: &mut RefreshState) -> Result<()> {
        state.attempted_at = Some(Instant::now());
        let result = self.fetch_and_install().await;
        state.failure = result.as_ref().err().map(RefreshFailure::from_error);
        self.attempts.fetch_add(1, Ordering::Release);
        result
    }

    async fn fetch_and_install(&self) -> Result<()> {
        let fetched = self.source.fetch().await.and_then(|jwk_set| {
            let keys = decode_key_set(&jwk_set);
            if keys.is_empty() {
                Err(AuthorizerError::KeySetInvalid("JWKS contains no usable signing keys".to_string()))
            } else {
                Ok(keys)
            }
        });

        match fetched {
            Ok(keys) => {
                tracing::debug!(source = self.source.location(), keys = keys.len(), "JWKS refreshed");
                let refreshed = CachedJwks {
                    keys,
                    fetched_at: Instant::now(),
                };
                *self.cached.write().await = Some(refreshed);
                Ok(())
            }
            Err(err) => {
                if self.cached.read().await.is_some() {
                    tracing::warn!(source = self.source.location(), error = %err, "JWKS refresh failed, keeping cached key set");
                } else {
                    tracing::error!(source = self.source.location(), error = %err, "JWKS refresh failed with no cached key set");
                }
                Err(err)
            }
        }
    }

    /// Refresh the key set every `every` in a background task
    pub fn spawn_refresh(self: &Arc<Self>, every: Duration) -> RefreshHandle {
        let cache = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(err) = cache.refresh().await {
                    tracing::warn!(error = %err, "Periodic JWKS refresh failed");
                }
            }
        });
        RefreshHandle { task }
    }
}

/// Handle to a periodic refresh task; the task stops on shutdown or drop
pub struct RefreshHandle {
    task: JoinHandle<()>,
}

impl RefreshHandle {
    pub fn shutdown(self) {
        self.task.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
