//! Authorization orchestrator
//!
//! Drives one request through verification, route resolution and scope
//! enforcement, and turns the outcome into a decision document. Any failure
//! short-circuits to `Deny`; the specific reason is logged, never returned.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::decision::AuthorizationDecision;
use super::enforcer::ScopeCheck;
use super::error::AuthorizationError;
use super::target::{InvocationTarget, TokenAuthorizerEvent};
use crate::config::AuthorizerConfig;
use crate::oidc::jwks::{HttpJwksSource, JwksCache};
use crate::oidc::verifier::TokenVerifier;
use crate::openapi::RouteTable;
use crate::policy::{CachedPolicyRepository, PolicyKey, PolicyKeyShape, PolicyLookupError, PolicyRecord, PolicyRepository};
use crate::retry::{retry_with_backoff, RetryConfig};
use crate::Result;

/// Default per-attempt bound on a policy lookup
pub const DEFAULT_POLICY_LOOKUP_TIMEOUT: Duration = Duration::from_secs(1);

/// Request context accumulated for logging
#[derive(Debug)]
struct RequestState {
    principal: Option<String>,
    target: Option<InvocationTarget>,
    route: Option<String>,
}

impl RequestState {
    fn new(method_arn: &str) -> Self {
        Self {
            principal: None,
            target: InvocationTarget::parse(method_arn).ok(),
            route: None,
        }
    }

    fn api_id(&self) -> &str {
        self.target.as_ref().map(|t| t.api_id.as_str()).unwrap_or_default()
    }

    fn method(&self) -> &str {
        self.target.as_ref().map(|t| t.method.as_str()).unwrap_or_default()
    }

    fn path(&self) -> &str {
        self.target.as_ref().map(|t| t.path.as_str()).unwrap_or_default()
    }
}

/// Decides whether a bearer credential may invoke an API operation
pub struct Authorizer {
    verifier: TokenVerifier,
    routes: Arc<RouteTable>,
    policies: Arc<dyn PolicyRepository>,
    policy_key: PolicyKeyShape,
    retry: RetryConfig,
    policy_lookup_timeout: Duration,
}

impl Authorizer {
    pub fn new(verifier: TokenVerifier, routes: Arc<RouteTable>, policies: Arc<dyn PolicyRepository>) -> Self {
        Self {
            verifier,
            routes,
            policies,
            policy_key: PolicyKeyShape::default(),
            retry: RetryConfig::default(),
            policy_lookup_timeout: DEFAULT_POLICY_LOOKUP_TIMEOUT,
        }
    }

    pub fn with_policy_key(mut self, shape: PolicyKeyShape) -> Self {
        self.policy_key = shape;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_policy_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.policy_lookup_timeout = timeout;
        self
    }

    /// Assemble an authorizer from validated configuration and a policy store
    ///
    /// Loads the route table and sets up the HTTP key-set source. Keys are
    /// fetched on first use or by [`JwksCache::refresh`].
    pub fn from_config(config: &AuthorizerConfig, policies: Arc<dyn PolicyRepository>) -> Result<Self> {
        let routes = RouteTable::load(&config.api_spec_path, &config.security_scheme)?;
        info!(
            spec = %config.api_spec_path.display(),
            routes = routes.len(),
            scheme = %config.security_scheme,
            "Loaded API specification"
        );

        let source = HttpJwksSource::new(config.jwks_uri(), config.http_timeout(), config.retry_config())?;
        let jwks = JwksCache::new(Arc::new(source), config.jwks_cache_ttl())
            .with_min_refresh_interval(config.jwks_min_refresh_interval());
        let verifier = TokenVerifier::new(Arc::new(jwks), config.issuer_url(), config.validation_options());

        let policies: Arc<dyn PolicyRepository> = match config.policy_cache_ttl() {
            Some(ttl) => Arc::new(CachedPolicyRepository::new(policies, ttl)),
            None => policies,
        };

        Ok(Self::new(verifier, Arc::new(routes), policies)
            .with_policy_key(config.policy_key)
            .with_retry(config.retry_config())
            .with_policy_lookup_timeout(config.policy_lookup_timeout()))
    }

    /// Build an authorizer backed by the configured DynamoDB table
    #[cfg(feature = "dynamodb")]
    pub async fn connect(config: &AuthorizerConfig) -> Result<Self> {
        let repository = crate::policy::DynamoDbPolicyRepository::connect(
            &config.aws_region,
            config.client_scopes_table.clone(),
            config.policy_lookup_timeout(),
        )
        .await;
        Self::from_config(config, Arc::new(repository))
    }

    pub fn verifier(&self) -> &TokenVerifier {
        &self.verifier
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Decide a gateway TOKEN authorizer event
    pub async fn authorize(&self, event: &TokenAuthorizerEvent) -> AuthorizationDecision {
        let mut state = RequestState::new(&event.method_arn);

        match self.evaluate(event, &mut state).await {
            Ok(()) => {
                let principal = state.principal.as_deref().unwrap_or_default();
                info!(
                    principal,
                    api_id = state.api_id(),
                    method = state.method(),
                    path = state.path(),
                    route = state.route.as_deref(),
                    "Authorization allowed"
                );
                AuthorizationDecision::allow(principal, &event.method_arn)
            }
            Err(err) => {
                warn!(
                    stage = %err.stage(),
                    kind = err.kind(),
                    reason = %err,
                    principal = state.principal.as_deref(),
                    api_id = state.api_id(),
                    method = state.method(),
                    path = state.path(),
                    route = state.route.as_deref(),
                    "Authorization denied"
                );
                AuthorizationDecision::deny(state.principal.as_deref(), &event.method_arn)
            }
        }
    }

    async fn evaluate(
        &self,
        event: &TokenAuthorizerEvent,
        state: &mut RequestState,
    ) -> std::result::Result<(), AuthorizationError> {
        let token = event.bearer_token().ok_or(AuthorizationError::InvalidCredential)?;
        let credential = self.verifier.verify(token).await?;
        state.principal = Some(credential.client_id.clone());

        let target = match &state.target {
            Some(target) => target.clone(),
            None => InvocationTarget::parse(&event.method_arn)?,
        };
        let resolved = self.routes.resolve(&target.api_id, &target.method, &target.path)?;
        state.route = Some(resolved.template.to_string());
        debug!(
            route = resolved.template,
            operation_id = resolved.operation_id(),
            required = ?resolved.required_scopes(),
            "Resolved route"
        );

        let key = PolicyKey::for_shape(self.policy_key, &credential.client_id, &target.api_id);
        let granted = self.lookup_policy(&key).await?;
        ScopeCheck::evaluate(resolved.required_scopes(), &granted, &credential.scopes())
            .into_result(&credential.client_id)
    }

    /// Fetch the principal's grant with bounded retries and per-attempt timeout
    async fn lookup_policy(&self, key: &PolicyKey) -> std::result::Result<PolicyRecord, AuthorizationError> {
        let policies = &self.policies;
        let timeout = self.policy_lookup_timeout;

        let lookup = retry_with_backoff("policy lookup", &self.retry, || async move {
            match tokio::time::timeout(timeout, policies.granted_scopes(key)).await {
                Ok(result) => result,
                Err(_) => Err(PolicyLookupError::Unavailable(format!(
                    "lookup timed out after {}ms",
                    timeout.as_millis()
                ))),
            }
        })
        .await;

        lookup.map_err(|err| match err {
            PolicyLookupError::NotFound => AuthorizationError::UnknownPrincipal {
                client_id: key.client_id.clone(),
            },
            PolicyLookupError::Failed(reason) => AuthorizationError::PolicyStoreFailed(reason),
            PolicyLookupError::Unavailable(reason) => AuthorizationError::PolicyStoreUnavailable(reason),
        })
    }
}
