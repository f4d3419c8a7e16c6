/// Per-request authorization failures
///
/// Every variant ends in the same caller-visible `Deny`; the variant only
/// drives internal logging.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthorizationError {
    /// Missing, malformed, expired or wrongly signed bearer token
    #[error("Credential verification failed")]
    InvalidCredential,

    /// The invocation target could not be parsed
    #[error("Malformed invocation target: {0}")]
    MalformedTarget(String),

    #[error("No route for {method} {path} in API {api_id}")]
    RouteNotFound {
        api_id: String,
        method: String,
        path: String,
    },

    /// No policy record exists for the principal
    #[error("No policy record for client {client_id}")]
    UnknownPrincipal { client_id: String },

    #[error("Client {client_id} is not granted: {}", .missing.join(", "))]
    PolicyScopeMissing { client_id: String, missing: Vec<String> },

    #[error("Token does not carry: {}", .missing.join(", "))]
    TokenScopeMissing { missing: Vec<String> },

    /// Policy lookup kept failing or timing out
    #[error("Policy store unavailable: {0}")]
    PolicyStoreUnavailable(String),

    /// The store answered with something that is not a usable policy record
    #[error("Policy store fault: {0}")]
    PolicyStoreFailed(String),
}

impl AuthorizationError {
    /// Stable label used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            AuthorizationError::InvalidCredential => "verification_error",
            AuthorizationError::MalformedTarget(_) => "malformed_target",
            AuthorizationError::RouteNotFound { .. } => "route_not_found",
            AuthorizationError::UnknownPrincipal { .. } => "unknown_principal",
            AuthorizationError::PolicyScopeMissing { .. } => "policy_scope_missing",
            AuthorizationError::TokenScopeMissing { .. } => "token_scope_missing",
            AuthorizationError::PolicyStoreUnavailable(_) => "policy_store_unavailable",
            AuthorizationError::PolicyStoreFailed(_) => "policy_store_failed",
        }
    }

    /// Stage at which this failure is raised
    pub fn stage(&self) -> Stage {
        match self {
            AuthorizationError::InvalidCredential => Stage::Verifying,
            AuthorizationError::MalformedTarget(_) | AuthorizationError::RouteNotFound { .. } => Stage::Resolving,
            AuthorizationError::UnknownPrincipal { .. }
            | AuthorizationError::PolicyScopeMissing { .. }
            | AuthorizationError::TokenScopeMissing { .. }
            | AuthorizationError::PolicyStoreUnavailable(_)
            | AuthorizationError::PolicyStoreFailed(_) => Stage::Enforcing,
        }
    }
}

/// Step of the authorization pipeline a failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Verifying,
    Resolving,
    Enforcing,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Verifying => "verifying",
            Stage::Resolving => "resolving",
            Stage::Enforcing => "enforcing",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
