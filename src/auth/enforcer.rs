//! Dual scope check: administrative grant and token scopes
//!
//! A required scope passes only when the policy store grants it to the
//! principal and the presented token carries it. Both checks are evaluated in
//! full so a deny can report everything that was missing.

use super::error::AuthorizationError;
use crate::policy::PolicyRecord;

/// Outcome of checking required scopes against both grant sources
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeCheck {
    /// Required scopes absent from the policy record
    pub policy_missing: Vec<String>,
    /// Required scopes absent from the token
    pub token_missing: Vec<String>,
}

impl ScopeCheck {
    pub fn evaluate(required: &[String], granted: &PolicyRecord, token_scopes: &[String]) -> Self {
        let policy_missing = required
            .iter()
            .filter(|scope| !granted.grants(scope))
            .cloned()
            .collect();
        let token_missing = required
            .iter()
            .filter(|scope| !token_scopes.contains(scope))
            .cloned()
            .collect();
        Self {
            policy_missing,
            token_missing,
        }
    }

    pub fn passed(&self) -> bool {
        self.policy_missing.is_empty() && self.token_missing.is_empty()
    }

    /// The policy failure takes precedence when both checks fail
    pub fn into_result(self, client_id: &str) -> Result<(), AuthorizationError> {
        if !self.policy_missing.is_empty() {
            return Err(AuthorizationError::PolicyScopeMissing {
                client_id: client_id.to_string(),
                missing: self.policy_missing,
            });
        }
        if !self.token_missing.is_empty() {
            return Err(AuthorizationError::TokenScopeMissing {
                missing: self.token_missing,
            });
        }
        Ok(())
    }
}

/// Check `required` against the principal's grant and the token's scopes
pub fn enforce(
    client_id: &str,
    required: &[String],
    granted: &PolicyRecord,
    token_scopes: &[String],
) -> Result<(), AuthorizationError> {
    ScopeCheck::evaluate(required, granted, token_scopes).into_result(client_id)
}
