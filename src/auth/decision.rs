//! Gateway authorization decision document

use serde::{Deserialize, Serialize};

/// Principal reported before a credential has been verified
pub const UNKNOWN_PRINCIPAL: &str = "unknown";

pub const POLICY_VERSION: &str = "2012-10-17";

pub const INVOKE_ACTION: &str = "execute-api:Invoke";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    pub action: String,
    pub effect: Effect,
    pub resource: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    pub statement: Vec<Statement>,
}

/// Allow or deny of the invoke action on exactly one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationDecision {
    pub principal_id: String,
    pub policy_document: PolicyDocument,
}

impl AuthorizationDecision {
    /// Build a decision; an absent principal is reported as [`UNKNOWN_PRINCIPAL`]
    pub fn build(principal: Option<&str>, effect: Effect, resource_arn: &str) -> Self {
        Self {
            principal_id: principal.unwrap_or(UNKNOWN_PRINCIPAL).to_string(),
            policy_document: PolicyDocument {
                version: POLICY_VERSION.to_string(),
                statement: vec![Statement {
                    action: INVOKE_ACTION.to_string(),
                    effect,
                    resource: resource_arn.to_string(),
                }],
            },
        }
    }

    pub fn allow(principal: &str, resource_arn: &str) -> Self {
        Self::build(Some(principal), Effect::Allow, resource_arn)
    }

    pub fn deny(principal: Option<&str>, resource_arn: &str) -> Self {
        Self::build(principal, Effect::Deny, resource_arn)
    }

    pub fn effect(&self) -> Effect {
        self.policy_document
            .statement
            .first()
            .map(|statement| statement.effect)
            .unwrap_or(Effect::Deny)
    }

    pub fn is_allowed(&self) -> bool {
        self.effect() == Effect::Allow
    }

    pub fn resource(&self) -> Option<&str> {
        self.policy_document
            .statement
            .first()
            .map(|statement| statement.resource.as_str())
    }
}
