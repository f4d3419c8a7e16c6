//! Inbound authorizer event and invocation-target parsing
//!
//! The gateway identifies the invoked operation with a method ARN of the form
//! `arn:aws:execute-api:{region}:{account}:{apiId}/{stage}/{METHOD}/{path...}`.

use serde::{Deserialize, Serialize};

use super::error::AuthorizationError;

fn default_event_type() -> String {
    "TOKEN".to_string()
}

/// TOKEN authorizer event as delivered by the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenAuthorizerEvent {
    #[serde(rename = "type", default = "default_event_type")]
    pub event_type: String,
    /// Raw `Authorization` header value
    #[serde(default)]
    pub authorization_token: String,
    pub method_arn: String,
}

impl TokenAuthorizerEvent {
    pub fn new(authorization_token: impl Into<String>, method_arn: impl Into<String>) -> Self {
        Self {
            event_type: default_event_type(),
            authorization_token: authorization_token.into(),
            method_arn: method_arn.into(),
        }
    }

    /// Token from a `Bearer <token>` header value
    pub fn bearer_token(&self) -> Option<&str> {
        let (scheme, token) = self.authorization_token.trim().split_once(' ')?;
        let token = token.trim();
        if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
            Some(token)
        } else {
            None
        }
    }
}

/// Parsed invocation target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationTarget {
    pub region: String,
    pub account_id: String,
    pub api_id: String,
    pub stage: String,
    pub method: String,
    /// Concrete request path with a leading slash
    pub path: String,
    /// The method ARN exactly as received
    pub resource_arn: String,
}

impl InvocationTarget {
    pub fn parse(method_arn: &str) -> Result<Self, AuthorizationError> {
        let malformed = |reason: &str| AuthorizationError::MalformedTarget(format!("{}: {}", reason, method_arn));

        let mut parts = method_arn.split('/');
        let prefix = parts.next().unwrap_or_default();
        let fields: Vec<&str> = prefix.split(':').collect();
        if fields.len() != 6 || fields[0] != "arn" || fields[2] != "execute-api" {
            return Err(malformed("not an execute-api ARN"));
        }

        let api_id = fields[5];
        let stage = parts.next().unwrap_or_default();
        let method = parts.next().unwrap_or_default();
        if api_id.is_empty() || stage.is_empty() || method.is_empty() {
            return Err(malformed("missing api id, stage or method"));
        }

        let path = format!("/{}", parts.collect::<Vec<_>>().join("/"));

        Ok(Self {
            region: fields[3].to_string(),
            account_id: fields[4].to_string(),
            api_id: api_id.to_string(),
            stage: stage.to_string(),
            method: method.to_string(),
            path,
            resource_arn: method_arn.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ACCOUNT_METHOD_ARN;

    #[test]
    fn test_parse_method_arn() {
        let target = InvocationTarget::parse(ACCOUNT_METHOD_ARN).unwrap();
        assert_eq!(target.region, "us-east-1");
        assert_eq!(target.account_id, "123456789012");
        assert_eq!(target.api_id, "abcdef1234");
        assert_eq!(target.stage, "prod");
        assert_eq!(target.method, "GET");
        assert_eq!(target.path, "/account/42");
        assert_eq!(target.resource_arn, ACCOUNT_METHOD_ARN);
    }

    #[test]
    fn test_parse_root_path() {
        let target = InvocationTarget::parse("arn:aws:execute-api:eu-west-1:123456789012:api1/dev/GET/").unwrap();
        assert_eq!(target.path, "/");

        let target = InvocationTarget::parse("arn:aws:execute-api:eu-west-1:123456789012:api1/dev/GET").unwrap();
        assert_eq!(target.path, "/");
    }

    #[test]
    fn test_parse_rejects_malformed_arns() {
        for arn in [
            "",
            "not-an-arn",
            "arn:aws:lambda:us-east-1:123456789012:function/f",
            "arn:aws:execute-api:us-east-1:123456789012:abcdef1234",
            "arn:aws:execute-api:us-east-1:123456789012:abcdef1234/prod",
            "arn:aws:execute-api:us-east-1:123456789012:/prod/GET/account",
        ] {
            assert!(
                matches!(InvocationTarget::parse(arn), Err(AuthorizationError::MalformedTarget(_))),
                "accepted {:?}",
                arn
            );
        }
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(TokenAuthorizerEvent::new("Bearer abc.def.ghi", "arn").bearer_token(), Some("abc.def.ghi"));
        assert_eq!(TokenAuthorizerEvent::new("bearer abc", "arn").bearer_token(), Some("abc"));
        assert_eq!(TokenAuthorizerEvent::new("abc.def.ghi", "arn").bearer_token(), None);
        assert_eq!(TokenAuthorizerEvent::new("Basic dXNlcg==", "arn").bearer_token(), None);
        assert_eq!(TokenAuthorizerEvent::new("Bearer ", "arn").bearer_token(), None);
        assert_eq!(TokenAuthorizerEvent::new("", "arn").bearer_token(), None);
    }

    #[test]
    fn test_event_deserializes_gateway_shape() {
        let event: TokenAuthorizerEvent = serde_json::from_value(serde_json::json!({
            "type": "TOKEN",
            "authorizationToken": "Bearer abc",
            "methodArn": ACCOUNT_METHOD_ARN
        }))
        .unwrap();
        assert_eq!(event.event_type, "TOKEN");
        assert_eq!(event.bearer_token(), Some("abc"));
        assert_eq!(event.method_arn, ACCOUNT_METHOD_ARN);
    }

    #[test]
    fn test_event_without_token_deserializes() {
        let event: TokenAuthorizerEvent =
            serde_json::from_value(serde_json::json!({ "methodArn": ACCOUNT_METHOD_ARN })).unwrap();
        assert_eq!(event.event_type, "TOKEN");
        assert!(event.bearer_token().is_none());
    }
}
