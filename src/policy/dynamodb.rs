//! DynamoDB-backed policy repository
//!
//! Records live in a table keyed by `client` (and `resource` for the
//! client-and-API shape) with the granted scopes in a `scopes` attribute,
//! stored either as a list of strings or as a string set.

use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_dynamodb::error::{DisplayErrorContext, SdkError};
use aws_sdk_dynamodb::operation::get_item::GetItemError;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use std::collections::HashMap;
use std::fmt::Debug;
use std::time::Duration;
use tracing::debug;

use super::{PolicyKey, PolicyLookupError, PolicyRecord, PolicyRepository};

pub const CLIENT_ATTRIBUTE: &str = "client";
pub const RESOURCE_ATTRIBUTE: &str = "resource";
pub const SCOPES_ATTRIBUTE: &str = "scopes";

pub struct DynamoDbPolicyRepository {
    client: Client,
    table: String,
}

impl DynamoDbPolicyRepository {
    pub fn new(client: Client, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }

    /// Build a client for `region` from the default credential chain
    ///
    /// Each attempt is bounded by `attempt_timeout`. SDK retries are disabled
    /// since the authorizer applies its own bounded retry.
    pub async fn connect(region: &str, table: impl Into<String>, attempt_timeout: Duration) -> Self {
        let timeouts = TimeoutConfig::builder()
            .operation_attempt_timeout(attempt_timeout)
            .build();
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .timeout_config(timeouts)
            .retry_config(RetryConfig::disabled())
            .load()
            .await;
        Self::new(Client::new(&sdk_config), table)
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

/// Primary-key attributes for `key`
pub fn key_attributes(key: &PolicyKey) -> HashMap<String, AttributeValue> {
    let mut attributes = HashMap::new();
    attributes.insert(CLIENT_ATTRIBUTE.to_string(), AttributeValue::S(key.client_id.clone()));
    if let Some(api_id) = &key.api_id {
        attributes.insert(RESOURCE_ATTRIBUTE.to_string(), AttributeValue::S(api_id.clone()));
    }
    attributes
}

/// Read the granted scopes out of a stored item
///
/// An item without a `scopes` attribute grants nothing.
pub fn record_from_item(item: &HashMap<String, AttributeValue>) -> Result<PolicyRecord, PolicyLookupError> {
    match item.get(SCOPES_ATTRIBUTE) {
        None => Ok(PolicyRecord::default()),
        Some(AttributeValue::Ss(scopes)) => Ok(PolicyRecord::new(scopes.iter().cloned())),
        Some(AttributeValue::L(values)) => {
            let scopes = values
                .iter()
                .map(|value| {
                    value.as_s().cloned().map_err(|_| {
                        PolicyLookupError::Failed(format!("non-string entry in {} list", SCOPES_ATTRIBUTE))
                    })
                })
                .collect::<Result<Vec<String>, _>>()?;
            Ok(PolicyRecord::new(scopes))
        }
        Some(_) => Err(PolicyLookupError::Failed(format!(
            "{} attribute must be a list or string set",
            SCOPES_ATTRIBUTE
        ))),
    }
}

fn classify<R: Debug + 'static>(err: SdkError<GetItemError, R>) -> PolicyLookupError {
    let message = DisplayErrorContext(&err).to_string();
    match err.as_service_error() {
        Some(service)
            if service.is_internal_server_error()
                || service.is_provisioned_throughput_exceeded_exception()
                || service.is_request_limit_exceeded() =>
        {
            PolicyLookupError::Unavailable(message)
        }
        Some(_) => PolicyLookupError::Failed(message),
        // Timeouts, dispatch and response failures
        None => PolicyLookupError::Unavailable(message),
    }
}

#[async_trait]
impl PolicyRepository for DynamoDbPolicyRepository {
    async fn granted_scopes(&self, key: &PolicyKey) -> Result<PolicyRecord, PolicyLookupError> {
        debug!(table = %self.table, key = %key, "Looking up policy record");

        let output = self
            .client
            .get_item()
            .table_name(&self.table)
            .set_key(Some(key_attributes(key)))
            .send()
            .await
            .map_err(classify)?;

        match output.item() {
            Some(item) => record_from_item(item),
            None => Err(PolicyLookupError::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(scopes: AttributeValue) -> HashMap<String, AttributeValue> {
        HashMap::from([
            (CLIENT_ATTRIBUTE.to_string(), AttributeValue::S("C1".to_string())),
            (SCOPES_ATTRIBUTE.to_string(), scopes),
        ])
    }

    #[test]
    fn test_key_attributes_for_client_shape() {
        let attributes = key_attributes(&PolicyKey::client("C1"));
        assert_eq!(attributes.len(), 1);
        assert_eq!(attributes[CLIENT_ATTRIBUTE], AttributeValue::S("C1".to_string()));
    }

    #[test]
    fn test_key_attributes_for_composite_shape() {
        let attributes = key_attributes(&PolicyKey::client_and_api("C1", "abcdef1234"));
        assert_eq!(attributes.len(), 2);
        assert_eq!(attributes[RESOURCE_ATTRIBUTE], AttributeValue::S("abcdef1234".to_string()));
    }

    #[test]
    fn test_record_from_string_list() {
        let record = record_from_item(&item(AttributeValue::L(vec![
            AttributeValue::S("account/read".to_string()),
            AttributeValue::S("account/write".to_string()),
        ])))
        .unwrap();
        assert_eq!(record, PolicyRecord::new(["account/read", "account/write"]));
    }

    #[test]
    fn test_record_from_string_set() {
        let record = record_from_item(&item(AttributeValue::Ss(vec!["account/read".to_string()]))).unwrap();
        assert!(record.grants("account/read"));
    }

    #[test]
    fn test_record_without_scopes_grants_nothing() {
        let item = HashMap::from([(CLIENT_ATTRIBUTE.to_string(), AttributeValue::S("C1".to_string()))]);
        assert!(record_from_item(&item).unwrap().scopes.is_empty());
    }

    #[test]
    fn test_malformed_scopes_rejected() {
        let err = record_from_item(&item(AttributeValue::N("3".to_string()))).unwrap_err();
        assert!(matches!(err, PolicyLookupError::Failed(_)));

        let err = record_from_item(&item(AttributeValue::L(vec![AttributeValue::Bool(true)]))).unwrap_err();
        assert!(matches!(err, PolicyLookupError::Failed(_)));
    }
}
