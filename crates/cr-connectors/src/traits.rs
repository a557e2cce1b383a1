//! Connector trait definitions for the CMDB reconciler.
//!
//! This module defines the interfaces the reconciliation engine uses to talk
//! to the asset catalog and to DNS, together with the wire shapes of the
//! catalog's attribute API.

use crate::secure_string::SecureString;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use thiserror::Error;

/// Errors that can occur in connectors.
#[derive(Error, Debug, Clone)]
pub enum ConnectorError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Unexpected status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Rate limited: retry after {0} seconds")]
    RateLimited(u64),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Name resolution failed: {0}")]
    ResolutionFailed(String),

    /// Every attempt of a retried operation failed. This is the "no result"
    /// signal: the outcome of the operation is unknown.
    #[error("Gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        attempts: u32,
        last_error: Box<ConnectorError>,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConnectorError {
    /// Returns true if the error means the remote outcome could not be determined.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, ConnectorError::RetriesExhausted { .. })
    }
}

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// Health status of a connector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorHealth {
    /// Connector is healthy and operational.
    Healthy,
    /// Connector is degraded but still functional.
    Degraded(String),
    /// Connector is unhealthy and not operational.
    Unhealthy(String),
}

/// Configuration for an HTTP connector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Connector name/identifier.
    pub name: String,
    /// Base URL for the API, including any API prefix.
    pub base_url: String,
    /// Authentication configuration.
    pub auth: AuthConfig,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Total attempts per logical call (first try included).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Fixed wait between attempts, in milliseconds.
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
    /// Whether to verify TLS certificates.
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,
    /// Additional headers to include.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    5
}

fn default_retry_interval_ms() -> u64 {
    2_000
}

fn default_verify_tls() -> bool {
    true
}

impl ConnectorConfig {
    /// Creates a configuration with the default timeout and retry policy.
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, auth: AuthConfig) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            auth,
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            retry_interval_ms: default_retry_interval_ms(),
            verify_tls: default_verify_tls(),
            headers: HashMap::new(),
        }
    }
}

/// Authentication configuration.
///
/// Credential fields use `SecureString` so they are zeroized on drop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    /// No authentication.
    None,
    /// Bearer token authentication (personal access tokens).
    BearerToken { token: SecureString },
    /// Basic authentication (account email + API token for Jira Cloud).
    Basic {
        username: String,
        password: SecureString,
    },
}

/// Base trait for all connectors.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Returns the connector name.
    fn name(&self) -> &str;

    /// Returns the connector type (e.g., "cmdb").
    fn connector_type(&self) -> &str;

    /// Checks the health of the connector.
    async fn health_check(&self) -> ConnectorResult<ConnectorHealth>;
}

// =============================================================================
// Asset catalog wire types
// =============================================================================

/// One value held by an attribute slot.
///
/// `value` is the machine form (for reference attributes, the id of the
/// referenced object); `display_value` is what a human sees.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeValue {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_scalar"
    )]
    pub value: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_scalar"
    )]
    pub display_value: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_scalar"
    )]
    pub search_value: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_scalar"
    )]
    pub referenced_type: Option<String>,
}

impl AttributeValue {
    /// A value that points at another catalog object by id.
    pub fn reference(object_id: impl Into<String>) -> Self {
        Self {
            value: Some(object_id.into()),
            ..Default::default()
        }
    }

    /// A plain text value, echoed into every representation.
    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            value: Some(text.clone()),
            display_value: Some(text.clone()),
            search_value: Some(text),
            referenced_type: Some("false".to_string()),
        }
    }

    /// The human-readable form, if the catalog supplied one.
    pub fn display(&self) -> Option<&str> {
        self.display_value.as_deref()
    }
}

/// A typed attribute field on a catalog object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeSlot {
    #[serde(deserialize_with = "lenient::scalar")]
    pub object_type_attribute_id: String,
    #[serde(default, deserialize_with = "lenient::null_as_empty")]
    pub object_attribute_values: Vec<AttributeValue>,
}

impl AttributeSlot {
    /// A slot holding exactly one value; writing it replaces the whole list.
    pub fn single(attribute_id: impl Into<String>, value: AttributeValue) -> Self {
        Self {
            object_type_attribute_id: attribute_id.into(),
            object_attribute_values: vec![value],
        }
    }
}

/// A catalog entry as returned by searches and object creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectEntry {
    #[serde(deserialize_with = "lenient::scalar")]
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_key: Option<String>,
}

/// Parameters of a paginated catalog search scoped to one object type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogQuery {
    /// Catalog id of the object type.
    pub object_type_id: String,
    /// Object type name as used in query-language filters ("Host").
    pub object_type_name: String,
    /// Object schema the type belongs to.
    pub schema_id: String,
    /// Attribute ids to include in each entry.
    pub display_attribute_ids: Vec<String>,
    /// Page size requested from the server.
    pub results_per_page: u32,
}

/// One page of a catalog search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogPage {
    /// Total number of pages (the server names this field `pageSize`).
    #[serde(default)]
    pub page_size: u32,
    #[serde(default, deserialize_with = "lenient::null_as_empty")]
    pub object_entries: Vec<ObjectEntry>,
}

/// Asset catalog connector (Jira Assets / Insight).
#[async_trait]
pub trait CmdbConnector: Connector {
    /// Fetches one page (1-indexed) of objects of a type.
    async fn search_page(&self, query: &CatalogQuery, page: u32) -> ConnectorResult<CatalogPage>;

    /// Fetches the full attribute set of an object.
    async fn get_attributes(&self, object_id: &str) -> ConnectorResult<Vec<AttributeSlot>>;

    /// Replaces the value lists of the given slots on an object.
    async fn update_attributes(
        &self,
        object_id: &str,
        attributes: Vec<AttributeSlot>,
    ) -> ConnectorResult<()>;

    /// Creates an object and returns the created entry.
    async fn create_object(
        &self,
        object_type_id: &str,
        attributes: Vec<AttributeSlot>,
    ) -> ConnectorResult<ObjectEntry>;

    /// Runs a free-text query-language search.
    async fn aql_search(
        &self,
        ql_query: &str,
        start_at: u32,
        max_results: u32,
    ) -> ConnectorResult<Vec<ObjectEntry>>;
}

/// Hostname to IPv4 resolution.
#[async_trait]
pub trait DnsResolver: Send + Sync {
    /// Resolves a hostname to its first IPv4 address.
    async fn resolve_ipv4(&self, hostname: &str) -> ConnectorResult<Ipv4Addr>;
}

/// Deserializers tolerant of the catalog's habit of mixing numbers and strings.
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn to_string(value: Value) -> Option<String> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(s),
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(n.to_string()),
            other => Some(other.to_string()),
        }
    }

    pub fn scalar<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        let value = Value::deserialize(deserializer)?;
        to_string(value).ok_or_else(|| serde::de::Error::custom("expected a string or number"))
    }

    pub fn opt_scalar<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        Ok(to_string(Value::deserialize(deserializer)?))
    }

    pub fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_slot_accepts_numeric_ids() {
        let json = r#"{
            "id": 991,
            "objectTypeAttributeId": 412,
            "objectAttributeValues": [
                {"value": 50, "displayValue": "MTL-A", "referencedType": true}
            ]
        }"#;
        let slot: AttributeSlot = serde_json::from_str(json).unwrap();
        assert_eq!(slot.object_type_attribute_id, "412");
        assert_eq!(slot.object_attribute_values[0].value.as_deref(), Some("50"));
        assert_eq!(slot.object_attribute_values[0].display(), Some("MTL-A"));
        assert_eq!(
            slot.object_attribute_values[0].referenced_type.as_deref(),
            Some("true")
        );
    }

    #[test]
    fn test_attribute_slot_null_values() {
        let json = r#"{"objectTypeAttributeId": "7", "objectAttributeValues": null}"#;
        let slot: AttributeSlot = serde_json::from_str(json).unwrap();
        assert!(slot.object_attribute_values.is_empty());
    }

    #[test]
    fn test_reference_value_serializes_only_value() {
        let slot = AttributeSlot::single("412", AttributeValue::reference("50"));
        let json = serde_json::to_value(&slot).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "objectTypeAttributeId": "412",
                "objectAttributeValues": [{"value": "50"}]
            })
        );
    }

    #[test]
    fn test_text_value_fills_every_form() {
        let value = AttributeValue::text("veeam-repo-02");
        assert_eq!(value.value.as_deref(), Some("veeam-repo-02"));
        assert_eq!(value.display(), Some("veeam-repo-02"));
        assert_eq!(value.search_value.as_deref(), Some("veeam-repo-02"));
        assert_eq!(value.referenced_type.as_deref(), Some("false"));
    }

    #[test]
    fn test_catalog_page_defaults() {
        let page: CatalogPage = serde_json::from_str(r#"{"objectEntries": null}"#).unwrap();
        assert_eq!(page.page_size, 0);
        assert!(page.object_entries.is_empty());
    }

    #[test]
    fn test_exhausted_error_display() {
        let err = ConnectorError::RetriesExhausted {
            attempts: 5,
            last_error: Box::new(ConnectorError::Timeout("read timed out".into())),
        };
        assert!(err.is_exhausted());
        assert_eq!(
            err.to_string(),
            "Gave up after 5 attempts: Timeout: read timed out"
        );
    }

    #[test]
    fn test_connector_config_defaults() {
        let config: ConnectorConfig = serde_json::from_str(
            r#"{"name": "assets", "base_url": "https://cmdb.example.com", "auth": {"type": "none"}}"#,
        )
        .unwrap();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.retry_interval_ms, 2_000);
        assert_eq!(config.timeout_secs, 30);
        assert!(config.verify_tls);
    }
}
