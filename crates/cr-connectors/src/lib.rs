//! # cr-connectors
//!
//! Remote collaborators of the CMDB reconciler: the asset catalog (Jira
//! Assets), DNS, and run-summary notification channels.
//!
//! All catalog traffic goes through [`HttpClient`], which applies the fixed
//! retry policy and reports exhaustion as [`ConnectorError::RetriesExhausted`].

pub mod cmdb;
pub mod dns;
pub mod http;
pub mod notify;
pub mod secure_string;
pub mod testing;
pub mod traits;

pub use secure_string::SecureString;

// Re-export traits
pub use traits::{
    AttributeSlot, AttributeValue, AuthConfig, CatalogPage, CatalogQuery, CmdbConnector,
    Connector, ConnectorConfig, ConnectorError, ConnectorHealth, ConnectorResult, DnsResolver,
    ObjectEntry,
};

// Re-export implementations
pub use cmdb::{JiraAssetsConfig, JiraAssetsConnector, MockCmdbConnector, MockObject};
pub use dns::{StaticResolver, SystemResolver};
pub use http::{HttpClient, RateLimitConfig, RetryPolicy};
pub use notify::{LogNotifier, NotificationError, Notifier, RunNotification, WebhookNotifier};
