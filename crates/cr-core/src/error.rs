//! Error types for the reconciliation engine.

use cr_connectors::ConnectorError;
use thiserror::Error;

/// Errors raised while reconciling a single object or attribute.
///
/// None of these abort a run; they are recorded against the item that
/// raised them.
#[derive(Error, Debug, Clone)]
pub enum ReconcileError {
    /// A required mapping is missing for this object type, site or device type.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The catalog call failed (usually after exhausting its retries).
    #[error("Remote call failed: {0}")]
    Remote(#[from] ConnectorError),

    /// The hostname could not be resolved.
    #[error("DNS resolution failed: {0}")]
    Dns(String),
}

/// Result type for reconciliation operations.
pub type ReconcileResult<T> = Result<T, ReconcileError>;
