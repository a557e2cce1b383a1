//! Testing harness for connector implementations.
//!
//! Provides helpers to build configs and catalog fixtures in tests.

use crate::traits::{
    AttributeSlot, AttributeValue, AuthConfig, ConnectorConfig, ConnectorError, ObjectEntry,
};
use std::collections::HashMap;

/// Creates a test connector config: no auth, a single attempt, no pause.
pub fn test_connector_config(name: &str, base_url: &str) -> ConnectorConfig {
    ConnectorConfig {
        name: name.to_string(),
        base_url: base_url.to_string(),
        auth: AuthConfig::None,
        timeout_secs: 30,
        max_attempts: 1,
        retry_interval_ms: 0,
        verify_tls: true,
        headers: HashMap::new(),
    }
}

/// A slot whose values carry both a machine and a display form.
pub fn slot(attribute_id: &str, values: &[(&str, &str)]) -> AttributeSlot {
    AttributeSlot {
        object_type_attribute_id: attribute_id.to_string(),
        object_attribute_values: values
            .iter()
            .map(|(value, display)| AttributeValue {
                value: Some(value.to_string()),
                display_value: Some(display.to_string()),
                ..Default::default()
            })
            .collect(),
    }
}

/// A slot of plain text values (value and display are identical).
pub fn text_slot(attribute_id: &str, values: &[&str]) -> AttributeSlot {
    let pairs: Vec<(&str, &str)> = values.iter().map(|v| (*v, *v)).collect();
    slot(attribute_id, &pairs)
}

/// A catalog entry fixture.
pub fn entry(id: &str, label: &str) -> ObjectEntry {
    ObjectEntry {
        id: id.to_string(),
        label: label.to_string(),
        object_key: None,
    }
}

/// The error a gateway reports once its retry budget is spent.
pub fn exhausted_error() -> ConnectorError {
    ConnectorError::RetriesExhausted {
        attempts: 5,
        last_error: Box::new(ConnectorError::ConnectionFailed(
            "connection refused".to_string(),
        )),
    }
}
