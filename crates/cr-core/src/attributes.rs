//! Attribute accessor: reads and replace-style writes of semantic attributes.

use crate::config::ReconcileConfig;
use crate::error::{ReconcileError, ReconcileResult};
use crate::models::{AssetObject, Lookup, SemanticAttribute};
use cr_connectors::{AttributeSlot, AttributeValue, CmdbConnector, ObjectEntry};
use std::sync::Arc;
use tracing::{debug, error, instrument};

/// Reads and writes attributes by meaning, resolving the per-type attribute id.
pub struct AttributeAccessor {
    cmdb: Arc<dyn CmdbConnector>,
    config: Arc<ReconcileConfig>,
}

impl AttributeAccessor {
    pub fn new(cmdb: Arc<dyn CmdbConnector>, config: Arc<ReconcileConfig>) -> Self {
        Self { cmdb, config }
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Attribute id for an object, or a configuration error.
    pub fn attribute_id(
        &self,
        object: &AssetObject,
        attribute: SemanticAttribute,
    ) -> ReconcileResult<&str> {
        self.config
            .attribute_id(object.object_type, attribute)
            .ok_or_else(|| {
                ReconcileError::Config(format!(
                    "no {} attribute configured for {}",
                    attribute, object.object_type
                ))
            })
    }

    /// Current values of an attribute.
    ///
    /// One attribute-set fetch per call. An absent or empty slot is `Absent`;
    /// an unconfigured attribute or a failed fetch is `Unknown`.
    #[instrument(skip(self, object), fields(object_id = %object.id))]
    pub async fn read(
        &self,
        object: &AssetObject,
        attribute: SemanticAttribute,
    ) -> Lookup<Vec<AttributeValue>> {
        let attribute_id = match self.attribute_id(object, attribute) {
            Ok(id) => id,
            Err(e) => {
                error!(object_id = %object.id, error = %e, "Cannot read attribute");
                return Lookup::Unknown;
            }
        };

        let slots = match self.cmdb.get_attributes(&object.id).await {
            Ok(slots) => slots,
            Err(e) => {
                error!(
                    object_id = %object.id,
                    attribute = %attribute,
                    error = %e,
                    "Failed to read attributes"
                );
                return Lookup::Unknown;
            }
        };

        match slots
            .into_iter()
            .find(|slot| slot.object_type_attribute_id == attribute_id)
        {
            Some(slot) if !slot.object_attribute_values.is_empty() => {
                Lookup::Present(slot.object_attribute_values)
            }
            _ => {
                debug!(object_id = %object.id, attribute = %attribute, "Attribute not set");
                Lookup::Absent
            }
        }
    }

    /// Display forms of all values that have one.
    pub async fn read_displays(
        &self,
        object: &AssetObject,
        attribute: SemanticAttribute,
    ) -> Lookup<Vec<String>> {
        self.read(object, attribute).await.and_then_opt(|values| {
            let displays: Vec<String> = values
                .into_iter()
                .filter_map(|v| v.display_value)
                .collect();
            (!displays.is_empty()).then_some(displays)
        })
    }

    /// Display form of the first value that has one.
    pub async fn read_first_display(
        &self,
        object: &AssetObject,
        attribute: SemanticAttribute,
    ) -> Lookup<String> {
        self.read(object, attribute)
            .await
            .and_then_opt(|values| values.into_iter().find_map(|v| v.display_value))
    }

    /// Replaces an attribute's values with a single reference or raw value.
    #[instrument(skip(self, object), fields(object_id = %object.id))]
    pub async fn write(
        &self,
        object: &AssetObject,
        attribute: SemanticAttribute,
        value: &str,
    ) -> ReconcileResult<()> {
        self.replace(object, attribute, AttributeValue::reference(value))
            .await
    }

    /// Replaces an attribute's values with a single plain-text value.
    #[instrument(skip(self, object), fields(object_id = %object.id))]
    pub async fn write_text(
        &self,
        object: &AssetObject,
        attribute: SemanticAttribute,
        text: &str,
    ) -> ReconcileResult<()> {
        self.replace(object, attribute, AttributeValue::text(text))
            .await
    }

    async fn replace(
        &self,
        object: &AssetObject,
        attribute: SemanticAttribute,
        value: AttributeValue,
    ) -> ReconcileResult<()> {
        let attribute_id = self.attribute_id(object, attribute)?;
        self.cmdb
            .update_attributes(&object.id, vec![AttributeSlot::single(attribute_id, value)])
            .await?;
        Ok(())
    }

    /// Creates an IP network object whose name and IPv4 attributes are `ip`.
    #[instrument(skip(self))]
    pub async fn create_network_object(&self, ip: &str) -> ReconcileResult<ObjectEntry> {
        let network = &self.config.network_object;
        let created = self
            .cmdb
            .create_object(
                &network.object_type_id,
                vec![
                    AttributeSlot::single(&network.name_attribute_id, AttributeValue::reference(ip)),
                    AttributeSlot::single(&network.ipv4_attribute_id, AttributeValue::reference(ip)),
                ],
            )
            .await?;
        Ok(created)
    }
}
