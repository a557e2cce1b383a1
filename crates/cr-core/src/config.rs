//! Reconciliation configuration.
//!
//! Built once at startup, validated, then shared read-only (behind an `Arc`)
//! by every component. Missing per-type attribute ids are not startup
//! errors; they surface as configuration errors on the items that need them.

use crate::derivation::{OsClassMap, SiteMap};
use crate::models::{DeviceTypeTag, ObjectType, SemanticAttribute, SiteCode};
use cr_connectors::CatalogQuery;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Catalog ids of one object type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectTypeConfig {
    /// Catalog id of the object type.
    pub object_type_id: String,
    /// Attribute id per semantic attribute.
    #[serde(default)]
    pub attributes: BTreeMap<SemanticAttribute, String>,
}

/// Catalog ids of the IP network object type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkObjectConfig {
    #[serde(default = "default_network_object_type_id")]
    pub object_type_id: String,
    pub name_attribute_id: String,
    pub ipv4_attribute_id: String,
}

fn default_network_object_type_id() -> String {
    "36".to_string()
}

fn default_results_per_page() -> u32 {
    25
}

/// Everything the engine needs to know about the catalog layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Object schema holding the tracked types.
    pub schema_id: String,
    /// Page size of catalog walks.
    #[serde(default = "default_results_per_page")]
    pub results_per_page: u32,
    /// Per-type ids.
    #[serde(default)]
    pub object_types: BTreeMap<ObjectType, ObjectTypeConfig>,
    pub network_object: NetworkObjectConfig,
    /// Catalog object id of each site.
    #[serde(default)]
    pub site_object_ids: BTreeMap<SiteCode, String>,
    /// Catalog object id of each derived device type.
    #[serde(default)]
    pub device_type_ids: BTreeMap<DeviceTypeTag, String>,
    /// Hardware device types (ap, camera, switch, ...). Never derived.
    #[serde(default)]
    pub hardware_device_type_ids: BTreeMap<String, String>,
    #[serde(default)]
    pub site_map: SiteMap,
    #[serde(default)]
    pub os_classes: OsClassMap,
}

impl ReconcileConfig {
    /// Parses and validates a YAML (or JSON) document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks structural invariants. Partial attribute tables are allowed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.schema_id.trim().is_empty() {
            return Err(ConfigError::Invalid("schema_id must not be empty".into()));
        }
        if self.results_per_page == 0 {
            return Err(ConfigError::Invalid(
                "results_per_page must be greater than zero".into(),
            ));
        }
        if self.network_object.object_type_id.trim().is_empty()
            || self.network_object.name_attribute_id.trim().is_empty()
            || self.network_object.ipv4_attribute_id.trim().is_empty()
        {
            return Err(ConfigError::Invalid(
                "network_object ids must not be empty".into(),
            ));
        }
        for (object_type, type_config) in &self.object_types {
            if type_config.object_type_id.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "object_types.{}.object_type_id must not be empty",
                    object_type
                )));
            }
            if let Some((attribute, _)) = type_config
                .attributes
                .iter()
                .find(|(_, id)| id.trim().is_empty())
            {
                return Err(ConfigError::Invalid(format!(
                    "object_types.{}.attributes.{} must not be empty",
                    object_type, attribute
                )));
            }
        }
        if let Some((site, _)) = self.site_object_ids.iter().find(|(_, id)| id.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "site_object_ids.{} must not be empty",
                site
            )));
        }
        let overlap = self.os_classes.overlapping();
        if !overlap.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "os_classes lists must be disjoint, both contain: {}",
                overlap.join(", ")
            )));
        }
        Ok(())
    }

    /// Catalog id of an object type.
    pub fn object_type_id(&self, object_type: ObjectType) -> Option<&str> {
        self.object_types
            .get(&object_type)
            .map(|t| t.object_type_id.as_str())
    }

    /// Attribute id of a semantic attribute on an object type.
    pub fn attribute_id(
        &self,
        object_type: ObjectType,
        attribute: SemanticAttribute,
    ) -> Option<&str> {
        self.object_types
            .get(&object_type)
            .and_then(|t| t.attributes.get(&attribute))
            .map(String::as_str)
    }

    pub fn site_object_id(&self, site: SiteCode) -> Option<&str> {
        self.site_object_ids.get(&site).map(String::as_str)
    }

    pub fn device_type_id(&self, tag: DeviceTypeTag) -> Option<&str> {
        self.device_type_ids.get(&tag).map(String::as_str)
    }

    /// Attributes returned with each catalog entry: name, network and site,
    /// those that are configured.
    pub fn display_attribute_ids(&self, object_type: ObjectType) -> Vec<String> {
        [
            SemanticAttribute::Name,
            SemanticAttribute::Network,
            SemanticAttribute::Site,
        ]
        .into_iter()
        .filter_map(|a| self.attribute_id(object_type, a).map(str::to_string))
        .collect()
    }

    /// Search parameters of a catalog walk, if the type is configured.
    pub fn catalog_query(&self, object_type: ObjectType) -> Option<CatalogQuery> {
        Some(CatalogQuery {
            object_type_id: self.object_type_id(object_type)?.to_string(),
            object_type_name: object_type.catalog_name().to_string(),
            schema_id: self.schema_id.clone(),
            display_attribute_ids: self.display_attribute_ids(object_type),
            results_per_page: self.results_per_page,
        })
    }

    /// Sites the site map can derive that have no catalog object id.
    pub fn unmapped_sites(&self) -> Vec<SiteCode> {
        self.site_map
            .sites()
            .filter(|site| !self.site_object_ids.contains_key(site))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
schema_id: "3"
object_types:
  host:
    object_type_id: "8"
    attributes:
      name: "101"
      network: "102"
      site: "103"
      operating_system: "104"
      device_type: "105"
  virtual guest:
    object_type_id: "9"
    attributes:
      name: "201"
      site: "203"
network_object:
  name_attribute_id: "361"
  ipv4_attribute_id: "362"
site_object_ids:
  MTL-A: "50"
  TOR-A: "55"
device_type_ids:
  server: "70"
  virtual workstation: "72"
hardware_device_type_ids:
  switch: "80"
"#;

    #[test]
    fn test_parse_yaml() {
        let config = ReconcileConfig::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.results_per_page, 25);
        assert_eq!(config.network_object.object_type_id, "36");
        assert_eq!(config.object_type_id(ObjectType::VirtualGuest), Some("9"));
        assert_eq!(
            config.attribute_id(ObjectType::Host, SemanticAttribute::Site),
            Some("103")
        );
        assert_eq!(
            config.attribute_id(ObjectType::VirtualGuest, SemanticAttribute::Network),
            None
        );
        assert_eq!(config.attribute_id(ObjectType::Device, SemanticAttribute::Site), None);
        assert_eq!(config.site_object_id(SiteCode::TorA), Some("55"));
        assert_eq!(config.device_type_id(DeviceTypeTag::Computer), None);
        assert_eq!(config.site_map, SiteMap::default());
    }

    #[test]
    fn test_display_attribute_ids_and_query() {
        let config = ReconcileConfig::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(
            config.display_attribute_ids(ObjectType::Host),
            vec!["101", "102", "103"]
        );
        assert_eq!(
            config.display_attribute_ids(ObjectType::VirtualGuest),
            vec!["201", "203"]
        );

        let query = config.catalog_query(ObjectType::VirtualGuest).unwrap();
        assert_eq!(query.object_type_name, "Virtual Guest");
        assert_eq!(query.schema_id, "3");
        assert!(config.catalog_query(ObjectType::Device).is_none());
    }

    #[test]
    fn test_unmapped_sites() {
        let config = ReconcileConfig::from_yaml_str(SAMPLE).unwrap();
        let unmapped = config.unmapped_sites();
        assert!(unmapped.contains(&SiteCode::IndA));
        assert!(!unmapped.contains(&SiteCode::MtlA));
    }

    #[test]
    fn test_rejects_malformed_tables() {
        let bad_site = SAMPLE.replace("MTL-A: \"50\"", "MTL-Z: \"50\"");
        assert!(matches!(
            ReconcileConfig::from_yaml_str(&bad_site),
            Err(ConfigError::Parse(_))
        ));

        let empty_schema = SAMPLE.replace("schema_id: \"3\"", "schema_id: \"\"");
        assert!(matches!(
            ReconcileConfig::from_yaml_str(&empty_schema),
            Err(ConfigError::Invalid(_))
        ));

        let overlapping = format!(
            "{}os_classes:\n  server_os: [\"Linux\"]\n  computer_os: [\"Linux\"]\n",
            SAMPLE
        );
        assert!(matches!(
            ReconcileConfig::from_yaml_str(&overlapping),
            Err(ConfigError::Invalid(_))
        ));
    }
}
