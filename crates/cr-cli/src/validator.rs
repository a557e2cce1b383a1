//! Configuration validation for the CMDB reconciler.
//!
//! Runs before any catalog call so that a broken configuration stops the
//! process instead of producing a run full of per-object failures.

use crate::config::{is_unexpanded, AppConfig};
use colored::Colorize;
use cr_core::{DeviceTypeTag, ObjectType, SemanticAttribute};

/// Attributes every reconciled type needs.
const REQUIRED_ATTRIBUTES: [SemanticAttribute; 2] =
    [SemanticAttribute::Name, SemanticAttribute::Site];

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Errors that prevent a run.
    pub errors: Vec<String>,
    /// Warnings that should be addressed but don't prevent a run.
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Prints the validation result to the console.
    pub fn print(&self) {
        if !self.warnings.is_empty() {
            println!();
            println!("{}", "Configuration Warnings:".yellow().bold());
            for warning in &self.warnings {
                println!("  {} {}", "⚠".yellow(), warning);
            }
        }

        if !self.errors.is_empty() {
            println!();
            println!("{}", "Configuration Errors:".red().bold());
            for error in &self.errors {
                println!("  {} {}", "✗".red(), error);
            }
        }

        if self.errors.is_empty() && self.warnings.is_empty() {
            println!("  {} Configuration OK", "✓".green());
        }
    }
}

/// Validates application configuration before a run.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates the application configuration.
    pub fn validate(config: &AppConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        Self::validate_cmdb(config, &mut result);
        Self::validate_reconcile(config, &mut result);
        Self::validate_hardware_types(config, &mut result);
        Self::validate_notification(config, &mut result);

        result
    }

    fn validate_cmdb(config: &AppConfig, result: &mut ValidationResult) {
        let cmdb = &config.cmdb;

        if cmdb.base_url.trim().is_empty() {
            result.add_error(
                "cmdb.base_url is required (e.g., https://company.atlassian.net/rest/assets/1.0)",
            );
        } else if !cmdb.base_url.starts_with("https://") && !cmdb.base_url.starts_with("http://") {
            result.add_error(format!(
                "cmdb.base_url '{}' must start with http:// or https://",
                cmdb.base_url
            ));
        } else if cmdb.base_url.starts_with("http://") {
            result.add_warning("cmdb.base_url uses plain HTTP; credentials are sent unencrypted");
        }

        if cmdb.api_token.is_empty() {
            result.add_warning(format!(
                "No CMDB API token configured. Set cmdb.api_token or the {} env var.",
                crate::config::API_TOKEN_ENV
            ));
        } else if is_unexpanded(cmdb.api_token.expose_secret()) {
            result.add_error("cmdb.api_token references an environment variable that is not set");
        }

        if cmdb.max_attempts == 0 {
            result.add_error("cmdb.max_attempts must be at least 1");
        }

        if !cmdb.verify_tls {
            result.add_warning("TLS certificate verification is disabled for the CMDB connection");
        }
    }

    fn validate_reconcile(config: &AppConfig, result: &mut ValidationResult) {
        let reconcile = &config.reconcile;

        if let Err(e) = reconcile.validate() {
            result.add_error(e.to_string());
        }

        for object_type in ObjectType::ALL {
            let Some(type_config) = reconcile.object_types.get(&object_type) else {
                result.add_warning(format!(
                    "No catalog ids configured for object type '{}'; it will not be reconciled",
                    object_type
                ));
                continue;
            };
            for attribute in REQUIRED_ATTRIBUTES {
                if !type_config.attributes.contains_key(&attribute) {
                    result.add_warning(format!(
                        "object_types.{}.attributes.{} is not configured",
                        object_type, attribute
                    ));
                }
            }
        }

        let unmapped = reconcile.unmapped_sites();
        if !unmapped.is_empty() {
            let names: Vec<&str> = unmapped.iter().map(|s| s.as_str()).collect();
            result.add_warning(format!(
                "Sites in the site map have no catalog object id: {}",
                names.join(", ")
            ));
        }

        let missing_tags: Vec<&str> = DeviceTypeTag::ALL
            .iter()
            .filter(|tag| reconcile.device_type_id(**tag).is_none())
            .map(|tag| tag.as_str())
            .collect();
        if !missing_tags.is_empty() {
            result.add_warning(format!(
                "Device types without a catalog object id: {}",
                missing_tags.join(", ")
            ));
        }
    }

    fn validate_hardware_types(config: &AppConfig, result: &mut ValidationResult) {
        let hardware = &config.reconcile.hardware_device_type_ids;
        if hardware.is_empty() {
            result.add_warning(
                "reconcile.hardware_device_type_ids is empty; device objects have no known hardware types",
            );
        }
        if let Some((name, _)) = hardware.iter().find(|(_, id)| id.trim().is_empty()) {
            result.add_error(format!(
                "hardware_device_type_ids.{} must not be empty",
                name
            ));
        }
    }

    fn validate_notification(config: &AppConfig, result: &mut ValidationResult) {
        if let Some(url) = config.notification.webhook_url.as_deref() {
            if is_unexpanded(url) {
                result.add_error(
                    "notification.webhook_url references an environment variable that is not set",
                );
            } else if !url.is_empty() && !url.starts_with("https://") && !url.starts_with("http://")
            {
                result.add_error(format!(
                    "notification.webhook_url '{}' must start with http:// or https://",
                    url
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
cmdb:
  base_url: https://company.atlassian.net/rest/assets/1.0
  email: automation@company.com
  api_token: token
reconcile:
  schema_id: "3"
  object_types:
    host:
      object_type_id: "8"
      attributes: { name: "101", site: "103" }
    virtual guest:
      object_type_id: "9"
      attributes: { name: "201", site: "203" }
    device:
      object_type_id: "10"
      attributes: { name: "301", site: "303" }
  network_object:
    name_attribute_id: "361"
    ipv4_attribute_id: "362"
  site_object_ids:
    MTL-A: "50"
    TEM-A: "54"
    QUE-A: "52"
    TOR-A: "55"
    IND-A: "49"
    TWN-A: "56"
  device_type_ids:
    server: "70"
    computer: "71"
    virtual workstation: "72"
  hardware_device_type_ids:
    switch: "80"
    ap: "81"
"#;

    fn config() -> AppConfig {
        AppConfig::from_yaml_str(CONFIG).unwrap()
    }

    #[test]
    fn test_validation_result_operations() {
        let mut result = ValidationResult::new();
        assert!(!result.has_errors());
        assert!(!result.has_warnings());

        result.add_error("Test error");
        result.add_warning("Test warning");
        assert!(result.has_errors());
        assert!(result.has_warnings());
    }

    #[test]
    fn test_complete_config_is_clean() {
        let result = ConfigValidator::validate(&config());
        assert!(!result.has_errors(), "{:?}", result.errors);
        assert!(!result.has_warnings(), "{:?}", result.warnings);
    }

    #[test]
    fn test_missing_base_url_is_an_error() {
        let mut config = config();
        config.cmdb.base_url = String::new();

        let mut result = ValidationResult::new();
        ConfigValidator::validate_cmdb(&config, &mut result);
        assert!(result.has_errors());
    }

    #[test]
    fn test_unexpanded_token_is_an_error() {
        let mut config = config();
        config.cmdb.api_token = "${CR_TEST_NEVER_SET}".into();

        let mut result = ValidationResult::new();
        ConfigValidator::validate_cmdb(&config, &mut result);
        assert!(result.errors[0].contains("api_token"));
    }

    #[test]
    fn test_unmapped_sites_and_device_types_warn() {
        let mut config = config();
        config.reconcile.site_object_ids.clear();
        config.reconcile.device_type_ids.clear();

        let mut result = ValidationResult::new();
        ConfigValidator::validate_reconcile(&config, &mut result);
        assert!(!result.has_errors());
        assert!(result.warnings.iter().any(|w| w.contains("MTL-A")));
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("virtual workstation")));
    }

    #[test]
    fn test_missing_object_type_warns() {
        let mut config = config();
        config.reconcile.object_types.remove(&ObjectType::Device);

        let mut result = ValidationResult::new();
        ConfigValidator::validate_reconcile(&config, &mut result);
        assert!(result.warnings.iter().any(|w| w.contains("device")));
    }

    #[test]
    fn test_invalid_reconcile_tables_are_errors() {
        let mut config = config();
        config.reconcile.results_per_page = 0;

        let mut result = ValidationResult::new();
        ConfigValidator::validate_reconcile(&config, &mut result);
        assert!(result.has_errors());
    }

    #[test]
    fn test_hardware_device_types() {
        let mut config = config();
        config.reconcile.hardware_device_type_ids.clear();

        let mut result = ValidationResult::new();
        ConfigValidator::validate_hardware_types(&config, &mut result);
        assert!(result.warnings[0].contains("hardware_device_type_ids"));

        config
            .reconcile
            .hardware_device_type_ids
            .insert("camera".to_string(), " ".to_string());
        let mut result = ValidationResult::new();
        ConfigValidator::validate_hardware_types(&config, &mut result);
        assert!(result.errors[0].contains("camera"));
    }

    #[test]
    fn test_bad_webhook_url() {
        let mut config = config();
        config.notification.webhook_url = Some("ftp://hooks".to_string());

        let mut result = ValidationResult::new();
        ConfigValidator::validate_notification(&config, &mut result);
        assert!(result.has_errors());
    }
}
