//! Configuration loading for the CMDB reconciler CLI.

use anyhow::{Context, Result};
use cr_connectors::{
    AuthConfig, ConnectorConfig, JiraAssetsConfig, LogNotifier, Notifier, RetryPolicy,
    SecureString, WebhookNotifier,
};
use cr_core::ReconcileConfig;
use cr_observability::LoggingConfig as ObservabilityLoggingConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const REDACTED: &str = "***REDACTED***";

/// Environment variable consulted when `cmdb.api_token` is left empty.
pub const API_TOKEN_ENV: &str = "CMDB_API_TOKEN";

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Asset catalog connection.
    pub cmdb: CmdbConfig,

    /// Catalog layout and derivation tables.
    pub reconcile: ReconcileConfig,

    /// Hostname resolution.
    #[serde(default)]
    pub dns: DnsConfig,

    /// End-of-run notifications.
    #[serde(default)]
    pub notification: NotificationConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Loads configuration from a file, expanding `${VAR}` references.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_yaml_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parses a YAML document, then expands `${VAR}` references in the
    /// connection and notification fields.
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let mut config: Self = serde_yaml::from_str(contents)?;
        config.expand_env_fields();

        if config.cmdb.api_token.is_empty() {
            if let Ok(token) = std::env::var(API_TOKEN_ENV) {
                config.cmdb.api_token = SecureString::new(token);
            }
        }

        Ok(config)
    }

    /// Substitutes environment values into the fields that accept `${VAR}`.
    /// Values are inserted after parsing, so they are never read as YAML.
    fn expand_env_fields(&mut self) {
        self.cmdb.base_url = expand_env(&self.cmdb.base_url);
        self.cmdb.email = expand_env(&self.cmdb.email);
        if is_unexpanded(self.cmdb.api_token.expose_secret()) {
            let token = expand_env(self.cmdb.api_token.expose_secret());
            self.cmdb.api_token = SecureString::new(token);
        }
        if let Some(url) = self.notification.webhook_url.as_mut() {
            *url = expand_env(url);
        }
        for value in self.notification.headers.values_mut() {
            *value = expand_env(value);
        }
    }

    /// Creates a copy with secrets redacted.
    pub fn redact_secrets(&self) -> Self {
        let mut config = self.clone();

        if !config.cmdb.api_token.is_empty() {
            config.cmdb.api_token = SecureString::from(REDACTED);
        }

        for value in config.notification.headers.values_mut() {
            *value = REDACTED.to_string();
        }

        config
    }
}

/// Asset catalog connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CmdbConfig {
    /// Assets API root, e.g. `https://company.atlassian.net/rest/assets/1.0`.
    pub base_url: String,

    /// Account email for basic authentication. Empty selects bearer auth.
    #[serde(default)]
    pub email: String,

    /// API token (or personal access token).
    #[serde(default)]
    pub api_token: SecureString,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Attempts per call, first try included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Wait between attempts, in milliseconds.
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,

    /// Client-side rate limit.
    #[serde(default)]
    pub requests_per_minute: Option<u32>,

    #[serde(default = "default_true")]
    pub verify_tls: bool,
}

fn default_timeout() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    5
}

fn default_retry_interval_ms() -> u64 {
    2_000
}

fn default_true() -> bool {
    true
}

impl CmdbConfig {
    /// Authentication derived from the email and token fields.
    pub fn auth(&self) -> AuthConfig {
        if self.api_token.is_empty() {
            AuthConfig::None
        } else if self.email.is_empty() {
            AuthConfig::BearerToken {
                token: self.api_token.clone(),
            }
        } else {
            AuthConfig::Basic {
                username: self.email.clone(),
                password: self.api_token.clone(),
            }
        }
    }

    /// Connector settings for the Jira Assets client.
    pub fn connector_config(&self) -> JiraAssetsConfig {
        let mut connector = ConnectorConfig::new("jira-assets", &self.base_url, self.auth());
        connector.timeout_secs = self.timeout_secs;
        connector.max_attempts = self.max_attempts;
        connector.retry_interval_ms = self.retry_interval_ms;
        connector.verify_tls = self.verify_tls;

        JiraAssetsConfig {
            connector,
            requests_per_minute: self.requests_per_minute,
        }
    }
}

/// Hostname resolution retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_interval_ms: default_retry_interval_ms(),
        }
    }
}

impl DnsConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.retry_interval_ms),
        )
    }
}

/// Notification settings. Without a webhook, notifications are logged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Extra headers sent with each webhook call.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl NotificationConfig {
    /// Builds the configured notifier.
    pub fn build(&self) -> Result<Box<dyn Notifier>> {
        match self.webhook_url.as_deref().filter(|url| !url.is_empty()) {
            Some(url) => {
                let notifier = WebhookNotifier::new(url)
                    .context("Invalid webhook notification settings")?
                    .with_headers(self.headers.clone());
                Ok(Box::new(notifier))
            }
            None => Ok(Box::new(LogNotifier::default())),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to use JSON format.
    #[serde(default)]
    pub json_format: bool,

    /// Run log file, truncated at start.
    #[serde(default)]
    pub file_path: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
            file_path: None,
        }
    }
}

impl LoggingConfig {
    /// Converts to the subscriber settings. Unknown levels fall back to INFO.
    pub fn to_observability(&self) -> ObservabilityLoggingConfig {
        ObservabilityLoggingConfig {
            level: self.level.parse().unwrap_or(tracing::Level::INFO),
            json_format: self.json_format,
            file: self.file_path.clone(),
            ..Default::default()
        }
    }
}

/// Replaces `${NAME}` with the value of the environment variable `NAME`.
///
/// Unset variables are left as written so validation can point at them.
pub fn expand_env(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match std::env::var(name) {
                    Ok(value) if !name.is_empty() => out.push_str(&value),
                    _ => out.push_str(&rest[start..start + 2 + end + 1]),
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Returns true when a value still holds an unexpanded `${VAR}` reference.
pub fn is_unexpanded(value: &str) -> bool {
    value.contains("${")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
cmdb:
  base_url: https://company.atlassian.net/rest/assets/1.0
  email: automation@company.com
  api_token: plain-token
  requests_per_minute: 120

reconcile:
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
  network_object:
    name_attribute_id: "361"
    ipv4_attribute_id: "362"
  site_object_ids:
    MTL-A: "50"
  device_type_ids:
    server: "70"

notification:
  webhook_url: https://hooks.example.com/cmdb
  headers:
    Authorization: Bearer hook-secret

logging:
  level: debug
"#;

    #[test]
    fn test_parse_yaml() {
        let config = AppConfig::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.cmdb.timeout_secs, 30);
        assert_eq!(config.cmdb.max_attempts, 5);
        assert_eq!(config.cmdb.requests_per_minute, Some(120));
        assert_eq!(config.reconcile.schema_id, "3");
        assert_eq!(config.dns.max_attempts, 5);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_connector_config_uses_basic_auth_with_email() {
        let config = AppConfig::from_yaml_str(SAMPLE).unwrap();
        let jira = config.cmdb.connector_config();
        assert_eq!(jira.requests_per_minute, Some(120));
        assert_eq!(jira.connector.retry_interval_ms, 2_000);
        match jira.connector.auth {
            AuthConfig::Basic { username, password } => {
                assert_eq!(username, "automation@company.com");
                assert_eq!(password.expose_secret(), "plain-token");
            }
            other => panic!("unexpected auth: {:?}", other),
        }
    }

    #[test]
    fn test_bearer_auth_without_email() {
        let mut config = AppConfig::from_yaml_str(SAMPLE).unwrap();
        config.cmdb.email.clear();
        assert!(matches!(config.cmdb.auth(), AuthConfig::BearerToken { .. }));
    }

    #[test]
    fn test_redact_secrets() {
        let config = AppConfig::from_yaml_str(SAMPLE).unwrap();
        let redacted = config.redact_secrets();
        assert_eq!(redacted.cmdb.api_token.expose_secret(), REDACTED);
        assert_eq!(redacted.notification.headers["Authorization"], REDACTED);
        assert_eq!(config.cmdb.api_token.expose_secret(), "plain-token");
    }

    #[test]
    fn test_expand_env() {
        std::env::set_var("CR_TEST_EXPAND_TOKEN", "s3cret");
        assert_eq!(
            expand_env("token: ${CR_TEST_EXPAND_TOKEN} tail"),
            "token: s3cret tail"
        );
        assert_eq!(
            expand_env("token: ${CR_TEST_UNSET_VARIABLE}"),
            "token: ${CR_TEST_UNSET_VARIABLE}"
        );
        assert_eq!(expand_env("open ${brace"), "open ${brace");
        assert!(is_unexpanded("${CR_TEST_UNSET_VARIABLE}"));
    }

    #[test]
    fn test_env_values_are_not_parsed_as_yaml() {
        std::env::set_var("CR_TEST_TOKEN_WITH_HASH", "abc #tail");
        std::env::set_var("CR_TEST_TOKEN_WITH_COLON", "a: b");
        std::env::set_var("CR_TEST_HOOK_HEADER", "Bearer x\ninjected: true");

        let yaml = r#"
cmdb:
  base_url: https://company.atlassian.net/rest/assets/1.0
  email: ${CR_TEST_TOKEN_WITH_COLON}
  api_token: ${CR_TEST_TOKEN_WITH_HASH}
reconcile:
  schema_id: "3"
  network_object:
    name_attribute_id: "361"
    ipv4_attribute_id: "362"
notification:
  headers:
    Authorization: ${CR_TEST_HOOK_HEADER}
"#;
        let config = AppConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.cmdb.api_token.expose_secret(), "abc #tail");
        assert_eq!(config.cmdb.email, "a: b");
        assert_eq!(
            config.notification.headers["Authorization"],
            "Bearer x\ninjected: true"
        );
        assert_eq!(config.notification.headers.len(), 1);
    }

    #[test]
    fn test_logging_conversion() {
        let logging = LoggingConfig {
            level: "warn".to_string(),
            json_format: true,
            file_path: Some(PathBuf::from("run.log")),
        };
        let converted = logging.to_observability();
        assert_eq!(converted.level, tracing::Level::WARN);
        assert!(converted.json_format);
        assert_eq!(converted.file, Some(PathBuf::from("run.log")));

        let fallback = LoggingConfig {
            level: "chatty".to_string(),
            ..Default::default()
        };
        assert_eq!(fallback.to_observability().level, tracing::Level::INFO);
    }

    #[test]
    fn test_notifier_selection() {
        let mut notification = NotificationConfig::default();
        assert_eq!(notification.build().unwrap().name(), "log");

        notification.webhook_url = Some("https://hooks.example.com/x".to_string());
        assert_eq!(notification.build().unwrap().name(), "webhook");
    }
}
