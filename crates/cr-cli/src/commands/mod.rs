//! Subcommands that talk to the asset catalog.

mod backup_sync;
mod reconcile;

pub use backup_sync::{run_backup_sync, BackupSyncArgs};
pub use reconcile::{run_reconcile, ReconcileArgs};

use anyhow::{bail, Context, Result};
use colored::Colorize;
use cr_connectors::{JiraAssetsConnector, Notifier, RunNotification};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::validator::ConfigValidator;

/// Validates the configuration and refuses to continue on errors.
fn ensure_valid(config: &AppConfig) -> Result<()> {
    let validation = ConfigValidator::validate(config);
    if validation.has_errors() {
        validation.print();
        bail!("Configuration validation failed. Fix the errors above and try again.");
    }
    for warning in &validation.warnings {
        warn!(warning = %warning, "Configuration warning");
    }
    Ok(())
}

/// Builds the Jira Assets client from the `cmdb` section.
fn connect(config: &AppConfig) -> Result<Arc<JiraAssetsConnector>> {
    let connector = JiraAssetsConnector::new(config.cmdb.connector_config())
        .context("Failed to create the Jira Assets client")?;
    Ok(Arc::new(connector))
}

/// Sends the end-of-run notification. Delivery failures are reported, not fatal.
async fn deliver(notifier: &dyn Notifier, notification: &RunNotification) {
    match notifier.notify(notification).await {
        Ok(()) => info!(notifier = notifier.name(), subject = %notification.subject, "Notification sent"),
        Err(e) => {
            warn!(notifier = notifier.name(), error = %e, "Failed to send notification");
            println!("{}: {}", "Notification failed".yellow(), e);
        }
    }
}
