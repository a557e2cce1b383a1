//! Run-summary notifications.
//!
//! A batch job ends by handing a [`RunNotification`] to a [`Notifier`]. The
//! notification only carries data; each channel decides how to render it.

mod webhook;

pub use webhook::WebhookNotifier;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Errors that can occur when sending notifications.
#[derive(Error, Debug)]
pub enum NotificationError {
    /// Failed to send the notification.
    #[error("Failed to send notification: {0}")]
    SendFailed(String),

    /// Invalid configuration.
    #[error("Invalid notification configuration: {0}")]
    InvalidConfig(String),

    /// Rate limited by the notification service.
    #[error("Rate limited: {0}")]
    RateLimited(String),
}

/// Outcome of a batch job, ready to be delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunNotification {
    /// Job name, e.g. "Set Backup Locations".
    pub job: String,
    /// True when nothing was left unresolved.
    pub success: bool,
    /// Subject line.
    pub subject: String,
    /// Items the job could not process (hostnames).
    pub unresolved: Vec<String>,
    /// Human-readable body.
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

impl RunNotification {
    /// Builds the notification for a job from the items it failed to resolve.
    pub fn for_job(job: impl Into<String>, unresolved: Vec<String>) -> Self {
        let job = job.into();
        let success = unresolved.is_empty();
        let (outcome, summary) = if success {
            ("with Success", "All objects were updated successfully".to_string())
        } else {
            (
                "with Failures",
                format!(
                    "These hosts failed to update because they could not be found in Jira Assets: {}",
                    unresolved.join(", ")
                ),
            )
        };

        Self {
            subject: format!("Jira Assets - {} Automation {}", job, outcome),
            job,
            success,
            unresolved,
            summary,
            created_at: Utc::now(),
        }
    }

    /// Replaces the generated body.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }
}

/// Trait for notification channels.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers a run notification.
    async fn notify(&self, notification: &RunNotification) -> Result<(), NotificationError>;

    /// Returns the name of the notifier.
    fn name(&self) -> &str;
}

/// A notifier that writes notifications to the log.
#[derive(Debug)]
pub struct LogNotifier {
    name: String,
}

impl LogNotifier {
    /// Creates a new log notifier.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new("log")
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &RunNotification) -> Result<(), NotificationError> {
        if notification.success {
            info!(
                notifier = %self.name,
                job = %notification.job,
                subject = %notification.subject,
                "{}",
                notification.summary
            );
        } else {
            warn!(
                notifier = %self.name,
                job = %notification.job,
                subject = %notification.subject,
                unresolved = notification.unresolved.len(),
                "{}",
                notification.summary
            );
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
