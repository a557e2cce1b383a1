//! Webhook notification channel.
//!
//! Posts run notifications as JSON to an arbitrary endpoint (chat-ops relay,
//! ticketing intake, mail gateway).

use super::{NotificationError, Notifier, RunNotification};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error, instrument};

/// A notifier that sends JSON payloads to a webhook URL.
pub struct WebhookNotifier {
    url: String,
    headers: HashMap<String, String>,
    client: reqwest::Client,
}

/// Payload structure for webhook notifications.
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    job: &'a str,
    success: bool,
    subject: &'a str,
    summary: &'a str,
    unresolved: &'a [String],
    created_at: String,
}

impl WebhookNotifier {
    /// Creates a new webhook notifier.
    pub fn new(url: impl Into<String>) -> Result<Self, NotificationError> {
        let url = url.into();
        if url.is_empty() {
            return Err(NotificationError::InvalidConfig(
                "Webhook URL cannot be empty".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| NotificationError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            url,
            headers: HashMap::new(),
            client,
        })
    }

    /// Adds a header to be included in webhook requests.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Sets multiple headers at once.
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers.extend(headers);
        self
    }

    fn payload<'a>(notification: &'a RunNotification) -> WebhookPayload<'a> {
        WebhookPayload {
            job: &notification.job,
            success: notification.success,
            subject: &notification.subject,
            summary: &notification.summary,
            unresolved: &notification.unresolved,
            created_at: notification.created_at.to_rfc3339(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    #[instrument(skip(self, notification), fields(url = %self.url))]
    async fn notify(&self, notification: &RunNotification) -> Result<(), NotificationError> {
        let mut request = self.client.post(&self.url).json(&Self::payload(notification));
        for (key, value) in &self.headers {
            request = request.header(key.as_str(), value.as_str());
        }

        debug!(job = %notification.job, "Sending notification to webhook");

        let response = request
            .send()
            .await
            .map_err(|e| NotificationError::SendFailed(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            debug!(job = %notification.job, "Webhook accepted notification");
            Ok(())
        } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Err(NotificationError::RateLimited(
                "Webhook rate limit exceeded".to_string(),
            ))
        } else {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            error!(status = %status, "Webhook rejected notification");
            Err(NotificationError::SendFailed(format!(
                "Webhook returned {}: {}",
                status, body
            )))
        }
    }

    fn name(&self) -> &str {
        "webhook"
    }
}
