//! Alert notification dispatch.
//!
//! Renders the message for a verdict and hands it to a sink. Dispatch
//! failures are logged by the caller and never change an evaluation.

use crate::models::{Account, AlertKind, AlertPair};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when dispatching a notification
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Webhook returned HTTP {0}")]
    Status(u16),
}

impl AlertKind {
    pub fn subject(&self) -> &'static str {
        match self {
            AlertKind::DeviceSilent => "ALERT: Asset GPS device gone dark!",
            AlertKind::MovingWithoutCompanion => "ALERT: Asset is moving without you!",
        }
    }
}

/// A rendered alert addressed to an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertNotification {
    pub account_id: i64,
    pub email: String,
    pub cc: Option<String>,
    pub kind: AlertKind,
    pub subject: String,
    pub body: String,
    pub devices: Vec<String>,
}

impl AlertNotification {
    pub fn render(account: &Account, pair: &AlertPair, kind: AlertKind, liveness_minutes: i64) -> Self {
        let companion = pair.companion_name.as_deref().unwrap_or("companion");

        let (warning, devices) = match kind {
            AlertKind::DeviceSilent => (
                format!(
                    "your asset GPS device \"{}\" has gone dark for more than {} minutes now!",
                    pair.asset_name, liveness_minutes
                ),
                vec![pair.asset_name.clone()],
            ),
            AlertKind::MovingWithoutCompanion => (
                format!(
                    "your asset GPS device \"{}\" is moving without your companion device \"{}\"!",
                    pair.asset_name, companion
                ),
                vec![pair.asset_name.clone(), companion.to_string()],
            ),
        };

        let body = format!(
            "Hi {},\n\nWARNING: POTENTIAL ASSET HIJACKING!\n\nThis is an alert to let you know that {}\n",
            account.email, warning
        );

        Self {
            account_id: account.id,
            email: account.email.clone(),
            cc: account.contact_email.clone(),
            kind,
            subject: kind.subject().to_string(),
            body,
            devices,
        }
    }
}

/// Sink for alert notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &AlertNotification) -> Result<(), NotifyError>;
}

/// Dispatches notifications to a webhook URL via HTTP POST
#[derive(Clone)]
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: &str, timeout_secs: u64) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            url: url.to_string(),
            client,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notification: &AlertNotification) -> Result<(), NotifyError> {
        let response = self.client.post(&self.url).json(notification).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }

        tracing::info!("Sent alert notification: {}", notification.subject);
        Ok(())
    }
}

/// Writes notifications to the log only
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &AlertNotification) -> Result<(), NotifyError> {
        tracing::warn!(
            account_id = notification.account_id,
            kind = notification.kind.as_str(),
            "{} ({})",
            notification.subject,
            notification.devices.join(", ")
        );
        Ok(())
    }
}
