//! Customer notifications over email and SMS
//!
//! Dispatch is a side effect of a decision, never part of it: a `Notifier`
//! cannot fail. Channel failures are captured in the returned
//! `NotificationDelivery` and the caller records them as they are.

pub mod channels;
pub mod templates;

pub use channels::{SendGridEmail, TwilioSms};
pub use templates::RenderedMessage;

use crate::models::Contact;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

//
// ================= Enums =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Approval,
    Review,
    Rejection,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NotificationKind::Approval => "approval",
            NotificationKind::Review => "review",
            NotificationKind::Rejection => "rejection",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Failed,
    /// No address on file for this channel
    Skipped,
}

//
// ================= Messages =================
//

/// What to tell the customer. Carries the content each kind needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Notification {
    Approval,
    Review { required_actions: Vec<String> },
    Rejection { reason: String },
}

impl Notification {
    pub fn kind(&self) -> NotificationKind {
        match self {
            Notification::Approval => NotificationKind::Approval,
            Notification::Review { .. } => NotificationKind::Review,
            Notification::Rejection { .. } => NotificationKind::Rejection,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryResult {
    pub status: DeliveryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeliveryResult {
    pub fn sent(message_id: Option<String>) -> Self {
        Self {
            status: DeliveryStatus::Sent,
            message_id,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: DeliveryStatus::Failed,
            message_id: None,
            error: Some(error.into()),
        }
    }

    pub fn skipped() -> Self {
        Self {
            status: DeliveryStatus::Skipped,
            message_id: None,
            error: None,
        }
    }

    fn from_send(channel: &str, outcome: Result<Option<String>>) -> Self {
        match outcome {
            Ok(message_id) => Self::sent(message_id),
            Err(e) => {
                warn!(channel, error = %e, "Notification delivery failed");
                Self::failed(e.to_string())
            }
        }
    }
}

/// Per-channel outcome of one dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationDelivery {
    pub email: DeliveryResult,
    pub sms: DeliveryResult,
}

impl NotificationDelivery {
    pub fn any_sent(&self) -> bool {
        self.email.status == DeliveryStatus::Sent || self.sms.status == DeliveryStatus::Sent
    }

    pub fn overall_status(&self) -> DeliveryStatus {
        if self.any_sent() {
            DeliveryStatus::Sent
        } else if self.email.status == DeliveryStatus::Failed
            || self.sms.status == DeliveryStatus::Failed
        {
            DeliveryStatus::Failed
        } else {
            DeliveryStatus::Skipped
        }
    }
}

//
// ================= Collaborator Seams =================
//

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Dispatch `notification` to `contact`. Never fails; inspect the delivery.
    async fn notify(&self, notification: &Notification, contact: &Contact) -> NotificationDelivery;
}

#[async_trait]
pub trait EmailChannel: Send + Sync {
    /// Returns the provider's message id when it reports one.
    async fn send_email(&self, to: &str, subject: &str, html: &str) -> Result<Option<String>>;
}

#[async_trait]
pub trait SmsChannel: Send + Sync {
    async fn send_sms(&self, to: &str, body: &str) -> Result<Option<String>>;
}

/// Renders the templates and sends email and SMS concurrently.
#[derive(Clone)]
pub struct ChannelNotifier {
    email: Arc<dyn EmailChannel>,
    sms: Arc<dyn SmsChannel>,
}

impl ChannelNotifier {
    pub fn new(email: Arc<dyn EmailChannel>, sms: Arc<dyn SmsChannel>) -> Self {
        Self { email, sms }
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, notification: &Notification, contact: &Contact) -> NotificationDelivery {
        let message = templates::render(notification, contact);

        let email = async {
            DeliveryResult::from_send(
                "email",
                self.email
                    .send_email(&contact.email, &message.email_subject, &message.email_html)
                    .await,
            )
        };

        let sms = async {
            match contact.phone.as_deref() {
                Some(phone) => DeliveryResult::from_send(
                    "sms",
                    self.sms.send_sms(phone, &message.sms_text).await,
                ),
                None => DeliveryResult::skipped(),
            }
        };

        let (email, sms) = tokio::join!(email, sms);
        let delivery = NotificationDelivery { email, sms };

        info!(
            kind = %notification.kind(),
            email = ?delivery.email.status,
            sms = ?delivery.sms.status,
            "Notification dispatched"
        );

        delivery
    }
}
