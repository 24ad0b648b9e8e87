//! Email delivery of rendered reports.
//!
//! Transports: SMTP via lettre, the Resend HTTP API, an in-memory outbox (local runs and
//! tests), and a disabled mailer that refuses every send.

pub mod email;
pub mod memory;
pub mod resend;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

pub use email::SmtpMailer;
pub use memory::MemoryMailer;
pub use resend::ResendMailer;

/// Subject + HTML body of one outgoing report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingReport {
    pub subject: String,
    pub html: String,
}

/// What the transport acknowledged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReceipt {
    pub recipient: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("email delivery is not configured: {0}")]
    NotConfigured(String),
    #[error("email transport failed: {0}")]
    Transport(String),
    #[error("email provider rejected the message (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, report: &OutgoingReport) -> Result<DeliveryReceipt, DeliveryError>;

    /// Configured recipient, if any.
    fn recipient(&self) -> Option<&str>;

    fn transport_name(&self) -> &'static str;
}

pub type DynMailer = Arc<dyn Mailer>;

/// Refuses every send; used when no usable transport is configured.
pub struct DisabledMailer {
    reason: String,
}

impl DisabledMailer {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Default for DisabledMailer {
    fn default() -> Self {
        Self::new("set EMAIL_TRANSPORT to smtp, resend or log")
    }
}

#[async_trait]
impl Mailer for DisabledMailer {
    async fn send(&self, _report: &OutgoingReport) -> Result<DeliveryReceipt, DeliveryError> {
        Err(DeliveryError::NotConfigured(self.reason.clone()))
    }

    fn recipient(&self) -> Option<&str> {
        None
    }

    fn transport_name(&self) -> &'static str {
        "disabled"
    }
}
