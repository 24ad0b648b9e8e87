use std::sync::Mutex;

use async_trait::async_trait;
use tracing::info;

use super::{DeliveryError, DeliveryReceipt, Mailer, OutgoingReport};

/// Keeps sent reports in memory and logs the subject. Optionally fails every send.
pub struct MemoryMailer {
    recipient: String,
    fail_with: Option<DeliveryError>,
    outbox: Mutex<Vec<OutgoingReport>>,
}

impl MemoryMailer {
    pub fn new(recipient: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            fail_with: None,
            outbox: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(recipient: impl Into<String>, err: DeliveryError) -> Self {
        Self {
            fail_with: Some(err),
            ..Self::new(recipient)
        }
    }

    pub fn sent(&self) -> Vec<OutgoingReport> {
        self.outbox.lock().expect("outbox mutex poisoned").clone()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, report: &OutgoingReport) -> Result<DeliveryReceipt, DeliveryError> {
        if let Some(err) = &self.fail_with {
            return Err(err.clone());
        }
        let mut outbox = self.outbox.lock().expect("outbox mutex poisoned");
        outbox.push(report.clone());
        info!(
            target: "delivery",
            to = %self.recipient,
            subject = %report.subject,
            bytes = report.html.len(),
            "report kept in memory outbox"
        );
        Ok(DeliveryReceipt {
            recipient: self.recipient.clone(),
            message_id: Some(format!("memory-{}", outbox.len())),
        })
    }

    fn recipient(&self) -> Option<&str> {
        Some(&self.recipient)
    }

    fn transport_name(&self) -> &'static str {
        "log"
    }
}
