use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{DeliveryError, DeliveryReceipt, Mailer, OutgoingReport};

const DEFAULT_ENDPOINT: &str = "https://api.resend.com/emails";

/// Resend HTTP API transport. One attempt per send; retrying is the caller's call.
#[derive(Clone)]
pub struct ResendMailer {
    client: Client,
    api_key: String,
    endpoint: String,
    from: String,
    to: String,
}

impl ResendMailer {
    pub fn new(client: Client, api_key: String, from: String, to: String) -> Self {
        Self {
            client,
            api_key,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            from,
            to,
        }
    }
}

#[derive(Serialize)]
struct SendPayload<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

#[derive(Deserialize)]
struct SendResponse {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: Option<String>,
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, report: &OutgoingReport) -> Result<DeliveryReceipt, DeliveryError> {
        if self.api_key.is_empty() {
            return Err(DeliveryError::NotConfigured("RESEND_API_KEY".to_string()));
        }
        let payload = SendPayload {
            from: &self.from,
            to: [&self.to],
            subject: &report.subject,
            html: &report.html,
        };

        let rsp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(format!("resend request failed: {e}")))?;

        let status = rsp.status();
        if !status.is_success() {
            let message = rsp
                .json::<ErrorResponse>()
                .await
                .ok()
                .and_then(|b| b.message)
                .unwrap_or_else(|| status.to_string());
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: SendResponse = rsp.json().await.unwrap_or(SendResponse { id: None });
        Ok(DeliveryReceipt {
            recipient: self.to.clone(),
            message_id: body.id,
        })
    }

    fn recipient(&self) -> Option<&str> {
        Some(&self.to)
    }

    fn transport_name(&self) -> &'static str {
        "resend"
    }
}
