use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::{DeliveryError, DeliveryReceipt, Mailer, OutgoingReport};

pub struct SmtpMailer {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
    to_display: String,
}

impl SmtpMailer {
    pub fn new(host: &str, user: &str, pass: &str, from: &str, to: &str) -> Result<Self> {
        let creds = Credentials::new(user.to_string(), pass.to_string());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .with_context(|| format!("invalid SMTP host {host}"))?
            .credentials(creds)
            .build();

        let from: Mailbox = from.parse().context("invalid sender address")?;
        let to: Mailbox = to.parse().context("invalid recipient address")?;

        Ok(Self {
            mailer,
            from,
            to_display: to.email.to_string(),
            to,
        })
    }

    fn build(&self, report: &OutgoingReport) -> Result<Message, DeliveryError> {
        Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(report.subject.clone())
            .header(header::ContentType::TEXT_HTML)
            .body(report.html.clone())
            .map_err(|e| DeliveryError::Transport(format!("build email: {e}")))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, report: &OutgoingReport) -> Result<DeliveryReceipt, DeliveryError> {
        let msg = self.build(report)?;
        let resp = self
            .mailer
            .send(msg)
            .await
            .map_err(|e| DeliveryError::Transport(format!("send email: {e}")))?;
        let message_id = resp.message().next().map(str::to_string);
        Ok(DeliveryReceipt {
            recipient: self.to_display.clone(),
            message_id,
        })
    }

    fn recipient(&self) -> Option<&str> {
        Some(&self.to_display)
    }

    fn transport_name(&self) -> &'static str {
        "smtp"
    }
}
