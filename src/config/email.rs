// src/config/email.rs
use serde::{Deserialize, Serialize};
use std::env;

pub const DEFAULT_SENDER: &str = "The Morning Brief <onboarding@resend.dev>";

fn default_transport() -> String {
    "disabled".to_string()
}
fn default_sender() -> String {
    DEFAULT_SENDER.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmailConfig {
    /// "smtp" | "resend" | "log" | "disabled"
    #[serde(default = "default_transport")]
    pub transport: String,
    #[serde(default = "default_sender")]
    pub sender: String,
    #[serde(default)]
    pub recipient: Option<String>,
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default)]
    pub smtp_user: Option<String>,
    /// "ENV" means: read from SMTP_PASS
    #[serde(default)]
    pub smtp_pass: Option<String>,
    /// "ENV" means: read from RESEND_API_KEY
    #[serde(default)]
    pub resend_api_key: Option<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            transport: default_transport(),
            sender: default_sender(),
            recipient: None,
            smtp_host: None,
            smtp_user: None,
            smtp_pass: None,
            resend_api_key: None,
        }
    }
}

fn resolve_env(value: Option<String>, var: &str) -> Option<String> {
    match value {
        Some(v) if v.trim().eq_ignore_ascii_case("env") => env::var(var).ok(),
        other => other,
    }
    .filter(|v| !v.trim().is_empty())
}

impl EmailConfig {
    pub fn from_env() -> Self {
        let resend_api_key = env::var("RESEND_API_KEY").ok();
        let smtp_host = env::var("SMTP_HOST").ok();
        // Pick a transport from whichever credentials are present.
        let transport = env::var("EMAIL_TRANSPORT").unwrap_or_else(|_| {
            if resend_api_key.is_some() {
                "resend".to_string()
            } else if smtp_host.is_some() {
                "smtp".to_string()
            } else {
                default_transport()
            }
        });
        Self {
            transport,
            sender: env::var("SENDER_EMAIL").unwrap_or_else(|_| default_sender()),
            recipient: env::var("RECIPIENT_EMAIL").ok(),
            smtp_host,
            smtp_user: env::var("SMTP_USER").ok(),
            smtp_pass: env::var("SMTP_PASS").ok(),
            resend_api_key,
        }
    }

    pub fn finalize(mut self) -> anyhow::Result<Self> {
        self.transport = self.transport.trim().to_lowercase();
        if !matches!(self.transport.as_str(), "smtp" | "resend" | "log" | "disabled") {
            anyhow::bail!("Unsupported email transport in config: {}", self.transport);
        }
        if self.sender.trim().is_empty() {
            self.sender = default_sender();
        }
        self.recipient = self.recipient.filter(|r| !r.trim().is_empty());
        self.smtp_pass = resolve_env(self.smtp_pass, "SMTP_PASS");
        self.resend_api_key = resolve_env(self.resend_api_key, "RESEND_API_KEY");
        Ok(self)
    }
}
