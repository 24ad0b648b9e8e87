//! # Pipeline orchestrator
//! One implementation of scan, render and deliver, shared by every trigger: the on-demand
//! API endpoints, the cron endpoint and the in-process scheduler.
//!
//! Collaborators (generator, verifier, mailer) are built once per app and injected; nothing
//! is cached in globals.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::{DateTime, FixedOffset, Utc};
use metrics::{counter, histogram};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::{BriefConfig, EmailConfig, GenerationConfig, ReportConfig};
use crate::extract::{self, ExtractionError};
use crate::llm::{AnthropicGenerator, DynGenerator, ScriptedGenerator, UpstreamError};
use crate::notify::{
    DeliveryError, DeliveryReceipt, DisabledMailer, DynMailer, MemoryMailer, OutgoingReport,
    ResendMailer, SmtpMailer,
};
use crate::prompts;
use crate::render::{self, RenderContext};
use crate::schema::{ScanBatch, VerificationResult};
use crate::verify::{Claim, Verifier};

/// Masthead note on reports produced by the recurring trigger.
pub const SCHEDULED_EDITION_NOTE: &str = "Automated Daily Scan";

/// A scan produced no batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("scan failed: {0}")]
    Scan(#[from] ScanError),
    /// The batch is valid; only sending it failed.
    #[error("delivery failed: {0}")]
    Delivery(#[from] DeliveryError),
    #[error("unauthorized")]
    Unauthorized,
}

/// Result of a scheduled run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliverySummary {
    pub item_count: usize,
    pub sent_to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

pub struct Pipeline {
    generator: DynGenerator,
    verifier: Verifier,
    mailer: DynMailer,
    report: ReportConfig,
    scan_max_tokens: u32,
    web_search: bool,
    // Scheduled runs queue here instead of overlapping.
    run_lock: Mutex<()>,
}

impl Pipeline {
    /// Pipeline with default report settings; the verifier shares the scan generator.
    pub fn new(generator: DynGenerator, mailer: DynMailer) -> Self {
        let defaults = GenerationConfig::default();
        Self {
            verifier: Verifier::new(
                generator.clone(),
                defaults.verify_max_tokens,
                defaults.web_search,
            ),
            generator,
            mailer,
            report: ReportConfig::default(),
            scan_max_tokens: defaults.max_tokens,
            web_search: defaults.web_search,
            run_lock: Mutex::new(()),
        }
    }

    pub fn with_verifier(mut self, verifier: Verifier) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn with_report(mut self, report: ReportConfig) -> Self {
        self.report = report;
        self
    }

    pub fn with_scan_limits(mut self, max_tokens: u32, web_search: bool) -> Self {
        self.scan_max_tokens = max_tokens;
        self.web_search = web_search;
        self
    }

    /// Build every collaborator from configuration.
    pub fn from_config(cfg: &BriefConfig) -> anyhow::Result<Self> {
        let gen = &cfg.generation;
        let http = AnthropicGenerator::http_client(Duration::from_secs(gen.timeout_secs))
            .context("building HTTP client")?;

        let (scan_gen, verify_gen): (DynGenerator, DynGenerator) = match gen.provider.as_str() {
            "mock" => {
                let scripted: DynGenerator = Arc::new(ScriptedGenerator::canned());
                (scripted.clone(), scripted)
            }
            _ => {
                let build = |model: &str| {
                    let g = AnthropicGenerator::new(http.clone(), gen.api_key.clone(), model);
                    match &gen.base_url {
                        Some(url) => g.with_base_url(url.clone()),
                        None => g,
                    }
                };
                let scan: DynGenerator = Arc::new(build(gen.model.as_str()));
                let verify: DynGenerator = Arc::new(build(gen.verify_model()));
                (scan, verify)
            }
        };

        let mailer = build_mailer(&cfg.email, http)?;
        info!(
            target: "scan",
            provider = scan_gen.provider_name(),
            model = %gen.model,
            verify_model = %gen.verify_model(),
            transport = mailer.transport_name(),
            "pipeline ready"
        );

        Ok(Self::new(scan_gen, mailer)
            .with_verifier(Verifier::new(verify_gen, gen.verify_max_tokens, gen.web_search))
            .with_report(cfg.report.clone())
            .with_scan_limits(gen.max_tokens, gen.web_search))
    }

    pub fn report_config(&self) -> &ReportConfig {
        &self.report
    }

    /// Current time in the report's configured offset.
    pub fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.report.offset())
    }

    /// Generate, extract and validate one batch.
    pub async fn run_scan(&self, focus: Option<&str>) -> Result<ScanBatch, ScanError> {
        let started = Instant::now();
        let req = prompts::scan_request(focus, self.scan_max_tokens, self.web_search);
        let outcome = match self.generator.generate(&req).await {
            Ok(raw) => extract::extract_with_stats(&raw).map_err(ScanError::from),
            Err(e) => Err(ScanError::from(e)),
        };
        histogram!("brief_scan_duration_ms").record(started.elapsed().as_millis() as f64);

        match outcome {
            Ok(extraction) => {
                counter!("brief_scan_runs_total", "outcome" => "ok").increment(1);
                counter!("brief_items_extracted_total").increment(extraction.items.len() as u64);
                counter!("brief_items_dropped_total").increment(extraction.dropped as u64);
                info!(
                    target: "scan",
                    items = extraction.items.len(),
                    dropped = extraction.dropped,
                    focus = focus.is_some(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "scan finished"
                );
                Ok(ScanBatch::new(extraction.items, Utc::now()))
            }
            Err(e) => {
                let outcome = match &e {
                    ScanError::Upstream(_) => "upstream_error",
                    ScanError::Extraction(_) => "extraction_error",
                };
                counter!("brief_scan_runs_total", "outcome" => outcome).increment(1);
                warn!(target: "scan", error = %e, "scan failed");
                Err(e)
            }
        }
    }

    /// Fact-check one claim. Never fails; see [`Verifier::verify`].
    pub async fn verify(&self, claim: &Claim) -> VerificationResult {
        self.verifier.verify(claim).await
    }

    /// Render `batch` as of now and send it.
    pub async fn deliver(
        &self,
        batch: &ScanBatch,
        edition_note: Option<&str>,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        self.deliver_at(batch, edition_note, self.now()).await
    }

    /// Render `batch` at a fixed time and send it. The email snapshot carries no
    /// verification results.
    pub async fn deliver_at(
        &self,
        batch: &ScanBatch,
        edition_note: Option<&str>,
        now: DateTime<FixedOffset>,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        if self.mailer.recipient().is_none() {
            counter!("brief_deliveries_total", "outcome" => "not_configured").increment(1);
            return Err(DeliveryError::NotConfigured(
                "no recipient configured (RECIPIENT_EMAIL)".to_string(),
            ));
        }

        let mut ctx = RenderContext::new(now).with_title(&self.report.title);
        if let Some(note) = edition_note {
            ctx = ctx.with_edition_note(note);
        }
        let doc = render::render(batch, &ctx);

        let outgoing = OutgoingReport {
            subject: doc.subject,
            html: doc.html,
        };
        match self.mailer.send(&outgoing).await {
            Ok(receipt) => {
                counter!("brief_deliveries_total", "outcome" => "sent").increment(1);
                info!(
                    target: "delivery",
                    transport = self.mailer.transport_name(),
                    to = %receipt.recipient,
                    items = batch.len(),
                    "report delivered"
                );
                Ok(receipt)
            }
            Err(e) => {
                counter!("brief_deliveries_total", "outcome" => "failed").increment(1);
                warn!(
                    target: "delivery",
                    transport = self.mailer.transport_name(),
                    error = %e,
                    "report delivery failed"
                );
                Err(e)
            }
        }
    }

    /// Scan, render and deliver in one call. Concurrent calls run one after another.
    pub async fn run_scan_and_deliver(&self) -> Result<DeliverySummary, PipelineError> {
        let _guard = self.run_lock.lock().await;
        let batch = self.run_scan(None).await?;
        let receipt = self.deliver(&batch, Some(SCHEDULED_EDITION_NOTE)).await?;
        Ok(DeliverySummary {
            item_count: batch.len(),
            sent_to: receipt.recipient,
            message_id: receipt.message_id,
        })
    }
}

fn build_mailer(email: &EmailConfig, http: reqwest::Client) -> anyhow::Result<DynMailer> {
    let transport = email.transport.as_str();
    let Some(to) = email.recipient.clone() else {
        if transport != "disabled" {
            warn!(target: "delivery", transport, "no recipient configured; email disabled");
        }
        return Ok(Arc::new(DisabledMailer::new(
            "no recipient configured (RECIPIENT_EMAIL)",
        )));
    };

    let mailer: DynMailer = match transport {
        "smtp" => {
            let host = email
                .smtp_host
                .as_deref()
                .context("EMAIL_TRANSPORT=smtp requires SMTP_HOST")?;
            Arc::new(SmtpMailer::new(
                host,
                email.smtp_user.as_deref().unwrap_or_default(),
                email.smtp_pass.as_deref().unwrap_or_default(),
                &email.sender,
                &to,
            )?)
        }
        "resend" => Arc::new(ResendMailer::new(
            http,
            email.resend_api_key.clone().unwrap_or_default(),
            email.sender.clone(),
            to,
        )),
        "log" => Arc::new(MemoryMailer::new(to)),
        _ => Arc::new(DisabledMailer::default()),
    };
    Ok(mailer)
}
