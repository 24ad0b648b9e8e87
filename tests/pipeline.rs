// tests/pipeline.rs
//
// Orchestrator outcomes: ScanFailed vs DeliveryFailed, and what gets sent.

use std::sync::Arc;

use chrono::{FixedOffset, TimeZone};
use morning_brief::extract::ExtractionError;
use morning_brief::llm::{ScriptedGenerator, UpstreamError};
use morning_brief::notify::{DeliveryError, MemoryMailer};
use morning_brief::pipeline::{Pipeline, PipelineError, ScanError, SCHEDULED_EDITION_NOTE};

fn pipeline(gen: ScriptedGenerator, mailer: MemoryMailer) -> (Pipeline, Arc<ScriptedGenerator>, Arc<MemoryMailer>) {
    let gen = Arc::new(gen);
    let mailer = Arc::new(mailer);
    (Pipeline::new(gen.clone(), mailer.clone()), gen, mailer)
}

#[tokio::test]
async fn upstream_failure_is_a_scan_error_and_nothing_is_sent() {
    let (p, _, mailer) = pipeline(
        ScriptedGenerator::failing(UpstreamError::Status {
            service: "anthropic",
            status: 529,
            message: "overloaded".into(),
        }),
        MemoryMailer::new("r@example.com"),
    );
    let err = p.run_scan_and_deliver().await.unwrap_err();
    assert!(matches!(err, PipelineError::Scan(ScanError::Upstream(_))));
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn unparseable_reply_is_a_scan_error() {
    let (p, _, mailer) = pipeline(
        ScriptedGenerator::scan_text("No news today, sorry."),
        MemoryMailer::new("r@example.com"),
    );
    let err = p.run_scan_and_deliver().await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Scan(ScanError::Extraction(ExtractionError::NoArray { .. }))
    ));
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn transport_failure_is_a_delivery_error_with_valid_batch() {
    let (p, _, _) = pipeline(
        ScriptedGenerator::canned(),
        MemoryMailer::failing("r@example.com", DeliveryError::Transport("smtp down".into())),
    );
    let err = p.run_scan_and_deliver().await.unwrap_err();
    assert!(matches!(err, PipelineError::Delivery(DeliveryError::Transport(_))));

    // The data half still works on its own.
    let batch = p.run_scan(None).await.unwrap();
    assert_eq!(batch.len(), 3);
}

#[tokio::test]
async fn scheduled_delivery_sends_dated_subject_and_note() {
    let (p, gen, mailer) = pipeline(ScriptedGenerator::canned(), MemoryMailer::new("r@example.com"));
    let summary = p.run_scan_and_deliver().await.unwrap();
    assert_eq!(summary.item_count, 3);
    assert_eq!(summary.sent_to, "r@example.com");
    assert_eq!(summary.message_id.as_deref(), Some("memory-1"));

    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].subject.starts_with("\u{1F4CA} The Morning Brief: "));
    assert!(sent[0].html.contains(SCHEDULED_EDITION_NOTE));
    assert!(!sent[0].html.contains("Check Failed"), "email snapshot has no verification badges");
    assert_eq!(gen.call_count(), 1, "scheduled run makes exactly one generation call");
}

#[tokio::test]
async fn deliver_at_is_reproducible() {
    let (p, _, mailer) = pipeline(ScriptedGenerator::canned(), MemoryMailer::new("r@example.com"));
    let batch = p.run_scan(None).await.unwrap();
    let now = FixedOffset::east_opt(3600)
        .unwrap()
        .with_ymd_and_hms(2025, 9, 8, 6, 45, 0)
        .unwrap();
    p.deliver_at(&batch, None, now).await.unwrap();
    p.deliver_at(&batch, None, now).await.unwrap();
    let sent = mailer.sent();
    assert_eq!(sent[0], sent[1]);
    assert_eq!(sent[0].subject, "\u{1F4CA} The Morning Brief: Monday, September 8, 2025");
}

#[tokio::test]
async fn focus_hint_reaches_the_generator() {
    let (p, gen, _) = pipeline(ScriptedGenerator::canned(), MemoryMailer::new("r@example.com"));
    p.run_scan(Some("semiconductor earnings")).await.unwrap();
    let reqs = gen.requests();
    assert!(reqs[0].user.contains("EXTRA FOCUS: semiconductor earnings"));
    assert!(reqs[0].web_search);
}
