// tests/render_report.rs
//
// Renderer contract: determinism, counters, sections, escaping.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use morning_brief::render::{self, RenderContext, DISCLAIMER};
use morning_brief::schema::{validate, NewsItem, ScanBatch, VerificationResult};
use serde_json::json;

fn item(v: serde_json::Value) -> NewsItem {
    validate(&v).expect("valid test item")
}

fn at() -> DateTime<FixedOffset> {
    FixedOffset::west_opt(4 * 3600)
        .unwrap()
        .with_ymd_and_hms(2025, 9, 5, 7, 30, 0)
        .unwrap()
}

fn sample_batch() -> ScanBatch {
    ScanBatch::new(
        vec![
            item(json!({"headline": "Fed holds", "analysis": "a", "signal": "NEUTRAL", "impact": "HIGH", "confidence": 88})),
            item(json!({"headline": "Chips rally", "analysis": "b", "signal": "BULLISH", "impact": "MEDIUM"})),
            item(json!({"headline": "Crude slides", "analysis": "c", "signal": "BEARISH", "impact": "HIGH", "confidence": 61})),
            item(json!({"headline": "Bitcoin whipsaws", "analysis": "d", "signal": "VOLATILE", "impact": "LOW"})),
            item(json!({"headline": "Banks steady", "analysis": "e", "signal": "BULLISH", "impact": "LOW"})),
        ],
        Utc.with_ymd_and_hms(2025, 9, 5, 11, 30, 0).unwrap(),
    )
}

#[test]
fn same_input_renders_byte_identical_output() {
    let batch = sample_batch();
    let a = render::render(&batch, &RenderContext::new(at()));
    let b = render::render(&batch, &RenderContext::new(at()));
    assert_eq!(a, b);
}

#[test]
fn counters_partition_the_batch() {
    let batch = sample_batch();
    let counts = batch.counts();
    assert_eq!(
        counts.bullish + counts.bearish + counts.neutral + counts.volatile,
        counts.total
    );
    assert!(counts.high_impact <= counts.total);

    let doc = render::render(&batch, &RenderContext::new(at()));
    assert_eq!(doc.counts.bullish, 2);
    assert_eq!(doc.counts.bearish, 1);
    assert_eq!(doc.counts.high_impact, 2);
    assert_eq!(doc.counts.total, 5);
}

#[test]
fn sections_appear_in_order_with_full_numbering() {
    let doc = render::render(&sample_batch(), &RenderContext::new(at()));
    let html = &doc.html;

    let masthead = html.find("The Morning Brief").unwrap();
    let priority = html.find("Priority Alerts").unwrap();
    let complete = html.find("Complete Briefing").unwrap();
    let footer = html.find(DISCLAIMER).unwrap();
    assert!(masthead < priority && priority < complete && complete < footer);

    // High-impact items show up in both sections.
    assert_eq!(html.matches("Fed holds").count(), 2);
    assert_eq!(html.matches("Chips rally").count(), 1);
    assert!(html.contains("1. Fed holds"));
    assert!(html.contains("5. Banks steady"));
}

#[test]
fn no_high_impact_items_means_no_priority_section() {
    let batch = ScanBatch::new(
        vec![item(json!({"headline": "Quiet day", "analysis": "x", "impact": "LOW"}))],
        Utc::now(),
    );
    let doc = render::render(&batch, &RenderContext::new(at()));
    assert!(!doc.html.contains("Priority Alerts"));
    assert!(doc.html.contains("1. Quiet day"));
}

#[test]
fn masthead_and_subject_use_the_render_time() {
    let doc = render::render(
        &sample_batch(),
        &RenderContext::new(at()).with_edition_note("Automated Daily Scan"),
    );
    assert_eq!(doc.subject, "\u{1F4CA} The Morning Brief: Friday, September 5, 2025");
    assert!(doc.html.contains("Friday, September 5, 2025 &middot; 07:30 AM &middot; Automated Daily Scan"));
}

#[test]
fn missing_confidence_renders_as_75_everywhere() {
    let doc = render::render(&sample_batch(), &RenderContext::new(at()));
    assert!(doc.html.contains("75% confidence"), "complete briefing default");
    assert!(doc.html.contains("Confidence: 88%"), "priority card uses the given value");
}

#[test]
fn model_text_is_escaped_and_only_http_links_survive() {
    let batch = ScanBatch::new(
        vec![item(json!({
            "headline": "<script>alert(1)</script> & more",
            "analysis": "x < y",
            "source": "Evil",
            "sourceUrl": "javascript:alert(1)"
        }))],
        Utc::now(),
    );
    let doc = render::render(&batch, &RenderContext::new(at()));
    assert!(!doc.html.contains("<script>"));
    assert!(doc.html.contains("&lt;script&gt;alert(1)&lt;/script&gt; &amp; more"));
    assert!(!doc.html.contains("javascript:"));
}

#[test]
fn verification_badges_only_when_supplied() {
    let batch = sample_batch();
    let plain = render::render(&batch, &RenderContext::new(at()));
    assert!(!plain.html.contains("Check Failed"));

    let mut results = BTreeMap::new();
    results.insert(1, VerificationResult::failed("upstream timed out"));
    let checked = render::render(&batch, &RenderContext::new(at()).with_verifications(&results));
    assert_eq!(checked.html.matches("Check Failed").count(), 1);
    assert!(checked.html.contains("upstream timed out"));
}
