//! # Report renderer
//! Pure function from a batch to one self-contained HTML document (inline styles only, no
//! scripts). The interactive `/report` view and the emailed snapshot both come from
//! [`render`], so their content and ordering cannot drift apart.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, FixedOffset};
use html_escape::{encode_double_quoted_attribute, encode_text};
use serde::Serialize;

use crate::schema::{self, Accuracy, Impact, NewsItem, ScanBatch, Signal, SignalCounts, VerificationResult};

pub const DEFAULT_TITLE: &str = "The Morning Brief";

pub const DISCLAIMER: &str =
    "AI-generated analysis &middot; Not financial advice &middot; Always do your own research";

/// Display colour and label of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalStyle {
    pub color: &'static str,
    pub label: &'static str,
}

const BULLISH: SignalStyle = SignalStyle { color: "#2d8a4e", label: "Bullish" };
const BEARISH: SignalStyle = SignalStyle { color: "#c0392b", label: "Bearish" };
const NEUTRAL: SignalStyle = SignalStyle { color: "#c49a2a", label: "Neutral" };
const VOLATILE: SignalStyle = SignalStyle { color: "#7b5ea7", label: "Volatile" };

pub fn signal_style(signal: Signal) -> SignalStyle {
    match signal {
        Signal::Bullish => BULLISH,
        Signal::Bearish => BEARISH,
        Signal::Neutral => NEUTRAL,
        Signal::Volatile => VOLATILE,
    }
}

fn accuracy_style(a: Accuracy) -> (&'static str, &'static str, &'static str) {
    // (color, background, label)
    match a {
        Accuracy::Confirmed => ("#2d8a4e", "#e8f5ec", "Confirmed"),
        Accuracy::PartiallyConfirmed => ("#c49a2a", "#fdf6e3", "Partially Confirmed"),
        Accuracy::Unconfirmed => ("#8b8275", "#f4f1eb", "Unconfirmed"),
        Accuracy::Incorrect => ("#c0392b", "#fce8e6", "Incorrect"),
        Accuracy::Error => ("#c0392b", "#fce8e6", "Check Failed"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceDirection {
    Up,
    Down,
}

/// A move string reads as down only when it has a minus and no plus.
pub fn price_direction(price: &str) -> PriceDirection {
    if price.contains('-') && !price.contains('+') {
        PriceDirection::Down
    } else {
        PriceDirection::Up
    }
}

/// Everything the renderer needs besides the batch itself.
#[derive(Debug, Clone)]
pub struct RenderContext<'a> {
    pub now: DateTime<FixedOffset>,
    pub title: &'a str,
    /// Extra masthead note, e.g. "Automated Daily Scan".
    pub edition_note: Option<&'a str>,
    /// Resolved verifications keyed by item position; `None` omits the badges.
    pub verifications: Option<&'a BTreeMap<usize, VerificationResult>>,
}

impl<'a> RenderContext<'a> {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self {
            now,
            title: DEFAULT_TITLE,
            edition_note: None,
            verifications: None,
        }
    }

    pub fn with_title(mut self, title: &'a str) -> Self {
        self.title = title;
        self
    }

    pub fn with_edition_note(mut self, note: &'a str) -> Self {
        self.edition_note = Some(note);
        self
    }

    pub fn with_verifications(mut self, v: &'a BTreeMap<usize, VerificationResult>) -> Self {
        self.verifications = Some(v);
        self
    }
}

/// Four headline counters of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryCounts {
    pub bullish: usize,
    pub bearish: usize,
    pub high_impact: usize,
    pub total: usize,
}

impl From<SignalCounts> for SummaryCounts {
    fn from(c: SignalCounts) -> Self {
        Self {
            bullish: c.bullish,
            bearish: c.bearish,
            high_impact: c.high_impact,
            total: c.total,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportDocument {
    pub subject: String,
    pub html: String,
    pub counts: SummaryCounts,
}

/// Long-form date used in the masthead and the email subject.
pub fn long_date(now: &DateTime<FixedOffset>) -> String {
    now.format("%A, %B %-d, %Y").to_string()
}

pub fn short_time(now: &DateTime<FixedOffset>) -> String {
    now.format("%I:%M %p").to_string()
}

pub fn subject_line(title: &str, now: &DateTime<FixedOffset>) -> String {
    format!("\u{1F4CA} {title}: {}", long_date(now))
}

fn format_confidence(c: f64) -> String {
    if c.fract() == 0.0 {
        format!("{c:.0}")
    } else {
        format!("{c:.1}")
    }
}

pub fn render(batch: &ScanBatch, ctx: &RenderContext<'_>) -> ReportDocument {
    let counts: SummaryCounts = batch.counts().into();
    let mut html = String::with_capacity(4096 + batch.len() * 2048);

    html.push_str(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\">\
         <meta name=\"viewport\" content=\"width=device-width,initial-scale=1\">",
    );
    let _ = write!(html, "<title>{}</title>", encode_text(ctx.title));
    html.push_str(
        "</head>\n<body style=\"margin:0;padding:0;background:#faf8f4;\">\n\
         <div style=\"font-family:Georgia,'Times New Roman',serif;max-width:680px;margin:0 auto;background:#faf8f4;color:#2c2c2c;\">\n",
    );

    write_masthead(&mut html, ctx);
    write_counters(&mut html, &counts);

    let priority: Vec<(usize, &NewsItem)> = batch
        .items
        .iter()
        .enumerate()
        .filter(|(_, it)| it.impact == Impact::High)
        .collect();
    if !priority.is_empty() {
        html.push_str(
            "<div style=\"padding:28px 36px;border-bottom:1px solid #e0dbd2;\">\n\
             <h2 style=\"font-size:13px;text-transform:uppercase;letter-spacing:3px;color:#c0392b;margin:0 0 20px;font-weight:600;\">&#x1F6A8; Priority Alerts</h2>\n",
        );
        for (idx, item) in priority {
            write_priority_card(&mut html, item, verification_for(ctx, idx));
        }
        html.push_str("</div>\n");
    }

    html.push_str(
        "<div style=\"padding:28px 36px;\">\n\
         <h2 style=\"font-size:13px;text-transform:uppercase;letter-spacing:3px;color:#8b8275;margin:0 0 20px;font-weight:600;\">Complete Briefing</h2>\n",
    );
    for (idx, item) in batch.items.iter().enumerate() {
        write_full_card(&mut html, idx + 1, item, verification_for(ctx, idx));
    }
    html.push_str("</div>\n");

    let _ = write!(
        html,
        "<div style=\"padding:24px 36px;text-align:center;border-top:1px solid #e0dbd2;\">\
         <p style=\"font-size:11px;color:#b0a899;margin:0;\">{DISCLAIMER}</p></div>\n"
    );
    html.push_str("</div></body></html>");

    ReportDocument {
        subject: subject_line(ctx.title, &ctx.now),
        html,
        counts,
    }
}

fn verification_for<'a>(ctx: &RenderContext<'a>, idx: usize) -> Option<&'a VerificationResult> {
    ctx.verifications.and_then(|m| m.get(&idx))
}

fn write_masthead(html: &mut String, ctx: &RenderContext<'_>) {
    let mut line = format!("{} &middot; {}", long_date(&ctx.now), short_time(&ctx.now));
    if let Some(note) = ctx.edition_note {
        let _ = write!(line, " &middot; {}", encode_text(note));
    }
    let _ = write!(
        html,
        "<div style=\"padding:40px 36px 24px;border-bottom:2px solid #1a1a1a;\">\
         <h1 style=\"margin:0;font-size:32px;font-weight:400;color:#1a1a1a;letter-spacing:-1px;\">{}</h1>\
         <p style=\"margin:8px 0 0;font-size:14px;color:#8b8275;\">{line}</p></div>\n",
        encode_text(ctx.title)
    );
}

fn write_counters(html: &mut String, c: &SummaryCounts) {
    html.push_str(
        "<div style=\"padding:24px 36px;background:#f4f1eb;border-bottom:1px solid #e0dbd2;\">\
         <table width=\"100%\" cellpadding=\"0\" cellspacing=\"0\"><tr>",
    );
    for (n, label, color) in [
        (c.bullish, "Bullish", BULLISH.color),
        (c.bearish, "Bearish", BEARISH.color),
        (c.high_impact, "High Impact", NEUTRAL.color),
        (c.total, "Total", "#1a1a1a"),
    ] {
        let _ = write!(
            html,
            "<td align=\"center\" style=\"padding:12px;\">\
             <div style=\"font-size:28px;font-weight:700;color:{color};\">{n}</div>\
             <div style=\"font-size:11px;color:#8b8275;text-transform:uppercase;letter-spacing:2px;\">{label}</div></td>"
        );
    }
    html.push_str("</tr></table></div>\n");
}

fn write_takeaway(html: &mut String, item: &NewsItem) {
    if let Some(k) = &item.key_takeaway {
        let _ = write!(
            html,
            "<div style=\"font-size:14px;color:#1a1a1a;font-style:italic;margin-bottom:10px;padding-left:12px;border-left:2px solid #e0dbd2;\">{}</div>",
            encode_text(k)
        );
    }
}

fn write_body(html: &mut String, item: &NewsItem, action_color: &str, action_bg: &str) {
    let _ = write!(
        html,
        "<div style=\"font-size:14px;color:#4a4a4a;line-height:1.7;margin-bottom:12px;\">{}</div>",
        encode_text(&item.analysis)
    );
    if !item.actionable.is_empty() {
        let _ = write!(
            html,
            "<div style=\"font-size:14px;color:{action_color};padding:12px 16px;background:{action_bg};border-radius:6px;margin-bottom:8px;\">&#x1F4A1; {}</div>",
            encode_text(&item.actionable)
        );
    }
}

fn write_tickers(html: &mut String, item: &NewsItem, prefix: &str) {
    if item.tickers.is_empty() {
        return;
    }
    let chips: Vec<String> = item
        .tickers
        .iter()
        .map(|t| {
            let mut chip = format!("<strong>{}</strong>", encode_text(t));
            if let Some(price) = item.price_for(t) {
                let color = match price_direction(price) {
                    PriceDirection::Up => BULLISH.color,
                    PriceDirection::Down => BEARISH.color,
                };
                let _ = write!(chip, " <span style=\"color:{color};\">{}</span>", encode_text(price));
            }
            chip
        })
        .collect();
    let _ = write!(
        html,
        "<div style=\"font-size:13px;color:#3a6ea5;margin-top:8px;\">{prefix}{}</div>",
        chips.join(" &middot; ")
    );
}

fn write_source(html: &mut String, item: &NewsItem) {
    let Some(url) = item.source_url.as_deref().filter(|u| schema::is_absolute_http_url(u)) else {
        return;
    };
    let name = if item.source.is_empty() { "source" } else { item.source.as_str() };
    let _ = write!(
        html,
        "<div style=\"margin-top:8px;\"><a href=\"{}\" style=\"font-size:12px;color:#8b8275;text-decoration:underline;\">Read at {} &rarr;</a></div>",
        encode_double_quoted_attribute(url),
        encode_text(name)
    );
}

fn write_verification(html: &mut String, v: Option<&VerificationResult>) {
    let Some(v) = v else {
        return;
    };
    let (color, bg, label) = accuracy_style(v.accuracy);
    let _ = write!(
        html,
        "<div style=\"margin-top:12px;padding:12px 16px;background:{bg};border-radius:6px;font-size:13px;\">\
         <div style=\"color:{color};font-weight:700;margin-bottom:4px;\">{label}</div>\
         <div style=\"color:#4a4a4a;\">{}</div>",
        encode_text(&v.details)
    );
    if let Some(fix) = &v.corrected_info {
        let _ = write!(
            html,
            "<div style=\"color:#1a1a1a;margin-top:6px;\"><strong>Correction:</strong> {}</div>",
            encode_text(fix)
        );
    }
    for src in v.sources.iter().filter(|u| schema::is_absolute_http_url(u)) {
        let _ = write!(
            html,
            "<div style=\"margin-top:4px;\"><a href=\"{}\" style=\"font-size:12px;color:#3a6ea5;\">{}</a></div>",
            encode_double_quoted_attribute(src),
            encode_text(src)
        );
    }
    html.push_str("</div>");
}

fn write_priority_card(html: &mut String, item: &NewsItem, v: Option<&VerificationResult>) {
    let style = signal_style(item.signal);
    let _ = write!(
        html,
        "<div style=\"padding:20px;margin-bottom:16px;background:white;border-radius:8px;border-left:4px solid {c};\">\
         <div style=\"font-size:18px;font-weight:600;color:#1a1a1a;margin-bottom:8px;line-height:1.4;\">{headline}</div>\
         <div style=\"font-size:12px;color:{c};font-weight:700;margin-bottom:12px;\">{label} &middot; {sector} &middot; Confidence: {conf}%</div>",
        c = style.color,
        headline = encode_text(&item.headline),
        label = style.label,
        sector = encode_text(item.sector.label()),
        conf = format_confidence(item.display_confidence()),
    );
    write_takeaway(html, item);
    write_body(html, item, "#2d8a4e", "#e8f5ec");
    write_tickers(html, item, "Tickers: ");
    write_source(html, item);
    write_verification(html, v);
    html.push_str("</div>\n");
}

fn write_full_card(html: &mut String, number: usize, item: &NewsItem, v: Option<&VerificationResult>) {
    let style = signal_style(item.signal);
    let _ = write!(
        html,
        "<div style=\"padding:20px;margin-bottom:14px;background:white;border-radius:8px;border-left:4px solid {c};\">\
         <div style=\"font-size:17px;font-weight:600;color:#1a1a1a;margin-bottom:6px;line-height:1.4;\">{number}. {headline}</div>\
         <div style=\"font-size:11px;margin-bottom:10px;color:#8b8275;\"><span style=\"color:{c};font-weight:700;\">{label}</span> &middot; {sector} &middot; {impact} impact &middot; {horizon} horizon &middot; {conf}% confidence</div>",
        c = style.color,
        headline = encode_text(&item.headline),
        label = style.label,
        sector = encode_text(item.sector.label()),
        impact = item.impact.as_str(),
        horizon = item.time_horizon.as_str(),
        conf = format_confidence(item.display_confidence()),
    );
    write_takeaway(html, item);
    write_body(html, item, "#2d6b3f", "#f0f7f2");
    write_tickers(html, item, "");
    write_source(html, item);
    write_verification(html, v);
    html.push_str("</div>\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_styles_are_distinct() {
        assert_eq!(signal_style(Signal::Bearish).label, "Bearish");
        assert_ne!(signal_style(Signal::Bullish).color, signal_style(Signal::Neutral).color);
        assert_eq!(signal_style(Signal::Volatile).color, "#7b5ea7");
    }

    #[test]
    fn price_direction_follows_sign() {
        assert_eq!(price_direction("+2.3%"), PriceDirection::Up);
        assert_eq!(price_direction("-0.4%"), PriceDirection::Down);
        assert_eq!(price_direction("$185.40 (+1.2%)"), PriceDirection::Up);
        assert_eq!(price_direction("$99.10"), PriceDirection::Up);
    }

    #[test]
    fn confidence_prints_without_trailing_zero() {
        assert_eq!(format_confidence(75.0), "75");
        assert_eq!(format_confidence(82.5), "82.5");
    }

    #[test]
    fn dates_are_long_form() {
        let now = DateTime::parse_from_rfc3339("2026-10-16T07:05:00-04:00").unwrap();
        assert_eq!(long_date(&now), "Friday, October 16, 2026");
        assert_eq!(short_time(&now), "07:05 AM");
        assert!(subject_line(DEFAULT_TITLE, &now).ends_with("The Morning Brief: Friday, October 16, 2026"));
    }
}
