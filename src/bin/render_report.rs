//! Offline renderer: raw generator output (file argument or stdin) -> HTML report on stdout.
//!
//! `render_report fixtures/scan.txt > brief.html`

use std::io::Read;

use anyhow::Context;
use chrono::Utc;
use morning_brief::extract;
use morning_brief::render::{self, RenderContext};
use morning_brief::schema::ScanBatch;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let raw = match std::env::args().nth(1) {
        Some(path) => {
            std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?
        }
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading stdin")?;
            buf
        }
    };

    let extraction = extract::extract_with_stats(&raw)?;
    eprintln!(
        "extracted {} items ({} dropped)",
        extraction.items.len(),
        extraction.dropped
    );

    let generated_at = Utc::now();
    let now = generated_at.fixed_offset();
    let batch = ScanBatch::new(extraction.items, generated_at);
    let doc = render::render(&batch, &RenderContext::new(now));
    eprintln!("subject: {}", doc.subject);
    println!("{}", doc.html);
    Ok(())
}
