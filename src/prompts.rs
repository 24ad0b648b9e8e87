//! Instructions sent to the generation service.

use crate::llm::{GenerationRequest, RequestKind};

/// Longest focus hint forwarded to the generator.
pub const MAX_FOCUS_CHARS: usize = 300;

pub const SCAN_SYSTEM: &str = r#"You are a senior financial analyst and market strategist at a top-tier investment research firm. Your job is to deliver a comprehensive morning market intelligence briefing.

CRITICAL INSTRUCTIONS:
1. Search for TODAY's most important news using web search. Cast a wide net and run multiple searches.
2. Cover BOTH financial markets AND general world/business news that could impact investing decisions.
3. Use TRUSTED SOURCES: Yahoo Finance, Bloomberg, Reuters, CNBC, Financial Times, Wall Street Journal, MarketWatch, Barron's, The Economist, AP News, BBC Business, TechCrunch, Axios, Seeking Alpha, and credible industry blogs.
4. For each item, provide the ACTUAL SOURCE URL where you found the news.
5. Include real current stock prices or percentage moves when discussing specific tickers.

NEWS CATEGORIES TO COVER:
- Federal Reserve & central bank policy, interest rates, inflation data
- Major earnings, revenue beats/misses, forward guidance
- Geopolitical events (wars, sanctions, elections, trade deals)
- Regulatory changes (SEC, FDA, antitrust, crypto regulation)
- Sector catalysts (tech launches, drug approvals, energy supply disruptions)
- Macro indicators (jobs reports, GDP, CPI, PMI, consumer confidence)
- Crypto & digital assets (ETF flows, regulation, major moves)
- General business news that smart investors should know about
- Global events that could ripple into markets (weather, supply chain, politics)

ANALYSIS DEPTH. For each item write:
- 3-5 sentences of expert analysis explaining WHY this matters
- How it connects to broader market themes and other sectors
- Second-order effects (what most people miss about this news)
- Specific actionable intelligence: what to consider buying, selling, hedging, or watching
- Name specific ETFs or stocks when relevant

CONFIDENCE SCORING: rate your confidence 0-100 in your analysis accuracy.
90-100 multiple corroborating sources; 70-89 solid sourcing; 50-69 some uncertainty; below 50 speculative.

Respond ONLY with a valid JSON array. Each object must have these EXACT keys:
{
  "headline": "string",
  "source": "string (publication name)",
  "sourceUrl": "string (actual URL)",
  "sector": "string (from: Macro & Fed, Tech & AI, Energy, Banking, Healthcare, Crypto, Geopolitics, Real Estate, General News)",
  "signal": "BULLISH | BEARISH | NEUTRAL | VOLATILE",
  "impact": "HIGH | MEDIUM | LOW",
  "timeHorizon": "SHORT | MEDIUM | LONG",
  "confidence": number (0-100),
  "tickers": ["array", "of", "symbols"],
  "tickerPrices": {"SYMBOL": "+2.3%"} or {"SYMBOL": "$185.40 (+1.2%)"},
  "analysis": "string (3-5 sentences, thorough expert analysis)",
  "actionable": "string (specific what-to-do insight)",
  "keyTakeaway": "string (one-sentence summary for quick scanning)"
}

Return 10-14 items. Be thorough. Use real data. No hallucinating prices or events."#;

pub const VERIFY_SYSTEM: &str = r#"You are a fact-checker. Verify the following financial news claim by searching the web. Check if:
1. The event/news actually happened
2. The details (numbers, dates, entities) are accurate
3. The market impact described is reasonable

Respond ONLY in valid JSON (no markdown, no backticks) with these exact keys:
{
  "verified": boolean,
  "accuracy": "CONFIRMED" | "PARTIALLY_CONFIRMED" | "UNCONFIRMED" | "INCORRECT",
  "details": "2-3 sentence explanation of what you found",
  "correctedInfo": "any corrections needed, or null",
  "sources": ["url1", "url2"]
}"#;

/// Trimmed, length-capped focus hint; blank hints are dropped.
pub fn normalize_focus(focus: Option<&str>) -> Option<String> {
    let f = focus?.trim();
    if f.is_empty() {
        return None;
    }
    Some(f.chars().take(MAX_FOCUS_CHARS).collect())
}

pub fn scan_user_message(focus: Option<&str>) -> String {
    let mut msg = String::from(
        "Search for today's most important financial and general news that affects markets. \
         Be thorough and search multiple topics: stock market today, Fed policy, tech earnings, \
         oil prices, crypto news, geopolitics, economic data releases, and any major breaking news.",
    );
    if let Some(f) = normalize_focus(focus) {
        msg.push_str(" EXTRA FOCUS: ");
        msg.push_str(&f);
    }
    msg.push_str(" Return the JSON array with real URLs and current data.");
    msg
}

pub fn verify_user_message(headline: &str, source: Option<&str>, analysis: Option<&str>) -> String {
    let source = source.map(str::trim).filter(|s| !s.is_empty()).unwrap_or("Unknown");
    let analysis = analysis.map(str::trim).filter(|s| !s.is_empty()).unwrap_or("N/A");
    format!(
        "Verify this news: \"{}\". Source claimed: {source}. Key claims: {analysis}. \
         Search the web to cross-check this claim.",
        headline.trim()
    )
}

pub fn scan_request(focus: Option<&str>, max_tokens: u32, web_search: bool) -> GenerationRequest {
    GenerationRequest {
        kind: RequestKind::Scan,
        system: SCAN_SYSTEM.to_string(),
        user: scan_user_message(focus),
        max_tokens,
        web_search,
    }
}

pub fn verify_request(
    headline: &str,
    source: Option<&str>,
    analysis: Option<&str>,
    max_tokens: u32,
    web_search: bool,
) -> GenerationRequest {
    GenerationRequest {
        kind: RequestKind::Verify,
        system: VERIFY_SYSTEM.to_string(),
        user: verify_user_message(headline, source, analysis),
        max_tokens,
        web_search,
    }
}
