//! Deterministic generator for mock mode (`AI_TEST_MODE=mock`) and tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{GenerationRequest, Generator, RequestKind, UpstreamError};

/// Canned briefing used by mock mode.
pub const SAMPLE_SCAN: &str = r#"Here is today's briefing:
```json
[
  {
    "headline": "Fed holds rates steady, signals patience on cuts",
    "source": "Reuters",
    "sourceUrl": "https://www.reuters.com/markets/us/fed-holds-rates",
    "sector": "Macro & Fed",
    "signal": "NEUTRAL",
    "impact": "HIGH",
    "timeHorizon": "MEDIUM",
    "confidence": 88,
    "tickers": ["SPY", "TLT"],
    "tickerPrices": {"SPY": "+0.4%", "TLT": "-0.3%"},
    "analysis": "Policy makers left the target range unchanged and pushed back on near-term easing.",
    "actionable": "Keep duration exposure light until the next CPI print.",
    "keyTakeaway": "No cut yet; data dependence continues."
  },
  {
    "headline": "Chipmakers rally on AI capex guidance",
    "source": "Bloomberg",
    "sector": "Tech & AI",
    "signal": "BULLISH",
    "impact": "MEDIUM",
    "timeHorizon": "SHORT",
    "tickers": ["NVDA", "AMD"],
    "tickerPrices": {"NVDA": "$185.40 (+1.2%)"},
    "analysis": "Hyperscalers reiterated spending plans, lifting semiconductor names.",
    "actionable": "Watch SMH for follow-through above its 50-day average."
  },
  {
    "headline": "Crude slides as inventories build",
    "source": "CNBC",
    "sector": "Energy",
    "signal": "BEARISH",
    "impact": "LOW",
    "timeHorizon": "SHORT",
    "confidence": 70,
    "tickers": ["XLE"],
    "tickerPrices": {},
    "analysis": "A surprise inventory build weighed on front-month futures.",
    "actionable": "Avoid chasing energy weakness into the weekly close."
  }
]
```"#;

/// Canned verification reply used by mock mode.
pub const SAMPLE_VERIFY: &str = r#"{"verified": true, "accuracy": "CONFIRMED", "details": "Matches multiple wire reports.", "correctedInfo": null, "sources": ["https://www.reuters.com/markets/"]}"#;

type Reply = Result<String, UpstreamError>;

/// Replies with fixed text per request kind and records every request it receives.
pub struct ScriptedGenerator {
    scan: Reply,
    verify: Reply,
    calls: AtomicUsize,
    seen: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new(scan: Reply, verify: Reply) -> Self {
        Self {
            scan,
            verify,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn canned() -> Self {
        Self::new(Ok(SAMPLE_SCAN.to_string()), Ok(SAMPLE_VERIFY.to_string()))
    }

    pub fn scan_text(text: impl Into<String>) -> Self {
        Self::new(Ok(text.into()), Ok(SAMPLE_VERIFY.to_string()))
    }

    pub fn failing(err: UpstreamError) -> Self {
        Self::new(Err(err.clone()), Err(err))
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.seen.lock().expect("scripted generator mutex poisoned").clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, req: &GenerationRequest) -> Result<String, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .expect("scripted generator mutex poisoned")
            .push(req.clone());
        match req.kind {
            RequestKind::Scan => self.scan.clone(),
            RequestKind::Verify => self.verify.clone(),
        }
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}
