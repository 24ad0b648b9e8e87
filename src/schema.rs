//! # News item schema
//! Typed shape of one briefing item plus the validator that turns an untrusted JSON
//! candidate into a [`NewsItem`]. Enum fields are coerced, never rejected; only a
//! missing `headline` or `analysis` drops a candidate.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Confidence shown when the generator did not provide one.
pub const DEFAULT_CONFIDENCE: f64 = 75.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Sector {
    #[serde(rename = "Macro & Fed")]
    MacroFed,
    #[serde(rename = "Tech & AI")]
    TechAi,
    #[serde(rename = "Energy")]
    Energy,
    #[serde(rename = "Banking")]
    Banking,
    #[serde(rename = "Healthcare")]
    Healthcare,
    #[serde(rename = "Crypto")]
    Crypto,
    #[serde(rename = "Geopolitics")]
    Geopolitics,
    #[serde(rename = "Real Estate")]
    RealEstate,
    #[serde(rename = "General News")]
    GeneralNews,
}

impl Sector {
    pub const ALL: [Sector; 9] = [
        Sector::MacroFed,
        Sector::TechAi,
        Sector::Energy,
        Sector::Banking,
        Sector::Healthcare,
        Sector::Crypto,
        Sector::Geopolitics,
        Sector::RealEstate,
        Sector::GeneralNews,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Sector::MacroFed => "Macro & Fed",
            Sector::TechAi => "Tech & AI",
            Sector::Energy => "Energy",
            Sector::Banking => "Banking",
            Sector::Healthcare => "Healthcare",
            Sector::Crypto => "Crypto",
            Sector::Geopolitics => "Geopolitics",
            Sector::RealEstate => "Real Estate",
            Sector::GeneralNews => "General News",
        }
    }

    /// Case-insensitive match on the display label.
    pub fn from_label(s: &str) -> Option<Self> {
        let s = s.trim();
        Sector::ALL
            .into_iter()
            .find(|sec| sec.label().eq_ignore_ascii_case(s))
    }

    /// Like [`Sector::from_label`], but unknown sectors land in General News.
    pub fn parse_lenient(s: &str) -> Self {
        Self::from_label(s).unwrap_or(Sector::GeneralNews)
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    Bullish,
    Bearish,
    #[default]
    Neutral,
    Volatile,
}

impl Signal {
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "BULLISH" => Signal::Bullish,
            "BEARISH" => Signal::Bearish,
            "VOLATILE" => Signal::Volatile,
            _ => Signal::Neutral,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Signal::Bullish => "BULLISH",
            Signal::Bearish => "BEARISH",
            Signal::Neutral => "NEUTRAL",
            Signal::Volatile => "VOLATILE",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Impact {
    High,
    #[default]
    Medium,
    Low,
}

impl Impact {
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "HIGH" => Impact::High,
            "LOW" => Impact::Low,
            _ => Impact::Medium,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Impact::High => "HIGH",
            Impact::Medium => "MEDIUM",
            Impact::Low => "LOW",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeHorizon {
    Short,
    #[default]
    Medium,
    Long,
}

impl TimeHorizon {
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "SHORT" => TimeHorizon::Short,
            "LONG" => TimeHorizon::Long,
            _ => TimeHorizon::Medium,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimeHorizon::Short => "SHORT",
            TimeHorizon::Medium => "MEDIUM",
            TimeHorizon::Long => "LONG",
        }
    }
}

/// One validated briefing item. Immutable once extracted; identified only by its
/// position inside its [`ScanBatch`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub headline: String,
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    pub sector: Sector,
    pub signal: Signal,
    pub impact: Impact,
    pub time_horizon: TimeHorizon,
    /// Kept absent when the generator omitted it; the renderer applies the default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub tickers: Vec<String>,
    #[serde(default)]
    pub ticker_prices: BTreeMap<String, String>,
    pub analysis: String,
    #[serde(default)]
    pub actionable: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_takeaway: Option<String>,
}

impl NewsItem {
    pub fn display_confidence(&self) -> f64 {
        self.confidence.unwrap_or(DEFAULT_CONFIDENCE)
    }

    pub fn price_for(&self, ticker: &str) -> Option<&str> {
        self.ticker_prices.get(ticker).map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Accuracy {
    Confirmed,
    PartiallyConfirmed,
    Unconfirmed,
    Incorrect,
    Error,
}

impl Accuracy {
    /// `ERROR` is reserved for failed checks, so an upstream claiming it maps to Unconfirmed.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().replace([' ', '-'], "_").as_str() {
            "CONFIRMED" => Accuracy::Confirmed,
            "PARTIALLY_CONFIRMED" => Accuracy::PartiallyConfirmed,
            "INCORRECT" => Accuracy::Incorrect,
            _ => Accuracy::Unconfirmed,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Accuracy::Confirmed => "CONFIRMED",
            Accuracy::PartiallyConfirmed => "PARTIALLY_CONFIRMED",
            Accuracy::Unconfirmed => "UNCONFIRMED",
            Accuracy::Incorrect => "INCORRECT",
            Accuracy::Error => "ERROR",
        }
    }
}

/// Outcome of one fact-check. Stored beside the batch, keyed by item position.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub accuracy: Accuracy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
    pub details: String,
    #[serde(default)]
    pub corrected_info: Option<String>,
    #[serde(default)]
    pub sources: Vec<String>,
}

impl VerificationResult {
    pub fn failed(details: impl Into<String>) -> Self {
        Self {
            accuracy: Accuracy::Error,
            verified: None,
            details: details.into(),
            corrected_info: None,
            sources: Vec::new(),
        }
    }

    pub fn inconclusive() -> Self {
        Self {
            accuracy: Accuracy::Unconfirmed,
            verified: None,
            details: "Verification could not be completed.".to_string(),
            corrected_info: None,
            sources: Vec::new(),
        }
    }
}

/// Ordered items from one scan plus the time they were generated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScanBatch {
    pub generated_at: DateTime<Utc>,
    pub items: Vec<NewsItem>,
}

impl ScanBatch {
    pub fn new(items: Vec<NewsItem>, generated_at: DateTime<Utc>) -> Self {
        Self {
            generated_at,
            items,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn counts(&self) -> SignalCounts {
        SignalCounts::tally(&self.items)
    }
}

/// Per-signal tallies of a batch plus the high-impact count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalCounts {
    pub bullish: usize,
    pub bearish: usize,
    pub neutral: usize,
    pub volatile: usize,
    pub high_impact: usize,
    pub total: usize,
}

impl SignalCounts {
    pub fn tally<'a>(items: impl IntoIterator<Item = &'a NewsItem>) -> Self {
        let mut c = SignalCounts::default();
        for it in items {
            match it.signal {
                Signal::Bullish => c.bullish += 1,
                Signal::Bearish => c.bearish += 1,
                Signal::Neutral => c.neutral += 1,
                Signal::Volatile => c.volatile += 1,
            }
            if it.impact == Impact::High {
                c.high_impact += 1;
            }
            c.total += 1;
        }
        c
    }
}

/// A candidate that did not make it into the batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationDrop {
    #[error("candidate is not a JSON object")]
    NotAnObject,
    #[error("candidate has no usable `{0}`")]
    MissingField(&'static str),
}

/// Validate one raw candidate. Missing `headline`/`analysis` rejects; everything else is
/// coerced into range.
pub fn validate(candidate: &Value) -> Result<NewsItem, ValidationDrop> {
    let obj = candidate.as_object().ok_or(ValidationDrop::NotAnObject)?;

    let headline = non_empty_str(obj, "headline").ok_or(ValidationDrop::MissingField("headline"))?;
    let analysis = non_empty_str(obj, "analysis").ok_or(ValidationDrop::MissingField("analysis"))?;

    Ok(NewsItem {
        headline,
        analysis,
        source: non_empty_str(obj, "source").unwrap_or_default(),
        source_url: non_empty_str(obj, "sourceUrl").filter(|u| is_absolute_http_url(u)),
        sector: str_field(obj, "sector")
            .map(Sector::parse_lenient)
            .unwrap_or(Sector::GeneralNews),
        signal: str_field(obj, "signal")
            .map(Signal::parse_lenient)
            .unwrap_or_default(),
        impact: str_field(obj, "impact")
            .map(Impact::parse_lenient)
            .unwrap_or_default(),
        time_horizon: str_field(obj, "timeHorizon")
            .map(TimeHorizon::parse_lenient)
            .unwrap_or_default(),
        confidence: confidence_field(obj.get("confidence")),
        tickers: tickers_field(obj.get("tickers")),
        ticker_prices: prices_field(obj.get("tickerPrices")),
        actionable: non_empty_str(obj, "actionable").unwrap_or_default(),
        key_takeaway: non_empty_str(obj, "keyTakeaway"),
    })
}

/// True for `http://` or `https://` URLs with a host.
pub fn is_absolute_http_url(s: &str) -> bool {
    match reqwest::Url::parse(s.trim()) {
        Ok(u) => matches!(u.scheme(), "http" | "https") && u.host_str().is_some(),
        Err(_) => false,
    }
}

fn str_field<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str)
}

fn non_empty_str(obj: &Map<String, Value>, key: &str) -> Option<String> {
    str_field(obj, key)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn confidence_field(v: Option<&Value>) -> Option<f64> {
    let raw = match v? {
        Value::Number(n) => n.as_f64()?,
        // Some generators quote numbers ("82" or "82%").
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok()?,
        _ => return None,
    };
    raw.is_finite().then(|| raw.clamp(0.0, 100.0))
}

fn tickers_field(v: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(arr)) = v else {
        return Vec::new();
    };
    arr.iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn prices_field(v: Option<&Value>) -> BTreeMap<String, String> {
    let Some(Value::Object(map)) = v else {
        return BTreeMap::new();
    };
    map.iter()
        .filter_map(|(k, v)| {
            let price = match v {
                Value::String(s) => s.trim().to_string(),
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            (!k.trim().is_empty() && !price.is_empty()).then(|| (k.trim().to_string(), price))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_missing_headline_or_analysis() {
        let no_headline = json!({ "analysis": "x" });
        let blank_analysis = json!({ "headline": "Fed holds", "analysis": "   " });
        assert_eq!(
            validate(&no_headline),
            Err(ValidationDrop::MissingField("headline"))
        );
        assert_eq!(
            validate(&blank_analysis),
            Err(ValidationDrop::MissingField("analysis"))
        );
        assert_eq!(validate(&json!("text")), Err(ValidationDrop::NotAnObject));
    }

    #[test]
    fn unknown_enums_coerce_to_safe_defaults() {
        let item = validate(&json!({
            "headline": "Oil spikes",
            "analysis": "Supply shock.",
            "signal": "UP",
            "impact": "EXTREME",
            "timeHorizon": 3,
            "sector": "Commodities"
        }))
        .unwrap();
        assert_eq!(item.signal, Signal::Neutral);
        assert_eq!(item.impact, Impact::Medium);
        assert_eq!(item.time_horizon, TimeHorizon::Medium);
        assert_eq!(item.sector, Sector::GeneralNews);
    }

    #[test]
    fn confidence_is_clamped_but_absence_is_kept() {
        let hi = validate(&json!({ "headline": "a", "analysis": "b", "confidence": 140 })).unwrap();
        let lo = validate(&json!({ "headline": "a", "analysis": "b", "confidence": -3.5 })).unwrap();
        let none = validate(&json!({ "headline": "a", "analysis": "b" })).unwrap();
        let quoted = validate(&json!({ "headline": "a", "analysis": "b", "confidence": "82%" })).unwrap();
        assert_eq!(hi.confidence, Some(100.0));
        assert_eq!(lo.confidence, Some(0.0));
        assert_eq!(none.confidence, None);
        assert_eq!(none.display_confidence(), 75.0);
        assert_eq!(quoted.confidence, Some(82.0));
    }

    #[test]
    fn source_url_must_be_absolute_http() {
        let ok = validate(&json!({ "headline": "a", "analysis": "b", "sourceUrl": "https://www.reuters.com/x" })).unwrap();
        let rel = validate(&json!({ "headline": "a", "analysis": "b", "sourceUrl": "/markets/x" })).unwrap();
        let js = validate(&json!({ "headline": "a", "analysis": "b", "sourceUrl": "javascript:alert(1)" })).unwrap();
        assert_eq!(ok.source_url.as_deref(), Some("https://www.reuters.com/x"));
        assert!(rel.source_url.is_none());
        assert!(js.source_url.is_none());
    }

    #[test]
    fn tickers_and_prices_are_lenient() {
        let item = validate(&json!({
            "headline": "Chips rally",
            "analysis": "Demand.",
            "tickers": ["NVDA", 5, " AMD ", ""],
            "tickerPrices": { "NVDA": "+2.3%", "AMD": 151.2, "X": null }
        }))
        .unwrap();
        assert_eq!(item.tickers, vec!["NVDA", "AMD"]);
        assert_eq!(item.price_for("NVDA"), Some("+2.3%"));
        assert_eq!(item.price_for("AMD"), Some("151.2"));
        assert_eq!(item.price_for("X"), None);
    }

    #[test]
    fn sector_matching_ignores_case() {
        assert_eq!(Sector::parse_lenient("tech & ai"), Sector::TechAi);
        assert_eq!(Sector::parse_lenient(" Real Estate "), Sector::RealEstate);
    }

    #[test]
    fn accuracy_never_parses_to_error() {
        assert_eq!(Accuracy::parse_lenient("partially confirmed"), Accuracy::PartiallyConfirmed);
        assert_eq!(Accuracy::parse_lenient("ERROR"), Accuracy::Unconfirmed);
    }

    #[test]
    fn item_serializes_with_wire_names() {
        let item = validate(&json!({ "headline": "a", "analysis": "b", "signal": "BULLISH", "sector": "Macro & Fed" })).unwrap();
        let v = serde_json::to_value(&item).unwrap();
        assert_eq!(v["signal"], "BULLISH");
        assert_eq!(v["sector"], "Macro & Fed");
        assert_eq!(v["timeHorizon"], "MEDIUM");
        assert!(v.get("confidence").is_none());
    }
}
