//! # Verification workflow
//! One independent fact-check per item. [`Verifier::verify`] never fails: transport
//! problems become an `ERROR` result, unparseable replies become an inconclusive
//! `UNCONFIRMED` result.

use std::sync::Arc;

use metrics::counter;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::extract;
use crate::llm::Generator;
use crate::prompts;
use crate::schema::{self, Accuracy, NewsItem, VerificationResult};

/// The three fields of an item a fact-check looks at.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Claim {
    pub headline: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub analysis: Option<String>,
}

impl From<&NewsItem> for Claim {
    fn from(item: &NewsItem) -> Self {
        Self {
            headline: item.headline.clone(),
            source: Some(item.source.clone()).filter(|s| !s.is_empty()),
            analysis: Some(item.analysis.clone()),
        }
    }
}

#[derive(Clone)]
pub struct Verifier {
    generator: Arc<dyn Generator>,
    max_tokens: u32,
    web_search: bool,
}

impl Verifier {
    pub fn new(generator: Arc<dyn Generator>, max_tokens: u32, web_search: bool) -> Self {
        Self {
            generator,
            max_tokens,
            web_search,
        }
    }

    pub async fn verify(&self, claim: &Claim) -> VerificationResult {
        let req = prompts::verify_request(
            &claim.headline,
            claim.source.as_deref(),
            claim.analysis.as_deref(),
            self.max_tokens,
            self.web_search,
        );

        let result = match self.generator.generate(&req).await {
            Ok(text) => parse_verification(&text),
            Err(e) => {
                warn!(target: "verify", error = %e, "verification call failed");
                VerificationResult::failed(e.to_string())
            }
        };

        counter!("brief_verifications_total", "accuracy" => result.accuracy.as_str())
            .increment(1);
        info!(
            target: "verify",
            accuracy = result.accuracy.as_str(),
            sources = result.sources.len(),
            "verification finished"
        );
        result
    }
}

/// Parse a verification reply with the same fence/slice fallback as item extraction.
pub fn parse_verification(raw: &str) -> VerificationResult {
    let Some(obj) = extract::extract_object(raw) else {
        return VerificationResult::inconclusive();
    };

    let accuracy = obj
        .get("accuracy")
        .and_then(Value::as_str)
        .map(Accuracy::parse_lenient)
        .unwrap_or(Accuracy::Unconfirmed);
    let details = obj
        .get("details")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| VerificationResult::inconclusive().details);
    let corrected_info = obj
        .get("correctedInfo")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("null"))
        .map(str::to_string);
    let sources = match obj.get("sources") {
        Some(Value::Array(arr)) => arr
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|u| schema::is_absolute_http_url(u))
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };

    VerificationResult {
        accuracy,
        verified: obj.get("verified").and_then(Value::as_bool),
        details,
        corrected_info,
        sources,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_reply() {
        let raw = "```json\n{\"verified\": true, \"accuracy\": \"PARTIALLY_CONFIRMED\", \"details\": \"Rate held, vote split differs.\", \"correctedInfo\": \"Vote was 10-2\", \"sources\": [\"https://apnews.com/a\", \"not a url\"]}\n```";
        let r = parse_verification(raw);
        assert_eq!(r.accuracy, Accuracy::PartiallyConfirmed);
        assert_eq!(r.verified, Some(true));
        assert_eq!(r.corrected_info.as_deref(), Some("Vote was 10-2"));
        assert_eq!(r.sources, vec!["https://apnews.com/a"]);
    }

    #[test]
    fn garbage_reply_is_inconclusive() {
        let r = parse_verification("I could not find anything about this.");
        assert_eq!(r, VerificationResult::inconclusive());
        assert_eq!(r.details, "Verification could not be completed.");
        assert!(r.sources.is_empty());
    }

    #[test]
    fn null_corrections_are_absent() {
        let r = parse_verification(r#"{"accuracy": "CONFIRMED", "details": "ok", "correctedInfo": null}"#);
        assert_eq!(r.accuracy, Accuracy::Confirmed);
        assert!(r.corrected_info.is_none());
        assert!(r.verified.is_none());
    }
}
