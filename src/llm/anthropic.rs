//! Anthropic Messages API client with the server-side web search tool.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{GenerationRequest, Generator, UpstreamError};

const SERVICE: &str = "anthropic";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicGenerator {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl AnthropicGenerator {
    pub fn new(http: reqwest::Client, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Shared HTTP client for every upstream call of one app instance.
    /// Web-search answers routinely take tens of seconds, hence the long timeout.
    pub fn http_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("morning-brief/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()?;
        Ok(client)
    }
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: &'static str,
    name: &'static str,
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    content: Vec<WireBlock>,
}

#[derive(Deserialize)]
struct WireBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct WireErrorBody {
    error: WireErrorDetail,
}

#[derive(Deserialize)]
struct WireErrorDetail {
    message: String,
}

/// Join the text blocks of a response, skipping tool-use and search-result blocks.
fn collect_text(resp: WireResponse) -> String {
    resp.content
        .into_iter()
        .filter(|b| b.kind == "text")
        .filter_map(|b| b.text)
        .collect::<Vec<_>>()
        .join("")
}

#[async_trait]
impl Generator for AnthropicGenerator {
    async fn generate(&self, req: &GenerationRequest) -> Result<String, UpstreamError> {
        if self.api_key.trim().is_empty() {
            return Err(UpstreamError::NotConfigured {
                service: SERVICE,
                what: "ANTHROPIC_API_KEY".to_string(),
            });
        }

        let tools = if req.web_search {
            vec![WireTool {
                kind: "web_search_20250305",
                name: "web_search",
            }]
        } else {
            Vec::new()
        };
        let body = WireRequest {
            model: &self.model,
            max_tokens: req.max_tokens,
            system: &req.system,
            messages: vec![WireMessage {
                role: "user",
                content: &req.user,
            }],
            tools,
        };

        debug!(target: "llm", kind = req.kind.as_str(), model = %self.model, "anthropic request");

        let resp = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| UpstreamError::Transport {
                service: SERVICE,
                message: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let raw = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<WireErrorBody>(&raw)
                .map(|b| b.error.message)
                .unwrap_or_else(|_| status.canonical_reason().unwrap_or("error").to_string());
            return Err(UpstreamError::Status {
                service: SERVICE,
                status: status.as_u16(),
                message,
            });
        }

        let parsed: WireResponse = resp.json().await.map_err(|e| UpstreamError::Decode {
            service: SERVICE,
            message: e.to_string(),
        })?;
        Ok(collect_text(parsed))
    }

    fn provider_name(&self) -> &'static str {
        SERVICE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::RequestKind;

    #[test]
    fn only_text_blocks_are_collected() {
        let resp: WireResponse = serde_json::from_value(serde_json::json!({
            "content": [
                { "type": "text", "text": "[{\"headline\":" },
                { "type": "server_tool_use", "id": "x", "name": "web_search" },
                { "type": "web_search_tool_result", "content": [] },
                { "type": "text", "text": "\"a\"}]" }
            ]
        }))
        .unwrap();
        assert_eq!(collect_text(resp), "[{\"headline\":\"a\"}]");
    }

    #[test]
    fn search_tool_is_serialized_only_when_requested() {
        let body = WireRequest {
            model: "m",
            max_tokens: 10,
            system: "s",
            messages: vec![],
            tools: vec![],
        };
        let v = serde_json::to_value(&body).unwrap();
        assert!(v.get("tools").is_none());
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let g = AnthropicGenerator::new(reqwest::Client::new(), "", "m");
        let req = GenerationRequest {
            kind: RequestKind::Scan,
            system: String::new(),
            user: String::new(),
            max_tokens: 1,
            web_search: false,
        };
        let err = g.generate(&req).await.unwrap_err();
        assert!(matches!(err, UpstreamError::NotConfigured { .. }));
    }
}
