// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::env;

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const MIN_TOKENS: u32 = 256;
const MAX_TOKENS: u32 = 32_000;

fn default_provider() -> String {
    "anthropic".to_string()
}
fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}
fn default_scan_tokens() -> u32 {
    8000
}
fn default_verify_tokens() -> u32 {
    1500
}
fn default_true() -> bool {
    true
}
fn default_timeout_secs() -> u64 {
    180
}

/// Settings for the generation/verification service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationConfig {
    /// "anthropic" | "mock" (case-insensitive)
    #[serde(default = "default_provider")]
    pub provider: String,
    /// "ENV" means: read from ANTHROPIC_API_KEY
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Model used for fact-checks; defaults to `model`.
    #[serde(default)]
    pub verify_model: Option<String>,
    #[serde(default = "default_scan_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_verify_tokens")]
    pub verify_max_tokens: u32,
    #[serde(default = "default_true")]
    pub web_search: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_key: default_api_key(),
            model: default_model(),
            verify_model: None,
            max_tokens: default_scan_tokens(),
            verify_max_tokens: default_verify_tokens(),
            web_search: true,
            timeout_secs: default_timeout_secs(),
            base_url: None,
        }
    }
}

impl GenerationConfig {
    /// Environment overrides on top of the defaults.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(p) = env::var("BRIEF_PROVIDER") {
            cfg.provider = p;
        }
        if let Ok(m) = env::var("BRIEF_MODEL") {
            cfg.model = m;
        }
        cfg.verify_model = env::var("BRIEF_VERIFY_MODEL").ok();
        if let Some(n) = env::var("BRIEF_MAX_TOKENS").ok().and_then(|v| v.trim().parse().ok()) {
            cfg.max_tokens = n;
        }
        if let Some(b) = env::var("BRIEF_WEB_SEARCH").ok().map(|v| parse_bool(&v)) {
            cfg.web_search = b;
        }
        cfg.base_url = env::var("ANTHROPIC_BASE_URL").ok();
        cfg
    }

    /// Normalize provider, resolve the key and clamp limits.
    pub fn finalize(mut self) -> anyhow::Result<Self> {
        self.provider = self.provider.trim().to_lowercase();

        // AI_TEST_MODE=mock forces the scripted generator regardless of config.
        if env::var("AI_TEST_MODE").map(|v| v == "mock").unwrap_or(false) {
            self.provider = "mock".to_string();
        }

        match self.provider.as_str() {
            "anthropic" => {
                if self.api_key.trim().eq_ignore_ascii_case("env") {
                    self.api_key = env::var("ANTHROPIC_API_KEY")
                        .map_err(|_| anyhow::anyhow!("Missing ANTHROPIC_API_KEY env var"))?;
                }
            }
            "mock" => {}
            other => anyhow::bail!("Unsupported provider in config: {other}"),
        }

        self.max_tokens = self.max_tokens.clamp(MIN_TOKENS, MAX_TOKENS);
        self.verify_max_tokens = self.verify_max_tokens.clamp(MIN_TOKENS, MAX_TOKENS);
        if self.timeout_secs == 0 {
            self.timeout_secs = default_timeout_secs();
        }
        if self.model.trim().is_empty() {
            self.model = default_model();
        }
        Ok(self)
    }

    pub fn verify_model(&self) -> &str {
        self.verify_model
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(&self.model)
    }
}

pub(crate) fn parse_bool(v: &str) -> bool {
    matches!(
        v.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
