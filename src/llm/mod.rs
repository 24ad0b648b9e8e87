//! Generation service abstraction: text in, free-form text out.
//! Concrete clients are constructed explicitly and handed to the pipeline; nothing here is
//! cached in globals.

pub mod anthropic;
pub mod scripted;

use std::sync::Arc;

use async_trait::async_trait;

pub use anthropic::AnthropicGenerator;
pub use scripted::ScriptedGenerator;

/// What a request is for. Lets scripted clients answer per purpose and labels logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Scan,
    Verify,
}

impl RequestKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestKind::Scan => "scan",
            RequestKind::Verify => "verify",
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub kind: RequestKind,
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
    /// Allow the provider to run web searches while answering.
    pub web_search: bool,
}

/// Network or HTTP-level failure talking to an upstream service. Never retried internally.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    #[error("{service} is not configured: {what}")]
    NotConfigured { service: &'static str, what: String },
    #[error("{service} request failed: {message}")]
    Transport {
        service: &'static str,
        message: String,
    },
    #[error("{service} returned HTTP {status}: {message}")]
    Status {
        service: &'static str,
        status: u16,
        message: String,
    },
    #[error("{service} response could not be decoded: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },
}

#[async_trait]
pub trait Generator: Send + Sync {
    /// Run one request and return the concatenated text blocks of the answer.
    async fn generate(&self, req: &GenerationRequest) -> Result<String, UpstreamError>;

    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type DynGenerator = Arc<dyn Generator>;
