// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod config;
pub mod schema;
pub mod extract;
pub mod prompts;
pub mod llm;
pub mod verify;
pub mod session;
pub mod render;
pub mod notify;
pub mod pipeline;
pub mod scheduler;
pub mod metrics;
pub mod api;

use std::sync::Arc;

use axum::Router;
use tracing::info;

pub use crate::api::{router, AppState};
pub use crate::config::BriefConfig;
pub use crate::pipeline::Pipeline;

/// Full service router for `cfg`: API routes plus `/metrics` when enabled.
/// Installs the global metrics recorder, so call it once per process.
pub fn app(cfg: &BriefConfig, pipeline: Arc<Pipeline>) -> anyhow::Result<Router> {
    let state = AppState::new(pipeline, cfg.cron_secret.clone());
    let mut router = api::router(state);
    if cfg.metrics_enabled {
        let m = crate::metrics::Metrics::init()?;
        router = router.merge(m.router());
        info!(target: "scan", "metrics exposed at /metrics");
    }
    Ok(router)
}
