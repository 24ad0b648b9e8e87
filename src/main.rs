//! Morning Brief service: binary entrypoint.
//! Loads configuration, builds the pipeline, mounts the router and starts the optional
//! in-process scheduler.

use std::sync::Arc;
use std::time::Duration;

use morning_brief::{scheduler, BriefConfig, Pipeline};
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact logs by default, JSON lines with `LOG_FORMAT=json`.
/// `try_init` because the hosting runtime may already own the global subscriber.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("morning_brief=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let result = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = BriefConfig::load_default()?;
    let pipeline = Arc::new(Pipeline::from_config(&cfg)?);

    if let Some(schedule) = &cfg.schedule {
        tracing::info!(
            target: "cron",
            interval_secs = schedule.interval_secs,
            "starting in-process scheduler"
        );
        let _handle =
            scheduler::spawn_scheduler(pipeline.clone(), Duration::from_secs(schedule.interval_secs));
    }

    let router = morning_brief::app(&cfg, pipeline)?;
    Ok(router.into())
}
