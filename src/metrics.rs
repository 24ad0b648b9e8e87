use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder and describe the service's series.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {e}"))?;

        describe_counter!("brief_scan_runs_total", "Scan runs by outcome");
        describe_counter!("brief_items_extracted_total", "Items that passed validation");
        describe_counter!("brief_items_dropped_total", "Candidate items rejected by validation");
        describe_counter!("brief_verifications_total", "Fact-checks by accuracy verdict");
        describe_counter!("brief_deliveries_total", "Report deliveries by outcome");
        describe_counter!("brief_cron_rejected_total", "Cron triggers rejected for bad credentials");
        describe_gauge!(
            "brief_scheduler_last_run_ts",
            Unit::Seconds,
            "Unix time of the last scheduled run"
        );
        describe_histogram!(
            "brief_scan_duration_ms",
            Unit::Milliseconds,
            "Wall time of one scan, generation plus extraction"
        );

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
