// src/metrics.rs
//! Prometheus exposition for the targeting and selection counters.

use anyhow::anyhow;
use axum::{extract::State, routing::get, Router};
use metrics::{describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub const ENV_METRICS_ENABLED: &str = "METRICS_ENABLED";

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and describe the service metrics.
    pub fn init(catalog_size: usize) -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| anyhow!("prometheus: install recorder: {e}"))?;

        describe_counter!(
            "ads_targeting_requests_total",
            "Targeted queries served, by dimension"
        );
        describe_counter!(
            "ads_targeting_matched_total",
            "Advertisements returned by targeted queries, by dimension"
        );
        describe_counter!("ads_selection_total", "Placements and picks, by selection mode");
        describe_counter!("ads_selection_empty_total", "Selections that found nothing eligible");
        describe_gauge!("ads_catalog_size", "Advertisements in the loaded catalog");

        gauge!("ads_catalog_size").set(catalog_size as f64);

        Ok(Self { handle })
    }

    /// `METRICS_ENABLED=1`
    pub fn enabled() -> bool {
        std::env::var(ENV_METRICS_ENABLED).ok().as_deref() == Some("1")
    }

    /// `/metrics` in the Prometheus text format, ready to merge into the app router.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/metrics", get(render))
            .with_state(self.handle.clone())
    }
}

async fn render(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}
