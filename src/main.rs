//! Ad Targeting Service: binary entrypoint.
//! Boots the Axum HTTP server, wiring config, catalog, shared state and
//! middleware.

use shuttle_axum::ShuttleAxum;
use std::time::Duration;
use tracing::{info, warn};

use ad_targeting_service::catalog::{start_hot_reload_thread, Catalog, CatalogHandle};
use ad_targeting_service::logging::init_tracing;
use ad_targeting_service::metrics::Metrics;
use ad_targeting_service::{create_router, AppState, ServiceConfig};

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let config = ServiceConfig::load()?;
    info!(
        selection = config.policy.selection.as_str(),
        seeded = config.policy.seed.is_some(),
        catalog = %config.catalog.path.display(),
        "service config ready"
    );

    // --- Catalog + optional dev hot reload ---
    let catalog = Catalog::load_or_empty(&config.catalog.path)?;
    let size = catalog.len();
    let handle = CatalogHandle::new(catalog);
    start_hot_reload_thread(
        handle.clone(),
        config.catalog.path.clone(),
        Duration::from_secs(config.catalog.hot_reload_secs),
    );

    let state = AppState::new(handle, config);
    let mut router = create_router(state);

    if Metrics::enabled() {
        match Metrics::init(size) {
            Ok(m) => router = router.merge(m.router()),
            Err(e) => warn!(error = %e, "metrics disabled"),
        }
    }

    Ok(router.into())
}
