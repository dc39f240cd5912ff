use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDateTime;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::catalog::CatalogHandle;
use crate::config::ServiceConfig;
use crate::engine::{self, Placement};
use crate::logging::{dev_logging_enabled, viewer_fingerprint};
use crate::model::{parse_lenient, AdId, Advertisement, Gender, Mood};
use crate::rotation::FairRotation;
use crate::targeting::{BioContext, GeoContext, MoodContext, TargetingQuery, TargetingRequest};

fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

#[derive(Clone)]
pub struct AppState {
    catalog: CatalogHandle,
    config: Arc<ServiceConfig>,
    rng: Arc<Mutex<StdRng>>,
    rotation: Arc<FairRotation>,
    clock: fn() -> NaiveDateTime,
}

impl AppState {
    pub fn new(catalog: CatalogHandle, config: ServiceConfig) -> Self {
        let rng = match config.policy.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            catalog,
            config: Arc::new(config),
            rng: Arc::new(Mutex::new(rng)),
            rotation: Arc::new(FairRotation::new()),
            clock: local_now,
        }
    }

    /// Fixed clock for override-window tests and demos.
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    pub fn catalog(&self) -> &CatalogHandle {
        &self.catalog
    }

    fn catalog_path(&self) -> PathBuf {
        self.config.catalog.path.clone()
    }

    fn place(&self, candidates: &[Advertisement]) -> Result<Placement, ApiError> {
        let now = (self.clock)();
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| ApiError::internal("rng lock poisoned"))?;
        Ok(engine::place(
            candidates,
            now,
            self.config.policy.selection,
            &mut *rng,
            &self.rotation,
        ))
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/advertisements", get(list_all))
        .route("/advertisements/active", get(list_active))
        .route("/advertisements/pick", get(pick_one))
        .route("/advertisements/targeted", post(targeted_combined))
        .route("/advertisements/geo-targeted", get(geo_targeted))
        .route("/advertisements/bio-targeted", get(bio_targeted))
        .route("/advertisements/mood-targeted", get(mood_targeted))
        .route("/advertisements/{id}", get(get_by_id))
        .route("/admin/reload-catalog", post(admin_reload_catalog))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/* ----------------------------
Errors
---------------------------- */

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/* ----------------------------
Handlers
---------------------------- */

async fn list_all(State(state): State<AppState>) -> Json<Vec<Advertisement>> {
    Json(state.catalog.snapshot())
}

async fn list_active(State(state): State<AppState>) -> Result<Json<Placement>, ApiError> {
    let active = state.catalog.active();
    state.place(&active).map(Json)
}

async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<AdId>,
) -> Result<Json<Advertisement>, ApiError> {
    state
        .catalog
        .get(id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("advertisement {id} not found")))
}

async fn pick_one(State(state): State<AppState>) -> Result<Response, ApiError> {
    let active = state.catalog.active();
    let now = (state.clock)();
    let pick = {
        let mut rng = state
            .rng
            .lock()
            .map_err(|_| ApiError::internal("rng lock poisoned"))?;
        engine::pick_one(
            &active,
            now,
            state.config.policy.selection,
            &mut *rng,
            &state.rotation,
        )
    };
    Ok(match pick {
        Some(ad) => Json(ad).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

async fn targeted_combined(
    State(state): State<AppState>,
    Json(req): Json<TargetingRequest>,
) -> Result<Json<Placement>, ApiError> {
    dev_log_viewer("combined", || req.viewer_key());
    let matched = engine::targeted_combined(&state.catalog.snapshot(), &req);
    state.place(&matched).map(Json)
}

// Numeric params arrive as raw strings so a bad value reads as "not supplied"
// instead of failing extraction.
#[derive(Debug, Default, Deserialize)]
struct GeoParams {
    country_code: Option<String>,
    region: Option<String>,
    city: Option<String>,
    latitude: Option<String>,
    longitude: Option<String>,
}

async fn geo_targeted(
    State(state): State<AppState>,
    Query(p): Query<GeoParams>,
) -> Result<Json<Placement>, ApiError> {
    let ctx = GeoContext {
        country_code: p.country_code,
        region: p.region,
        city: p.city,
        latitude: parse_lenient(p.latitude.as_deref()),
        longitude: parse_lenient(p.longitude.as_deref()),
    };
    run_query(&state, TargetingQuery::Geo(ctx))
}

#[derive(Debug, Default, Deserialize)]
struct BioParams {
    age: Option<String>,
    gender: Option<String>,
    occupation: Option<String>,
    education_level: Option<String>,
    language: Option<String>,
    /// Comma-separated.
    interests: Option<String>,
}

async fn bio_targeted(
    State(state): State<AppState>,
    Query(p): Query<BioParams>,
) -> Result<Json<Placement>, ApiError> {
    let interests = p
        .interests
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    let ctx = BioContext {
        age: parse_lenient(p.age.as_deref()),
        gender: p.gender.as_deref().and_then(Gender::parse),
        occupation: p.occupation,
        education_level: p.education_level,
        language: p.language,
        interests,
    };
    run_query(&state, TargetingQuery::Bio(ctx))
}

#[derive(Debug, Default, Deserialize)]
struct MoodParams {
    mood: Option<String>,
    intensity: Option<String>,
    time_of_day: Option<String>,
    day_of_week: Option<String>,
    season: Option<String>,
}

async fn mood_targeted(
    State(state): State<AppState>,
    Query(p): Query<MoodParams>,
) -> Result<Json<Placement>, ApiError> {
    let ctx = MoodContext {
        mood: p.mood.as_deref().and_then(Mood::parse),
        intensity: parse_lenient(p.intensity.as_deref()),
        time_of_day: p.time_of_day,
        day_of_week: p.day_of_week,
        season: p.season,
    };
    run_query(&state, TargetingQuery::Mood(ctx))
}

fn run_query(state: &AppState, query: TargetingQuery) -> Result<Json<Placement>, ApiError> {
    dev_log_viewer(query.dimension().as_str(), || query.viewer_key());
    let matched = engine::targeted(&state.catalog.snapshot(), &query);
    state.place(&matched).map(Json)
}

async fn admin_reload_catalog(State(state): State<AppState>) -> Result<Response, ApiError> {
    let path = state.catalog_path();
    match state.catalog.reload(&path) {
        Ok(n) => {
            info!(target: "catalog", path = %path.display(), advertisements = n, "catalog reloaded via admin");
            Ok(Json(json!({ "reloaded": n })).into_response())
        }
        Err(e) => {
            warn!(target: "catalog", error = %e, "admin catalog reload failed");
            Err(ApiError::internal(format!("{e:#}")))
        }
    }
}

// Viewer context is only ever logged as a fingerprint.
fn dev_log_viewer(kind: &str, key: impl FnOnce() -> String) {
    if !dev_logging_enabled() {
        return;
    }
    let viewer = viewer_fingerprint([kind, key().as_str()]);
    info!(target: "targeting", %viewer, kind, "targeted request");
}
