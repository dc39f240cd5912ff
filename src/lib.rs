// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod rotation;
pub mod targeting;
pub mod viewing;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::catalog::{Catalog, CatalogHandle};
pub use crate::config::ServiceConfig;
pub use crate::engine::{Placement, SelectionMode};
pub use crate::model::{Advertisement, Rule};
pub use crate::rotation::FairRotation;
pub use crate::targeting::{
    has_disqualifying_exclusion, matches_bio, matches_combined, matches_geo, matches_mood,
    BioContext, GeoContext, MoodContext, TargetingQuery, TargetingRequest,
};
pub use crate::viewing::{
    is_override_active, order_for_display, order_for_display_with_fair_first, select_one_fair,
};
