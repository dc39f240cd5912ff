//! # Placement Engine
//! Pure glue between the catalog and the viewing policy: drop inactive ads,
//! run targeting for a query, then order (and optionally feature) the
//! survivors according to the configured [`SelectionMode`].
//!
//! No I/O. The clock, the random source and the rotation counters come from
//! the caller, so everything here is reproducible in tests.

use chrono::NaiveDateTime;
use metrics::counter;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{AdId, Advertisement};
use crate::rotation::FairRotation;
use crate::targeting::{filter_by_query, filter_by_targeting, TargetingQuery, TargetingRequest};
use crate::viewing::{is_override_active, order_for_display, select_one_fair, with_first};

/// How the front slot of a placement is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// Weighted random pick first, then the deterministic order.
    #[default]
    Weighted,
    /// Most under-served ad first (view counters).
    Rotation,
    /// Plain override/weight/recency order.
    Deterministic,
}

impl SelectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionMode::Weighted => "weighted",
            SelectionMode::Rotation => "rotation",
            SelectionMode::Deterministic => "deterministic",
        }
    }

    /// Case-insensitive; `None` for unknown names.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weighted" | "fair" => Some(Self::Weighted),
            "rotation" => Some(Self::Rotation),
            "deterministic" => Some(Self::Deterministic),
            _ => None,
        }
    }
}

/// Ordered result handed to the display surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Placement {
    pub mode: SelectionMode,
    /// Id of the ad placed at index 0 by the pick, if any.
    pub featured_id: Option<AdId>,
    /// True when at least one candidate sits inside its override window.
    pub override_active: bool,
    pub advertisements: Vec<Advertisement>,
}

impl Placement {
    pub fn is_empty(&self) -> bool {
        self.advertisements.is_empty()
    }
}

/// Active ads only.
pub fn active_only(ads: &[Advertisement]) -> Vec<Advertisement> {
    ads.iter().filter(|ad| ad.active).cloned().collect()
}

/// Active ads matching a single-dimension query.
pub fn targeted(ads: &[Advertisement], query: &TargetingQuery) -> Vec<Advertisement> {
    let dimension = query.dimension().as_str();
    counter!("ads_targeting_requests_total", "dimension" => dimension).increment(1);

    let active = active_only(ads);
    let out: Vec<Advertisement> = filter_by_query(&active, query).into_iter().cloned().collect();

    counter!("ads_targeting_matched_total", "dimension" => dimension).increment(out.len() as u64);
    out
}

/// Active ads passing the combined geo+bio+mood query.
pub fn targeted_combined(ads: &[Advertisement], request: &TargetingRequest) -> Vec<Advertisement> {
    counter!("ads_targeting_requests_total", "dimension" => "combined").increment(1);

    let active = active_only(ads);
    let out: Vec<Advertisement> = filter_by_targeting(&active, request)
        .into_iter()
        .cloned()
        .collect();

    counter!("ads_targeting_matched_total", "dimension" => "combined").increment(out.len() as u64);
    out
}

/// Order `candidates` for display under `mode`.
pub fn place<R: Rng>(
    candidates: &[Advertisement],
    now: NaiveDateTime,
    mode: SelectionMode,
    rng: &mut R,
    rotation: &FairRotation,
) -> Placement {
    counter!("ads_selection_total", "mode" => mode.as_str()).increment(1);

    let override_active = candidates.iter().any(|ad| is_override_active(ad, now));
    let deterministic = order_for_display(candidates, now);

    let pick = match mode {
        SelectionMode::Deterministic => None,
        SelectionMode::Weighted => select_one_fair(candidates, now, rng),
        SelectionMode::Rotation => rotation.select(candidates, now),
    };
    let featured_id = pick.map(|ad| ad.id);
    let ordered = match pick {
        Some(ad) => with_first(deterministic, ad),
        None => deterministic,
    };

    if ordered.is_empty() {
        counter!("ads_selection_empty_total").increment(1);
    }

    debug!(
        target: "engine",
        mode = mode.as_str(),
        candidates = candidates.len(),
        featured = ?featured_id,
        override_active,
        "placement built"
    );

    Placement {
        mode,
        featured_id,
        override_active,
        advertisements: ordered.into_iter().cloned().collect(),
    }
}

/// Single pick under `mode`; `None` when nothing is eligible.
pub fn pick_one<R: Rng>(
    candidates: &[Advertisement],
    now: NaiveDateTime,
    mode: SelectionMode,
    rng: &mut R,
    rotation: &FairRotation,
) -> Option<Advertisement> {
    counter!("ads_selection_total", "mode" => mode.as_str()).increment(1);

    let pick = match mode {
        SelectionMode::Weighted => select_one_fair(candidates, now, rng),
        SelectionMode::Rotation => rotation.select(candidates, now),
        SelectionMode::Deterministic => order_for_display(candidates, now).into_iter().next(),
    };

    if pick.is_none() {
        counter!("ads_selection_empty_total").increment(1);
    }
    pick.cloned()
}
