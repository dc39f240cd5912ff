//! Deterministic fair rotation.
//!
//! Keeps an in-memory view counter per advertisement and always serves the ad
//! that is furthest behind its weight share. Counters live for the lifetime of
//! the process; nothing is persisted.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Mutex;

use chrono::NaiveDateTime;
use tracing::{debug, warn};

use crate::model::{AdId, Advertisement};
use crate::viewing::{display_cmp, order_for_display, selection_pool, with_first};

#[derive(Debug, Default)]
pub struct FairRotation {
    views: Mutex<HashMap<AdId, u64>>,
}

impl FairRotation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Views recorded for `id` so far.
    pub fn views_for(&self, id: AdId) -> u64 {
        match self.views.lock() {
            Ok(v) => v.get(&id).copied().unwrap_or(0),
            Err(_) => 0,
        }
    }

    pub fn record_view(&self, id: AdId) {
        match self.views.lock() {
            Ok(mut v) => *v.entry(id).or_insert(0) += 1,
            Err(e) => warn!(target: "rotation", "view counter lock poisoned: {e}"),
        }
    }

    pub fn reset(&self) {
        if let Ok(mut v) = self.views.lock() {
            v.clear();
        }
    }

    /// The most under-served ad of the pool (override-restricted, weight > 0).
    /// Ties go to the display order. Does not record a view.
    pub fn peek<'a>(&self, ads: &'a [Advertisement], now: NaiveDateTime) -> Option<&'a Advertisement> {
        match self.views.lock() {
            Ok(views) => most_underserved(ads, now, &views),
            Err(e) => {
                warn!(target: "rotation", "view counter lock poisoned: {e}");
                None
            }
        }
    }

    /// Pick and count a view. Both happen under one lock, so concurrent
    /// callers never get handed the same deficit.
    pub fn select<'a>(&self, ads: &'a [Advertisement], now: NaiveDateTime) -> Option<&'a Advertisement> {
        let mut views = match self.views.lock() {
            Ok(v) => v,
            Err(e) => {
                warn!(target: "rotation", "view counter lock poisoned: {e}");
                return None;
            }
        };
        let pick = most_underserved(ads, now, &views)?;
        let seen = views.entry(pick.id).or_insert(0);
        *seen += 1;
        debug!(target: "rotation", ad_id = pick.id, views = *seen, "rotation pick");
        Some(pick)
    }

    /// Like the hybrid ordering, but the front slot goes to the rotation pick.
    pub fn order_with_rotation_first<'a>(
        &self,
        ads: &'a [Advertisement],
        now: NaiveDateTime,
    ) -> Vec<&'a Advertisement> {
        let ordered = order_for_display(ads, now);
        match self.select(ads, now) {
            Some(pick) => with_first(ordered, pick),
            None => ordered,
        }
    }
}

fn most_underserved<'a>(
    ads: &'a [Advertisement],
    now: NaiveDateTime,
    views: &HashMap<AdId, u64>,
) -> Option<&'a Advertisement> {
    let pool: Vec<&Advertisement> = selection_pool(ads, now)
        .into_iter()
        .filter(|ad| ad.weight > 0)
        .collect();
    let total: u64 = pool.iter().map(|ad| u64::from(ad.weight)).sum();
    if total == 0 {
        return None;
    }

    // views / (weight / total) == views * total / weight
    let deficit = |ad: &Advertisement| -> f64 {
        let seen = views.get(&ad.id).copied().unwrap_or(0) as f64;
        seen * total as f64 / f64::from(ad.weight)
    };

    pool.into_iter().min_by(|a, b| {
        deficit(*a)
            .partial_cmp(&deficit(*b))
            .unwrap_or(Ordering::Equal)
            .then_with(|| display_cmp(a, b))
    })
}
