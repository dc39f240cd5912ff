// src/viewing.rs
//! Viewing policy: scheduled overrides, weighted ordering and the weighted
//! random ("fair view") pick.
//!
//! All functions borrow the candidate list and hand back references into it.
//! The clock and the random source come from the caller, so every result is
//! reproducible in tests.

use std::cmp::Ordering;

use chrono::NaiveDateTime;
use rand::Rng;
use tracing::debug;

use crate::model::Advertisement;

/// True iff both bounds are set and `start <= now <= end`.
pub fn is_override_active(ad: &Advertisement, now: NaiveDateTime) -> bool {
    match ad.override_window() {
        Some((start, end)) => start <= now && now <= end,
        None => false,
    }
}

/// Weight descending, then newest `created_at` first; missing timestamps last.
pub(crate) fn display_cmp(a: &Advertisement, b: &Advertisement) -> Ordering {
    b.weight
        .cmp(&a.weight)
        .then_with(|| match (a.created_at, b.created_at) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
}

/// Override-active ads first, each group sorted by [`display_cmp`].
/// The result is a permutation of the input.
pub fn order_for_display(ads: &[Advertisement], now: NaiveDateTime) -> Vec<&Advertisement> {
    let (mut overrides, mut rest): (Vec<&Advertisement>, Vec<&Advertisement>) =
        ads.iter().partition(|ad| is_override_active(ad, now));

    overrides.sort_by(|a, b| display_cmp(a, b));
    rest.sort_by(|a, b| display_cmp(a, b));

    if !overrides.is_empty() {
        debug!(
            target: "viewing",
            overrides = overrides.len(),
            others = rest.len(),
            "override window active"
        );
    }

    overrides.extend(rest);
    overrides
}

/// The pool a pick draws from: override-active ads if any, otherwise all.
pub(crate) fn selection_pool(ads: &[Advertisement], now: NaiveDateTime) -> Vec<&Advertisement> {
    let active: Vec<&Advertisement> = ads.iter().filter(|ad| is_override_active(ad, now)).collect();
    if active.is_empty() {
        ads.iter().collect()
    } else {
        active
    }
}

/// Weighted random pick: P(ad) = weight / total over the pool.
/// Zero-weight ads are never drawn; an empty or all-zero pool yields `None`.
pub fn select_one_fair<'a, R: Rng>(
    ads: &'a [Advertisement],
    now: NaiveDateTime,
    rng: &mut R,
) -> Option<&'a Advertisement> {
    let pool: Vec<&Advertisement> = selection_pool(ads, now)
        .into_iter()
        .filter(|ad| ad.weight > 0)
        .collect();

    let total: u64 = pool.iter().map(|ad| u64::from(ad.weight)).sum();
    if total == 0 {
        return None;
    }

    let draw = rng.random_range(0..total);
    let mut cumulative = 0u64;
    for ad in &pool {
        cumulative += u64::from(ad.weight);
        if cumulative > draw {
            return Some(*ad);
        }
    }

    // Unreachable while draw < total; keep the last candidate rather than panic.
    pool.last().copied()
}

/// Deterministic order with `pick` moved to the front; `pick` must point into `ads`.
pub(crate) fn with_first<'a>(
    ordered: Vec<&'a Advertisement>,
    pick: &'a Advertisement,
) -> Vec<&'a Advertisement> {
    let mut out = Vec::with_capacity(ordered.len());
    out.push(pick);
    out.extend(ordered.into_iter().filter(|ad| !std::ptr::eq(*ad, pick)));
    out
}

/// Hybrid ordering: the weighted pick at index 0, then [`order_for_display`]
/// without the picked element.
pub fn order_for_display_with_fair_first<'a, R: Rng>(
    ads: &'a [Advertisement],
    now: NaiveDateTime,
    rng: &mut R,
) -> Vec<&'a Advertisement> {
    let ordered = order_for_display(ads, now);
    match select_one_fair(ads, now, rng) {
        Some(pick) => with_first(ordered, pick),
        None => ordered,
    }
}
