// src/catalog.rs
//! Advertisement catalog: a JSON snapshot of the ad store, validated on load,
//! shared behind a thread-safe handle that can be swapped at runtime.

use anyhow::{anyhow, Context};
use metrics::gauge;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::{Duration, SystemTime};
use tracing::{info, warn};

use crate::logging::is_dev_env;
use crate::model::{AdId, Advertisement, AdvertisementSource};

pub const ENV_HOT_RELOAD: &str = "ADS_HOT_RELOAD";

pub const MAX_WEIGHT: u32 = 100;
const COUNTRY_CODE_PATTERN: &str = r"^[A-Za-z]{2}$";

/// On-disk shape: either `{"advertisements": [...]}` or a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    Wrapped { advertisements: Vec<Advertisement> },
    Bare(Vec<Advertisement>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Catalog {
    pub advertisements: Vec<Advertisement>,
}

impl Catalog {
    pub fn new(advertisements: Vec<Advertisement>) -> Self {
        Self { advertisements }
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading catalog from {}", path.display()))?;
        let catalog = Self::from_json_str(&data)
            .with_context(|| format!("loading catalog {}", path.display()))?;
        info!(
            target: "catalog",
            path = %path.display(),
            advertisements = catalog.len(),
            "catalog loaded"
        );
        Ok(catalog)
    }

    /// Missing file yields an empty catalog; a present but broken file is an error.
    pub fn load_or_empty<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(target: "catalog", path = %path.display(), "catalog file missing, starting empty");
            return Ok(Self::default());
        }
        Self::load_from_file(path)
    }

    pub fn from_json_str(s: &str) -> anyhow::Result<Self> {
        let file: CatalogFile = serde_json::from_str(s)?;
        let advertisements = match file {
            CatalogFile::Wrapped { advertisements } => advertisements,
            CatalogFile::Bare(v) => v,
        };
        let catalog = Self { advertisements };
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.advertisements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.advertisements.is_empty()
    }

    pub fn get(&self, id: AdId) -> Option<&Advertisement> {
        self.advertisements.iter().find(|ad| ad.id == id)
    }

    pub fn active(&self) -> Vec<Advertisement> {
        self.advertisements.iter().filter(|ad| ad.active).cloned().collect()
    }

    /// Checks every ad and reports all problems at once as `ads[i].field: message`.
    pub fn validate(&self) -> anyhow::Result<()> {
        let country_re =
            Regex::new(COUNTRY_CODE_PATTERN).context("compiling country code pattern")?;

        let mut errors = Vec::new();
        let mut seen = HashSet::new();
        for (i, ad) in self.advertisements.iter().enumerate() {
            if !seen.insert(ad.id) {
                errors.push(format!("ads[{i}].id: duplicate id {}", ad.id));
            }
            for msg in validate_ad(ad, &country_re) {
                errors.push(format!("ads[{i}].{msg}"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(anyhow!(
                "catalog validation failed ({} problems): {}",
                errors.len(),
                errors.join("; ")
            ))
        }
    }
}

/// Field errors for one ad (`field: message`); soft issues are only logged.
pub fn validate_ad(ad: &Advertisement, country_re: &Regex) -> Vec<String> {
    let mut errors = Vec::new();

    if ad.title.trim().is_empty() {
        errors.push("title: is required".to_string());
    }
    if ad.content.trim().is_empty() {
        errors.push("content: is required".to_string());
    }
    if ad.source_identifier.trim().is_empty() {
        errors.push("source_identifier: is required".to_string());
    }
    if ad.source == AdvertisementSource::Youtube {
        if let Some(video_id) = ad.youtube_details.as_ref().and_then(|d| d.video_id.as_deref()) {
            if video_id != ad.source_identifier {
                errors.push(format!(
                    "youtube_details.video_id: `{video_id}` does not match source_identifier"
                ));
            }
        }
    }
    if ad.weight > MAX_WEIGHT {
        errors.push(format!("weight: {} exceeds {MAX_WEIGHT}", ad.weight));
    }
    if ad.clickable && ad.target_url.as_deref().map_or(true, |u| u.trim().is_empty()) {
        errors.push("target_url: required when clickable".to_string());
    }

    match (ad.override_start, ad.override_end) {
        (Some(start), Some(end)) if end < start => {
            errors.push("override_end: precedes override_start".to_string());
        }
        (Some(_), None) | (None, Some(_)) => {
            warn!(target: "catalog", ad_id = ad.id, "half-set override window is ignored");
        }
        _ => {}
    }

    for (j, rule) in ad.geo_targets.iter().enumerate() {
        if let Some(cc) = rule.criteria().country_code.as_deref() {
            if !country_re.is_match(cc) {
                errors.push(format!("geo_targets[{j}].country_code: `{cc}` is not a 2-letter code"));
            }
        }
        let g = rule.criteria();
        if let Some(lat) = g.latitude {
            if !(-90.0..=90.0).contains(&lat) {
                errors.push(format!("geo_targets[{j}].latitude: {lat} out of range"));
            }
        }
        if let Some(lon) = g.longitude {
            if !(-180.0..=180.0).contains(&lon) {
                errors.push(format!("geo_targets[{j}].longitude: {lon} out of range"));
            }
        }
    }

    for (j, rule) in ad.bio_targets.iter().enumerate() {
        let b = rule.criteria();
        if let (Some(lo), Some(hi)) = (b.min_age, b.max_age) {
            if lo > hi {
                errors.push(format!("bio_targets[{j}].min_age: {lo} above max_age {hi}"));
            }
        }
    }

    for (j, rule) in ad.mood_targets.iter().enumerate() {
        let m = rule.criteria();
        for (name, v) in [("intensity_min", m.intensity_min), ("intensity_max", m.intensity_max)] {
            if let Some(v) = v {
                if !(1..=10).contains(&v) {
                    errors.push(format!("mood_targets[{j}].{name}: {v} outside 1-10"));
                }
            }
        }
    }

    errors
}

/* ----------------------------
Thread-safe handle + hot reload
---------------------------- */

/// Shared catalog. Readers take a snapshot; reloads swap the whole catalog.
#[derive(Clone, Default)]
pub struct CatalogHandle {
    inner: Arc<RwLock<Catalog>>,
}

impl CatalogHandle {
    pub fn new(catalog: Catalog) -> Self {
        gauge!("ads_catalog_size").set(catalog.len() as f64);
        Self {
            inner: Arc::new(RwLock::new(catalog)),
        }
    }

    /// Cloned list of all advertisements.
    pub fn snapshot(&self) -> Vec<Advertisement> {
        match self.inner.read() {
            Ok(c) => c.advertisements.clone(),
            Err(_) => Vec::new(),
        }
    }

    pub fn active(&self) -> Vec<Advertisement> {
        match self.inner.read() {
            Ok(c) => c.active(),
            Err(_) => Vec::new(),
        }
    }

    pub fn get(&self, id: AdId) -> Option<Advertisement> {
        self.inner.read().ok().and_then(|c| c.get(id).cloned())
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn replace(&self, catalog: Catalog) -> anyhow::Result<()> {
        let size = catalog.len();
        let mut guard = self
            .inner
            .write()
            .map_err(|_| anyhow!("catalog lock poisoned"))?;
        *guard = catalog;
        gauge!("ads_catalog_size").set(size as f64);
        Ok(())
    }

    /// Load `path` and swap it in; the old catalog stays on any error.
    pub fn reload(&self, path: &Path) -> anyhow::Result<usize> {
        let fresh = Catalog::load_from_file(path)?;
        let size = fresh.len();
        self.replace(fresh)?;
        Ok(size)
    }
}

/// ADS_HOT_RELOAD=1 in a dev environment.
fn hot_reload_enabled() -> bool {
    std::env::var(ENV_HOT_RELOAD).ok().as_deref() == Some("1") && is_dev_env()
}

/// Poll the catalog file's mtime and reload on change (dev only).
pub fn start_hot_reload_thread(handle: CatalogHandle, path: PathBuf, poll: Duration) {
    if !hot_reload_enabled() {
        return;
    }
    info!(target: "catalog", path = %path.display(), "catalog hot reload enabled");

    thread::spawn(move || {
        let mut last_mtime: Option<SystemTime> = None;

        loop {
            if let Ok(mtime) = fs::metadata(&path).and_then(|m| m.modified()) {
                let changed = match last_mtime {
                    None => {
                        last_mtime = Some(mtime);
                        false
                    }
                    Some(prev) => mtime > prev,
                };
                if changed {
                    match handle.reload(&path) {
                        Ok(n) => info!(target: "catalog", advertisements = n, "catalog hot-reloaded"),
                        Err(e) => warn!(target: "catalog", error = %e, "catalog reload failed, keeping previous"),
                    }
                    last_mtime = Some(mtime);
                }
            }
            thread::sleep(poll);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = r#"{
        "advertisements": [
            { "id": 1, "title": "Coffee", "content": "Fresh beans", "source": "STORAGE",
              "source_identifier": "ads/coffee.png", "active": true, "weight": 30 },
            { "id": 2, "title": "Trailer", "content": "Watch now", "source": "YOUTUBE",
              "source_identifier": "dQw4w9WgXcQ", "active": false, "weight": 70,
              "youtube_details": { "video_id": "dQw4w9WgXcQ" } }
        ]
    }"#;

    #[test]
    fn wrapped_and_bare_forms_load() {
        let c = Catalog::from_json_str(GOOD).unwrap();
        assert_eq!(c.len(), 2);
        assert_eq!(c.active().len(), 1);
        assert_eq!(c.get(2).map(|a| a.title.as_str()), Some("Trailer"));

        let bare = r#"[{ "id": 5, "title": "t", "content": "c", "source": "STORAGE",
                         "source_identifier": "x", "weight": 1 }]"#;
        assert_eq!(Catalog::from_json_str(bare).unwrap().len(), 1);
    }

    #[test]
    fn validation_collects_every_problem() {
        let bad = r#"[
            { "id": 1, "title": "", "content": "c", "source": "YOUTUBE",
              "source_identifier": "abc", "weight": 150,
              "youtube_details": { "video_id": "xyz" },
              "clickable": true,
              "geo_targets": [ { "include": { "country_code": "USA" } } ] },
            { "id": 1, "title": "dup", "content": "c", "source": "STORAGE",
              "source_identifier": "s", "weight": 1 }
        ]"#;
        let err = Catalog::from_json_str(bad).unwrap_err().to_string();
        assert!(err.contains("ads[0].title"), "{err}");
        assert!(err.contains("ads[0].weight"), "{err}");
        assert!(err.contains("ads[0].youtube_details.video_id"), "{err}");
        assert!(err.contains("ads[0].target_url"), "{err}");
        assert!(err.contains("geo_targets[0].country_code"), "{err}");
        assert!(err.contains("ads[1].id: duplicate"), "{err}");
    }

    #[test]
    fn handle_swaps_catalog() {
        let h = CatalogHandle::new(Catalog::default());
        assert!(h.is_empty());
        h.replace(Catalog::from_json_str(GOOD).unwrap()).unwrap();
        assert_eq!(h.len(), 2);
        assert_eq!(h.active().len(), 1);
        assert!(h.get(1).is_some());
        assert!(h.get(99).is_none());
    }
}
