// src/config/service.rs
//! Service settings from `config/ads.toml` (or `$ADS_CONFIG_PATH`), with env
//! overrides applied on top. A missing file is not an error: defaults apply.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path, path::PathBuf};
use tracing::{info, warn};

use crate::engine::SelectionMode;

pub const DEFAULT_CONFIG_PATH: &str = "config/ads.toml";
pub const DEFAULT_CATALOG_PATH: &str = "config/catalog.json";
pub const DEFAULT_HOT_RELOAD_SECS: u64 = 2;

pub const ENV_CONFIG_PATH: &str = "ADS_CONFIG_PATH";
pub const ENV_SELECTION_MODE: &str = "ADS_SELECTION_MODE";
pub const ENV_RNG_SEED: &str = "ADS_RNG_SEED";
pub const ENV_CATALOG_PATH: &str = "ADS_CATALOG_PATH";

fn default_catalog_path() -> PathBuf {
    PathBuf::from(DEFAULT_CATALOG_PATH)
}
fn default_hot_reload_secs() -> u64 {
    DEFAULT_HOT_RELOAD_SECS
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicySection {
    #[serde(default)]
    pub selection: SelectionMode,
    /// Fixed RNG seed; `None` seeds from the OS.
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSection {
    #[serde(default = "default_catalog_path")]
    pub path: PathBuf,
    /// Poll interval of the dev hot-reload watcher.
    #[serde(default = "default_hot_reload_secs")]
    pub hot_reload_secs: u64,
}

impl Default for CatalogSection {
    fn default() -> Self {
        Self {
            path: default_catalog_path(),
            hot_reload_secs: default_hot_reload_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub policy: PolicySection,
    #[serde(default)]
    pub catalog: CatalogSection,
}

impl ServiceConfig {
    /// Resolve the config path from `$ADS_CONFIG_PATH` or the default,
    /// load it (defaults when missing) and apply env overrides.
    pub fn load() -> anyhow::Result<Self> {
        let path = env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut cfg = if path.exists() {
            Self::load_from_file(&path)?
        } else {
            info!(target: "config", path = %path.display(), "no config file, using defaults");
            Self::default()
        };
        cfg.apply_env();
        cfg.sanitize();
        Ok(cfg)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading service config from {}", path.display()))?;
        let cfg = Self::from_toml_str(&data)
            .with_context(|| format!("parsing service config {}", path.display()))?;
        info!(
            target: "config",
            path = %path.display(),
            selection = cfg.policy.selection.as_str(),
            "service config loaded"
        );
        Ok(cfg)
    }

    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let mut cfg: ServiceConfig = toml::from_str(s)?;
        cfg.sanitize();
        Ok(cfg)
    }

    /// `ADS_SELECTION_MODE`, `ADS_RNG_SEED`, `ADS_CATALOG_PATH`.
    /// Unparseable values are ignored with a warning.
    pub fn apply_env(&mut self) {
        if let Ok(raw) = env::var(ENV_SELECTION_MODE) {
            match SelectionMode::parse(&raw) {
                Some(mode) => self.policy.selection = mode,
                None => warn!(target: "config", value = %raw, "ignoring unknown {ENV_SELECTION_MODE}"),
            }
        }
        if let Ok(raw) = env::var(ENV_RNG_SEED) {
            match raw.trim().parse::<u64>() {
                Ok(seed) => self.policy.seed = Some(seed),
                Err(_) => warn!(target: "config", value = %raw, "ignoring non-numeric {ENV_RNG_SEED}"),
            }
        }
        if let Ok(raw) = env::var(ENV_CATALOG_PATH) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                self.catalog.path = PathBuf::from(trimmed);
            }
        }
    }

    fn sanitize(&mut self) {
        if !(1..=300).contains(&self.catalog.hot_reload_secs) {
            self.catalog.hot_reload_secs = DEFAULT_HOT_RELOAD_SECS;
        }
        if self.catalog.path.as_os_str().is_empty() {
            self.catalog.path = default_catalog_path();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_toml_parses() {
        let cfg = ServiceConfig::from_toml_str(
            r#"
[policy]
selection = "rotation"
seed = 99

[catalog]
path = "data/ads.json"
hot_reload_secs = 10
"#,
        )
        .unwrap();
        assert_eq!(cfg.policy.selection, SelectionMode::Rotation);
        assert_eq!(cfg.policy.seed, Some(99));
        assert_eq!(cfg.catalog.path, PathBuf::from("data/ads.json"));
        assert_eq!(cfg.catalog.hot_reload_secs, 10);
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let cfg = ServiceConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, ServiceConfig::default());
        assert_eq!(cfg.policy.selection, SelectionMode::Weighted);
    }

    #[test]
    fn out_of_range_poll_is_reset() {
        let cfg = ServiceConfig::from_toml_str("[catalog]\nhot_reload_secs = 0\n").unwrap();
        assert_eq!(cfg.catalog.hot_reload_secs, DEFAULT_HOT_RELOAD_SECS);
    }

    #[test]
    fn unknown_selection_is_rejected_in_file() {
        assert!(ServiceConfig::from_toml_str("[policy]\nselection = \"lottery\"\n").is_err());
    }
}
