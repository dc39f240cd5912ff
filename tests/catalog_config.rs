// tests/catalog_config.rs
//
// Loading the service config and the catalog from disk, env overrides included.
// Env-mutating tests run serially.

use ad_targeting_service::catalog::{Catalog, CatalogHandle};
use ad_targeting_service::config::service::{
    ENV_CATALOG_PATH, ENV_CONFIG_PATH, ENV_RNG_SEED, ENV_SELECTION_MODE,
};
use ad_targeting_service::{SelectionMode, ServiceConfig};
use serial_test::serial;
use std::{env, fs, path::PathBuf};

fn clear_env() {
    for k in [ENV_CONFIG_PATH, ENV_SELECTION_MODE, ENV_RNG_SEED, ENV_CATALOG_PATH] {
        env::remove_var(k);
    }
}

#[test]
#[serial]
fn missing_config_file_falls_back_to_defaults() {
    clear_env();
    let tmp = tempfile::tempdir().unwrap();
    env::set_var(ENV_CONFIG_PATH, tmp.path().join("nope.toml"));

    let cfg = ServiceConfig::load().unwrap();
    assert_eq!(cfg.policy.selection, SelectionMode::Weighted);
    assert_eq!(cfg.policy.seed, None);
    assert_eq!(cfg.catalog.path, PathBuf::from("config/catalog.json"));
    clear_env();
}

#[test]
#[serial]
fn env_overrides_file_values() {
    clear_env();
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("ads.toml");
    fs::write(
        &path,
        "[policy]\nselection = \"deterministic\"\nseed = 1\n\n[catalog]\npath = \"a.json\"\n",
    )
    .unwrap();
    env::set_var(ENV_CONFIG_PATH, &path);

    let cfg = ServiceConfig::load().unwrap();
    assert_eq!(cfg.policy.selection, SelectionMode::Deterministic);
    assert_eq!(cfg.policy.seed, Some(1));

    env::set_var(ENV_SELECTION_MODE, "ROTATION");
    env::set_var(ENV_RNG_SEED, "77");
    env::set_var(ENV_CATALOG_PATH, "/tmp/other.json");
    let cfg = ServiceConfig::load().unwrap();
    assert_eq!(cfg.policy.selection, SelectionMode::Rotation);
    assert_eq!(cfg.policy.seed, Some(77));
    assert_eq!(cfg.catalog.path, PathBuf::from("/tmp/other.json"));

    // junk env values are ignored
    env::set_var(ENV_SELECTION_MODE, "lottery");
    env::set_var(ENV_RNG_SEED, "seven");
    let cfg = ServiceConfig::load().unwrap();
    assert_eq!(cfg.policy.selection, SelectionMode::Deterministic);
    assert_eq!(cfg.policy.seed, Some(1));

    clear_env();
}

#[test]
#[serial]
fn broken_config_file_is_an_error() {
    clear_env();
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("ads.toml");
    fs::write(&path, "[policy\nselection = ").unwrap();
    env::set_var(ENV_CONFIG_PATH, &path);

    let err = ServiceConfig::load().unwrap_err();
    assert!(format!("{err:#}").contains("ads.toml"), "{err:#}");
    clear_env();
}

#[test]
fn shipped_files_load() {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let cfg = ServiceConfig::load_from_file(root.join("config/ads.toml")).unwrap();
    assert_eq!(cfg.policy.selection, SelectionMode::Weighted);

    let catalog = Catalog::load_from_file(root.join("config/catalog.json")).unwrap();
    assert_eq!(catalog.len(), 4);
    assert_eq!(catalog.active().len(), 3);
}

#[test]
fn catalog_missing_vs_broken() {
    let tmp = tempfile::tempdir().unwrap();
    let missing = tmp.path().join("none.json");
    assert!(Catalog::load_or_empty(&missing).unwrap().is_empty());
    assert!(Catalog::load_from_file(&missing).is_err());

    let broken = tmp.path().join("broken.json");
    fs::write(&broken, "{ not json").unwrap();
    assert!(Catalog::load_or_empty(&broken).is_err());
}

#[test]
fn failed_reload_keeps_previous_catalog() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("catalog.json");
    fs::write(
        &path,
        r#"[{ "id": 1, "title": "t", "content": "c", "source": "STORAGE",
              "source_identifier": "x", "active": true, "weight": 5 }]"#,
    )
    .unwrap();

    let handle = CatalogHandle::new(Catalog::default());
    assert_eq!(handle.reload(&path).unwrap(), 1);

    fs::write(
        &path,
        r#"[{ "id": 1, "title": "", "content": "c", "source": "STORAGE",
              "source_identifier": "x", "weight": 500 }]"#,
    )
    .unwrap();
    let err = handle.reload(&path).unwrap_err();
    assert!(format!("{err:#}").contains("weight"), "{err:#}");
    assert_eq!(handle.len(), 1);
    assert_eq!(handle.get(1).map(|a| a.title), Some("t".to_string()));
}
