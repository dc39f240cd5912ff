// src/logging.rs
//! Tracing setup and the dev-only diagnostics gate.

use sha2::{Digest, Sha256};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const DEFAULT_LOG_FILTER: &str = "ad_targeting_service=info,catalog=info,config=info,warn";

/// Dev environment: debug build OR SHUTTLE_ENV in {local, development, dev}.
pub(crate) fn is_dev_env() -> bool {
    if cfg!(debug_assertions) {
        return true;
    }
    matches!(
        std::env::var("SHUTTLE_ENV")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str(),
        "local" | "development" | "dev"
    )
}

// ADS_DEV_LOG=1 AND dev env
pub(crate) fn dev_logging_enabled() -> bool {
    std::env::var("ADS_DEV_LOG").ok().as_deref() == Some("1") && is_dev_env()
}

/// 12-hex-char SHA-256 fingerprint over the given key parts. Parts are
/// separated with a unit separator so `["ab", "c"]` and `["a", "bc"]` differ.
pub fn viewer_fingerprint<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_ref().as_bytes());
        hasher.update([0x1f]);
    }
    hasher
        .finalize()
        .iter()
        .take(6)
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Install the global subscriber. Filter comes from RUST_LOG, falling back to
/// [`DEFAULT_LOG_FILTER`]; `LOG_FORMAT=json` switches to JSON lines.
/// A subscriber installed earlier (e.g. by the runtime) wins silently.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let result = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };

    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_short_and_stable() {
        let a = viewer_fingerprint(["geo", "US", "Texas"]);
        assert_eq!(a.len(), 12);
        assert_eq!(a, viewer_fingerprint(["geo", "US", "Texas"]));
        assert_ne!(a, viewer_fingerprint(["geo", "US", "Ohio"]));
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn fingerprint_separates_parts() {
        assert_ne!(viewer_fingerprint(["ab", "c"]), viewer_fingerprint(["a", "bc"]));
    }
}
