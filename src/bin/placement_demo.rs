//! Loads the catalog and prints how it would be shown to a sample viewer.
//!
//! Usage: `cargo run --bin placement_demo -- [catalog.json] [COUNTRY] [AGE] [MOOD]`

use anyhow::Context;
use rand::rngs::StdRng;
use rand::SeedableRng;

use ad_targeting_service::catalog::Catalog;
use ad_targeting_service::config::ServiceConfig;
use ad_targeting_service::engine;
use ad_targeting_service::logging::init_tracing;
use ad_targeting_service::model::Mood;
use ad_targeting_service::rotation::FairRotation;
use ad_targeting_service::targeting::{explain, BioContext, GeoContext, MoodContext, TargetingRequest};

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = ServiceConfig::load()?;
    let mut args = std::env::args().skip(1);
    let path = args
        .next()
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| cfg.catalog.path.clone());
    let country = args.next().unwrap_or_else(|| "US".to_string());
    let age = match args.next() {
        Some(a) => Some(a.parse::<u32>().context("AGE must be a number")?),
        None => Some(28),
    };
    let mood = args.next().as_deref().and_then(Mood::parse).or(Some(Mood::Happy));

    let catalog = Catalog::load_from_file(&path)?;
    let request = TargetingRequest {
        geo: Some(GeoContext::country(country)),
        bio: Some(BioContext {
            age,
            ..BioContext::default()
        }),
        mood: Some(MoodContext {
            mood,
            ..MoodContext::default()
        }),
    };

    let matched = engine::targeted_combined(&catalog.advertisements, &request);
    let mut rng = match cfg.policy.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let now = chrono::Local::now().naive_local();
    let placement = engine::place(
        &matched,
        now,
        cfg.policy.selection,
        &mut rng,
        &FairRotation::new(),
    );

    println!(
        "mode={} matched={} of {} override_active={}",
        placement.mode.as_str(),
        matched.len(),
        catalog.len(),
        placement.override_active
    );
    for (pos, ad) in placement.advertisements.iter().enumerate() {
        let star = if Some(ad.id) == placement.featured_id { "*" } else { " " };
        println!("{star}{pos:>2}. [{}] {} (weight {})", ad.id, ad.title, ad.weight);
    }

    for ad in catalog.advertisements.iter().filter(|a| a.active) {
        let trace = explain(ad, &request);
        if !trace.matched {
            println!("   skipped [{}] {}: {}", ad.id, ad.title, serde_json::to_string(&trace)?);
        }
    }

    Ok(())
}
