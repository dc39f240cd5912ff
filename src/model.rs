//! # Advertisement model
//! Records the targeting engine reads: the advertisement itself, its three
//! rule sets and the small enums they use.
//!
//! Everything here is a plain value. The engine never mutates an
//! advertisement; replacing one happens wholesale at the catalog boundary.

use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};

/// Advertisement ids are BIGINT in the upstream store.
pub type AdId = i64;

/// Where the creative is served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AdvertisementSource {
    Storage,
    Youtube,
}

/// Gender options for bio targeting. `All` on a rule is a wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Male,
    Female,
    NonBinary,
    All,
}

impl Gender {
    /// Lenient parse (case-insensitive). Unknown values yield `None`,
    /// which the matcher treats as "not supplied".
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MALE" => Some(Self::Male),
            "FEMALE" => Some(Self::Female),
            "NON_BINARY" => Some(Self::NonBinary),
            "ALL" => Some(Self::All),
            _ => None,
        }
    }
}

/// Viewer mood for mood targeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mood {
    Happy,
    Sad,
    Excited,
    Relaxed,
    Angry,
    Neutral,
}

impl Mood {
    /// Lenient parse (case-insensitive), `None` for anything unknown.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HAPPY" => Some(Self::Happy),
            "SAD" => Some(Self::Sad),
            "EXCITED" => Some(Self::Excited),
            "RELAXED" => Some(Self::Relaxed),
            "ANGRY" => Some(Self::Angry),
            "NEUTRAL" => Some(Self::Neutral),
            _ => None,
        }
    }
}

/// Viewer-side gender: unknown strings become `None` instead of an error.
pub(crate) fn lenient_gender<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Gender>, D::Error> {
    let raw: Option<String> = Option::deserialize(d)?;
    Ok(raw.as_deref().and_then(Gender::parse))
}

pub(crate) fn lenient_mood<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Mood>, D::Error> {
    let raw: Option<String> = Option::deserialize(d)?;
    Ok(raw.as_deref().and_then(Mood::parse))
}

/// Viewer-side number: accepts a JSON number or a numeric string. Anything
/// unparseable or out of range for `T` becomes `None`.
pub(crate) fn lenient_number<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
{
    let raw: Option<serde_json::Value> = Option::deserialize(d)?;
    Ok(match raw {
        Some(serde_json::Value::Number(n)) => n.to_string().parse().ok(),
        Some(serde_json::Value::String(s)) => parse_lenient(Some(&s)),
        _ => None,
    })
}

/// Trimmed parse of an optional raw value; failures read as "not supplied".
pub fn parse_lenient<T: FromStr>(raw: Option<&str>) -> Option<T> {
    raw.and_then(|s| s.trim().parse().ok())
}

/// A targeting rule: the same criteria either opt a viewer in or rule them out.
///
/// Serialized externally tagged: `{"include": {...}}` / `{"exclude": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rule<T> {
    Include(T),
    Exclude(T),
}

impl<T> Rule<T> {
    pub fn criteria(&self) -> &T {
        match self {
            Rule::Include(c) | Rule::Exclude(c) => c,
        }
    }

    pub fn is_include(&self) -> bool {
        matches!(self, Rule::Include(_))
    }
}

/// Geographic criteria. All fields optional; unset fields are wildcards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoTarget {
    /// ISO country code, e.g. "US".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    /// State, province, etc.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    /// Proximity radius around (latitude, longitude).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius_km: Option<u32>,
}

/// Biographical criteria.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BioTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub education_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interest_category: Option<String>,
}

/// Mood / context criteria.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MoodTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<Mood>,
    /// 1-10 scale, inclusive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity_min: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity_max: Option<u8>,
    /// Morning, Afternoon, Evening, Night
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_of_day: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<String>,
    /// Spring, Summer, Fall, Winter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<String>,
}

pub type GeoRule = Rule<GeoTarget>;
pub type BioRule = Rule<BioTarget>;
pub type MoodRule = Rule<MoodTarget>;

/// Metadata for YouTube-sourced creatives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct YouTubeDetails {
    /// Should match `Advertisement::source_identifier` for YOUTUBE ads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// An advertisement together with the rules that decide who sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advertisement {
    pub id: AdId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub content: String,
    pub source: AdvertisementSource,
    /// File path or YouTube id.
    #[serde(default)]
    pub source_identifier: String,
    #[serde(default)]
    pub active: bool,

    /// Relative likelihood in weighted selection; also the primary sort key.
    #[serde(default)]
    pub weight: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<NaiveDateTime>,

    /// Scheduled window during which the ad is forced to the front.
    /// Both bounds or neither; a half-set window is never active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_start: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_end: Option<NaiveDateTime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
    #[serde(default)]
    pub clickable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub youtube_details: Option<YouTubeDetails>,

    #[serde(default)]
    pub geo_targets: Vec<GeoRule>,
    #[serde(default)]
    pub bio_targets: Vec<BioRule>,
    #[serde(default)]
    pub mood_targets: Vec<MoodRule>,
}

impl Advertisement {
    /// Minimal active advertisement with no rules; handy for tests and demos.
    pub fn new(id: AdId, title: impl Into<String>, weight: u32) -> Self {
        Self {
            id,
            title: title.into(),
            description: None,
            content: String::new(),
            source: AdvertisementSource::Storage,
            source_identifier: String::new(),
            active: true,
            weight,
            created_at: None,
            updated_at: None,
            override_start: None,
            override_end: None,
            target_url: None,
            clickable: false,
            youtube_details: None,
            geo_targets: Vec::new(),
            bio_targets: Vec::new(),
            mood_targets: Vec::new(),
        }
    }

    pub fn created(mut self, at: NaiveDateTime) -> Self {
        self.created_at = Some(at);
        self
    }

    pub fn with_override(mut self, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        self.override_start = Some(start);
        self.override_end = Some(end);
        self
    }

    pub fn with_geo(mut self, rule: GeoRule) -> Self {
        self.geo_targets.push(rule);
        self
    }

    pub fn with_bio(mut self, rule: BioRule) -> Self {
        self.bio_targets.push(rule);
        self
    }

    pub fn with_mood(mut self, rule: MoodRule) -> Self {
        self.mood_targets.push(rule);
        self
    }

    /// The override window, only when both bounds are present.
    pub fn override_window(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        match (self.override_start, self.override_end) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn enums_parse_leniently() {
        assert_eq!(Gender::parse("female"), Some(Gender::Female));
        assert_eq!(Gender::parse(" non_binary "), Some(Gender::NonBinary));
        assert_eq!(Gender::parse("robot"), None);
        assert_eq!(Mood::parse("Happy"), Some(Mood::Happy));
        assert_eq!(Mood::parse(""), None);
    }

    #[test]
    fn rules_deserialize_as_tagged_variants() {
        let v = json!({
            "id": 7,
            "title": "Spring sale",
            "content": "50% off",
            "source": "STORAGE",
            "source_identifier": "ads/spring.mp4",
            "active": true,
            "weight": 40,
            "geo_targets": [
                { "include": { "country_code": "US" } },
                { "exclude": { "region": "Alaska" } }
            ],
            "bio_targets": [ { "include": { "min_age": 18, "gender": "ALL" } } ]
        });
        let ad: Advertisement = serde_json::from_value(v).expect("parse ad");
        assert_eq!(ad.geo_targets.len(), 2);
        assert!(ad.geo_targets[0].is_include());
        assert!(!ad.geo_targets[1].is_include());
        assert_eq!(
            ad.geo_targets[1].criteria().region.as_deref(),
            Some("Alaska")
        );
        assert_eq!(ad.bio_targets[0].criteria().gender, Some(Gender::All));
        assert!(ad.mood_targets.is_empty());
    }

    #[test]
    fn half_set_override_window_is_absent() {
        let t = chrono::NaiveDate::from_ymd_opt(2025, 3, 1)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .unwrap();
        let mut ad = Advertisement::new(1, "a", 1);
        ad.override_start = Some(t);
        assert!(ad.override_window().is_none());
        ad.override_end = Some(t);
        assert_eq!(ad.override_window(), Some((t, t)));
    }
}
