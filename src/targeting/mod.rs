//! # Targeting matcher
//! Decides, per advertisement and viewer context, whether the ad is eligible
//! along each targeting dimension (geo, bio, mood) and combines dimensions for
//! the mixed query.
//!
//! Every dimension runs the same evaluation:
//! 1. no rules of this kind → governed by [`EmptyRules`]
//! 2. `include_match` = any include rule matches the context
//! 3. `exclude_match` = any exclude rule matches the context
//! 4. eligible = `include_match && !exclude_match`
//!
//! Pure functions over borrowed inputs. Nothing here errors; missing or
//! unparseable context fields simply do not constrain.

pub mod bio;
pub mod geo;
pub mod mood;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::model::{AdId, Advertisement, Rule};

pub use bio::BioContext;
pub use geo::{haversine_km, GeoContext, EARTH_RADIUS_KM};
pub use mood::MoodContext;

/// The closed set of targeting dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Geo,
    Bio,
    Mood,
}

impl Dimension {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Geo => "geo",
            Dimension::Bio => "bio",
            Dimension::Mood => "mood",
        }
    }
}

/// What a dimension answers for an advertisement that has no rules of its kind.
///
/// Dimension-specific queries are opt-in (`Reject`): an ad must carry at least
/// one rule to show up in, say, a geo-targeted listing. The combined query and
/// the exclusion check use `Pass`: an untargeted dimension does not constrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyRules {
    Reject,
    Pass,
}

/// Field-by-field comparison of one rule's criteria against a viewer context.
pub trait Criteria {
    type Context;

    /// True when every field the rule sets agrees with the context.
    fn matches(&self, ctx: &Self::Context) -> bool;
}

/// Raw include/exclude hits of one dimension for one advertisement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RuleOutcome {
    pub has_rules: bool,
    pub include_match: bool,
    pub exclude_match: bool,
}

impl RuleOutcome {
    pub fn eligible(&self, empty: EmptyRules) -> bool {
        if !self.has_rules {
            return empty == EmptyRules::Pass;
        }
        self.include_match && !self.exclude_match
    }
}

/// Evaluate a rule set against a context.
pub fn evaluate_rules<T: Criteria>(rules: &[Rule<T>], ctx: &T::Context) -> RuleOutcome {
    let mut out = RuleOutcome {
        has_rules: !rules.is_empty(),
        ..RuleOutcome::default()
    };
    for rule in rules {
        match rule {
            Rule::Include(c) if !out.include_match => out.include_match = c.matches(ctx),
            Rule::Exclude(c) if !out.exclude_match => out.exclude_match = c.matches(ctx),
            _ => {}
        }
        if out.include_match && out.exclude_match {
            break;
        }
    }
    out
}

/* ----------------------------
Per-dimension matching
---------------------------- */

fn trace_outcome(ad_id: AdId, dim: Dimension, out: &RuleOutcome, matched: bool) {
    trace!(
        target: "targeting",
        ad_id,
        dimension = dim.as_str(),
        has_rules = out.has_rules,
        include_match = out.include_match,
        exclude_match = out.exclude_match,
        matched,
    );
}

pub fn geo_outcome(ad: &Advertisement, ctx: &GeoContext) -> RuleOutcome {
    evaluate_rules(&ad.geo_targets, ctx)
}

pub fn bio_outcome(ad: &Advertisement, ctx: &BioContext) -> RuleOutcome {
    evaluate_rules(&ad.bio_targets, ctx)
}

pub fn mood_outcome(ad: &Advertisement, ctx: &MoodContext) -> RuleOutcome {
    evaluate_rules(&ad.mood_targets, ctx)
}

/// Geo-targeted query; ads without geo rules never match.
pub fn matches_geo(ad: &Advertisement, ctx: &GeoContext) -> bool {
    let out = geo_outcome(ad, ctx);
    let matched = out.eligible(EmptyRules::Reject);
    trace_outcome(ad.id, Dimension::Geo, &out, matched);
    matched
}

/// Bio-targeted query; ads without bio rules never match.
pub fn matches_bio(ad: &Advertisement, ctx: &BioContext) -> bool {
    let out = bio_outcome(ad, ctx);
    let matched = out.eligible(EmptyRules::Reject);
    trace_outcome(ad.id, Dimension::Bio, &out, matched);
    matched
}

/// Mood-targeted query; ads without mood rules never match.
pub fn matches_mood(ad: &Advertisement, ctx: &MoodContext) -> bool {
    let out = mood_outcome(ad, ctx);
    let matched = out.eligible(EmptyRules::Reject);
    trace_outcome(ad.id, Dimension::Mood, &out, matched);
    matched
}

/// Combined query: AND over the dimensions the caller supplied a non-empty
/// context for. Within an applied dimension an ad without rules of that kind
/// is not constrained; an ad with rules must pass include/exclude.
pub fn matches_combined(
    ad: &Advertisement,
    geo: Option<&GeoContext>,
    bio: Option<&BioContext>,
    mood: Option<&MoodContext>,
) -> bool {
    if let Some(ctx) = geo.filter(|c| !c.is_empty()) {
        let out = geo_outcome(ad, ctx);
        let ok = out.eligible(EmptyRules::Pass);
        trace_outcome(ad.id, Dimension::Geo, &out, ok);
        if !ok {
            return false;
        }
    }
    if let Some(ctx) = bio.filter(|c| !c.is_empty()) {
        let out = bio_outcome(ad, ctx);
        let ok = out.eligible(EmptyRules::Pass);
        trace_outcome(ad.id, Dimension::Bio, &out, ok);
        if !ok {
            return false;
        }
    }
    if let Some(ctx) = mood.filter(|c| !c.is_empty()) {
        let out = mood_outcome(ad, ctx);
        let ok = out.eligible(EmptyRules::Pass);
        trace_outcome(ad.id, Dimension::Mood, &out, ok);
        if !ok {
            return false;
        }
    }
    true
}

/* ----------------------------
Query shapes
---------------------------- */

/// A single-dimension targeted query.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetingQuery {
    Geo(GeoContext),
    Bio(BioContext),
    Mood(MoodContext),
}

impl TargetingQuery {
    pub fn dimension(&self) -> Dimension {
        match self {
            TargetingQuery::Geo(_) => Dimension::Geo,
            TargetingQuery::Bio(_) => Dimension::Bio,
            TargetingQuery::Mood(_) => Dimension::Mood,
        }
    }

    pub fn outcome(&self, ad: &Advertisement) -> RuleOutcome {
        match self {
            TargetingQuery::Geo(ctx) => geo_outcome(ad, ctx),
            TargetingQuery::Bio(ctx) => bio_outcome(ad, ctx),
            TargetingQuery::Mood(ctx) => mood_outcome(ad, ctx),
        }
    }

    /// Stable text form of the viewer context, for fingerprinting.
    pub fn viewer_key(&self) -> String {
        let ctx = match self {
            TargetingQuery::Geo(ctx) => serde_json::to_string(ctx),
            TargetingQuery::Bio(ctx) => serde_json::to_string(ctx),
            TargetingQuery::Mood(ctx) => serde_json::to_string(ctx),
        };
        ctx.unwrap_or_default()
    }

    pub fn matches(&self, ad: &Advertisement) -> bool {
        match self {
            TargetingQuery::Geo(ctx) => matches_geo(ad, ctx),
            TargetingQuery::Bio(ctx) => matches_bio(ad, ctx),
            TargetingQuery::Mood(ctx) => matches_mood(ad, ctx),
        }
    }
}

/// Viewer context for the combined query. Absent parts are not applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetingRequest {
    #[serde(default)]
    pub geo: Option<GeoContext>,
    #[serde(default)]
    pub bio: Option<BioContext>,
    #[serde(default)]
    pub mood: Option<MoodContext>,
}

impl TargetingRequest {
    pub fn matches(&self, ad: &Advertisement) -> bool {
        matches_combined(ad, self.geo.as_ref(), self.bio.as_ref(), self.mood.as_ref())
    }

    /// Dimensions that will actually be applied.
    pub fn applied(&self) -> Vec<Dimension> {
        let mut dims = Vec::with_capacity(3);
        if self.geo.as_ref().is_some_and(|c| !c.is_empty()) {
            dims.push(Dimension::Geo);
        }
        if self.bio.as_ref().is_some_and(|c| !c.is_empty()) {
            dims.push(Dimension::Bio);
        }
        if self.mood.as_ref().is_some_and(|c| !c.is_empty()) {
            dims.push(Dimension::Mood);
        }
        dims
    }

    /// Outcome for `dim`, or `None` when that context is absent or empty.
    fn outcome(&self, ad: &Advertisement, dim: Dimension) -> Option<RuleOutcome> {
        match dim {
            Dimension::Geo => self
                .geo
                .as_ref()
                .filter(|c| !c.is_empty())
                .map(|c| geo_outcome(ad, c)),
            Dimension::Bio => self
                .bio
                .as_ref()
                .filter(|c| !c.is_empty())
                .map(|c| bio_outcome(ad, c)),
            Dimension::Mood => self
                .mood
                .as_ref()
                .filter(|c| !c.is_empty())
                .map(|c| mood_outcome(ad, c)),
        }
    }

    /// Stable text form of the supplied context, for fingerprinting.
    pub fn viewer_key(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/* ----------------------------
Filters over a candidate list
---------------------------- */

pub fn filter_by_query<'a>(ads: &'a [Advertisement], query: &TargetingQuery) -> Vec<&'a Advertisement> {
    let out: Vec<&Advertisement> = ads.iter().filter(|ad| query.matches(ad)).collect();
    debug!(
        target: "targeting",
        dimension = query.dimension().as_str(),
        "filtered {} out of {} advertisements",
        out.len(),
        ads.len()
    );
    out
}

pub fn filter_by_geo<'a>(ads: &'a [Advertisement], ctx: &GeoContext) -> Vec<&'a Advertisement> {
    filter_by_query(ads, &TargetingQuery::Geo(ctx.clone()))
}

pub fn filter_by_bio<'a>(ads: &'a [Advertisement], ctx: &BioContext) -> Vec<&'a Advertisement> {
    filter_by_query(ads, &TargetingQuery::Bio(ctx.clone()))
}

pub fn filter_by_mood<'a>(ads: &'a [Advertisement], ctx: &MoodContext) -> Vec<&'a Advertisement> {
    filter_by_query(ads, &TargetingQuery::Mood(ctx.clone()))
}

/// Combined filter.
pub fn filter_by_targeting<'a>(
    ads: &'a [Advertisement],
    request: &TargetingRequest,
) -> Vec<&'a Advertisement> {
    let out: Vec<&Advertisement> = ads.iter().filter(|ad| request.matches(ad)).collect();
    debug!(
        target: "targeting",
        applied = ?request.applied(),
        "combined filter kept {} out of {} advertisements",
        out.len(),
        ads.len()
    );
    out
}

/// Permissive check: does any supplied dimension hit an exclude rule?
/// Dimensions without rules never disqualify.
pub fn has_disqualifying_exclusion(ad: &Advertisement, request: &TargetingRequest) -> bool {
    request
        .applied()
        .into_iter()
        .filter_map(|d| request.outcome(ad, d))
        .any(|o| o.exclude_match)
}

/// Per-dimension explanation of a combined decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchTrace {
    pub ad_id: AdId,
    pub matched: bool,
    pub dimensions: Vec<DimensionTrace>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DimensionTrace {
    pub dimension: Dimension,
    #[serde(flatten)]
    pub outcome: RuleOutcome,
}

pub fn explain(ad: &Advertisement, request: &TargetingRequest) -> MatchTrace {
    let dimensions = request
        .applied()
        .into_iter()
        .filter_map(|d| {
            request.outcome(ad, d).map(|outcome| DimensionTrace {
                dimension: d,
                outcome,
            })
        })
        .collect();
    MatchTrace {
        ad_id: ad.id,
        matched: request.matches(ad),
        dimensions,
    }
}

/* ----------------------------
Shared field comparators
---------------------------- */

/// Case-insensitive equality where an unset side is a wildcard.
pub(crate) fn same_text(rule: Option<&str>, ctx: Option<&str>) -> bool {
    match (rule, ctx) {
        (Some(r), Some(c)) => r == c || r.to_lowercase() == c.to_lowercase(),
        _ => true,
    }
}

/// Inclusive range check; skipped when the value or both bounds are unset.
pub(crate) fn in_range<T: PartialOrd + Copy>(value: Option<T>, min: Option<T>, max: Option<T>) -> bool {
    let Some(v) = value else {
        return true;
    };
    min.map_or(true, |lo| v >= lo) && max.map_or(true, |hi| v <= hi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BioTarget, GeoTarget, Mood, MoodTarget};

    fn us() -> GeoTarget {
        GeoTarget {
            country_code: Some("US".into()),
            ..GeoTarget::default()
        }
    }

    fn texas() -> GeoTarget {
        GeoTarget {
            region: Some("Texas".into()),
            ..GeoTarget::default()
        }
    }

    #[test]
    fn no_rules_rejects_dimension_query() {
        let ad = Advertisement::new(1, "plain", 10);
        assert!(!matches_geo(&ad, &GeoContext::country("US")));
        assert!(!matches_bio(&ad, &BioContext::aged(30)));
        assert!(!matches_mood(&ad, &MoodContext::feeling(Mood::Happy)));
    }

    #[test]
    fn exclude_beats_include() {
        let ad = Advertisement::new(1, "us-not-texas", 10)
            .with_geo(Rule::Include(us()))
            .with_geo(Rule::Exclude(texas()));
        let mut ctx = GeoContext::country("US");
        ctx.region = Some("Ohio".into());
        assert!(matches_geo(&ad, &ctx));
        ctx.region = Some("texas".into());
        assert!(!matches_geo(&ad, &ctx));
        // an unsupplied region does not constrain, so the exclude rule hits
        ctx.region = None;
        assert!(!matches_geo(&ad, &ctx));
    }

    #[test]
    fn exclude_only_rules_never_match() {
        let ad = Advertisement::new(1, "nowhere", 10).with_geo(Rule::Exclude(texas()));
        assert!(!matches_geo(&ad, &GeoContext::country("US")));
    }

    #[test]
    fn vacuous_rule_matches_everything() {
        let ad = Advertisement::new(1, "all", 10).with_geo(Rule::Include(GeoTarget::default()));
        assert!(matches_geo(&ad, &GeoContext::country("FR")));
        assert!(matches_geo(&ad, &GeoContext::default()));
    }

    #[test]
    fn combined_applies_only_supplied_dimensions() {
        let ad = Advertisement::new(1, "young-us", 10)
            .with_geo(Rule::Include(us()))
            .with_bio(Rule::Include(BioTarget {
                min_age: Some(18),
                max_age: Some(30),
                ..BioTarget::default()
            }));

        // nothing supplied -> no constraint
        assert!(matches_combined(&ad, None, None, None));
        // geo only
        assert!(matches_combined(&ad, Some(&GeoContext::country("US")), None, None));
        assert!(!matches_combined(&ad, Some(&GeoContext::country("CA")), None, None));
        // bio mismatch
        assert!(!matches_combined(
            &ad,
            Some(&GeoContext::country("US")),
            Some(&BioContext::aged(40)),
            None
        ));
        // mood supplied but ad carries no mood rules -> not constrained
        assert!(matches_combined(
            &ad,
            None,
            Some(&BioContext::aged(22)),
            Some(&MoodContext::feeling(Mood::Sad))
        ));
        // empty context counts as not supplied
        assert!(matches_combined(&ad, Some(&GeoContext::default()), None, None));
    }

    #[test]
    fn query_variant_dispatches_to_dimension() {
        let ad = Advertisement::new(1, "happy", 10).with_mood(Rule::Include(MoodTarget {
            mood: Some(Mood::Happy),
            ..MoodTarget::default()
        }));
        let q = TargetingQuery::Mood(MoodContext::feeling(Mood::Happy));
        assert_eq!(q.dimension(), Dimension::Mood);
        assert!(q.matches(&ad));
        assert!(!TargetingQuery::Geo(GeoContext::country("US")).matches(&ad));
    }

    #[test]
    fn exclusion_check_is_permissive() {
        let ad = Advertisement::new(1, "no-texas", 10).with_geo(Rule::Exclude(texas()));
        let mut req = TargetingRequest::default();
        assert!(!has_disqualifying_exclusion(&ad, &req));
        req.geo = Some(GeoContext {
            region: Some("Texas".into()),
            ..GeoContext::default()
        });
        assert!(has_disqualifying_exclusion(&ad, &req));
        let plain = Advertisement::new(2, "plain", 1);
        assert!(!has_disqualifying_exclusion(&plain, &req));
    }

    #[test]
    fn empty_context_never_disqualifies() {
        let ad = Advertisement::new(1, "no-texas", 10).with_geo(Rule::Exclude(texas()));
        let req = TargetingRequest {
            geo: Some(GeoContext::default()),
            bio: Some(BioContext::default()),
            mood: None,
        };
        assert!(req.matches(&ad));
        assert!(!has_disqualifying_exclusion(&ad, &req));
        assert!(explain(&ad, &req).dimensions.is_empty());
    }

    #[test]
    fn explain_lists_applied_dimensions() {
        let ad = Advertisement::new(9, "us", 10).with_geo(Rule::Include(us()));
        let req = TargetingRequest {
            geo: Some(GeoContext::country("US")),
            bio: Some(BioContext::default()),
            mood: None,
        };
        let t = explain(&ad, &req);
        assert!(t.matched);
        assert_eq!(t.dimensions.len(), 1);
        assert_eq!(t.dimensions[0].dimension, Dimension::Geo);
        assert!(t.dimensions[0].outcome.include_match);
    }

    #[test]
    fn range_helper() {
        assert!(in_range(Some(5), Some(5), None));
        assert!(!in_range(Some(4), Some(5), None));
        assert!(in_range::<u32>(None, Some(5), Some(6)));
        assert!(in_range(Some(100), None, None));
    }
}
