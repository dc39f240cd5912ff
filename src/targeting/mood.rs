//! Mood targeting: mood enum, intensity range and calendar-ish context strings.

use serde::{Deserialize, Serialize};

use super::{in_range, same_text, Criteria};
use crate::model::{Mood, MoodTarget};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MoodContext {
    #[serde(default, deserialize_with = "crate::model::lenient_mood")]
    pub mood: Option<Mood>,
    /// 1-10
    #[serde(default, deserialize_with = "crate::model::lenient_number")]
    pub intensity: Option<u8>,
    #[serde(default)]
    pub time_of_day: Option<String>,
    #[serde(default)]
    pub day_of_week: Option<String>,
    #[serde(default)]
    pub season: Option<String>,
}

impl MoodContext {
    pub fn feeling(mood: Mood) -> Self {
        Self {
            mood: Some(mood),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.mood.is_none()
            && self.intensity.is_none()
            && self.time_of_day.is_none()
            && self.day_of_week.is_none()
            && self.season.is_none()
    }
}

impl Criteria for MoodTarget {
    type Context = MoodContext;

    fn matches(&self, ctx: &MoodContext) -> bool {
        if let (Some(want), Some(have)) = (self.mood, ctx.mood) {
            if want != have {
                return false;
            }
        }

        in_range(ctx.intensity, self.intensity_min, self.intensity_max)
            && same_text(self.time_of_day.as_deref(), ctx.time_of_day.as_deref())
            && same_text(self.day_of_week.as_deref(), ctx.day_of_week.as_deref())
            && same_text(self.season.as_deref(), ctx.season.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intensity_band_and_mood() {
        let r = MoodTarget {
            mood: Some(Mood::Happy),
            intensity_min: Some(5),
            intensity_max: Some(8),
            ..MoodTarget::default()
        };
        let mut ctx = MoodContext::feeling(Mood::Happy);
        ctx.intensity = Some(5);
        assert!(r.matches(&ctx));
        ctx.intensity = Some(9);
        assert!(!r.matches(&ctx));
        ctx.intensity = Some(7);
        ctx.mood = Some(Mood::Sad);
        assert!(!r.matches(&ctx));
    }

    #[test]
    fn context_mood_parses_leniently() {
        let ctx: MoodContext = serde_json::from_str(r#"{"mood": "happy"}"#).unwrap();
        assert_eq!(ctx.mood, Some(Mood::Happy));
        let ctx: MoodContext = serde_json::from_str(r#"{"mood": "grumpy"}"#).unwrap();
        assert!(ctx.is_empty());
    }

    #[test]
    fn out_of_range_intensity_reads_as_unset() {
        let ctx: MoodContext =
            serde_json::from_str(r#"{"mood": "HAPPY", "intensity": 300}"#).unwrap();
        assert_eq!(ctx.intensity, None);
        let ctx: MoodContext = serde_json::from_str(r#"{"intensity": "7"}"#).unwrap();
        assert_eq!(ctx.intensity, Some(7));
    }

    #[test]
    fn calendar_fields() {
        let r = MoodTarget {
            season: Some("Winter".into()),
            day_of_week: Some("friday".into()),
            ..MoodTarget::default()
        };
        let ctx = MoodContext {
            season: Some("WINTER".into()),
            day_of_week: Some("Friday".into()),
            ..MoodContext::default()
        };
        assert!(r.matches(&ctx));
        let summer = MoodContext {
            season: Some("summer".into()),
            ..MoodContext::default()
        };
        assert!(!r.matches(&summer));
    }
}
