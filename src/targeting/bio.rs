//! Bio targeting: age range, gender (with `ALL` wildcard) and a handful of
//! case-insensitive text attributes.

use serde::{Deserialize, Serialize};

use super::{in_range, same_text, Criteria};
use crate::model::{BioTarget, Gender};

/// Who the viewer is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BioContext {
    #[serde(default, deserialize_with = "crate::model::lenient_number")]
    pub age: Option<u32>,
    #[serde(default, deserialize_with = "crate::model::lenient_gender")]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub occupation: Option<String>,
    #[serde(default)]
    pub education_level: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
}

impl BioContext {
    pub fn aged(age: u32) -> Self {
        Self {
            age: Some(age),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.age.is_none()
            && self.gender.is_none()
            && self.occupation.is_none()
            && self.education_level.is_none()
            && self.language.is_none()
            && self.interests.is_empty()
    }
}

impl Criteria for BioTarget {
    type Context = BioContext;

    fn matches(&self, ctx: &BioContext) -> bool {
        if !in_range(ctx.age, self.min_age, self.max_age) {
            return false;
        }

        if let (Some(want), Some(have)) = (self.gender, ctx.gender) {
            if want != Gender::All && want != have {
                return false;
            }
        }

        if !same_text(self.occupation.as_deref(), ctx.occupation.as_deref())
            || !same_text(self.education_level.as_deref(), ctx.education_level.as_deref())
            || !same_text(self.language.as_deref(), ctx.language.as_deref())
        {
            return false;
        }

        // At least one supplied interest must hit the rule's category.
        if let Some(category) = self.interest_category.as_deref() {
            if !ctx.interests.is_empty()
                && !ctx
                    .interests
                    .iter()
                    .any(|i| same_text(Some(category), Some(i)))
            {
                return false;
            }
        }

        true
    }
}
