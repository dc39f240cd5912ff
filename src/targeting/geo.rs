//! Geo targeting: country / region / city equality plus a proximity clause.

use serde::{Deserialize, Serialize};

use super::{same_text, Criteria};
use crate::model::GeoTarget;

/// Mean Earth radius used by the proximity clause.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Where the viewer is. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoContext {
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "crate::model::lenient_number")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "crate::model::lenient_number")]
    pub longitude: Option<f64>,
}

impl GeoContext {
    pub fn country(code: impl Into<String>) -> Self {
        Self {
            country_code: Some(code.into()),
            ..Self::default()
        }
    }

    pub fn at(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
            ..Self::default()
        }
    }

    /// True when nothing was supplied.
    pub fn is_empty(&self) -> bool {
        self.country_code.is_none()
            && self.region.is_none()
            && self.city.is_none()
            && self.latitude.is_none()
            && self.longitude.is_none()
    }

    fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Some((lat, lon)),
            _ => None,
        }
    }
}

impl Criteria for GeoTarget {
    type Context = GeoContext;

    fn matches(&self, ctx: &GeoContext) -> bool {
        if !same_text(self.country_code.as_deref(), ctx.country_code.as_deref()) {
            return false;
        }
        if !same_text(self.region.as_deref(), ctx.region.as_deref()) {
            return false;
        }
        if !same_text(self.city.as_deref(), ctx.city.as_deref()) {
            return false;
        }

        // Proximity: needs coordinates on both sides plus a radius on the rule.
        if let (Some((lat, lon)), Some(rlat), Some(rlon), Some(radius)) =
            (ctx.coordinates(), self.latitude, self.longitude, self.radius_km)
        {
            let distance = haversine_km(lat, lon, rlat, rlon);
            if !distance.is_finite() || distance > f64::from(radius) {
                return false;
            }
        }

        true
    }
}

/// Great-circle distance in kilometres; inputs in degrees.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    // rounding can push `a` past 1 near the antipode
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}
