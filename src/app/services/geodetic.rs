//! Great-circle distance and radius filtering
//!
//! Distances are expressed as central angles in degrees, the unit used by
//! station metadata services for radius constraints.

use crate::app::models::AvailabilityRecord;
use crate::constants::MAX_DISTANCE_DEGREES;
use crate::{Error, Result};

/// Great-circle distance between two points, in degrees of arc
///
/// Haversine formula on a unit sphere; the result is in `[0, 180]`.
pub fn distance_degrees(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().min(1.0).asin();
    c.to_degrees()
}

/// A min/max radius constraint around a reference point
///
/// Either bound may be absent. Constructing a filter with a radius bound but
/// no reference point is a caller error and fails fast.
#[derive(Debug, Clone, PartialEq)]
pub struct RadiusFilter {
    pub latitude: f64,
    pub longitude: f64,
    pub min_radius: Option<f64>,
    pub max_radius: Option<f64>,
}

impl RadiusFilter {
    /// Build a filter from optional caller arguments
    ///
    /// Returns `Ok(None)` when no radius bound was supplied at all. Bounds
    /// outside `[0, 180]` degrees of arc cannot match any point and are
    /// rejected up front.
    pub fn from_args(
        latitude: Option<f64>,
        longitude: Option<f64>,
        min_radius: Option<f64>,
        max_radius: Option<f64>,
    ) -> Result<Option<Self>> {
        if min_radius.is_none() && max_radius.is_none() {
            return Ok(None);
        }
        for bound in [min_radius, max_radius].into_iter().flatten() {
            if !(0.0..=MAX_DISTANCE_DEGREES).contains(&bound) {
                return Err(Error::configuration(format!(
                    "radius bound {bound} is outside [0, {MAX_DISTANCE_DEGREES}] degrees"
                )));
            }
        }
        if let (Some(min), Some(max)) = (min_radius, max_radius) {
            if min > max {
                return Err(Error::configuration(format!(
                    "minradius {min} exceeds maxradius {max}"
                )));
            }
        }
        match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => Ok(Some(Self {
                latitude,
                longitude,
                min_radius,
                max_radius,
            })),
            _ => Err(Error::configuration(
                "minradius/maxradius require both latitude and longitude of the reference point",
            )),
        }
    }

    /// Whether a distance satisfies the configured bounds
    pub fn within(&self, distance: f64) -> bool {
        if let Some(min) = self.min_radius {
            if distance < min {
                return false;
            }
        }
        if let Some(max) = self.max_radius {
            if distance > max {
                return false;
            }
        }
        true
    }

    /// Whether a record passes the filter
    ///
    /// Records without coordinates cannot satisfy an active radius
    /// constraint and are excluded.
    pub fn admits(&self, record: &AvailabilityRecord) -> bool {
        match (record.latitude, record.longitude) {
            (Some(lat), Some(lon)) => {
                self.within(distance_degrees(self.latitude, self.longitude, lat, lon))
            }
            _ => false,
        }
    }
}
