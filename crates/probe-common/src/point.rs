//! Geographic point attached to a dive.

use serde::{Deserialize, Serialize};

use crate::error::ProbeError;

/// SRID of the `session_data.location` column (WGS 84).
pub const WGS84_SRID: i32 = 4326;

/// A WGS 84 position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

impl GeoPoint {
    /// Create a point, rejecting coordinates outside the valid ranges.
    pub fn new(longitude: f64, latitude: f64) -> Result<Self, ProbeError> {
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(ProbeError::InvalidLocation(format!(
                "longitude {} out of range",
                longitude
            )));
        }
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(ProbeError::InvalidLocation(format!(
                "latitude {} out of range",
                latitude
            )));
        }
        Ok(Self {
            longitude,
            latitude,
        })
    }

    /// Well-known text, x (longitude) first: `POINT(5.32 60.39)`.
    pub fn to_wkt(&self) -> String {
        format!("POINT({} {})", self.longitude, self.latitude)
    }

    /// Parse `POINT(x y)` as produced by [`GeoPoint::to_wkt`].
    pub fn from_wkt(s: &str) -> Result<Self, ProbeError> {
        let trimmed = s.trim();
        let inner = trimmed
            .strip_prefix("POINT(")
            .or_else(|| trimmed.strip_prefix("POINT ("))
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(|| ProbeError::InvalidLocation(format!("not a WKT point: {}", s)))?;

        let mut parts = inner.split_whitespace();
        let (Some(x), Some(y), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(ProbeError::InvalidLocation(format!(
                "expected two coordinates: {}",
                s
            )));
        };

        let parse = |v: &str| {
            v.parse::<f64>()
                .map_err(|_| ProbeError::InvalidLocation(format!("invalid number: {}", v)))
        };
        Self::new(parse(x)?, parse(y)?)
    }
}
