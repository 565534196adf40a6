// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Geographic primitives for proximity ranking.

use crate::error::DomainError;
use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometers, per the IUGG.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// A point on the Earth's surface in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Latitude in degrees, -90 to 90 inclusive.
    latitude: f64,
    /// Longitude in degrees, -180 to 180 inclusive.
    longitude: f64,
}

impl Location {
    /// Creates a new `Location`.
    ///
    /// # Arguments
    ///
    /// * `latitude` - Latitude in decimal degrees
    /// * `longitude` - Longitude in decimal degrees
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidCoordinates` if either coordinate is
    /// outside its valid range or is not finite.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, DomainError> {
        if !latitude.is_finite()
            || !longitude.is_finite()
            || !(-90.0..=90.0).contains(&latitude)
            || !(-180.0..=180.0).contains(&longitude)
        {
            return Err(DomainError::InvalidCoordinates {
                latitude,
                longitude,
            });
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Returns the latitude in degrees.
    #[must_use]
    pub const fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Returns the longitude in degrees.
    #[must_use]
    pub const fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Returns the great-circle distance to `other` in kilometers, using
    /// the haversine formula.
    #[must_use]
    pub fn distance_km(&self, other: &Self) -> f64 {
        let lat1: f64 = self.latitude.to_radians();
        let lat2: f64 = other.latitude.to_radians();
        let d_lat: f64 = (other.latitude - self.latitude).to_radians();
        let d_lng: f64 = (other.longitude - self.longitude).to_radians();

        let a: f64 = (d_lat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
        let c: f64 = 2.0 * a.sqrt().asin();

        EARTH_RADIUS_KM * c
    }
}
