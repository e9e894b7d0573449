//! Geographic primitives

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A point on the earth, in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude
    pub lat: f64,
    /// Longitude
    pub lng: f64,
}

impl Coordinates {
    /// Create checked coordinates.
    ///
    /// Latitude must lie in [-90, 90] and longitude in [-180, 180].
    pub fn new(lat: f64, lng: f64) -> Result<Self> {
        let coords = Self { lat, lng };
        coords.validate()?;
        Ok(coords)
    }

    /// Check the ranges; deserialized values skip [`Coordinates::new`]
    pub fn validate(&self) -> Result<()> {
        let lat_ok = (-90.0..=90.0).contains(&self.lat);
        let lng_ok = (-180.0..=180.0).contains(&self.lng);
        if lat_ok && lng_ok {
            Ok(())
        } else {
            Err(Error::InvalidCoordinates {
                lat: self.lat,
                lng: self.lng,
            })
        }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.lat, self.lng)
    }
}
