//! Geodetic value types shared across the engine

use crate::EngineError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A geographic coordinate in degrees
///
/// Plain value type; validation happens at the engine's API boundaries via
/// [`Coordinate::new`] or [`Coordinate::is_valid`]. Invalid values are
/// rejected there, never silently clamped.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Coordinate {
    /// Latitude in degrees, valid range [-90, 90]
    pub latitude: f64,
    /// Longitude in degrees, valid range [-180, 180]
    pub longitude: f64,
}

impl Coordinate {
    /// Create a validated coordinate
    ///
    /// Returns [`EngineError::InvalidParameter`] for non-finite components and
    /// [`EngineError::OutOfRange`] for values outside the geodetic domain.
    pub fn new(latitude: f64, longitude: f64) -> crate::Result<Self> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(EngineError::InvalidParameter(format!(
                "non-finite coordinate components: ({latitude}, {longitude})"
            )));
        }
        let coordinate = Self {
            latitude,
            longitude,
        };
        if !coordinate.in_range() {
            return Err(EngineError::OutOfRange {
                latitude,
                longitude,
            });
        }
        Ok(coordinate)
    }

    /// Construct without validation, for values already known to be in range
    #[inline]
    pub const fn new_unchecked(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    #[inline]
    fn in_range(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Whether both components are finite and inside the geodetic domain
    ///
    /// Batch operations use this to skip malformed items without failing the
    /// whole call.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite() && self.in_range()
    }

    /// Validate for use as a conversion input
    pub(crate) fn validate(&self) -> crate::Result<()> {
        if !self.latitude.is_finite() || !self.longitude.is_finite() {
            return Err(EngineError::InvalidParameter(format!(
                "non-finite coordinate components: ({}, {})",
                self.latitude, self.longitude
            )));
        }
        if !self.in_range() {
            return Err(EngineError::OutOfRange {
                latitude: self.latitude,
                longitude: self.longitude,
            });
        }
        Ok(())
    }
}

impl From<geo::Point<f64>> for Coordinate {
    /// Interpret a `geo` point as (x = longitude, y = latitude)
    fn from(point: geo::Point<f64>) -> Self {
        Self {
            latitude: point.y(),
            longitude: point.x(),
        }
    }
}

impl From<Coordinate> for geo::Point<f64> {
    fn from(coordinate: Coordinate) -> Self {
        geo::Point::new(coordinate.longitude, coordinate.latitude)
    }
}

impl From<geo::Coord<f64>> for Coordinate {
    fn from(coord: geo::Coord<f64>) -> Self {
        Self {
            latitude: coord.y,
            longitude: coord.x,
        }
    }
}

/// The closed set of coordinate reference systems the engine knows about
///
/// Conversions are defined only for specific ordered pairs; see
/// [`crate::convert`]. BD09MC (the projected meter-space variant) is part of
/// the closed set but has no pure client-side conversion; a native delegate
/// may still serve it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CoordinateSystem {
    /// Global geodetic reference system
    Wgs84,
    /// Chinese obfuscated system ("Mars coordinates")
    Gcj02,
    /// Baidu lat/lon system layered atop GCJ02
    Bd09Ll,
    /// Baidu projected (meter-space) variant
    Bd09Mc,
}

impl std::fmt::Display for CoordinateSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CoordinateSystem::Wgs84 => "WGS84",
            CoordinateSystem::Gcj02 => "GCJ02",
            CoordinateSystem::Bd09Ll => "BD09LL",
            CoordinateSystem::Bd09Mc => "BD09MC",
        };
        f.write_str(name)
    }
}

/// Outcome of a single coordinate conversion
///
/// Always returned as a value, never as `Err`, so batch callers can continue
/// past individual failures. On failure the input coordinate is echoed back
/// unchanged.
#[derive(Clone, Debug, PartialEq)]
pub struct ConversionResult {
    pub coordinate: Coordinate,
    pub success: bool,
    pub error: Option<EngineError>,
}

impl ConversionResult {
    /// Successful conversion carrying the output coordinate
    #[inline]
    pub fn ok(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            success: true,
            error: None,
        }
    }

    /// Failed conversion echoing the input coordinate unchanged
    #[inline]
    pub fn failed(coordinate: Coordinate, error: EngineError) -> Self {
        Self {
            coordinate,
            success: false,
            error: Some(error),
        }
    }

    /// The converted coordinate, if the conversion succeeded
    #[inline]
    pub fn coordinate_ok(&self) -> Option<Coordinate> {
        self.success.then_some(self.coordinate)
    }
}
