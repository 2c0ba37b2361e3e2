//! Great-circle and pixel-space distance utilities
//!
//! Two earth radii live here on purpose: the mean radius for general
//! great-circle distances and the Web Mercator (WGS84 semi-major) radius for
//! pixel-space math at a zoom level. The transform engine carries a third,
//! the Krasovsky radius, in [`crate::convert`]. Call sites keep their own
//! constants; unifying them changes numeric output.

use crate::coords::Coordinate;

use std::f64::consts::PI;

/// Mean earth radius in meters, used for general great-circle distances
pub const MEAN_EARTH_RADIUS_M: f64 = 6_371_000.0;

/// WGS84 semi-major axis in meters, the radius Web Mercator tiling assumes
pub const WEB_MERCATOR_RADIUS_M: f64 = 6_378_137.0;

/// Haversine distance in meters on a sphere of the given radius
#[inline]
pub(crate) fn haversine_with_radius(a: Coordinate, b: Coordinate, radius_m: f64) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lng = (b.longitude - a.longitude).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    radius_m * c
}

/// Great-circle distance between two coordinates in meters
#[inline]
pub fn great_circle_distance(a: Coordinate, b: Coordinate) -> f64 {
    haversine_with_radius(a, b, MEAN_EARTH_RADIUS_M)
}

/// Screen pixels per ground meter at a tile zoom level (256px tiles)
#[inline]
pub fn pixels_per_meter(zoom: f64) -> f64 {
    256.0 * 2f64.powf(zoom) / (2.0 * PI * WEB_MERCATOR_RADIUS_M)
}

/// Distance between two coordinates in screen pixels at a zoom level
///
/// The underlying ground distance is measured on the Web Mercator radius so
/// the pixel scaling and the distance agree on the sphere they describe.
#[inline]
pub fn pixel_distance(a: Coordinate, b: Coordinate, zoom: f64) -> f64 {
    haversine_with_radius(a, b, WEB_MERCATOR_RADIUS_M) * pixels_per_meter(zoom)
}
