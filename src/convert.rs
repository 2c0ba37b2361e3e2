//! Coordinate conversion between WGS84, GCJ02 and BD09LL
//!
//! The GCJ02 and BD09 transforms are the fixed obfuscation algorithms used by
//! China-region map providers. They are one-directional approximations, not
//! exact mathematical inverses; round trips agree only to within a loose
//! tolerance (roughly meter scale).

use crate::coords::{ConversionResult, Coordinate, CoordinateSystem};
use crate::distance::haversine_with_radius;
use crate::EngineError;

use std::f64::consts::PI;

/// Semi-major axis of the Krasovsky 1940 ellipsoid, used by the GCJ02 offset
/// formula and by [`calculate_distance`]. Deliberately distinct from the
/// radii in [`crate::distance`]; unifying them changes numeric output.
pub const KRASOVSKY_RADIUS_M: f64 = 6_378_245.0;

/// First eccentricity squared of the Krasovsky 1940 ellipsoid
pub const KRASOVSKY_EE: f64 = 0.006_693_421_622_965_943_23;

/// The scaled pi used by the BD09 polar transform
const X_PI: f64 = PI * 3000.0 / 180.0;

/// China bounding box outside of which WGS84<->GCJ02 is a no-op
///
/// The obfuscation algorithm is defined only inside this box.
const CHINA_LON_RANGE: (f64, f64) = (72.004, 137.8347);
const CHINA_LAT_RANGE: (f64, f64) = (0.8293, 55.8271);

#[inline]
fn out_of_china(lat: f64, lng: f64) -> bool {
    lng < CHINA_LON_RANGE.0 || lng > CHINA_LON_RANGE.1 || lat < CHINA_LAT_RANGE.0 || lat > CHINA_LAT_RANGE.1
}

/// Latitude correction series of the GCJ02 offset formula
fn transform_lat(x: f64, y: f64) -> f64 {
    let mut ret =
        -100.0 + 2.0 * x + 3.0 * y + 0.2 * y * y + 0.1 * x * y + 0.2 * x.abs().sqrt();
    ret += (20.0 * (6.0 * x * PI).sin() + 20.0 * (2.0 * x * PI).sin()) * 2.0 / 3.0;
    ret += (20.0 * (y * PI).sin() + 40.0 * (y / 3.0 * PI).sin()) * 2.0 / 3.0;
    ret += (160.0 * (y / 12.0 * PI).sin() + 320.0 * (y * PI / 30.0).sin()) * 2.0 / 3.0;
    ret
}

/// Longitude correction series of the GCJ02 offset formula
fn transform_lng(x: f64, y: f64) -> f64 {
    let mut ret = 300.0 + x + 2.0 * y + 0.1 * x * x + 0.1 * x * y + 0.1 * x.abs().sqrt();
    ret += (20.0 * (6.0 * x * PI).sin() + 20.0 * (2.0 * x * PI).sin()) * 2.0 / 3.0;
    ret += (20.0 * (x * PI).sin() + 40.0 * (x / 3.0 * PI).sin()) * 2.0 / 3.0;
    ret += (150.0 * (x / 12.0 * PI).sin() + 300.0 * (x / 30.0 * PI).sin()) * 2.0 / 3.0;
    ret
}

/// The (dLat, dLng) offset at a point, in degrees
///
/// Shared by both directions of the WGS84<->GCJ02 conversion; the inverse
/// subtracts the offset computed at the input point, which is where the
/// approximation error comes from.
fn gcj02_offset(lat: f64, lng: f64) -> (f64, f64) {
    let d_lat = transform_lat(lng - 105.0, lat - 35.0);
    let d_lng = transform_lng(lng - 105.0, lat - 35.0);

    let rad_lat = lat / 180.0 * PI;
    let mut magic = rad_lat.sin();
    magic = 1.0 - KRASOVSKY_EE * magic * magic;
    let sqrt_magic = magic.sqrt();

    let d_lat =
        (d_lat * 180.0) / ((KRASOVSKY_RADIUS_M * (1.0 - KRASOVSKY_EE)) / (magic * sqrt_magic) * PI);
    let d_lng = (d_lng * 180.0) / (KRASOVSKY_RADIUS_M / sqrt_magic * rad_lat.cos() * PI);
    (d_lat, d_lng)
}

/// WGS84 -> GCJ02; no-op outside the China bounding box
pub fn wgs84_to_gcj02(coordinate: Coordinate) -> Coordinate {
    let Coordinate {
        latitude: lat,
        longitude: lng,
    } = coordinate;
    if out_of_china(lat, lng) {
        return coordinate;
    }
    let (d_lat, d_lng) = gcj02_offset(lat, lng);
    Coordinate {
        latitude: lat + d_lat,
        longitude: lng + d_lng,
    }
}

/// GCJ02 -> WGS84 (approximate inverse); no-op outside the China bounding box
pub fn gcj02_to_wgs84(coordinate: Coordinate) -> Coordinate {
    let Coordinate {
        latitude: lat,
        longitude: lng,
    } = coordinate;
    if out_of_china(lat, lng) {
        return coordinate;
    }
    let (d_lat, d_lng) = gcj02_offset(lat, lng);
    Coordinate {
        latitude: lat - d_lat,
        longitude: lng - d_lng,
    }
}

/// GCJ02 -> BD09LL polar transform
pub fn gcj02_to_bd09(coordinate: Coordinate) -> Coordinate {
    let Coordinate {
        latitude: lat,
        longitude: lng,
    } = coordinate;
    let z = (lng * lng + lat * lat).sqrt() + 0.00002 * (lat * X_PI).sin();
    let theta = lat.atan2(lng) + 0.000003 * (lng * X_PI).cos();
    Coordinate {
        latitude: z * theta.sin() + 0.006,
        longitude: z * theta.cos() + 0.0065,
    }
}

/// BD09LL -> GCJ02 polar transform
pub fn bd09_to_gcj02(coordinate: Coordinate) -> Coordinate {
    let x = coordinate.longitude - 0.0065;
    let y = coordinate.latitude - 0.006;
    let z = (x * x + y * y).sqrt() - 0.00002 * (y * X_PI).sin();
    let theta = y.atan2(x) - 0.000003 * (x * X_PI).cos();
    Coordinate {
        latitude: z * theta.sin(),
        longitude: z * theta.cos(),
    }
}

/// Dispatch a validated, non-identity conversion through the supported pairs
///
/// WGS84<->BD09LL is composed by chaining through GCJ02. Pairs involving
/// BD09MC have no pure client-side algorithm.
fn convert_pure(
    coordinate: Coordinate,
    from: CoordinateSystem,
    to: CoordinateSystem,
) -> crate::Result<Coordinate> {
    use CoordinateSystem::*;
    match (from, to) {
        (Wgs84, Gcj02) => Ok(wgs84_to_gcj02(coordinate)),
        (Gcj02, Wgs84) => Ok(gcj02_to_wgs84(coordinate)),
        (Gcj02, Bd09Ll) => Ok(gcj02_to_bd09(coordinate)),
        (Bd09Ll, Gcj02) => Ok(bd09_to_gcj02(coordinate)),
        (Wgs84, Bd09Ll) => Ok(gcj02_to_bd09(wgs84_to_gcj02(coordinate))),
        (Bd09Ll, Wgs84) => Ok(gcj02_to_wgs84(bd09_to_gcj02(coordinate))),
        _ => Err(EngineError::UnsupportedConversion { from, to }),
    }
}

/// Host-supplied conversion capability, typically backed by a native map SDK
///
/// Returning `None` signals that the delegate cannot (or failed to) convert
/// the pair, and the caller should fall back to the pure algorithm.
pub trait NativeConverter {
    fn convert(
        &self,
        coordinate: Coordinate,
        from: CoordinateSystem,
        to: CoordinateSystem,
    ) -> Option<Coordinate>;
}

/// A conversion strategy: validation and identity handling are common,
/// the mapping itself is pluggable
pub trait ConversionStrategy {
    /// Convert a single coordinate; never panics, never returns `Err`
    fn convert(
        &self,
        coordinate: Coordinate,
        from: CoordinateSystem,
        to: CoordinateSystem,
    ) -> ConversionResult;

    /// Convert a batch, one result per input, continuing past failures
    fn convert_batch(
        &self,
        coordinates: &[Coordinate],
        from: CoordinateSystem,
        to: CoordinateSystem,
    ) -> Vec<ConversionResult> {
        coordinates
            .iter()
            .map(|&coordinate| self.convert(coordinate, from, to))
            .collect()
    }
}

/// Validation and identity handling shared by both strategies
///
/// Returns `Some` when the result is already decided (invalid input or
/// identity pair), `None` when the actual mapping still has to run.
fn preflight(
    coordinate: Coordinate,
    from: CoordinateSystem,
    to: CoordinateSystem,
) -> Option<ConversionResult> {
    if let Err(error) = coordinate.validate() {
        return Some(ConversionResult::failed(coordinate, error));
    }
    if from == to {
        return Some(ConversionResult::ok(coordinate));
    }
    None
}

/// Pure-algorithm conversion strategy
#[derive(Clone, Copy, Debug, Default)]
pub struct PureConverter;

impl ConversionStrategy for PureConverter {
    fn convert(
        &self,
        coordinate: Coordinate,
        from: CoordinateSystem,
        to: CoordinateSystem,
    ) -> ConversionResult {
        if let Some(decided) = preflight(coordinate, from, to) {
            return decided;
        }
        match convert_pure(coordinate, from, to) {
            Ok(converted) => ConversionResult::ok(converted),
            Err(error) => ConversionResult::failed(coordinate, error),
        }
    }
}

/// Delegate-first strategy: try the native converter, fall back to the pure
/// algorithm when it declines
pub struct DelegateFirst<D: NativeConverter> {
    delegate: D,
}

impl<D: NativeConverter> DelegateFirst<D> {
    pub fn new(delegate: D) -> Self {
        Self { delegate }
    }
}

impl<D: NativeConverter> ConversionStrategy for DelegateFirst<D> {
    fn convert(
        &self,
        coordinate: Coordinate,
        from: CoordinateSystem,
        to: CoordinateSystem,
    ) -> ConversionResult {
        if let Some(decided) = preflight(coordinate, from, to) {
            return decided;
        }
        if let Some(converted) = self.delegate.convert(coordinate, from, to) {
            return ConversionResult::ok(converted);
        }
        tracing::warn!(%from, %to, "native coordinate conversion declined, falling back to pure algorithm");
        match convert_pure(coordinate, from, to) {
            Ok(converted) => ConversionResult::ok(converted),
            Err(error) => ConversionResult::failed(coordinate, error),
        }
    }
}

/// Convert a single coordinate with the pure algorithm
///
/// Convenience wrapper over [`PureConverter`].
pub fn convert(
    coordinate: Coordinate,
    from: CoordinateSystem,
    to: CoordinateSystem,
) -> ConversionResult {
    PureConverter.convert(coordinate, from, to)
}

/// Convert a batch of coordinates with the pure algorithm
pub fn convert_batch(
    coordinates: &[Coordinate],
    from: CoordinateSystem,
    to: CoordinateSystem,
) -> Vec<ConversionResult> {
    PureConverter.convert_batch(coordinates, from, to)
}

/// Great-circle distance in meters on the Krasovsky radius
///
/// This is the transform engine's distance; pixel-space and general
/// great-circle math live in [`crate::distance`] with their own radii.
pub fn calculate_distance(a: Coordinate, b: Coordinate) -> f64 {
    haversine_with_radius(a, b, KRASOVSKY_RADIUS_M)
}

/// Even-odd ray-casting point-in-polygon test
///
/// A polygon needs at least 3 vertices; anything smaller contains nothing.
pub fn point_in_polygon(point: Coordinate, polygon: &[Coordinate]) -> bool {
    if polygon.len() < 3 {
        return false;
    }

    let (x, y) = (point.latitude, point.longitude);
    let mut inside = false;
    let mut j = polygon.len() - 1;

    for i in 0..polygon.len() {
        let (xi, yi) = (polygon[i].latitude, polygon[i].longitude);
        let (xj, yj) = (polygon[j].latitude, polygon[j].longitude);

        if ((yi > y) != (yj > y)) && (x < (xj - xi) * (y - yi) / (yj - yi) + xi) {
            inside = !inside;
        }
        j = i;
    }

    inside
}

#[cfg(test)]
mod tests {
    use super::*;
    use CoordinateSystem::*;

    const BEIJING: Coordinate = Coordinate::new_unchecked(39.915, 116.404);

    /// Documented loose tolerance for round trips of the approximate inverses
    const ROUND_TRIP_TOLERANCE_DEG: f64 = 1e-4;

    #[test]
    fn test_identity_law() {
        for system in [Wgs84, Gcj02, Bd09Ll, Bd09Mc] {
            let result = convert(BEIJING, system, system);
            assert!(result.success);
            assert_eq!(result.coordinate, BEIJING);
        }
    }

    #[test]
    fn test_out_of_china_is_noop() {
        let sydney = Coordinate::new_unchecked(-33.8688, 151.2093);
        let result = convert(sydney, Wgs84, Gcj02);
        assert!(result.success);
        assert_eq!(result.coordinate, sydney);

        let equator = Coordinate::new_unchecked(10.0, 10.0);
        let result = convert(equator, Wgs84, Gcj02);
        assert!(result.success);
        assert_eq!(result.coordinate, equator);
    }

    #[test]
    fn test_wgs84_to_gcj02_offsets_inside_china() {
        let result = convert(BEIJING, Wgs84, Gcj02);
        assert!(result.success);
        let converted = result.coordinate;
        // The obfuscation shifts points by roughly 100-700 meters
        assert!((converted.latitude - BEIJING.latitude).abs() > 1e-4);
        assert!((converted.longitude - BEIJING.longitude).abs() > 1e-4);
        assert!((converted.latitude - BEIJING.latitude).abs() < 0.01);
        assert!((converted.longitude - BEIJING.longitude).abs() < 0.01);
    }

    #[test]
    fn test_bd09ll_to_gcj02_scenario() {
        let result = convert(BEIJING, Bd09Ll, Gcj02);
        assert!(result.success);
        let converted = result.coordinate;
        let d_lat = BEIJING.latitude - converted.latitude;
        let d_lng = BEIJING.longitude - converted.longitude;
        // Removing the BD09 layer moves the point south-west by roughly
        // (0.0055, 0.0065) degrees
        assert!((0.004..0.008).contains(&d_lat), "d_lat = {d_lat}");
        assert!((0.005..0.008).contains(&d_lng), "d_lng = {d_lng}");
    }

    #[test]
    fn test_round_trip_wgs84_gcj02() {
        let there = convert(BEIJING, Wgs84, Gcj02).coordinate;
        let back = convert(there, Gcj02, Wgs84).coordinate;
        assert!((back.latitude - BEIJING.latitude).abs() < ROUND_TRIP_TOLERANCE_DEG);
        assert!((back.longitude - BEIJING.longitude).abs() < ROUND_TRIP_TOLERANCE_DEG);
    }

    #[test]
    fn test_round_trip_gcj02_bd09ll() {
        let there = convert(BEIJING, Gcj02, Bd09Ll).coordinate;
        let back = convert(there, Bd09Ll, Gcj02).coordinate;
        assert!((back.latitude - BEIJING.latitude).abs() < ROUND_TRIP_TOLERANCE_DEG);
        assert!((back.longitude - BEIJING.longitude).abs() < ROUND_TRIP_TOLERANCE_DEG);
    }

    #[test]
    fn test_chained_wgs84_bd09ll() {
        let direct = convert(BEIJING, Wgs84, Bd09Ll).coordinate;
        let chained = convert(convert(BEIJING, Wgs84, Gcj02).coordinate, Gcj02, Bd09Ll).coordinate;
        assert_eq!(direct, chained);
    }

    #[test]
    fn test_unsupported_pairs() {
        for (from, to) in [(Wgs84, Bd09Mc), (Bd09Mc, Wgs84), (Bd09Mc, Gcj02), (Bd09Ll, Bd09Mc)] {
            let result = convert(BEIJING, from, to);
            assert!(!result.success);
            assert_eq!(
                result.error,
                Some(EngineError::UnsupportedConversion { from, to })
            );
            assert_eq!(result.coordinate, BEIJING);
        }
    }

    #[test]
    fn test_invalid_input_reports_out_of_range() {
        let bad = Coordinate::new_unchecked(120.0, 116.404);
        let result = convert(bad, Wgs84, Gcj02);
        assert!(!result.success);
        assert!(matches!(result.error, Some(EngineError::OutOfRange { .. })));
        assert_eq!(result.coordinate, bad);

        let nan = Coordinate::new_unchecked(f64::NAN, 116.404);
        let result = convert(nan, Wgs84, Gcj02);
        assert!(!result.success);
        assert!(matches!(
            result.error,
            Some(EngineError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_convert_batch_continues_past_failures() {
        let inputs = [
            BEIJING,
            Coordinate::new_unchecked(f64::NAN, 0.0),
            Coordinate::new_unchecked(31.2304, 121.4737),
        ];
        let results = convert_batch(&inputs, Wgs84, Gcj02);
        assert_eq!(results.len(), 3);
        assert!(results[0].success);
        assert!(!results[1].success);
        assert!(results[2].success);
    }

    struct FixedDelegate(Option<Coordinate>);

    impl NativeConverter for FixedDelegate {
        fn convert(
            &self,
            _coordinate: Coordinate,
            _from: CoordinateSystem,
            _to: CoordinateSystem,
        ) -> Option<Coordinate> {
            self.0
        }
    }

    #[test]
    fn test_delegate_first_prefers_delegate() {
        let delegate_output = Coordinate::new_unchecked(1.0, 2.0);
        let strategy = DelegateFirst::new(FixedDelegate(Some(delegate_output)));
        let result = strategy.convert(BEIJING, Wgs84, Gcj02);
        assert!(result.success);
        assert_eq!(result.coordinate, delegate_output);
    }

    #[test]
    fn test_delegate_first_falls_back_to_pure() {
        let strategy = DelegateFirst::new(FixedDelegate(None));
        let fallback = strategy.convert(BEIJING, Wgs84, Gcj02);
        let pure = PureConverter.convert(BEIJING, Wgs84, Gcj02);
        assert_eq!(fallback, pure);
    }

    #[test]
    fn test_delegate_first_still_validates_first() {
        // A delegate that would "succeed" must never see invalid input
        let strategy = DelegateFirst::new(FixedDelegate(Some(BEIJING)));
        let bad = Coordinate::new_unchecked(0.0, 999.0);
        let result = strategy.convert(bad, Wgs84, Gcj02);
        assert!(!result.success);
        assert_eq!(result.coordinate, bad);
    }

    #[test]
    fn test_calculate_distance_beijing_shanghai() {
        let shanghai = Coordinate::new_unchecked(31.2304, 121.4737);
        let distance = calculate_distance(BEIJING, shanghai);
        // Roughly 1070 km; the Krasovsky radius runs a little over the
        // mean-radius figure
        assert!(distance > 1_000_000.0 && distance < 1_150_000.0, "{distance}");
    }

    #[test]
    fn test_calculate_distance_zero() {
        assert_eq!(calculate_distance(BEIJING, BEIJING), 0.0);
    }

    #[test]
    fn test_point_in_polygon() {
        let square = [
            Coordinate::new_unchecked(0.0, 0.0),
            Coordinate::new_unchecked(0.0, 10.0),
            Coordinate::new_unchecked(10.0, 10.0),
            Coordinate::new_unchecked(10.0, 0.0),
        ];
        assert!(point_in_polygon(Coordinate::new_unchecked(5.0, 5.0), &square));
        assert!(!point_in_polygon(
            Coordinate::new_unchecked(15.0, 5.0),
            &square
        ));
    }

    #[test]
    fn test_point_in_polygon_degenerate() {
        let line = [
            Coordinate::new_unchecked(0.0, 0.0),
            Coordinate::new_unchecked(10.0, 10.0),
        ];
        assert!(!point_in_polygon(Coordinate::new_unchecked(5.0, 5.0), &line));
        assert!(!point_in_polygon(Coordinate::new_unchecked(5.0, 5.0), &[]));
    }
}
