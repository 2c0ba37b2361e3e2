//! Zoom-adaptive greedy clustering of marker sets
//!
//! A single greedy pass over the input: each unvisited item seeds a cluster
//! and absorbs every later unvisited item within the zoom-adjusted pixel
//! radius of the seed. Complexity is O(n²); this is acceptable up to a few
//! thousand items within sub-second budgets, and larger sets should be
//! pre-culled through [`crate::filter_in_viewport`] first.

use crate::distance::pixel_distance;
use crate::marker::{Cluster, MarkerItem};

/// Cluster radius adjusted for zoom
///
/// Radius shrinks as zoom increases (finer detail needs less aggregation),
/// bottoming out at half the base radius.
#[inline]
pub fn adjusted_cluster_radius(zoom: f64, base_radius_px: f64) -> f64 {
    let factor = (1.0 - (zoom - 10.0) * 0.1).max(0.5);
    base_radius_px * factor
}

/// Cluster a marker set at the given zoom level
///
/// Items with malformed coordinates (non-finite or out of range) are skipped
/// with a warning and do not appear in any cluster; the partition invariant
/// holds over the remaining valid items. Visited tracking is an arena of
/// `Option` slots indexed by position, so duplicate coordinates or payloads
/// cannot confuse the pass.
pub fn cluster_markers<T>(
    items: Vec<MarkerItem<T>>,
    zoom_level: f64,
    base_radius_px: f64,
) -> Vec<Cluster<T>> {
    #[cfg(feature = "profiling")]
    profiling::scope!("cluster::cluster_markers");

    if items.is_empty() {
        return Vec::new();
    }

    let radius_px = adjusted_cluster_radius(zoom_level, base_radius_px);
    let mut slots: Vec<Option<MarkerItem<T>>> = items.into_iter().map(Some).collect();
    let mut clusters = Vec::new();

    for i in 0..slots.len() {
        let Some(seed) = slots[i].take() else {
            continue;
        };

        if !seed.coordinate.is_valid() {
            tracing::warn!(
                latitude = seed.coordinate.latitude,
                longitude = seed.coordinate.longitude,
                "skipping marker with malformed coordinate"
            );
            continue;
        }

        let seed_coordinate = seed.coordinate;
        let mut members = vec![seed];

        for j in (i + 1)..slots.len() {
            let absorb = match &slots[j] {
                Some(candidate) if candidate.coordinate.is_valid() => {
                    pixel_distance(seed_coordinate, candidate.coordinate, zoom_level) <= radius_px
                }
                _ => false,
            };
            if absorb {
                // The match above guarantees the slot is occupied
                members.push(slots[j].take().expect("checked occupied slot"));
            }
        }

        let is_cluster = members.len() > 1;
        let center = if is_cluster {
            cluster_center(&members)
        } else {
            seed_coordinate
        };

        clusters.push(Cluster {
            center,
            members,
            is_cluster,
        });
    }

    clusters
}

/// Unweighted arithmetic mean of the member coordinates
///
/// No antimeridian wraparound correction is applied; member sets spanning
/// ±180° average raw longitudes.
fn cluster_center<T>(members: &[MarkerItem<T>]) -> crate::Coordinate {
    let mut total_lat = 0.0;
    let mut total_lng = 0.0;
    for member in members {
        total_lat += member.coordinate.latitude;
        total_lng += member.coordinate.longitude;
    }
    crate::Coordinate {
        latitude: total_lat / members.len() as f64,
        longitude: total_lng / members.len() as f64,
    }
}
