//! Marker and cluster value types

use crate::coords::Coordinate;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A map marker: a coordinate plus an opaque payload
///
/// The payload is carried untouched through culling and clustering; the
/// engine never inspects it.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MarkerItem<T> {
    pub coordinate: Coordinate,
    pub payload: T,
}

impl<T> MarkerItem<T> {
    pub fn new(coordinate: Coordinate, payload: T) -> Self {
        Self {
            coordinate,
            payload,
        }
    }
}

/// A group of markers produced by the clusterer
///
/// Partition invariant: across the output of one clustering call, every valid
/// input item is a member of exactly one cluster.
#[derive(Clone, Debug)]
pub struct Cluster<T> {
    /// Unweighted arithmetic mean of the member coordinates
    pub center: Coordinate,
    pub members: Vec<MarkerItem<T>>,
    /// True iff more than one member was absorbed
    pub is_cluster: bool,
}

impl<T> Cluster<T> {
    /// Number of markers absorbed into this cluster
    #[inline]
    pub fn count(&self) -> usize {
        self.members.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_item_carries_payload() {
        let item = MarkerItem::new(Coordinate::new_unchecked(1.0, 2.0), "poi-42");
        assert_eq!(item.payload, "poi-42");
        assert_eq!(item.coordinate.latitude, 1.0);
    }

    #[test]
    fn test_cluster_count() {
        let members = vec![
            MarkerItem::new(Coordinate::new_unchecked(0.0, 0.0), 1u32),
            MarkerItem::new(Coordinate::new_unchecked(0.1, 0.1), 2u32),
        ];
        let cluster = Cluster {
            center: Coordinate::new_unchecked(0.05, 0.05),
            members,
            is_cluster: true,
        };
        assert_eq!(cluster.count(), 2);
    }
}
