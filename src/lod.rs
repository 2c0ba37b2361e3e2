//! Level-of-detail selection and reduction pipeline
//!
//! A zoom level picks a [`LodLevel`] out of an ordered table; the pipeline
//! then truncates the marker set to the level's budget, runs the optional
//! simplification callback, and clusters when the set is still above the
//! level's threshold.

use crate::cluster::cluster_markers;
use crate::marker::{Cluster, MarkerItem};
use crate::EngineError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One entry of the zoom-keyed LOD table
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LodLevel {
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Item budget; inputs are truncated to this count in input order
    pub max_items: usize,
    /// Cluster when the truncated count exceeds this; 0 disables clustering
    pub cluster_threshold: usize,
    /// Strength passed to the simplification callback, in [0, 1]; 0 disables
    pub simplification: f64,
}

impl LodLevel {
    #[inline]
    pub fn contains_zoom(&self, zoom: f64) -> bool {
        zoom >= self.min_zoom && zoom <= self.max_zoom
    }
}

/// Default LOD table covering the usable zoom range
///
/// Low zooms show few, heavily aggregated markers; the highest level shows
/// everything up to its budget with clustering disabled.
pub fn default_levels() -> Vec<LodLevel> {
    vec![
        LodLevel {
            min_zoom: 3.0,
            max_zoom: 8.0,
            max_items: 50,
            cluster_threshold: 10,
            simplification: 0.8,
        },
        LodLevel {
            min_zoom: 9.0,
            max_zoom: 12.0,
            max_items: 200,
            cluster_threshold: 5,
            simplification: 0.5,
        },
        LodLevel {
            min_zoom: 13.0,
            max_zoom: 16.0,
            max_items: 500,
            cluster_threshold: 3,
            simplification: 0.2,
        },
        LodLevel {
            min_zoom: 17.0,
            max_zoom: 21.0,
            max_items: 1000,
            cluster_threshold: 0,
            simplification: 0.0,
        },
    ]
}

/// Select the LOD level for a zoom: first containing level wins, the last
/// level is the fallback for zooms outside every range
///
/// Returns `None` only for an empty table.
pub fn select_level(levels: &[LodLevel], zoom: f64) -> Option<&LodLevel> {
    levels
        .iter()
        .find(|level| level.contains_zoom(zoom))
        .or_else(|| levels.last())
}

/// Items surviving the LOD pipeline: raw markers, or clusters when the
/// clustering stage ran
#[derive(Clone, Debug)]
pub enum LodItems<T> {
    Markers(Vec<MarkerItem<T>>),
    Clusters(Vec<Cluster<T>>),
}

impl<T> LodItems<T> {
    /// Number of renderable entries (clusters count as one)
    pub fn len(&self) -> usize {
        match self {
            LodItems::Markers(items) => items.len(),
            LodItems::Clusters(clusters) => clusters.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outcome of [`apply_lod`]
#[derive(Clone, Debug)]
pub struct LodResult<T> {
    pub items: LodItems<T>,
    pub level: LodLevel,
    pub clustered: bool,
}

/// Simplification callback: item plus the level's strength in (0, 1]
pub type SimplifyFn<T> = dyn Fn(MarkerItem<T>, f64) -> MarkerItem<T>;

/// Run the LOD pipeline: truncate to the level budget, simplify, cluster
///
/// Truncation is first-N by input order, not importance-ranked. An empty
/// level table is an [`EngineError::InvalidParameter`].
pub fn apply_lod<T>(
    items: Vec<MarkerItem<T>>,
    zoom: f64,
    levels: &[LodLevel],
    cluster_radius_px: f64,
    simplify: Option<&SimplifyFn<T>>,
) -> crate::Result<LodResult<T>> {
    #[cfg(feature = "profiling")]
    profiling::scope!("lod::apply_lod");

    let level = *select_level(levels, zoom).ok_or_else(|| {
        EngineError::InvalidParameter("empty LOD level table".to_string())
    })?;

    let mut items = items;
    if items.len() > level.max_items {
        tracing::debug!(
            budget = level.max_items,
            dropped = items.len() - level.max_items,
            "truncating marker set to LOD budget"
        );
        items.truncate(level.max_items);
    }

    if level.simplification > 0.0 {
        if let Some(simplify) = simplify {
            items = items
                .into_iter()
                .map(|item| simplify(item, level.simplification))
                .collect();
        }
    }

    let should_cluster = level.cluster_threshold > 0 && items.len() > level.cluster_threshold;
    let items = if should_cluster {
        LodItems::Clusters(cluster_markers(items, zoom, cluster_radius_px))
    } else {
        LodItems::Markers(items)
    };

    Ok(LodResult {
        items,
        level,
        clustered: should_cluster,
    })
}
