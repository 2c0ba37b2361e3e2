//! Engine instance: configuration, pipeline orchestration and session state
//!
//! Everything the original design kept in process-wide singletons (frame
//! history, render queue, location cache, tuned parameters) lives on an
//! [`Engine`] value here, so independent instances can coexist and tests do
//! not leak state into each other. Dropping the engine releases everything;
//! [`Engine::reset`] restores a fresh session in place.

use crate::cluster::cluster_markers;
use crate::lod::{self, LodItems, LodLevel, SimplifyFn};
use crate::marker::{Cluster, MarkerItem};
use crate::schedule::{
    self, adaptive_adjustment, BatchQueue, FrameMonitor, RenderParams, VirtualizationState,
};
use crate::viewport::{filter_in_viewport, ViewportBounds};
use crate::Coordinate;

use instant::Instant;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Engine configuration
///
/// The window and batch sizes are starting points; the adaptive tuner moves
/// the live values between fixed floors and caps as the frame rate demands.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EngineConfig {
    pub enable_virtualization: bool,
    pub virtual_window_size: usize,
    pub enable_lod: bool,
    pub lod_levels: Vec<LodLevel>,
    /// Base cluster radius in pixels before zoom adjustment
    pub cluster_radius_px: f64,
    /// Extra degrees included around the viewport when culling
    pub viewport_buffer: f64,
    pub enable_frame_monitoring: bool,
    pub target_fps: f64,
    pub enable_batching: bool,
    pub batch_size: usize,
    pub location_cache_capacity: usize,
    #[cfg_attr(feature = "serde", serde(skip, default = "default_cache_ttl"))]
    pub location_cache_ttl: Duration,
}

#[cfg(feature = "serde")]
fn default_cache_ttl() -> Duration {
    Duration::from_secs(60)
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enable_virtualization: true,
            virtual_window_size: 100,
            enable_lod: true,
            lod_levels: lod::default_levels(),
            cluster_radius_px: 50.0,
            viewport_buffer: 0.0,
            enable_frame_monitoring: true,
            target_fps: 60.0,
            enable_batching: true,
            batch_size: 50,
            location_cache_capacity: 64,
            location_cache_ttl: Duration::from_secs(60),
        }
    }
}

/// The bounded visible set produced by one [`Engine::optimize`] call
#[derive(Clone, Debug)]
pub enum VisibleSet<T> {
    Markers(VirtualizationState<MarkerItem<T>>),
    Clusters(VirtualizationState<Cluster<T>>),
}

impl<T> VisibleSet<T> {
    /// Number of entries selected for rendering
    pub fn len(&self) -> usize {
        match self {
            VisibleSet::Markers(state) => state.visible.len(),
            VisibleSet::Clusters(state) => state.visible.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reduction statistics for one optimize call
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OptimizeMetrics {
    pub original_count: usize,
    pub optimized_count: usize,
    /// Fraction of the input removed by the pipeline, in [0, 1]
    pub reduction_ratio: f64,
    pub processing_time_ms: f64,
}

/// Result of the cull -> LOD -> virtualize pipeline
#[derive(Clone, Debug)]
pub struct OptimizeResult<T> {
    pub visible: VisibleSet<T>,
    pub level: LodLevel,
    pub clustered: bool,
    pub metrics: OptimizeMetrics,
}

/// Read-side snapshot of the engine's session state
#[derive(Clone, Copy, Debug)]
pub struct EngineStats {
    pub location_cache_size: usize,
    pub queued_operations: usize,
    pub dropped_frames: u64,
    pub current_fps: f64,
}

struct CachedLocation {
    coordinate: Coordinate,
    stored_at: Instant,
}

/// Per-session optimization engine
///
/// All state is instance-owned and mutated from the single logical thread
/// driving the scheduler; no cross-instance sharing exists.
pub struct Engine {
    config: EngineConfig,
    params: RenderParams,
    frame_monitor: FrameMonitor,
    render_queue: BatchQueue,
    location_cache: LruCache<String, CachedLocation>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let capacity = NonZeroUsize::new(config.location_cache_capacity)
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            params: RenderParams {
                window_size: config.virtual_window_size,
                batch_size: config.batch_size,
            },
            frame_monitor: FrameMonitor::new(config.target_fps),
            render_queue: BatchQueue::new(),
            location_cache: LruCache::new(capacity),
            config,
        }
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The live (adaptively tuned) window/batch parameters
    #[inline]
    pub fn params(&self) -> RenderParams {
        self.params
    }

    /// Run the full pipeline: viewport cull, LOD reduction, virtualization
    ///
    /// `simplify` is forwarded to the LOD stage and applied per item when the
    /// selected level asks for simplification.
    pub fn optimize<T: Clone>(
        &self,
        items: Vec<MarkerItem<T>>,
        bounds: &ViewportBounds,
        zoom: f64,
        simplify: Option<&SimplifyFn<T>>,
    ) -> crate::Result<OptimizeResult<T>> {
        #[cfg(feature = "profiling")]
        profiling::scope!("engine::optimize");
        let started = Instant::now();
        let original_count = items.len();

        // 1. Cull to the (buffered) viewport
        let culled = filter_in_viewport(items, bounds, self.config.viewport_buffer);

        // 2. LOD reduction
        let (lod_items, level, clustered) = if self.config.enable_lod {
            let result = lod::apply_lod(
                culled,
                zoom,
                &self.config.lod_levels,
                self.config.cluster_radius_px,
                simplify,
            )?;
            (result.items, result.level, result.clustered)
        } else {
            let level = *self.config.lod_levels.last().ok_or_else(|| {
                crate::EngineError::InvalidParameter("empty LOD level table".to_string())
            })?;
            (LodItems::Markers(culled), level, false)
        };

        // 3. Windowed virtualization over whichever shape the LOD stage left
        let visible = match lod_items {
            LodItems::Markers(markers) => {
                VisibleSet::Markers(self.virtualize_stage(&markers, bounds, |m| m.coordinate))
            }
            LodItems::Clusters(clusters) => {
                VisibleSet::Clusters(self.virtualize_stage(&clusters, bounds, |c| c.center))
            }
        };

        let optimized_count = visible.len();
        let metrics = OptimizeMetrics {
            original_count,
            optimized_count,
            reduction_ratio: if original_count > 0 {
                (original_count - optimized_count) as f64 / original_count as f64
            } else {
                0.0
            },
            processing_time_ms: started.elapsed().as_secs_f64() * 1000.0,
        };

        Ok(OptimizeResult {
            visible,
            level,
            clustered,
            metrics,
        })
    }

    fn virtualize_stage<I: Clone>(
        &self,
        items: &[I],
        bounds: &ViewportBounds,
        position: impl Fn(&I) -> Coordinate,
    ) -> VirtualizationState<I> {
        if self.config.enable_virtualization {
            schedule::virtualize(items, bounds, self.params.window_size, position)
        } else {
            VirtualizationState {
                visible: items.to_vec(),
                total: items.len(),
                start_index: 0,
                end_index: items.len().saturating_sub(1),
            }
        }
    }

    /// Cluster a marker set with the engine's configured base radius
    pub fn cluster<T>(&self, items: Vec<MarkerItem<T>>, zoom: f64) -> Vec<Cluster<T>> {
        cluster_markers(items, zoom, self.config.cluster_radius_px)
    }

    /// Queue a render operation for cooperative execution
    ///
    /// With batching disabled the operation runs immediately.
    pub fn submit_render_op(&mut self, operation: impl FnOnce() + 'static) {
        if self.config.enable_batching {
            self.render_queue.submit(operation);
        } else {
            operation();
        }
    }

    /// Execute one cooperative batch of queued render operations
    ///
    /// Returns the number of operations still queued; call once per
    /// scheduling tick until it reaches zero.
    pub fn run_tick(&mut self) -> usize {
        self.render_queue.run_batch(self.params.batch_size)
    }

    /// Feed the frame monitor with a frame boundary timestamp
    pub fn record_frame(&mut self, now: Instant) {
        if self.config.enable_frame_monitoring {
            self.frame_monitor.record_frame(now);
        }
    }

    #[inline]
    pub fn current_fps(&self) -> f64 {
        self.frame_monitor.current_fps()
    }

    /// The rolling frame history, oldest first
    pub fn frame_samples(&self) -> impl Iterator<Item = &schedule::FrameSample> {
        self.frame_monitor.samples()
    }

    /// Re-tune window/batch sizes from the measured frame rate
    ///
    /// No-op until the monitor has seen at least two frames.
    pub fn adaptive_adjustment(&mut self) {
        let current = self.frame_monitor.current_fps();
        if current > 0.0 {
            adaptive_adjustment(&mut self.params, current, self.config.target_fps);
        }
    }

    /// Store a located coordinate under a key
    pub fn cache_location(&mut self, key: impl Into<String>, coordinate: Coordinate, now: Instant) {
        self.location_cache.put(
            key.into(),
            CachedLocation {
                coordinate,
                stored_at: now,
            },
        );
    }

    /// Fetch a cached location; entries past the TTL are evicted lazily
    pub fn cached_location(&mut self, key: &str, now: Instant) -> Option<Coordinate> {
        let ttl = self.config.location_cache_ttl;
        let hit = self
            .location_cache
            .get(key)
            .map(|cached| (cached.coordinate, cached.stored_at));
        match hit {
            Some((coordinate, stored_at)) if now.duration_since(stored_at) <= ttl => {
                Some(coordinate)
            }
            Some(_) => {
                self.location_cache.pop(key);
                None
            }
            None => None,
        }
    }

    /// Drop one cached location, or all of them
    pub fn clear_location_cache(&mut self, key: Option<&str>) {
        match key {
            Some(key) => {
                self.location_cache.pop(key);
            }
            None => self.location_cache.clear(),
        }
    }

    /// Snapshot of the session state
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            location_cache_size: self.location_cache.len(),
            queued_operations: self.render_queue.len(),
            dropped_frames: self.frame_monitor.dropped_frames(),
            current_fps: self.frame_monitor.current_fps(),
        }
    }

    /// Restore a fresh session: clears history, queue and cache and resets
    /// the tuned parameters to their configured values
    pub fn reset(&mut self) {
        self.frame_monitor.reset();
        self.render_queue.clear();
        self.location_cache.clear();
        self.params = RenderParams {
            window_size: self.config.virtual_window_size,
            batch_size: self.config.batch_size,
        };
        tracing::debug!("engine session reset");
    }
}
