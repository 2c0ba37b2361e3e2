//! Large Marker Engine - Spatial Data Optimization for Map Marker Sets
//!
//! This library provides the pure computation core behind a marker-heavy map
//! view: coordinate conversion between the geodetic systems used in
//! China-region mapping, clustering and culling of large marker sets, and a
//! frame-budget-aware render scheduler. It performs no I/O and owns no file
//! formats; plain geographic/viewport values go in, plain computed results
//! come out.
//!
//! # Architecture
//!
//! - **[`Coordinate`] / [`CoordinateSystem`]**: validated geodetic value types
//! - **[`convert`]**: WGS84 / GCJ02 / BD09LL conversion algorithms with a
//!   pluggable native-delegate strategy
//! - **[`distance`]**: great-circle and pixel-space distance utilities
//! - **[`cluster`]**: zoom-adaptive greedy clustering of marker sets
//! - **[`ViewportBounds`]**: inclusive axis-aligned viewport culling
//! - **[`lod`]**: zoom-keyed level-of-detail selection and reduction pipeline
//! - **[`schedule`]**: windowed virtualization, cooperative batching and
//!   frame-rate-driven adaptive tuning
//! - **[`Engine`]**: per-instance state tying the pipeline together
//!
//! # Concurrency model
//!
//! Single logical thread, cooperative scheduling. All operations are
//! synchronous; the debounce/throttle primitives and the batch queue are
//! poll-driven rather than timer-driven, so the caller owns the clock.

pub mod cluster;
pub mod convert;
mod coords;
pub mod distance;
mod engine;
pub mod limiter;
pub mod lod;
mod marker;
pub mod schedule;
mod viewport;

// Public API exports
pub use convert::{ConversionStrategy, DelegateFirst, NativeConverter, PureConverter};
pub use coords::{ConversionResult, Coordinate, CoordinateSystem};
pub use engine::{Engine, EngineConfig, EngineStats, OptimizeMetrics, OptimizeResult, VisibleSet};
pub use limiter::{DebounceEdge, Debouncer, Throttler};
pub use lod::{LodItems, LodLevel, LodResult};
pub use marker::{Cluster, MarkerItem};
pub use schedule::{BatchQueue, FrameMonitor, FrameSample, RenderParams, VirtualizationState};
pub use viewport::{filter_in_viewport, ViewportBounds};

/// Error taxonomy for the engine
///
/// Single-item conversions never surface these as `Err`; they embed the error
/// in a [`ConversionResult`] so batch callers can continue past individual
/// failures. Batch operations skip malformed items instead of failing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("coordinate out of range: latitude {latitude}, longitude {longitude}")]
    OutOfRange { latitude: f64, longitude: f64 },

    #[error("unsupported conversion: {from} -> {to}")]
    UnsupportedConversion {
        from: CoordinateSystem,
        to: CoordinateSystem,
    },
}

pub type Result<T> = std::result::Result<T, EngineError>;
