//! Render scheduling: virtualization, cooperative batching and frame-rate
//! driven adaptive tuning
//!
//! Nothing here spawns threads or timers. The batch queue executes work in
//! bounded chunks and yields by returning to the caller; the frame monitor is
//! fed timestamps by whoever drives the frame loop.

use crate::viewport::ViewportBounds;
use crate::Coordinate;

use instant::Instant;
use std::collections::VecDeque;

/// Result of a windowed visibility scan
#[derive(Clone, Debug)]
pub struct VirtualizationState<T> {
    /// Items matching the bounds test, in input order, at most `window_size`
    pub visible: Vec<T>,
    /// Total number of input items considered
    pub total: usize,
    /// Start of the first contiguous run of matches (0 when nothing matched)
    pub start_index: usize,
    /// End of the first contiguous run of matches (0 when nothing matched)
    ///
    /// Matches beyond the first run still appear in `visible` but are not
    /// reflected here.
    pub end_index: usize,
}

/// Scan items in order, collecting up to `window_size` items inside the bounds
///
/// `position` extracts the coordinate used for the bounds test, so the scan
/// works over raw markers, clusters, or anything else with a location. The
/// `start_index`/`end_index` pair brackets only the first contiguous run of
/// matches; this mirrors the behavior downstream consumers currently rely on
/// and is documented on [`VirtualizationState`].
pub fn virtualize<T, F>(
    items: &[T],
    bounds: &ViewportBounds,
    window_size: usize,
    position: F,
) -> VirtualizationState<T>
where
    T: Clone,
    F: Fn(&T) -> Coordinate,
{
    let mut visible = Vec::new();
    let mut start_index: Option<usize> = None;
    let mut end_index: Option<usize> = None;
    let mut first_run_open = true;

    for (i, item) in items.iter().enumerate() {
        if !bounds.contains(position(item)) {
            if start_index.is_some() {
                first_run_open = false;
            }
            continue;
        }

        if start_index.is_none() {
            start_index = Some(i);
            end_index = Some(i);
        } else if first_run_open {
            end_index = Some(i);
        }

        visible.push(item.clone());
        if visible.len() >= window_size {
            break;
        }
    }

    VirtualizationState {
        visible,
        total: items.len(),
        start_index: start_index.unwrap_or(0),
        end_index: end_index.unwrap_or(0),
    }
}

/// FIFO queue of render operations executed in cooperative batches
///
/// `run_batch` executes at most one batch and returns; returning is the
/// yield point that bounds single-tick work.
#[derive(Default)]
pub struct BatchQueue {
    queue: VecDeque<Box<dyn FnOnce()>>,
}

impl BatchQueue {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    /// Append one operation to the queue
    pub fn submit(&mut self, operation: impl FnOnce() + 'static) {
        self.queue.push_back(Box::new(operation));
    }

    /// Append many operations to the queue
    pub fn submit_all<I>(&mut self, operations: I)
    where
        I: IntoIterator<Item = Box<dyn FnOnce()>>,
    {
        self.queue.extend(operations);
    }

    /// Execute up to `batch_size` queued operations, then yield
    ///
    /// Returns the number of operations still queued.
    pub fn run_batch(&mut self, batch_size: usize) -> usize {
        let take = batch_size.min(self.queue.len());
        for _ in 0..take {
            // Occupancy just checked
            let operation = self.queue.pop_front().expect("checked non-empty queue");
            operation();
        }
        self.queue.len()
    }

    /// Drain the queue completely, invoking `between` as the yield point
    /// after every batch that leaves work behind
    ///
    /// Returns the total number of operations executed (the completion
    /// signal).
    pub fn drain_with(&mut self, batch_size: usize, mut between: impl FnMut()) -> usize {
        let mut executed = 0;
        while !self.queue.is_empty() {
            let before = self.queue.len();
            let remaining = self.run_batch(batch_size);
            executed += before - remaining;
            if remaining > 0 {
                between();
            }
        }
        executed
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drop all queued operations without executing them
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

/// One frame-time observation
#[derive(Clone, Copy, Debug)]
pub struct FrameSample {
    pub frame_time_ms: f64,
    pub fps: f64,
    pub timestamp: Instant,
}

/// Bound on the rolling frame history
const MAX_FRAME_SAMPLES: usize = 100;
/// When the history overflows it is cut back to this many newest samples
const TRIMMED_FRAME_SAMPLES: usize = 50;
/// A frame counts as dropped past this multiple of the target frame time
const DROPPED_FRAME_FACTOR: f64 = 1.5;

/// Rolling frame-time monitor
///
/// Fed explicitly with `record_frame(now)`; keeps a bounded sample history
/// used for read-side statistics and adaptive tuning only.
pub struct FrameMonitor {
    target_fps: f64,
    samples: VecDeque<FrameSample>,
    last_frame: Option<Instant>,
    dropped_frames: u64,
}

impl FrameMonitor {
    pub fn new(target_fps: f64) -> Self {
        Self {
            target_fps,
            samples: VecDeque::new(),
            last_frame: None,
            dropped_frames: 0,
        }
    }

    #[inline]
    pub fn target_fps(&self) -> f64 {
        self.target_fps
    }

    /// Record a frame boundary; the first call only seeds the baseline
    pub fn record_frame(&mut self, now: Instant) {
        if let Some(last) = self.last_frame {
            let frame_time_ms = now.duration_since(last).as_secs_f64() * 1000.0;
            let fps = if frame_time_ms > 0.0 {
                1000.0 / frame_time_ms
            } else {
                f64::INFINITY
            };

            if frame_time_ms > DROPPED_FRAME_FACTOR * (1000.0 / self.target_fps) {
                self.dropped_frames += 1;
            }

            self.samples.push_back(FrameSample {
                frame_time_ms,
                fps,
                timestamp: now,
            });
            if self.samples.len() > MAX_FRAME_SAMPLES {
                let excess = self.samples.len() - TRIMMED_FRAME_SAMPLES;
                self.samples.drain(..excess);
            }
        }
        self.last_frame = Some(now);
    }

    /// FPS averaged over the last 10 samples; 0 until two frames were seen
    pub fn current_fps(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let recent: Vec<&FrameSample> = self.samples.iter().rev().take(10).collect();
        let avg_frame_time: f64 =
            recent.iter().map(|s| s.frame_time_ms).sum::<f64>() / recent.len() as f64;
        if avg_frame_time > 0.0 {
            1000.0 / avg_frame_time
        } else {
            0.0
        }
    }

    /// FPS averaged over the whole rolling window
    pub fn average_fps(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().map(|s| s.fps).sum::<f64>() / self.samples.len() as f64
    }

    #[inline]
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    /// The rolling sample history, oldest first
    pub fn samples(&self) -> impl Iterator<Item = &FrameSample> {
        self.samples.iter()
    }

    pub fn reset(&mut self) {
        self.samples.clear();
        self.last_frame = None;
        self.dropped_frames = 0;
    }
}

/// Tunable scheduling parameters adjusted by the adaptive tuner
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderParams {
    /// Virtualization window: max items selected per scan
    pub window_size: usize,
    /// Batch size: max operations executed per cooperative tick
    pub batch_size: usize,
}

// Tuning floors and caps
const WINDOW_FLOOR_SEVERE: usize = 20;
const WINDOW_FLOOR_MILD: usize = 50;
const WINDOW_CAP: usize = 200;
const BATCH_FLOOR_SEVERE: usize = 10;
const BATCH_FLOOR_MILD: usize = 25;
const BATCH_CAP: usize = 100;

/// Adjust window/batch sizes from the measured frame rate
///
/// Below half the target the parameters are halved (severe floors); below
/// 80% they shrink by 20% (mild floors); above 95% they grow by 10% up to
/// fixed caps. In between, nothing changes.
pub fn adaptive_adjustment(params: &mut RenderParams, current_fps: f64, target_fps: f64) {
    if current_fps < target_fps * 0.5 {
        params.window_size = WINDOW_FLOOR_SEVERE.max((params.window_size as f64 * 0.5) as usize);
        params.batch_size = BATCH_FLOOR_SEVERE.max((params.batch_size as f64 * 0.5) as usize);
        tracing::warn!(
            fps = current_fps,
            window_size = params.window_size,
            batch_size = params.batch_size,
            "severe frame-rate drop, halving render parameters"
        );
    } else if current_fps < target_fps * 0.8 {
        params.window_size = WINDOW_FLOOR_MILD.max((params.window_size as f64 * 0.8) as usize);
        params.batch_size = BATCH_FLOOR_MILD.max((params.batch_size as f64 * 0.8) as usize);
        tracing::debug!(
            fps = current_fps,
            window_size = params.window_size,
            batch_size = params.batch_size,
            "frame rate below target, reducing render parameters"
        );
    } else if current_fps > target_fps * 0.95 {
        params.window_size = WINDOW_CAP.min((params.window_size as f64 * 1.1) as usize);
        params.batch_size = BATCH_CAP.min((params.batch_size as f64 * 1.1) as usize);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::MarkerItem;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    fn marker(lat: f64, lng: f64) -> MarkerItem<u32> {
        MarkerItem::new(Coordinate::new_unchecked(lat, lng), 0)
    }

    fn bounds() -> ViewportBounds {
        ViewportBounds::new(10.0, 0.0, 10.0, 0.0)
    }

    #[test]
    fn test_virtualize_window_limit() {
        let items: Vec<_> = (0..20).map(|i| marker(5.0, 0.1 + i as f64 * 0.1)).collect();
        let state = virtualize(&items, &bounds(), 5, |m| m.coordinate);
        assert_eq!(state.visible.len(), 5);
        assert_eq!(state.total, 20);
        assert_eq!(state.start_index, 0);
        assert_eq!(state.end_index, 4);
    }

    #[test]
    fn test_virtualize_no_matches_defaults_to_zero() {
        let items = vec![marker(50.0, 50.0), marker(60.0, 60.0)];
        let state = virtualize(&items, &bounds(), 10, |m| m.coordinate);
        assert!(state.visible.is_empty());
        assert_eq!(state.start_index, 0);
        assert_eq!(state.end_index, 0);
    }

    #[test]
    fn test_virtualize_index_range_brackets_first_run_only() {
        // in, in, out, in: the index range covers items 0..=1, but the late
        // match is still collected
        let items = vec![
            marker(5.0, 1.0),
            marker(5.0, 2.0),
            marker(50.0, 50.0),
            marker(5.0, 3.0),
        ];
        let state = virtualize(&items, &bounds(), 10, |m| m.coordinate);
        assert_eq!(state.visible.len(), 3);
        assert_eq!(state.start_index, 0);
        assert_eq!(state.end_index, 1);
    }

    #[test]
    fn test_virtualize_offset_first_run() {
        let items = vec![
            marker(50.0, 50.0),
            marker(5.0, 1.0),
            marker(5.0, 2.0),
        ];
        let state = virtualize(&items, &bounds(), 10, |m| m.coordinate);
        assert_eq!(state.start_index, 1);
        assert_eq!(state.end_index, 2);
    }

    #[test]
    fn test_virtualize_inverted_bounds_selects_nothing() {
        let inverted = ViewportBounds::new(0.0, 10.0, 0.0, 10.0);
        let items = vec![marker(5.0, 5.0)];
        let state = virtualize(&items, &inverted, 10, |m| m.coordinate);
        assert!(state.visible.is_empty());
    }

    #[test]
    fn test_batch_queue_runs_in_chunks() {
        let counter = Rc::new(RefCell::new(0u32));
        let mut queue = BatchQueue::new();
        for _ in 0..7 {
            let counter = counter.clone();
            queue.submit(move || *counter.borrow_mut() += 1);
        }

        assert_eq!(queue.run_batch(3), 4);
        assert_eq!(*counter.borrow(), 3);
        assert_eq!(queue.run_batch(3), 1);
        assert_eq!(*counter.borrow(), 6);
        assert_eq!(queue.run_batch(3), 0);
        assert_eq!(*counter.borrow(), 7);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_batch_queue_drain_with_yields_between_batches() {
        let counter = Rc::new(RefCell::new(0u32));
        let mut queue = BatchQueue::new();
        for _ in 0..10 {
            let counter = counter.clone();
            queue.submit(move || *counter.borrow_mut() += 1);
        }

        let mut yields = 0;
        let executed = queue.drain_with(4, || yields += 1);
        assert_eq!(executed, 10);
        assert_eq!(*counter.borrow(), 10);
        // Batches of 4, 4, 2: the last batch finishes the queue, no yield
        assert_eq!(yields, 2);
    }

    #[test]
    fn test_batch_queue_clear_drops_work() {
        let mut queue = BatchQueue::new();
        queue.submit(|| panic!("must not run"));
        queue.clear();
        assert_eq!(queue.run_batch(10), 0);
    }

    #[test]
    fn test_frame_monitor_drop_detection() {
        let mut monitor = FrameMonitor::new(60.0);
        let t0 = Instant::now();
        monitor.record_frame(t0);
        // 16ms frame: fine at 60fps (threshold 25ms)
        monitor.record_frame(t0 + Duration::from_millis(16));
        assert_eq!(monitor.dropped_frames(), 0);
        // 40ms frame: dropped
        monitor.record_frame(t0 + Duration::from_millis(56));
        assert_eq!(monitor.dropped_frames(), 1);
    }

    #[test]
    fn test_frame_monitor_fps_statistics() {
        let mut monitor = FrameMonitor::new(60.0);
        let t0 = Instant::now();
        let mut t = t0;
        monitor.record_frame(t);
        for _ in 0..20 {
            t += Duration::from_millis(20);
            monitor.record_frame(t);
        }
        let fps = monitor.current_fps();
        assert!((fps - 50.0).abs() < 1.0, "{fps}");
        assert!((monitor.average_fps() - 50.0).abs() < 1.0);
    }

    #[test]
    fn test_frame_monitor_history_is_bounded() {
        let mut monitor = FrameMonitor::new(60.0);
        let t0 = Instant::now();
        let mut t = t0;
        monitor.record_frame(t);
        for _ in 0..150 {
            t += Duration::from_millis(16);
            monitor.record_frame(t);
        }
        let count = monitor.samples().count();
        assert!(count <= MAX_FRAME_SAMPLES);
        // Overflow trims back to the newest 50
        assert!(count >= TRIMMED_FRAME_SAMPLES);
    }

    #[test]
    fn test_frame_monitor_reset() {
        let mut monitor = FrameMonitor::new(60.0);
        let t0 = Instant::now();
        monitor.record_frame(t0);
        monitor.record_frame(t0 + Duration::from_millis(100));
        assert!(monitor.dropped_frames() > 0);
        monitor.reset();
        assert_eq!(monitor.dropped_frames(), 0);
        assert_eq!(monitor.current_fps(), 0.0);
        assert_eq!(monitor.samples().count(), 0);
    }

    #[test]
    fn test_adaptive_severe_halves_with_floors() {
        let mut params = RenderParams {
            window_size: 100,
            batch_size: 50,
        };
        adaptive_adjustment(&mut params, 20.0, 60.0);
        assert_eq!(params.window_size, 50);
        assert_eq!(params.batch_size, 25);

        // Repeated severe pressure bottoms out at the floors
        for _ in 0..10 {
            adaptive_adjustment(&mut params, 10.0, 60.0);
        }
        assert_eq!(params.window_size, WINDOW_FLOOR_SEVERE);
        assert_eq!(params.batch_size, BATCH_FLOOR_SEVERE);
    }

    #[test]
    fn test_adaptive_mild_reduces_by_a_fifth() {
        let mut params = RenderParams {
            window_size: 100,
            batch_size: 50,
        };
        adaptive_adjustment(&mut params, 40.0, 60.0);
        assert_eq!(params.window_size, 80);
        assert_eq!(params.batch_size, 40);
    }

    #[test]
    fn test_adaptive_growth_is_capped() {
        let mut params = RenderParams {
            window_size: 195,
            batch_size: 98,
        };
        adaptive_adjustment(&mut params, 60.0, 60.0);
        assert_eq!(params.window_size, WINDOW_CAP);
        assert_eq!(params.batch_size, BATCH_CAP);
    }

    #[test]
    fn test_adaptive_steady_band_changes_nothing() {
        let mut params = RenderParams {
            window_size: 100,
            batch_size: 50,
        };
        // 85% of target: neither degradation nor growth
        adaptive_adjustment(&mut params, 51.0, 60.0);
        assert_eq!(
            params,
            RenderParams {
                window_size: 100,
                batch_size: 50
            }
        );
    }
}
