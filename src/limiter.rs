//! Debounce and throttle primitives
//!
//! Poll-driven rather than timer-driven: the caller owns the clock and passes
//! `now` explicitly, which keeps the single-threaded cooperative model intact
//! and makes the timing behavior deterministic under test. Cancellation is
//! explicit; dropping a value does not fire or cancel anything on its own.

use instant::Instant;
use std::time::Duration;

/// Which edge of the burst a debouncer fires on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DebounceEdge {
    /// Fire once after the burst goes quiet for a full window (default)
    Trailing,
    /// Fire immediately on the first call, suppress the rest of the burst
    Leading,
}

struct Pending<T> {
    args: Option<T>,
    deadline: Instant,
}

/// Collapses a burst of calls into a single invocation
///
/// Trailing mode: every [`call`](Debouncer::call) stores the latest arguments
/// and re-arms the single-shot deadline; [`poll`](Debouncer::poll) yields the
/// arguments once the window has elapsed. Leading mode: the first call in a
/// quiet period fires immediately and later calls only extend the suppression
/// window.
pub struct Debouncer<T> {
    window: Duration,
    edge: DebounceEdge,
    pending: Option<Pending<T>>,
}

impl<T> Debouncer<T> {
    /// Trailing-edge debouncer with the given window
    pub fn new(window: Duration) -> Self {
        Self::with_edge(window, DebounceEdge::Trailing)
    }

    pub fn with_edge(window: Duration, edge: DebounceEdge) -> Self {
        Self {
            window,
            edge,
            pending: None,
        }
    }

    /// Record a call; returns `Some(args)` when the leading edge fires
    pub fn call(&mut self, args: T, now: Instant) -> Option<T> {
        let deadline = now + self.window;
        match self.edge {
            DebounceEdge::Trailing => {
                self.pending = Some(Pending {
                    args: Some(args),
                    deadline,
                });
                None
            }
            DebounceEdge::Leading => {
                let suppressed = self
                    .pending
                    .as_ref()
                    .is_some_and(|pending| now < pending.deadline);
                self.pending = Some(Pending {
                    args: None,
                    deadline,
                });
                if suppressed { None } else { Some(args) }
            }
        }
    }

    /// Check the deadline; returns the pending arguments when a trailing
    /// invocation is due
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        let due = self
            .pending
            .as_ref()
            .is_some_and(|pending| now >= pending.deadline);
        if !due {
            return None;
        }
        // A leading-edge pending carries no args; expiry just re-arms
        self.pending.take().and_then(|pending| pending.args)
    }

    /// Cancel any pending invocation
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    /// Whether a trailing invocation (or leading suppression window) is armed
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// Allows at most one invocation per fixed window
///
/// The first call in a window fires immediately; calls during the window are
/// dropped; the first call after the window fires again.
pub struct Throttler {
    window: Duration,
    last_fired: Option<Instant>,
}

impl Throttler {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_fired: None,
        }
    }

    /// Whether a call at `now` is allowed through
    pub fn allow(&mut self, now: Instant) -> bool {
        match self.last_fired {
            Some(last) if now.duration_since(last) < self.window => false,
            _ => {
                self.last_fired = Some(now);
                true
            }
        }
    }

    /// Reopen the window so the next call fires immediately
    pub fn reset(&mut self) {
        self.last_fired = None;
    }
}
