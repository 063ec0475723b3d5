//! High/low watermark tracking for outbound queues.
//!
//! The owner of an outbound queue reports every size change to a
//! [`SaturationManager`]. The manager answers with a
//! [`SaturationStateChange`], and that answer is the only signal the owner
//! should use to pause or resume its producers.
//!
//! ```text
//!   queue size
//!       ▲
//!  high ┤─ ─ ─ ─ ─ ─ ╱╲─ ─ ─ ─ ─   > high while clear  → Saturated
//!       │           ╱  ╲
//!       │    ──────╱    ╲          in between          → NoChange
//!   low ┤─ ─╱─ ─ ─ ─ ─ ─ ╲─ ─ ─   <= low while latched → Desaturated
//!       └──────────────────────▶
//! ```
//!
//! The latch flips by compare-and-swap, so when many writers cross a
//! watermark together exactly one of them sees the transition.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

/// Default low watermark (32 KiB).
pub const DEFAULT_LOW_WATER_MARK: u32 = 32 * 1024;

/// Default high watermark (64 KiB).
pub const DEFAULT_HIGH_WATER_MARK: u32 = 64 * 1024;

/// Outcome of a queue size change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaturationStateChange {
    /// The queue climbed above the high watermark: pause producers.
    Saturated,
    /// The queue fell to or below the low watermark: resume producers.
    Desaturated,
    NoChange,
}

/// The pair of thresholds a [`SaturationManager`] compares against.
///
/// `low` must not exceed `high`. This is not checked: inverted watermarks
/// make the latch flip on every delta that lands between them.
///
/// Both marks are `u32` so the pair packs into one atomic word and is always
/// read whole. The queue size is `i64` and may run past `u32::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Watermarks {
    /// Desaturation point: a queue at or below this clears saturation.
    pub low: u32,
    /// Saturation point: a queue above this sets saturation.
    pub high: u32,
}

impl Watermarks {
    pub const fn new(low: u32, high: u32) -> Self {
        Self { low, high }
    }

    /// True when `low <= high`.
    pub const fn is_ordered(&self) -> bool {
        self.low <= self.high
    }

    const fn pack(self) -> u64 {
        ((self.high as u64) << 32) | self.low as u64
    }

    const fn unpack(word: u64) -> Self {
        Self {
            low: word as u32,
            high: (word >> 32) as u32,
        }
    }
}

impl Default for Watermarks {
    fn default() -> Self {
        Self::new(DEFAULT_LOW_WATER_MARK, DEFAULT_HIGH_WATER_MARK)
    }
}

/// Tracks pending outbound bytes and latches saturation between two
/// watermarks.
///
/// All methods take `&self` and are lock-free; share it behind an `Arc`.
#[derive(Debug)]
pub struct SaturationManager {
    /// Both watermarks in one word so readers never see a torn pair.
    watermarks: AtomicU64,
    queue_size: AtomicI64,
    saturated: AtomicBool,
}

impl SaturationManager {
    /// Create a manager with an empty queue, not saturated.
    pub fn new(watermarks: Watermarks) -> Self {
        Self {
            watermarks: AtomicU64::new(watermarks.pack()),
            queue_size: AtomicI64::new(0),
            saturated: AtomicBool::new(false),
        }
    }

    /// Add `size_delta` to the queue size and report whether that crossed a
    /// watermark.
    ///
    /// Positive deltas are bytes enqueued, negative deltas bytes flushed. A
    /// zero delta re-evaluates the current size against the current
    /// watermarks.
    pub fn apply_delta(&self, size_delta: i64) -> SaturationStateChange {
        let new_size = self
            .queue_size
            .fetch_add(size_delta, Ordering::AcqRel)
            .wrapping_add(size_delta);
        let marks = self.watermarks();

        let change = if new_size <= i64::from(marks.low) {
            if self
                .saturated
                .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                SaturationStateChange::Desaturated
            } else {
                SaturationStateChange::NoChange
            }
        } else if new_size > i64::from(marks.high) {
            if self
                .saturated
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                SaturationStateChange::Saturated
            } else {
                SaturationStateChange::NoChange
            }
        } else {
            SaturationStateChange::NoChange
        };

        match change {
            SaturationStateChange::NoChange => {
                tracing::trace!(size_delta, new_size, "queue size changed");
            }
            _ => {
                tracing::debug!(
                    size_delta,
                    new_size,
                    low = marks.low,
                    high = marks.high,
                    ?change,
                    "saturation state changed"
                );
            }
        }
        change
    }

    /// Replace both watermarks.
    ///
    /// Takes effect for subsequent [`apply_delta`](Self::apply_delta) calls
    /// only; the current queue size is not re-evaluated here.
    pub fn update_thresholds(&self, watermarks: Watermarks) {
        self.watermarks.store(watermarks.pack(), Ordering::Release);
    }

    pub fn watermarks(&self) -> Watermarks {
        Watermarks::unpack(self.watermarks.load(Ordering::Acquire))
    }

    pub fn queue_size(&self) -> i64 {
        self.queue_size.load(Ordering::Acquire)
    }

    pub fn is_saturated(&self) -> bool {
        self.saturated.load(Ordering::Acquire)
    }
}

impl Default for SaturationManager {
    fn default() -> Self {
        Self::new(Watermarks::default())
    }
}
