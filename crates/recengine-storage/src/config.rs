//! Storage Configuration
//!
//! Tuning knobs shared by every namespace worker. The defaults match the
//! engine's intended interactive workload; tests shrink the batching window
//! and the compaction thresholds to exercise those paths deterministically.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Bound of the per-namespace request inbox. Posting to a full inbox
    /// suspends the caller (backpressure).
    pub inbox_capacity: usize,

    /// How long the worker waits after the first request of a batch for more
    /// requests to accumulate, amortizing header rewrites and flushes.
    pub batch_window: Duration,

    /// Compact when the delta log outgrows this fraction of the database
    /// file size.
    pub compact_ratio: f64,

    /// Vacuum the database (drop tombstoned slots) when their fraction of
    /// all slots exceeds this after a compaction.
    pub vacuum_ratio: f64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            inbox_capacity: 100,
            batch_window: Duration::from_millis(50),
            compact_ratio: 0.5,
            vacuum_ratio: 0.25,
        }
    }
}
