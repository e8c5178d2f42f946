//! Cache Metrics Module
//!
//! Tracks cache activity: insertions, hits, misses and evictions.
//!
//! Two sinks share one interface. [`AtomicMetrics`] counts, [`NoopMetrics`]
//! ignores everything. The store picks one at construction and never checks
//! which one it holds afterwards.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

// == Metrics Sink ==
/// Counter capability set consumed by the cache store.
///
/// All methods take `&self` and must be safe to call from any number of
/// threads at once.
pub trait MetricsSink: Send + Sync + Debug {
    /// Number of `set`-like calls
    fn insertions(&self) -> u64;
    /// Number of lookups that returned a live value
    fn hits(&self) -> u64;
    /// Number of lookups that found nothing or an expired value
    fn misses(&self) -> u64;
    /// Number of keys removed by delete, get-delete or the expiration sweep
    fn evictions(&self) -> u64;

    fn incr_insertions(&self);
    fn incr_hits(&self);
    fn incr_misses(&self);
    fn incr_evictions(&self);

    /// Zeroes every counter.
    fn reset(&self);

    // == Snapshot ==
    /// Captures the current counter values.
    fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot::new(self.insertions(), self.hits(), self.misses(), self.evictions())
    }
}

// == Atomic Metrics ==
/// Counting sink backed by four independent atomics.
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    insertions: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl AtomicMetrics {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetricsSink for AtomicMetrics {
    fn insertions(&self) -> u64 {
        self.insertions.load(Ordering::Relaxed)
    }

    fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    fn incr_insertions(&self) {
        self.insertions.fetch_add(1, Ordering::Relaxed);
    }

    fn incr_hits(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn incr_misses(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn incr_evictions(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    fn reset(&self) {
        self.insertions.store(0, Ordering::Relaxed);
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }
}

// == Noop Metrics ==
/// Sink used when metrics are disabled. Every reader returns 0.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn insertions(&self) -> u64 {
        0
    }

    fn hits(&self) -> u64 {
        0
    }

    fn misses(&self) -> u64 {
        0
    }

    fn evictions(&self) -> u64 {
        0
    }

    fn incr_insertions(&self) {}

    fn incr_hits(&self) {}

    fn incr_misses(&self) {}

    fn incr_evictions(&self) {}

    fn reset(&self) {}
}

// == Metrics Snapshot ==
/// Point-in-time copy of the counters, suitable for logging or export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub insertions: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// hits / (hits + misses), 0.0 when nothing was looked up
    pub hit_rate: f64,
    pub captured_at: DateTime<Utc>,
}

impl MetricsSnapshot {
    fn new(insertions: u64, hits: u64, misses: u64, evictions: u64) -> Self {
        let lookups = hits + misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            hits as f64 / lookups as f64
        };

        Self {
            insertions,
            hits,
            misses,
            evictions,
            hit_rate,
            captured_at: Utc::now(),
        }
    }
}
