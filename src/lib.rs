//! Mini Cache - A lightweight in-process key/value cache
//!
//! Provides a thread-safe store with per-item TTL expiration, background
//! cleanup of expired entries, optional metrics and insertion/eviction events.

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{Cache, CacheStore, MetricsSink, MetricsSnapshot};
pub use config::Config;
pub use error::{CacheError, Result};
