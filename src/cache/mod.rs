//! Cache Module
//!
//! Provides in-memory caching with TTL expiration, metrics and events.

mod events;
mod handle;
mod item;
mod metrics;
mod store;


// Re-export public types
pub use events::{Callback, EventDispatcher};
pub use handle::Cache;
pub use item::Item;
pub use metrics::{AtomicMetrics, MetricsSink, MetricsSnapshot, NoopMetrics};
pub use store::CacheStore;
