//! Cache Handle Module
//!
//! Owns a [`CacheStore`] together with its background cleaner and exposes the
//! shutdown path.

use std::ops::Deref;
use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::cache::CacheStore;
use crate::config::Config;
use crate::error::Result;
use crate::tasks::{Cleaner, ExpirationSweep};

// == Cache ==
/// An in-process key/value cache with TTL expiration.
///
/// Dereferences to [`CacheStore`], which carries every read and write
/// operation. If the configured cleanup interval is non-zero, a background
/// task purges expired entries on that interval.
///
/// ```
/// use std::time::Duration;
/// use mini_cache::{Cache, Config};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> mini_cache::Result<()> {
/// let cache = Cache::new(Config::new().ttl(Duration::from_secs(60)).enable_metrics())?;
///
/// cache.set("user:1", "Alice".to_string());
/// assert_eq!(cache.get("user:1"), Some("Alice".to_string()));
/// assert_eq!(cache.metrics().hits(), 1);
///
/// cache.close().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Cache<V>
where
    V: Clone + Send + Sync + 'static,
{
    store: Arc<CacheStore<V>>,
    /// None when the cleanup interval is zero
    cleaner: Option<Cleaner>,
    config: Config,
}

impl<V> Cache<V>
where
    V: Clone + Send + Sync + 'static,
{
    // == Constructors ==
    /// Creates a cache bound to the tokio runtime the caller is running in.
    ///
    /// # Errors
    /// Returns [`CacheError::NoRuntime`](crate::CacheError::NoRuntime) when
    /// called outside a tokio runtime.
    pub fn new(config: Config) -> Result<Self> {
        let runtime = Handle::try_current()?;
        Ok(Self::with_runtime(config, runtime))
    }

    /// Creates a cache that runs its cleaner and event callbacks on `runtime`.
    pub fn with_runtime(config: Config, runtime: Handle) -> Self {
        let store = Arc::new(CacheStore::new(&config, runtime.clone()));

        let cleaner = if config.cleanup_interval.is_zero() {
            debug!("Cleanup interval is zero, background cleanup disabled");
            None
        } else {
            let cleaner = Cleaner::new(config.cleanup_interval);
            let target: Arc<dyn ExpirationSweep> = store.clone();
            cleaner.start(Arc::downgrade(&target), &runtime);
            Some(cleaner)
        };

        info!(
            "Cache initialized: ttl={:?}, cleanup_interval={:?}, metrics={}",
            config.ttl, config.cleanup_interval, config.enable_metrics
        );

        Self {
            store,
            cleaner,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns a shareable handle to the underlying store.
    ///
    /// The store outlives the cache if the handle is kept, but background
    /// cleanup stops once the cache is dropped or closed.
    pub fn store(&self) -> Arc<CacheStore<V>> {
        Arc::clone(&self.store)
    }

    /// Returns true while the background cleaner is running.
    pub fn is_cleaner_running(&self) -> bool {
        self.cleaner.as_ref().is_some_and(Cleaner::is_running)
    }

    /// Returns the number of event callbacks that have not finished yet.
    pub fn pending_events(&self) -> usize {
        self.store.events().pending()
    }

    // == Close ==
    /// Stops background cleanup and waits for every dispatched event callback.
    ///
    /// Stored entries are kept, so the cache stays usable (without background
    /// cleanup) afterwards. Closing twice is harmless.
    pub async fn close(&self) {
        if let Some(cleaner) = &self.cleaner {
            debug!("[close] stopping cleaner");
            cleaner.stop();
        }

        debug!("[close] waiting for the execution of all events");
        self.store.events().wait().await;
    }
}

impl<V> Deref for Cache<V>
where
    V: Clone + Send + Sync + 'static,
{
    type Target = CacheStore<V>;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

impl<V> Drop for Cache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        if let Some(cleaner) = &self.cleaner {
            cleaner.stop();
        }
    }
}
