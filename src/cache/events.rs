//! Event Dispatcher Module
//!
//! Runs user callbacks on insertion and eviction without blocking the store.
//!
//! Each slot holds at most one callback; registering a new one replaces the
//! old one. An empty slot is a no-op and dispatches nothing. Callbacks run on
//! the runtime's blocking pool and are counted until they finish, so
//! [`EventDispatcher::wait`] can act as a join barrier on shutdown.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::runtime::Handle;
use tokio::sync::watch;

/// Callback invoked with the key and value involved in an event.
pub type Callback<V> = Arc<dyn Fn(String, V) + Send + Sync>;

// == Event Dispatcher ==
pub struct EventDispatcher<V> {
    runtime: Handle,
    on_insertion: RwLock<Option<Callback<V>>>,
    on_eviction: RwLock<Option<Callback<V>>>,
    /// Number of callbacks spawned but not yet finished
    pending: Arc<watch::Sender<usize>>,
}

impl<V> EventDispatcher<V>
where
    V: Clone + Send + 'static,
{
    // == Constructor ==
    /// Creates a dispatcher with both slots empty.
    ///
    /// # Arguments
    /// * `runtime` - Runtime whose blocking pool executes the callbacks
    pub fn new(runtime: Handle) -> Self {
        let (pending, _) = watch::channel(0usize);

        Self {
            runtime,
            on_insertion: RwLock::new(None),
            on_eviction: RwLock::new(None),
            pending: Arc::new(pending),
        }
    }

    // == Registration ==
    /// Replaces the insertion callback.
    pub fn set_on_insertion<F>(&self, callback: F)
    where
        F: Fn(String, V) + Send + Sync + 'static,
    {
        *self.on_insertion.write() = Some(Arc::new(callback));
    }

    /// Replaces the eviction callback.
    pub fn set_on_eviction<F>(&self, callback: F)
    where
        F: Fn(String, V) + Send + Sync + 'static,
    {
        *self.on_eviction.write() = Some(Arc::new(callback));
    }

    // == Dispatch ==
    /// Fires the insertion callback, if any.
    pub fn insertion(&self, key: &str, value: &V) {
        self.dispatch(&self.on_insertion, key, value);
    }

    /// Fires the eviction callback, if any.
    pub fn eviction(&self, key: &str, value: &V) {
        self.dispatch(&self.on_eviction, key, value);
    }

    fn dispatch(&self, slot: &RwLock<Option<Callback<V>>>, key: &str, value: &V) {
        let Some(callback) = slot.read().clone() else {
            return;
        };

        let guard = PendingGuard::new(Arc::clone(&self.pending));
        let key = key.to_owned();
        let value = value.clone();

        // Detached: completion is tracked through the guard, not the JoinHandle.
        drop(self.runtime.spawn_blocking(move || {
            let _guard = guard;
            callback(key, value);
        }));
    }

    // == Join Barrier ==
    /// Returns the number of callbacks still running.
    pub fn pending(&self) -> usize {
        *self.pending.borrow()
    }

    /// Waits until every dispatched callback has finished.
    pub async fn wait(&self) {
        let mut rx = self.pending.subscribe();
        // The sender is owned by `self`, so the channel cannot close here.
        let _ = rx.wait_for(|pending| *pending == 0).await;
    }
}

impl<V> fmt::Debug for EventDispatcher<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("on_insertion", &self.on_insertion.read().is_some())
            .field("on_eviction", &self.on_eviction.read().is_some())
            .field("pending", &*self.pending.borrow())
            .finish()
    }
}

// == Pending Guard ==
/// Counts one in-flight callback. Decrements on drop, including when the
/// callback panics or the task never runs.
struct PendingGuard {
    pending: Arc<watch::Sender<usize>>,
}

impl PendingGuard {
    fn new(pending: Arc<watch::Sender<usize>>) -> Self {
        pending.send_modify(|count| *count += 1);
        Self { pending }
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.pending.send_modify(|count| *count -= 1);
    }
}
