//! Cache Item Module
//!
//! Defines a single stored value together with its optional expiration deadline.

use std::time::{Duration, Instant};

// == Item ==
/// A single value held by the cache.
///
/// The deadline is fixed at creation. Changing the TTL of a key means
/// replacing its item entirely.
#[derive(Debug, Clone)]
pub struct Item<V> {
    /// The stored value
    pub value: V,
    /// TTL requested at creation, `Duration::ZERO` = no expiration
    pub ttl: Duration,
    /// Absolute deadline, None = no expiration
    pub expires_at: Option<Instant>,
}

impl<V> Item<V> {
    // == Constructor ==
    /// Creates a new item.
    ///
    /// # Arguments
    /// * `value` - The value to store
    /// * `ttl` - Time to live; `Duration::ZERO` means the item never expires
    ///
    /// A TTL too large to be represented as a deadline (e.g. `Duration::MAX`)
    /// also stores the item without expiration.
    pub fn new(value: V, ttl: Duration) -> Self {
        let expires_at = if ttl.is_zero() {
            None
        } else {
            Instant::now().checked_add(ttl)
        };

        Self {
            value,
            ttl,
            expires_at,
        }
    }

    // == Expired ==
    /// Checks whether the item is expired at `now`.
    ///
    /// An item is expired strictly after its deadline. Items without a
    /// deadline never expire.
    pub fn expired_at(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(deadline) => now > deadline,
            None => false,
        }
    }

    /// Checks whether the item is expired right now.
    pub fn expired(&self) -> bool {
        self.expired_at(Instant::now())
    }

    // == Can Expire ==
    /// Returns true if the item carries a deadline.
    pub fn can_expire(&self) -> bool {
        self.expires_at.is_some()
    }

    // == Time To Live ==
    /// Returns the time left before expiration, or None if no expiration is set.
    ///
    /// # Returns
    /// - `Some(Duration::ZERO)` if the deadline has passed
    /// - `Some(remaining)` if the item has a deadline in the future
    /// - `None` if the item never expires
    pub fn ttl_remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}
