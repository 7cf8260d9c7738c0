//! Cache Item Module
//!
//! Defines a single cached value together with its access bookkeeping.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

/// Callback invoked with the item's key right before the item is removed.
pub type AboutToExpireCallback<K> = Arc<dyn Fn(&K) + Send + Sync>;

/// Mutable part of an item, guarded by the item's own lock.
struct ItemState<K> {
    accessed_on: Instant,
    access_count: u64,
    about_to_expire: Option<AboutToExpireCallback<K>>,
}

// == Cache Item ==
/// A single cached value plus its access bookkeeping.
///
/// Key, data, lifespan and creation time never change after construction and
/// are read without locking. The last access time, the access counter and the
/// pre-expiry callback live behind the item's own lock, so keep-alive updates
/// on different items never contend on the table lock.
pub struct CacheItem<K, V> {
    key: K,
    data: V,
    /// Idle duration after which the item expires; zero means never
    life_span: Duration,
    created_on: Instant,
    created_at: DateTime<Utc>,
    state: RwLock<ItemState<K>>,
    /// Set once a delete or expiry has claimed the item
    removing: AtomicBool,
}

impl<K, V> CacheItem<K, V> {
    // == Constructor ==
    /// Creates a new item with `created_on == accessed_on == now` and no accesses.
    ///
    /// # Arguments
    /// * `key` - The key the item is stored under
    /// * `life_span` - Idle duration before expiry, `Duration::ZERO` for never
    /// * `data` - The cached payload
    pub fn new(key: K, life_span: Duration, data: V) -> Self {
        let now = Instant::now();
        Self {
            key,
            data,
            life_span,
            created_on: now,
            created_at: Utc::now(),
            state: RwLock::new(ItemState {
                accessed_on: now,
                access_count: 0,
                about_to_expire: None,
            }),
            removing: AtomicBool::new(false),
        }
    }

    // == Keep Alive ==
    /// Marks the item as accessed, restarting its idle clock.
    pub fn keep_alive(&self) {
        let mut state = self.state.write();
        state.accessed_on = Instant::now();
        state.access_count += 1;
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn data(&self) -> &V {
        &self.data
    }

    pub fn life_span(&self) -> Duration {
        self.life_span
    }

    /// Monotonic creation instant.
    pub fn created_on(&self) -> Instant {
        self.created_on
    }

    /// Wall-clock creation time.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the item was last kept alive (or created).
    pub fn accessed_on(&self) -> Instant {
        self.state.read().accessed_on
    }

    /// Returns how often the item has been kept alive.
    pub fn access_count(&self) -> u64 {
        self.state.read().access_count
    }

    // == Expiry Callback ==
    /// Sets a callback that runs right before the item is removed from its table.
    ///
    /// Setting a callback on an item with a zero lifespan is allowed. It still
    /// runs on explicit deletion but the item never expires on its own.
    pub fn set_about_to_expire_callback<F>(&self, f: F)
    where
        F: Fn(&K) + Send + Sync + 'static,
    {
        self.state.write().about_to_expire = Some(Arc::new(f));
    }

    /// Claims the item for removal. Returns false if it was already claimed.
    pub(crate) fn begin_removal(&self) -> bool {
        !self.removing.swap(true, Ordering::AcqRel)
    }

    /// Runs the pre-expiry callback, if any, while holding the item's read lock.
    pub(crate) fn notify_about_to_expire(&self) {
        let state = self.state.read();
        if let Some(callback) = state.about_to_expire.as_ref() {
            callback(&self.key);
        }
    }

    // == Time To Live ==
    /// Returns the idle time left at `now`, or `None` if the item never expires.
    ///
    /// # Returns
    /// - `None` if the lifespan is zero
    /// - `Some(Duration::ZERO)` if the item has been idle for at least its lifespan
    /// - `Some(remaining)` otherwise
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        if self.life_span.is_zero() {
            return None;
        }
        let idle = now.saturating_duration_since(self.accessed_on());
        Some(self.life_span.saturating_sub(idle))
    }

    /// Returns true if the item has a lifespan and has been idle for at least that long.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.remaining(now).is_some_and(|left| left.is_zero())
    }

    /// Splits the item into its key, lifespan and data.
    pub fn into_parts(self) -> (K, Duration, V) {
        (self.key, self.life_span, self.data)
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for CacheItem<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("CacheItem")
            .field("key", &self.key)
            .field("data", &self.data)
            .field("life_span", &self.life_span)
            .field("created_at", &self.created_at)
            .field("access_count", &state.access_count)
            .finish()
    }
}
