//! Cache Table Module
//!
//! A named table of cache items with idle-time expiration driven by a
//! self-adjusting one-shot timer, plus lifecycle callbacks and a data loader.
//!
//! # Locking
//! A single reader/writer lock guards the items, the timer state and the
//! callback slots. Callbacks and the loader are cloned out of the table while
//! the lock is held and invoked after it is released, so a callback may call
//! back into the same table. The logger sink is the exception: it runs with the
//! lock held and must not touch the table.

use std::any::Any;
use std::borrow::Borrow;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{RwLock, RwLockWriteGuard};
use tracing::{debug, info};

use crate::cache::CacheItem;
use crate::error::{CacheError, Result};
use crate::tasks::{schedule_expiration_check, ExpirationTimer};

/// Loader invoked on a miss with the key and the caller's extra arguments.
pub type DataLoader<K, V> = Arc<dyn Fn(&K, &[&dyn Any]) -> Option<CacheItem<K, V>> + Send + Sync>;

/// Callback receiving an item that was added or is about to be deleted.
pub type ItemCallback<K, V> = Arc<dyn Fn(&CacheItem<K, V>) + Send + Sync>;

/// Sink receiving human-readable diagnostic lines.
pub type Logger = Arc<dyn Fn(&str) + Send + Sync>;

/// Longest delay a timer is armed with; the check re-arms itself on wake.
const MAX_TIMER_DELAY: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Everything guarded by the table lock.
struct TableState<K, V> {
    items: HashMap<K, Arc<CacheItem<K, V>>>,
    /// Delay the pending timer was armed with, None when disarmed
    cleanup_interval: Option<Duration>,
    /// Instant the pending timer fires at
    cleanup_deadline: Option<Instant>,
    cleanup_timer: Option<ExpirationTimer>,
    load_data: Option<DataLoader<K, V>>,
    added_item: Option<ItemCallback<K, V>>,
    about_to_delete_item: Option<ItemCallback<K, V>>,
    logger: Option<Logger>,
}

impl<K, V> TableState<K, V> {
    fn disarm(&mut self) {
        self.cleanup_interval = None;
        self.cleanup_deadline = None;
        if let Some(timer) = self.cleanup_timer.take() {
            timer.cancel();
        }
    }
}

// == Cache Table ==
/// A named, thread-safe table of expiring cache items.
///
/// Tables are always shared through an `Arc`; the expiration timer keeps a weak
/// reference back to its table and stops once the table is dropped.
pub struct CacheTable<K, V> {
    name: String,
    state: RwLock<TableState<K, V>>,
    this: Weak<CacheTable<K, V>>,
}

impl<K, V> CacheTable<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates an empty table. Most callers go through [`crate::cache::cache`].
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        let name = name.into();
        info!("Creating cache table {}", name);

        Arc::new_cyclic(|this| Self {
            name,
            state: RwLock::new(TableState {
                items: HashMap::new(),
                cleanup_interval: None,
                cleanup_deadline: None,
                cleanup_timer: None,
                load_data: None,
                added_item: None,
                about_to_delete_item: None,
                logger: None,
            }),
            this: this.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns how many items are currently stored.
    pub fn count(&self) -> usize {
        self.state.read().items.len()
    }

    // == Foreach ==
    /// Visits every item under the shared read lock.
    ///
    /// The visitor must not add or delete items on this table.
    pub fn foreach<F>(&self, mut visit: F)
    where
        F: FnMut(&K, &Arc<CacheItem<K, V>>),
    {
        let state = self.state.read();
        for (key, item) in state.items.iter() {
            visit(key, item);
        }
    }

    // == Callback Setters ==
    /// Sets the loader called when a lookup misses.
    pub fn set_data_loader<F>(&self, f: F)
    where
        F: Fn(&K, &[&dyn Any]) -> Option<CacheItem<K, V>> + Send + Sync + 'static,
    {
        self.state.write().load_data = Some(Arc::new(f));
    }

    /// Sets the callback called after a new item is added.
    pub fn set_added_item_callback<F>(&self, f: F)
    where
        F: Fn(&CacheItem<K, V>) + Send + Sync + 'static,
    {
        self.state.write().added_item = Some(Arc::new(f));
    }

    /// Sets the callback called before an item is deleted or expires.
    pub fn set_about_to_delete_item_callback<F>(&self, f: F)
    where
        F: Fn(&CacheItem<K, V>) + Send + Sync + 'static,
    {
        self.state.write().about_to_delete_item = Some(Arc::new(f));
    }

    /// Sets a sink that receives the table's diagnostic lines.
    ///
    /// Lines are still emitted through `tracing` regardless of the sink.
    pub fn set_logger<F>(&self, f: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.state.write().logger = Some(Arc::new(f));
    }

    // == Add ==
    /// Adds a key/value pair, replacing any item stored under the same key.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `life_span` - Idle duration before expiry, `Duration::ZERO` for never
    /// * `data` - The value to store
    pub fn add(&self, key: K, life_span: Duration, data: V) -> Arc<CacheItem<K, V>> {
        let item = Arc::new(CacheItem::new(key, life_span, data));
        let state = self.state.write();
        self.add_internal(state, Arc::clone(&item));
        item
    }

    // == Not Found Add ==
    /// Adds the pair only if the key is absent. Returns whether it was added.
    ///
    /// The existence check and the insertion happen under one write lock.
    pub fn not_found_add(&self, key: K, life_span: Duration, data: V) -> bool {
        let state = self.state.write();
        if state.items.contains_key(&key) {
            return false;
        }

        let item = Arc::new(CacheItem::new(key, life_span, data));
        self.add_internal(state, item);
        true
    }

    /// Inserts `item` and consumes the write guard, releasing it before callbacks run.
    fn add_internal(&self, mut state: RwLockWriteGuard<'_, TableState<K, V>>, item: Arc<CacheItem<K, V>>) {
        self.log(
            &state,
            format_args!(
                "Adding item with key {:?} and lifespan of {:?} to table {}",
                item.key(),
                item.life_span(),
                self.name
            ),
        );
        state.items.insert(item.key().clone(), Arc::clone(&item));

        let deadline = state.cleanup_deadline;
        let added_item = state.added_item.clone();
        drop(state);

        if let Some(callback) = added_item {
            callback(&item);
        }

        // Re-evaluate only when this item is due before the armed timer
        if item.life_span().is_zero() {
            return;
        }
        // A due time past the end of Instant cannot beat an armed deadline
        let due = item.accessed_on().checked_add(item.life_span());
        let sooner = match (due, deadline) {
            (_, None) => true,
            (Some(due), Some(deadline)) => due < deadline,
            (None, Some(_)) => false,
        };
        if sooner {
            self.expiration_check();
        }
    }

    // == Value ==
    /// Returns the item stored under `key` and keeps it alive.
    ///
    /// On a miss the data loader, if configured, is asked for the item with no
    /// extra arguments. See [`CacheTable::value_with_args`].
    pub fn value<Q>(&self, key: &Q) -> Result<Arc<CacheItem<K, V>>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        self.value_with_args(key, &[])
    }

    /// Returns the item stored under `key`, passing `args` to the loader on a miss.
    ///
    /// # Errors
    /// - `KeyNotFound` if the key is absent and no loader is configured
    /// - `KeyNotFoundOrLoadable` if the loader returned nothing
    ///
    /// A panicking loader propagates to the caller.
    pub fn value_with_args<Q>(&self, key: &Q, args: &[&dyn Any]) -> Result<Arc<CacheItem<K, V>>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        let (found, load_data) = {
            let state = self.state.read();
            (state.items.get(key).cloned(), state.load_data.clone())
        };

        if let Some(item) = found {
            item.keep_alive();
            return Ok(item);
        }

        let load_data = load_data.ok_or(CacheError::KeyNotFound)?;
        let key = key.to_owned();
        match load_data(&key, args) {
            Some(loaded) => {
                let (_, life_span, data) = loaded.into_parts();
                Ok(self.add(key, life_span, data))
            }
            None => Err(CacheError::KeyNotFoundOrLoadable),
        }
    }

    // == Delete ==
    /// Deletes the item stored under `key` and returns it.
    ///
    /// The table's about-to-delete callback runs first, then the item's own
    /// about-to-expire callback, then the item is removed. An item already being
    /// removed by another delete or by expiry is reported as `KeyNotFound`.
    pub fn delete<Q>(&self, key: &Q) -> Result<Arc<CacheItem<K, V>>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut state = self.state.write();
        self.delete_internal(&mut state, key)
    }

    /// Runs the delete callbacks with the lock released, then removes the item.
    ///
    /// The guard is held again on return. If the key was replaced while the
    /// lock was released, the newer item stays in place. An item whose removal
    /// is already in progress counts as absent, so its callbacks run once.
    fn delete_internal<Q>(
        &self,
        state: &mut RwLockWriteGuard<'_, TableState<K, V>>,
        key: &Q,
    ) -> Result<Arc<CacheItem<K, V>>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let item = state.items.get(key).cloned().ok_or(CacheError::KeyNotFound)?;
        // Another delete or the expiration scan is already running its callbacks
        if !item.begin_removal() {
            return Err(CacheError::KeyNotFound);
        }
        let about_to_delete_item = state.about_to_delete_item.clone();

        RwLockWriteGuard::unlocked(state, || {
            if let Some(callback) = about_to_delete_item {
                callback(&item);
            }
            item.notify_about_to_expire();
        });

        self.log(
            state,
            format_args!(
                "Deleting item with key {:?} created on {} and hit {} times from table {}",
                item.key(),
                item.created_at(),
                item.access_count(),
                self.name
            ),
        );
        if state
            .items
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, &item))
        {
            state.items.remove(key);
        }

        Ok(item)
    }

    // == Exists ==
    /// Returns whether `key` is stored. Never calls the loader or touches access stats.
    pub fn exists<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.state.read().items.contains_key(key)
    }

    // == Flush ==
    /// Removes every item and disarms the expiration timer.
    ///
    /// No delete or expire callbacks run: a flush is a bulk reset.
    pub fn flush(&self) {
        let mut state = self.state.write();
        info!("Flushing table {}", self.name);
        self.log(&state, format_args!("Flushing table {}", self.name));

        state.items.clear();
        state.disarm();
    }

    // == Most Accessed ==
    /// Returns up to `count` items ordered by descending access count.
    ///
    /// Ties come back in no particular order.
    pub fn most_accessed(&self, count: usize) -> Vec<Arc<CacheItem<K, V>>> {
        let state = self.state.read();

        let mut ranked: Vec<(u64, &Arc<CacheItem<K, V>>)> = state
            .items
            .values()
            .map(|item| (item.access_count(), item))
            .collect();
        ranked.sort_unstable_by_key(|(hits, _)| Reverse(*hits));

        ranked
            .into_iter()
            .take(count)
            .map(|(_, item)| Arc::clone(item))
            .collect()
    }

    // == Expiration Check ==
    /// Deletes expired items and re-arms the timer for the next one due.
    ///
    /// Runs on the timer's thread when the timer fires, and inline from `add`
    /// when a new item is due before the armed timer.
    fn expiration_check(&self) {
        let mut state = self.state.write();
        if let Some(timer) = state.cleanup_timer.take() {
            timer.cancel();
        }
        match state.cleanup_interval {
            Some(interval) => self.log(
                &state,
                format_args!("Expiration check triggered after {:?} for table {}", interval, self.name),
            ),
            None => self.log(
                &state,
                format_args!("Expiration check installed for table {}", self.name),
            ),
        }

        let now = Instant::now();
        let expired: Vec<Arc<CacheItem<K, V>>> = state
            .items
            .values()
            .filter(|item| item.is_expired(now))
            .cloned()
            .collect();

        for item in expired {
            // Skip keys deleted or replaced while an earlier callback ran
            let unchanged = state
                .items
                .get(item.key())
                .is_some_and(|current| Arc::ptr_eq(current, &item));
            if unchanged && self.delete_internal(&mut state, item.key()).is_err() {
                debug!("Item {:?} in table {} is already being deleted", item.key(), self.name);
            }
        }

        let now = Instant::now();
        let smallest = state
            .items
            .values()
            .filter_map(|item| item.remaining(now))
            .min();

        // A concurrent add may have armed a timer while callbacks ran
        state.disarm();
        let Some(delay) = smallest.map(|delay| delay.min(MAX_TIMER_DELAY)) else {
            debug!("No expiring items left in table {}, timer disarmed", self.name);
            return;
        };

        self.log(
            &state,
            format_args!("Next expiration check for table {} in {:?}", self.name, delay),
        );
        let table = self.this.clone();
        state.cleanup_interval = Some(delay);
        state.cleanup_deadline = Some(now + delay);
        state.cleanup_timer = Some(schedule_expiration_check(delay, move || {
            if let Some(table) = table.upgrade() {
                table.expiration_check();
            }
        }));
    }

    /// Emits a diagnostic line through tracing and the optional sink.
    fn log(&self, state: &TableState<K, V>, message: fmt::Arguments<'_>) {
        let line = message.to_string();
        debug!(table = %self.name, "{}", line);
        if let Some(logger) = state.logger.as_ref() {
            logger(&line);
        }
    }
}

impl<K, V> Drop for CacheTable<K, V> {
    fn drop(&mut self) {
        self.state.get_mut().disarm();
    }
}

impl<K, V> fmt::Debug for CacheTable<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("CacheTable")
            .field("name", &self.name)
            .field("items", &state.items.len())
            .field("cleanup_interval", &state.cleanup_interval)
            .finish()
    }
}
