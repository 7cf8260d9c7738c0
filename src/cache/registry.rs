//! Cache Registry Module
//!
//! Process-wide mapping from table name to table, created lazily on first access.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::cache::CacheTable;

/// Tables are namespaced by their key/value types as well as by name.
type TableId = (TypeId, String);

type SharedTable = Arc<dyn Any + Send + Sync>;

static TABLES: Lazy<RwLock<HashMap<TableId, SharedTable>>> = Lazy::new(|| RwLock::new(HashMap::new()));

fn downcast_table<K, V>(table: &SharedTable) -> Option<Arc<CacheTable<K, V>>>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    Arc::clone(table).downcast::<CacheTable<K, V>>().ok()
}

// == Cache Accessor ==
/// Returns the table called `name`, creating it on first access.
///
/// The same name always yields the same table for a given `K`/`V` pair. Tables
/// live for the rest of the process once created.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use ttl_cache::cache::cache;
///
/// let table = cache::<String, u32>("doc-example");
/// table.add("answer".to_string(), Duration::ZERO, 42);
/// assert_eq!(*cache::<String, u32>("doc-example").value("answer").unwrap().data(), 42);
/// ```
pub fn cache<K, V>(name: &str) -> Arc<CacheTable<K, V>>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    let id: TableId = (TypeId::of::<CacheTable<K, V>>(), name.to_string());

    if let Some(table) = TABLES.read().get(&id).and_then(downcast_table::<K, V>) {
        return table;
    }

    let mut tables = TABLES.write();
    // Another caller may have created it between the two locks
    if let Some(table) = tables.get(&id).and_then(downcast_table::<K, V>) {
        return table;
    }

    let table = CacheTable::<K, V>::new(name);
    tables.insert(id, Arc::clone(&table) as SharedTable);
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_same_name_returns_same_table() {
        let first = cache::<String, String>("registry-same");
        let second = cache::<String, String>("registry-same");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.name(), "registry-same");
    }

    #[test]
    fn test_different_names_are_independent() {
        let a = cache::<String, String>("registry-a");
        let b = cache::<String, String>("registry-b");

        a.add("key".to_string(), Duration::ZERO, "value".to_string());

        assert!(!Arc::ptr_eq(&a, &b));
        assert!(a.exists("key"));
        assert!(!b.exists("key"));
    }

    #[test]
    fn test_types_have_separate_namespaces() {
        let strings = cache::<String, String>("registry-typed");
        let numbers = cache::<u64, u64>("registry-typed");

        strings.add("key".to_string(), Duration::ZERO, "value".to_string());
        numbers.add(1, Duration::ZERO, 2);

        assert_eq!(strings.count(), 1);
        assert_eq!(numbers.count(), 1);
    }

    #[test]
    fn test_concurrent_access_creates_one_table() {
        let handles: Vec<_> = (0..8)
            .map(|_| thread::spawn(|| cache::<String, String>("registry-concurrent")))
            .collect();

        let tables: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for table in &tables[1..] {
            assert!(Arc::ptr_eq(&tables[0], table));
        }
    }
}
