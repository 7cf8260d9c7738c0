//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check table behavior against a plain HashMap model.

use proptest::prelude::*;
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheItem, CacheTable};
use crate::error::CacheError;

// == Strategies ==
/// Generates cache keys from a small alphabet so operations collide often
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-e]{1,2}".prop_map(|s| s)
}

fn value_strategy() -> impl Strategy<Value = u32> {
    any::<u32>()
}

/// A table operation applied to both the table and the model
#[derive(Debug, Clone)]
enum TableOp {
    Add { key: String, value: u32 },
    NotFoundAdd { key: String, value: u32 },
    Value { key: String },
    Delete { key: String },
    Flush,
}

fn table_op_strategy() -> impl Strategy<Value = TableOp> {
    prop_oneof![
        4 => (key_strategy(), value_strategy()).prop_map(|(key, value)| TableOp::Add { key, value }),
        2 => (key_strategy(), value_strategy())
            .prop_map(|(key, value)| TableOp::NotFoundAdd { key, value }),
        4 => key_strategy().prop_map(|key| TableOp::Value { key }),
        2 => key_strategy().prop_map(|key| TableOp::Delete { key }),
        1 => Just(TableOp::Flush),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Non-expiring items behave exactly like a map: add overwrites,
    // not_found_add keeps the first value, delete and flush remove.
    #[test]
    fn prop_table_matches_model(ops in prop::collection::vec(table_op_strategy(), 1..60)) {
        let table: Arc<CacheTable<String, u32>> = CacheTable::new("prop-model");
        let mut model: HashMap<String, u32> = HashMap::new();

        for op in ops {
            match op {
                TableOp::Add { key, value } => {
                    table.add(key.clone(), Duration::ZERO, value);
                    model.insert(key, value);
                }
                TableOp::NotFoundAdd { key, value } => {
                    let added = table.not_found_add(key.clone(), Duration::ZERO, value);
                    prop_assert_eq!(added, !model.contains_key(&key));
                    model.entry(key).or_insert(value);
                }
                TableOp::Value { key } => {
                    match (table.value(key.as_str()), model.get(&key)) {
                        (Ok(item), Some(expected)) => {
                            prop_assert_eq!(item.data(), expected);
                        }
                        (Err(CacheError::KeyNotFound), None) => {}
                        (result, expected) => {
                            prop_assert!(false, "value({}) = {:?}, model has {:?}", key, result, expected);
                        }
                    }
                }
                TableOp::Delete { key } => {
                    let result = table.delete(key.as_str());
                    prop_assert_eq!(result.is_ok(), model.remove(&key).is_some());
                }
                TableOp::Flush => {
                    table.flush();
                    model.clear();
                }
            }

            prop_assert_eq!(table.count(), model.len());
        }
    }

    // Access counts track successful lookups and most_accessed ranks by them.
    #[test]
    fn prop_most_accessed_is_sorted(hits in prop::collection::vec(0usize..8, 1..10), n in 0usize..12) {
        let table: Arc<CacheTable<usize, ()>> = CacheTable::new("prop-ranked");
        for (key, count) in hits.iter().enumerate() {
            table.add(key, Duration::ZERO, ());
            for _ in 0..*count {
                table.value(&key).unwrap();
            }
        }

        let top = table.most_accessed(n);
        prop_assert_eq!(top.len(), n.min(hits.len()));
        for pair in top.windows(2) {
            prop_assert!(pair[0].access_count() >= pair[1].access_count());
        }
        for item in &top {
            prop_assert_eq!(item.access_count() as usize, hits[*item.key()]);
        }

        let mut expected: Vec<usize> = hits.clone();
        expected.sort_unstable_by(|a, b| b.cmp(a));
        let counts: Vec<usize> = top.iter().map(|item| item.access_count() as usize).collect();
        prop_assert_eq!(counts, expected[..top.len()].to_vec());
    }

    // The loader runs once per missing key; later lookups are hits.
    #[test]
    fn prop_loader_runs_once_per_key(keys in prop::collection::vec(key_strategy(), 1..30)) {
        let table: Arc<CacheTable<String, String>> = CacheTable::new("prop-loader");
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        table.set_data_loader(move |key: &String, _args: &[&dyn Any]| {
            counter.fetch_add(1, Ordering::SeqCst);
            Some(CacheItem::new(key.clone(), Duration::ZERO, key.to_uppercase()))
        });

        for key in &keys {
            let item = table.value(key.as_str()).unwrap();
            prop_assert_eq!(item.data(), &key.to_uppercase());
        }

        let distinct: std::collections::HashSet<&String> = keys.iter().collect();
        prop_assert_eq!(calls.load(Ordering::SeqCst), distinct.len());
        prop_assert_eq!(table.count(), distinct.len());
    }
}
