//! Cache Module
//!
//! Provides named in-memory tables with idle-time expiration and lifecycle callbacks.

mod item;
mod registry;
mod table;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use item::{AboutToExpireCallback, CacheItem};
pub use registry::cache;
pub use table::{CacheTable, DataLoader, ItemCallback, Logger};
