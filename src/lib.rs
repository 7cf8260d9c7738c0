//! TTL Cache - A thread-safe in-process key/value cache
//!
//! Items live in independently named tables and expire after a configurable
//! idle period. Tables support added/about-to-delete/about-to-expire callbacks
//! and a data loader for misses.

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{cache, CacheItem, CacheTable};
pub use config::Config;
pub use error::{CacheError, Result};
