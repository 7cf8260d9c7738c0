//! TTL Cache demo
//!
//! Walks through the cache's main features against the process-wide registry:
//! expiry, lifecycle callbacks and on-demand loading.

use std::any::Any;
use std::thread::sleep;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ttl_cache::{cache, CacheError, CacheItem, Config};

#[derive(Debug)]
struct Document {
    text: String,
    more_data: Vec<u8>,
}

/// Main entry point for the demo.
///
/// # Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Run the expiry, callback and loader scenarios
fn main() -> Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ttl_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let ttl = Duration::from_millis(config.demo_ttl_ms);
    info!("Running demo with a base lifespan of {:?}", ttl);

    expiry_demo(ttl)?;
    callbacks_demo(ttl)?;
    loader_demo()?;

    info!("Demo complete");
    Ok(())
}

/// Adds an expiring item, reads it, waits for it to expire, then flushes.
fn expiry_demo(ttl: Duration) -> Result<()> {
    let table = cache::<String, Document>("expiry");

    table.add(
        "myKey".to_string(),
        ttl,
        Document {
            text: "This is a test!".to_string(),
            more_data: Vec::new(),
        },
    );

    let item = table.value("myKey")?;
    info!(
        "Found item in the cache: {} ({} extra bytes)",
        item.data().text,
        item.data().more_data.len()
    );

    sleep(ttl + ttl / 5);
    match table.value("myKey") {
        Err(CacheError::KeyNotFound) => info!("Item is no longer cached"),
        Err(err) => return Err(err.into()),
        Ok(_) => warn!("Item outlived its lifespan"),
    }

    table.add(
        "myKey".to_string(),
        Duration::ZERO,
        Document {
            text: "This one never expires".to_string(),
            more_data: vec![1, 2, 3],
        },
    );
    table.set_about_to_delete_item_callback(|item| {
        info!("Deleting: {} {} {}", item.key(), item.data().text, item.created_at());
    });
    table.delete("myKey")?;
    table.flush();
    Ok(())
}

/// Shows the added, about-to-delete and about-to-expire callbacks.
fn callbacks_demo(ttl: Duration) -> Result<()> {
    let table = cache::<String, String>("callbacks");

    table.set_added_item_callback(|item| {
        info!("Added: {} {} {}", item.key(), item.data(), item.created_at());
    });
    table.set_about_to_delete_item_callback(|item| {
        info!(
            "Deleting: {} {} {} (hit {} times)",
            item.key(),
            item.data(),
            item.created_at(),
            item.access_count()
        );
    });

    table.add("someKey".to_string(), Duration::ZERO, "this is data".to_string());
    let item = table.value("someKey")?;
    info!("Found the value in cache: {}", item.data());

    // Never fires on expiry since the lifespan is zero, only on the delete below
    item.set_about_to_expire_callback(|key| info!("Removing never-expiring item: {}", key));
    table.delete("someKey")?;

    let item = table.add("anotherKey".to_string(), ttl, "this is another test".to_string());
    item.set_about_to_expire_callback(|key| info!("About to expire: {}", key));

    sleep(ttl + ttl / 2);
    info!("Items left in table {}: {}", table.name(), table.count());
    Ok(())
}

/// Loads missing keys on demand and lists what ended up in the table.
fn loader_demo() -> Result<()> {
    let table = cache::<String, String>("loader");

    table.set_data_loader(|key: &String, _args: &[&dyn Any]| {
        // A real loader would read from a database, file or network
        let value = format!("this is a mock value with key {}", key);
        Some(CacheItem::new(key.clone(), Duration::ZERO, value))
    });

    table.add("myKey".to_string(), Duration::ZERO, "this is a test".to_string());

    for i in 0..10 {
        match table.value(format!("someKey_{}", i).as_str()) {
            Ok(item) => info!("Found the value in cache: {}", item.key()),
            Err(err) => warn!("Error retrieving value from cache: {}", err),
        }
    }

    table.foreach(|key, _| info!("KEY: {}", key));

    let top = table.most_accessed(3);
    info!(
        "Most accessed keys: {:?}",
        top.iter().map(|item| item.key()).collect::<Vec<_>>()
    );
    Ok(())
}
