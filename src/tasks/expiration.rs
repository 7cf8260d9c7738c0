//! Expiration Timer
//!
//! One-shot timers that wake a table exactly when its next item is due.
//!
//! Timers run on a dedicated runtime owned by the crate so tables work the same
//! from plain threads and from inside a caller's async runtime.

use std::time::Duration;

use once_cell::sync::Lazy;
use tokio::runtime::{Builder, Runtime};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Config;

static RUNTIME: Lazy<Runtime> = Lazy::new(|| {
    let config = Config::from_env();
    info!(
        "Starting expiration runtime: workers={}, thread_name={}",
        config.expiration_workers, config.expiration_thread_name
    );

    Builder::new_multi_thread()
        .worker_threads(config.expiration_workers)
        .thread_name(config.expiration_thread_name)
        .enable_time()
        .build()
        .expect("Failed to build expiration runtime")
});

// == Expiration Timer ==
/// A pending one-shot expiration check.
///
/// Dropping the timer does not cancel it; call [`ExpirationTimer::cancel`].
#[derive(Debug)]
pub struct ExpirationTimer {
    handle: JoinHandle<()>,
}

impl ExpirationTimer {
    /// Cancels the timer if it has not fired yet.
    ///
    /// A check that already started on the blocking pool runs to completion.
    pub fn cancel(self) {
        self.handle.abort();
    }
}

/// Arms a one-shot timer that runs `check` after `delay`.
///
/// The check runs on the runtime's blocking pool because it takes the table
/// lock and invokes user callbacks.
///
/// # Arguments
/// * `delay` - How long to wait before running the check
/// * `check` - The expiration scan to run
///
/// # Example
/// ```ignore
/// let timer = schedule_expiration_check(Duration::from_secs(1), move || table.expiration_check());
/// // A sooner item arrived:
/// timer.cancel();
/// ```
pub fn schedule_expiration_check<F>(delay: Duration, check: F) -> ExpirationTimer
where
    F: FnOnce() + Send + 'static,
{
    let handle = RUNTIME.spawn(async move {
        tokio::time::sleep(delay).await;
        debug!("Expiration timer fired after {:?}", delay);

        if let Err(err) = tokio::task::spawn_blocking(check).await {
            if err.is_panic() {
                warn!("Expiration check panicked: {}", err);
            }
        }
    });

    ExpirationTimer { handle }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread::sleep;

    #[test]
    fn test_timer_fires_after_delay() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();

        let _timer = schedule_expiration_check(Duration::from_millis(50), move || {
            flag.store(true, Ordering::SeqCst);
        });
        assert!(!fired.load(Ordering::SeqCst));

        sleep(Duration::from_millis(500));
        assert!(fired.load(Ordering::SeqCst), "Timer should have fired");
    }

    #[test]
    fn test_timer_can_be_cancelled() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();

        let timer = schedule_expiration_check(Duration::from_millis(200), move || {
            flag.store(true, Ordering::SeqCst);
        });
        timer.cancel();

        sleep(Duration::from_millis(500));
        assert!(!fired.load(Ordering::SeqCst), "Cancelled timer must not fire");
    }

    #[tokio::test]
    async fn test_timer_works_inside_caller_runtime() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();

        let _timer = schedule_expiration_check(Duration::from_millis(20), move || {
            flag.store(true, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(fired.load(Ordering::SeqCst));
    }
}
