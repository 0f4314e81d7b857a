//! Background Expiry Sweeper
//!
//! Reads never return an expired record, so correctness does not depend on
//! this task. It exists to reclaim memory held by records that expire and
//! are never looked up again ("active expiry").
//!
//! ## Design
//!
//! The sweeper runs as a Tokio task and on every tick:
//! 1. Sleeps for the current interval
//! 2. Removes expired records from every database
//! 3. Shortens the interval when a large share of records had expired, and
//!    lengthens it while nothing expires

use crate::storage::registry::Databases;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, trace};

/// Configuration for the expiry sweeper.
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    /// Interval the sweeper starts with (default: 100ms)
    pub base_interval: Duration,

    /// Shortest interval the sweeper will back down to (default: 10ms)
    pub min_interval: Duration,

    /// Longest interval the sweeper will back off to (default: 1s)
    pub max_interval: Duration,

    /// Speed up when more than this fraction of records had expired
    pub speedup_threshold: f64,

    /// Slow down when less than this fraction of records had expired
    pub slowdown_threshold: f64,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_millis(100),
            min_interval: Duration::from_millis(10),
            max_interval: Duration::from_secs(1),
            speedup_threshold: 0.25,
            slowdown_threshold: 0.01,
        }
    }
}

/// Handle to a running sweeper. Dropping it stops the task.
#[derive(Debug)]
pub struct ExpirySweeper {
    shutdown_tx: watch::Sender<bool>,
}

impl ExpirySweeper {
    /// Spawns the sweeper on the current Tokio runtime.
    pub fn start(databases: Arc<Databases>, config: ExpiryConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(sweeper_loop(databases, config, shutdown_rx));
        info!("Background expiry sweeper started");

        Self { shutdown_tx }
    }

    /// Signals the task to stop.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
        debug!("Background expiry sweeper stopped");
    }
}

/// Removes expired records from every database and returns
/// `(records before, records removed)`.
fn sweep_once(databases: &Databases) -> (usize, u64) {
    let before = databases.total_keys();
    let expired: u64 = databases.iter().map(|keyspace| keyspace.cleanup_expired()).sum();
    (before, expired)
}

/// Computes the next interval from the share of records that had expired.
fn next_interval(
    config: &ExpiryConfig,
    current: Duration,
    before: usize,
    expired: u64,
) -> Duration {
    if before == 0 {
        return current;
    }

    let rate = expired as f64 / before as f64;
    if rate > config.speedup_threshold {
        (current / 2).max(config.min_interval)
    } else if rate < config.slowdown_threshold && expired == 0 {
        (current * 2).min(config.max_interval)
    } else {
        current
    }
}

async fn sweeper_loop(
    databases: Arc<Databases>,
    config: ExpiryConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut interval = config.base_interval;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Expiry sweeper received shutdown signal");
                    return;
                }
            }
        }

        let (before, expired) = sweep_once(&databases);
        let next = next_interval(&config, interval, before, expired);

        if next < interval {
            debug!(
                expired,
                before,
                interval_ms = next.as_millis(),
                "High expiry rate, speeding up sweeper"
            );
        } else if next > interval {
            trace!(interval_ms = next.as_millis(), "Nothing expired, slowing down sweeper");
        }
        if expired > 0 {
            debug!(
                expired,
                remaining = databases.total_keys(),
                "Expired records reclaimed"
            );
        }

        interval = next;
    }
}
