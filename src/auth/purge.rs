//! Periodic challenge purge
//!
//! Runs independently of request handling; a failed sweep is logged and
//! retried on the next tick.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::challenge::{with_timeout, ChallengeStore};

/// Default sweep interval (5 minutes)
pub const DEFAULT_PURGE_INTERVAL_SECONDS: u64 = 300;

/// Handle to the running purge task
///
/// The task stops when `shutdown` is called or the handle is dropped.
pub struct PurgeTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl PurgeTask {
    pub fn spawn(
        store: Arc<dyn ChallengeStore>,
        interval: Duration,
        store_timeout: Duration,
    ) -> Self {
        let (shutdown, rx) = watch::channel(false);
        let handle = tokio::spawn(run(store, interval, store_timeout, rx));

        tracing::info!(interval_secs = interval.as_secs(), "Nonce purge task started");
        Self { shutdown, handle }
    }

    /// Stop the task and wait for it to exit
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "Nonce purge task panicked");
        }
        tracing::info!("Nonce purge task stopped");
    }
}

async fn run(
    store: Arc<dyn ChallengeStore>,
    interval: Duration,
    store_timeout: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => sweep(store.as_ref(), store_timeout).await,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

async fn sweep(store: &dyn ChallengeStore, store_timeout: Duration) {
    match with_timeout(store_timeout, store.purge_expired()).await {
        Ok(0) => tracing::debug!("Nonce purge found nothing to remove"),
        Ok(removed) => tracing::info!(removed, "Purged consumed and expired nonces"),
        Err(e) => tracing::warn!(error = %e, "Nonce purge failed, retrying next interval"),
    }
}
