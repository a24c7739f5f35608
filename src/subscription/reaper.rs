//! Background eviction of orphaned subscriptions.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Utc;
use crossbeam_channel::{bounded, select, Receiver, Sender};

use super::cache::SubscriptionCache;

/// Worker thread that periodically evicts subscriptions no delivery session
/// ever attached to. Stops when dropped.
#[derive(Debug)]
pub struct SubscriptionReaper {
    stop_tx: Option<Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl SubscriptionReaper {
    /// Spawns the reaper, ticking every `cache.config().reap_interval`.
    pub fn spawn(cache: Arc<SubscriptionCache>) -> std::io::Result<Self> {
        let interval = cache.config().reap_interval.max(Duration::from_millis(1));
        let (stop_tx, stop_rx) = bounded::<()>(0);

        let join = thread::Builder::new()
            .name("feedhook-reaper".to_string())
            .spawn(move || reap_loop(&cache, interval, &stop_rx))?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            join: Some(join),
        })
    }

    /// Stops the worker and waits for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        drop(self.stop_tx.take());
        if let Some(handle) = self.join.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SubscriptionReaper {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn reap_loop(cache: &SubscriptionCache, interval: Duration, stop_rx: &Receiver<()>) {
    loop {
        select! {
            recv(stop_rx) -> _ => break,
            default(interval) => {
                let evicted = cache.evict_orphans(Utc::now());
                if evicted > 0 {
                    tracing::debug!(evicted, remaining = cache.len(), "reaper pass");
                }
            }
        }
    }
}
