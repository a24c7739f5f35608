//! Subscription cache.
//!
//! Maps subscription URI to a live [`FeedSubscription`]. All synchronization
//! is internal: `put`, `get` and `release` may be called concurrently from
//! any thread without external locking.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::SubscriptionError;

use super::entry::FeedSubscription;

/// Cache limits and eviction policy.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Max live subscriptions; registrations beyond this are rejected.
    pub max_subscriptions: usize,
    /// A subscription no delivery session attached to within this window is evicted.
    pub orphan_ttl: Duration,
    /// How often the reaper looks for orphans.
    pub reap_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_subscriptions: 4096,
            orphan_ttl: Duration::from_secs(300),
            reap_interval: Duration::from_secs(1),
        }
    }
}

/// Process-wide registry of feed subscriptions, shared via `Arc`.
#[derive(Debug, Default)]
pub struct SubscriptionCache {
    entries: RwLock<HashMap<String, Arc<FeedSubscription>>>,
    cfg: CacheConfig,
}

impl SubscriptionCache {
    /// Creates a cache with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cache with custom limits.
    #[must_use]
    pub fn with_config(cfg: CacheConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            cfg,
        }
    }

    /// The cache configuration.
    #[must_use]
    pub const fn config(&self) -> &CacheConfig {
        &self.cfg
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<FeedSubscription>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<FeedSubscription>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `subscription` under `key`, transferring cursor ownership to
    /// the cache.
    ///
    /// A key whose previous subscription is already closed is reused.
    ///
    /// # Errors
    /// - `DuplicateKey` if a live subscription is registered under `key`.
    /// - `CapacityExceeded` if the cache is full.
    ///
    /// On error the rejected subscription is dropped, closing its cursor.
    pub fn put(
        &self,
        key: impl Into<String>,
        subscription: FeedSubscription,
    ) -> Result<Arc<FeedSubscription>, SubscriptionError> {
        let key = key.into();
        let mut entries = self.write();

        let replacing = match entries.get(&key) {
            Some(existing) if existing.is_live() => {
                return Err(SubscriptionError::DuplicateKey { key });
            }
            Some(_) => true,
            None => false,
        };

        if !replacing && entries.len() >= self.cfg.max_subscriptions {
            return Err(SubscriptionError::CapacityExceeded {
                max: self.cfg.max_subscriptions,
            });
        }

        let sub = Arc::new(subscription);
        entries.insert(key.clone(), Arc::clone(&sub));
        drop(entries);

        tracing::info!(uri = %key, handle = sub.handle(), "feed subscription registered");
        Ok(sub)
    }

    /// Returns the live subscription at `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<FeedSubscription>> {
        self.read().get(key).filter(|s| s.is_live()).cloned()
    }

    /// Claims the live subscription at `key` for a delivery session, so the
    /// reaper no longer treats it as orphaned.
    ///
    /// A subscription serves one session: `None` when nothing live is
    /// registered at `key` or another session already attached.
    #[must_use]
    pub fn attach(&self, key: &str) -> Option<Arc<FeedSubscription>> {
        let entries = self.write();
        let sub = entries.get(key).filter(|s| s.is_live())?;
        if !sub.mark_attached() {
            tracing::warn!(uri = %key, "delivery session already attached");
            return None;
        }
        let sub = Arc::clone(sub);
        drop(entries);

        tracing::info!(uri = %key, "delivery session attached");
        Some(sub)
    }

    /// True when a live subscription is registered at `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Removes the entry at `key` and closes its cursor.
    ///
    /// Idempotent: releasing a missing key is a no-op. Returns true if an
    /// entry was removed.
    pub fn release(&self, key: &str) -> bool {
        let removed = self.write().remove(key);
        let Some(sub) = removed else {
            return false;
        };

        sub.close();
        tracing::info!(uri = %key, handle = sub.handle(), "feed subscription released");
        true
    }

    /// Releases `subscription` if it is still the entry registered at its
    /// URI; a newer subscription reusing the URI is left alone. The cursor is
    /// closed either way.
    pub fn release_entry(&self, subscription: &Arc<FeedSubscription>) -> bool {
        let removed = {
            let mut entries = self.write();
            match entries.get(subscription.uri()) {
                Some(current) if Arc::ptr_eq(current, subscription) => entries.remove(subscription.uri()),
                _ => None,
            }
        };

        let closed = subscription.close();
        if removed.is_some() {
            tracing::info!(uri = subscription.uri(), handle = subscription.handle(), "feed subscription released");
        }
        removed.is_some() || closed
    }

    /// Releases subscriptions never attached within the orphan TTL, and any
    /// entry whose cursor has already closed. Returns how many were evicted.
    pub fn evict_orphans(&self, now: DateTime<Utc>) -> usize {
        let ttl = chrono::Duration::from_std(self.cfg.orphan_ttl)
            .unwrap_or_else(|_| chrono::Duration::weeks(52 * 100));

        let evicted: Vec<(String, Arc<FeedSubscription>)> = {
            let mut entries = self.write();
            let keys: Vec<String> = entries
                .iter()
                .filter(|(_, s)| !s.is_live() || (!s.is_attached() && now - s.created_at() >= ttl))
                .map(|(k, _)| k.clone())
                .collect();
            keys.into_iter()
                .filter_map(|k| entries.remove(&k).map(|s| (k, s)))
                .collect()
        };

        for (key, sub) in &evicted {
            sub.close();
            tracing::info!(uri = %key, handle = sub.handle(), "orphaned feed subscription evicted");
        }
        evicted.len()
    }

    /// Releases every subscription. Returns how many were released.
    pub fn release_all(&self) -> usize {
        let drained: Vec<Arc<FeedSubscription>> = self.write().drain().map(|(_, s)| s).collect();
        for sub in &drained {
            sub.close();
        }
        drained.len()
    }

    /// Number of registered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// True when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Registered keys, unordered.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }
}
