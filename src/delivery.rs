//! Delivery-side consumer of feed subscriptions.
//!
//! A real-time channel attaches with the subscription URI it was handed,
//! forwards change events to its client, and releases the subscription when
//! the client disconnects. Framing and transport are the channel's business;
//! this module only covers the cache contract.

use std::sync::Arc;
use std::time::Duration;

use crate::error::CursorError;
use crate::store::ChangeEvent;
use crate::subscription::{FeedSubscription, SubscriptionCache};

/// A delivery channel attached to one feed subscription.
///
/// Dropping the session counts as a disconnect and releases the subscription.
#[derive(Debug)]
pub struct FeedSession {
    cache: Arc<SubscriptionCache>,
    subscription: Arc<FeedSubscription>,
    detached: bool,
}

impl FeedSession {
    /// Attaches to the live subscription at `uri`.
    ///
    /// `None` when no live subscription is registered there or another
    /// session is already attached to it.
    #[must_use]
    pub fn attach(cache: Arc<SubscriptionCache>, uri: &str) -> Option<Self> {
        let subscription = cache.attach(uri)?;
        Some(Self {
            cache,
            subscription,
            detached: false,
        })
    }

    /// Subscription URI this session is attached to.
    #[must_use]
    pub fn uri(&self) -> &str {
        self.subscription.uri()
    }

    /// The attached subscription.
    #[must_use]
    pub const fn subscription(&self) -> &Arc<FeedSubscription> {
        &self.subscription
    }

    /// Blocks for the next event. `Closed` once the subscription is released.
    pub fn recv(&self) -> Result<ChangeEvent, CursorError> {
        self.subscription.cursor().recv()
    }

    /// Waits up to `timeout` for the next event.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<ChangeEvent, CursorError> {
        self.subscription.cursor().recv_timeout(timeout)
    }

    /// Forwards events to `sink` until the subscription closes or `sink`
    /// returns false (client gone). Returns how many events were forwarded.
    pub fn forward<F>(&self, mut sink: F) -> usize
    where
        F: FnMut(&ChangeEvent) -> bool,
    {
        let mut forwarded = 0;
        for event in self.subscription.cursor().iter() {
            if !sink(&event) {
                break;
            }
            forwarded += 1;
        }
        forwarded
    }

    /// Disconnects: releases the subscription and closes its cursor.
    pub fn detach(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.detached {
            return;
        }
        self.detached = true;
        if self.cache.release_entry(&self.subscription) {
            tracing::info!(uri = self.subscription.uri(), "delivery session detached");
        }
    }
}

impl Drop for FeedSession {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourcePath;
    use crate::store::{ChangeStreamSource, InMemoryChangeStore};
    use serde_json::json;

    fn setup() -> (InMemoryChangeStore, Arc<SubscriptionCache>) {
        let store = InMemoryChangeStore::new();
        let cache = Arc::new(SubscriptionCache::new());
        let resource = ResourcePath::new("db", "orders");
        let cursor = store.watch(&resource, &[]).unwrap();
        cache
            .put(
                "/db/orders/_feeds/all/h",
                FeedSubscription::new("h", "/db/orders/_feeds/all/h", resource, "all", Vec::new(), cursor),
            )
            .unwrap();
        (store, cache)
    }

    #[test]
    fn test_attach_unknown_uri_is_none() {
        let (_, cache) = setup();
        assert!(FeedSession::attach(cache, "/db/orders/_feeds/all/nope").is_none());
    }

    #[test]
    fn test_forwards_until_sink_stops_then_drop_releases() {
        let (store, cache) = setup();
        let session = FeedSession::attach(Arc::clone(&cache), "/db/orders/_feeds/all/h").unwrap();

        for i in 0..3 {
            store.publish(&ChangeEvent::insert(ResourcePath::new("db", "orders"), json!({"_id": i})));
        }

        let mut seen = Vec::new();
        let forwarded = session.forward(|ev| {
            seen.push(ev.document_key["_id"].clone());
            seen.len() < 2
        });
        assert_eq!(forwarded, 1);
        assert_eq!(seen, vec![json!(0), json!(1)]);

        drop(session);
        assert!(cache.get("/db/orders/_feeds/all/h").is_none());
        assert_eq!(store.active_watches(), 0);
    }

    #[test]
    fn test_second_session_is_refused_and_first_keeps_its_events() {
        let (store, cache) = setup();
        let first = FeedSession::attach(Arc::clone(&cache), "/db/orders/_feeds/all/h").unwrap();
        assert!(FeedSession::attach(Arc::clone(&cache), "/db/orders/_feeds/all/h").is_none());

        for i in 0..2 {
            store.publish(&ChangeEvent::insert(ResourcePath::new("db", "orders"), json!({"_id": i})));
        }
        assert_eq!(first.recv().unwrap().document_key["_id"], json!(0));
        assert_eq!(first.recv().unwrap().document_key["_id"], json!(1));
        assert!(cache.get(first.uri()).is_some());
    }

    #[test]
    fn test_detach_is_a_release() {
        let (store, cache) = setup();
        let session = FeedSession::attach(Arc::clone(&cache), "/db/orders/_feeds/all/h").unwrap();
        session.detach();
        assert!(cache.is_empty());
        assert_eq!(store.released_watches(), 1);
    }
}
