//! In-memory change-stream backend.
//!
//! Thread-safe reference implementation of [`ChangeStreamSource`] for embedded
//! usage and tests. Writers call [`InMemoryChangeStore::publish`]; every open
//! watch on the event's namespace whose pipeline matches receives a copy.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crossbeam_channel::{bounded, Sender, TrySendError};
use serde::Deserialize;

use crate::document::Document;
use crate::error::StoreError;
use crate::resource::ResourcePath;

use super::cursor::ChangeCursor;
use super::event::ChangeEvent;
use super::pipeline::Pipeline;
use super::traits::ChangeStreamSource;

/// In-memory backend configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemoryStoreConfig {
    /// Per-cursor buffered events before new events are dropped.
    pub watch_buffer: usize,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self { watch_buffer: 1024 }
    }
}

#[derive(Debug)]
struct Watch {
    resource: ResourcePath,
    pipeline: Pipeline,
    tx: Sender<ChangeEvent>,
}

#[derive(Debug, Default)]
struct StoreState {
    watches: Mutex<HashMap<u64, Watch>>,
    next_id: AtomicU64,
    released: AtomicU64,
    dropped_events: AtomicU64,
}

impl StoreState {
    fn watches(&self) -> MutexGuard<'_, HashMap<u64, Watch>> {
        self.watches.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// In-memory change-stream source.
#[derive(Debug, Clone, Default)]
pub struct InMemoryChangeStore {
    state: Arc<StoreState>,
    cfg: MemoryStoreConfig,
}

impl InMemoryChangeStore {
    /// Creates a store with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with custom configuration.
    #[must_use]
    pub fn with_config(cfg: MemoryStoreConfig) -> Self {
        Self {
            state: Arc::default(),
            cfg,
        }
    }

    /// Delivers `event` to every matching watch. Returns the number of
    /// cursors that received it.
    ///
    /// Never blocks: a cursor whose buffer is full misses the event.
    pub fn publish(&self, event: &ChangeEvent) -> usize {
        let doc = event.to_document();
        let watches = self.state.watches();

        let mut delivered = 0;
        for (id, w) in watches.iter() {
            if w.resource != event.ns || !w.pipeline.matches(&doc) {
                continue;
            }
            match w.tx.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    self.state.dropped_events.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(watch = id, resource = %w.resource, "watch buffer full, change event dropped");
                }
                Err(TrySendError::Disconnected(_)) => {
                    self.state.dropped_events.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        delivered
    }

    /// Number of open watches.
    #[must_use]
    pub fn active_watches(&self) -> usize {
        self.state.watches().len()
    }

    /// Number of watches released so far.
    #[must_use]
    pub fn released_watches(&self) -> u64 {
        self.state.released.load(Ordering::Relaxed)
    }

    /// Number of events not delivered because a cursor buffer was full.
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.state.dropped_events.load(Ordering::Relaxed)
    }
}

fn unwatch(state: &Weak<StoreState>, id: u64) {
    let Some(state) = state.upgrade() else {
        return;
    };
    if state.watches().remove(&id).is_some() {
        state.released.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(watch = id, "watch released");
    }
}

impl ChangeStreamSource for InMemoryChangeStore {
    fn watch(&self, resource: &ResourcePath, stages: &[Document]) -> Result<ChangeCursor, StoreError> {
        let pipeline = Pipeline::compile(stages)?;
        let (tx, rx) = bounded::<ChangeEvent>(self.cfg.watch_buffer.max(1));

        let id = self.state.next_id.fetch_add(1, Ordering::Relaxed);
        self.state.watches().insert(
            id,
            Watch {
                resource: resource.clone(),
                pipeline,
                tx,
            },
        );

        let weak = Arc::downgrade(&self.state);
        Ok(ChangeCursor::new(rx, move || unwatch(&weak, id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn orders() -> ResourcePath {
        ResourcePath::new("db", "orders")
    }

    fn new_only() -> Vec<Document> {
        vec![json!({"$match": {"fullDocument.status": "new"}})
            .as_object()
            .cloned()
            .unwrap()]
    }

    #[test]
    fn test_delivers_matching_events_only() {
        let store = InMemoryChangeStore::new();
        let cursor = store.watch(&orders(), &new_only()).unwrap();

        assert_eq!(store.publish(&ChangeEvent::insert(orders(), json!({"_id": 1, "status": "old"}))), 0);
        assert_eq!(store.publish(&ChangeEvent::insert(orders(), json!({"_id": 2, "status": "new"}))), 1);
        assert_eq!(
            store.publish(&ChangeEvent::insert(
                ResourcePath::new("db", "other"),
                json!({"_id": 3, "status": "new"})
            )),
            0
        );

        let ev = cursor.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(ev.full_document.unwrap()["_id"], 2);
        assert_eq!(cursor.try_next().unwrap(), None);
    }

    #[test]
    fn test_closing_cursor_releases_watch_once() {
        let store = InMemoryChangeStore::new();
        let cursor = store.watch(&orders(), &[]).unwrap();
        assert_eq!(store.active_watches(), 1);

        cursor.close();
        cursor.close();
        drop(cursor);

        assert_eq!(store.active_watches(), 0);
        assert_eq!(store.released_watches(), 1);
    }

    #[test]
    fn test_full_buffer_drops_without_blocking() {
        let store = InMemoryChangeStore::with_config(MemoryStoreConfig { watch_buffer: 1 });
        let _cursor = store.watch(&orders(), &[]).unwrap();

        store.publish(&ChangeEvent::insert(orders(), json!({"_id": 1})));
        store.publish(&ChangeEvent::insert(orders(), json!({"_id": 2})));
        assert_eq!(store.dropped_events(), 1);
    }

    #[test]
    fn test_unsupported_stage_fails_watch() {
        let store = InMemoryChangeStore::new();
        let stages = vec![json!({"$group": {}}).as_object().cloned().unwrap()];
        let err = store.watch(&orders(), &stages).unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedStage { .. }));
        assert_eq!(store.active_watches(), 0);
    }
}
