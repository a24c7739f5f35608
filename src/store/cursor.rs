//! Owned change cursor.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crossbeam_channel::{bounded, select, Receiver, Sender};

use crate::error::CursorError;

use super::event::ChangeEvent;

type CloseHook = Box<dyn FnOnce() + Send>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A live stream of change events.
///
/// The cursor owns the server-side watch that feeds it. [`close`](Self::close)
/// releases the watch exactly once no matter how often or from how many
/// threads it is called; dropping the cursor closes it too. A reader blocked
/// in [`recv`](Self::recv) observes [`CursorError::Closed`] once the cursor
/// is closed.
pub struct ChangeCursor {
    events: Receiver<ChangeEvent>,
    shutdown_rx: Receiver<()>,
    shutdown_tx: Mutex<Option<Sender<()>>>,
    on_close: Mutex<Option<CloseHook>>,
    closed: AtomicBool,
}

impl ChangeCursor {
    /// Wraps an event receiver. `on_close` runs once, when the cursor closes.
    pub fn new(events: Receiver<ChangeEvent>, on_close: impl FnOnce() + Send + 'static) -> Self {
        // Nothing is ever sent on this channel; dropping the sender wakes readers.
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
        Self {
            events,
            shutdown_rx,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            on_close: Mutex::new(Some(Box::new(on_close))),
            closed: AtomicBool::new(false),
        }
    }

    /// True once the cursor has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Closes the cursor and releases the underlying watch.
    ///
    /// Returns true for the call that actually closed it.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }

        drop(lock(&self.shutdown_tx).take());

        let hook = lock(&self.on_close).take();
        if let Some(hook) = hook {
            hook();
        }

        tracing::debug!("change cursor closed");
        true
    }

    /// Blocks until the next event arrives or the cursor closes.
    pub fn recv(&self) -> Result<ChangeEvent, CursorError> {
        if self.is_closed() {
            return Err(CursorError::Closed);
        }

        select! {
            recv(self.events) -> msg => msg.map_err(|_| CursorError::Closed),
            recv(self.shutdown_rx) -> _ => Err(CursorError::Closed),
        }
    }

    /// Like [`recv`](Self::recv), giving up after `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<ChangeEvent, CursorError> {
        if self.is_closed() {
            return Err(CursorError::Closed);
        }

        select! {
            recv(self.events) -> msg => msg.map_err(|_| CursorError::Closed),
            recv(self.shutdown_rx) -> _ => Err(CursorError::Closed),
            default(timeout) => Err(CursorError::Timeout {
                duration_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    /// Returns a buffered event without blocking, if one is ready.
    pub fn try_next(&self) -> Result<Option<ChangeEvent>, CursorError> {
        if self.is_closed() {
            return Err(CursorError::Closed);
        }

        match self.events.try_recv() {
            Ok(ev) => Ok(Some(ev)),
            Err(crossbeam_channel::TryRecvError::Empty) => Ok(None),
            Err(crossbeam_channel::TryRecvError::Disconnected) => Err(CursorError::Closed),
        }
    }

    /// Blocking iterator that ends when the cursor closes.
    pub fn iter(&self) -> impl Iterator<Item = ChangeEvent> + '_ {
        std::iter::from_fn(move || self.recv().ok())
    }
}

impl fmt::Debug for ChangeCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeCursor")
            .field("closed", &self.is_closed())
            .field("buffered", &self.events.len())
            .finish_non_exhaustive()
    }
}

impl Drop for ChangeCursor {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::thread;

    use crate::resource::ResourcePath;

    fn event() -> ChangeEvent {
        ChangeEvent::insert(ResourcePath::new("db", "c"), serde_json::json!({"_id": 1}))
    }

    fn counted_cursor() -> (Sender<ChangeEvent>, ChangeCursor, Arc<AtomicUsize>) {
        let (tx, rx) = bounded(8);
        let closes = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&closes);
        let cursor = ChangeCursor::new(rx, move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (tx, cursor, closes)
    }

    #[test]
    fn test_delivers_buffered_events() {
        let (tx, cursor, _) = counted_cursor();
        tx.send(event()).unwrap();
        assert!(cursor.recv_timeout(Duration::from_secs(1)).is_ok());
        assert_eq!(cursor.try_next().unwrap(), None);
    }

    #[test]
    fn test_close_runs_hook_exactly_once() {
        let (_tx, cursor, closes) = counted_cursor();
        assert!(cursor.close());
        assert!(!cursor.close());
        drop(cursor);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_closes() {
        let (_tx, cursor, closes) = counted_cursor();
        drop(cursor);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_timeout_when_idle() {
        let (_tx, cursor, _) = counted_cursor();
        let err = cursor.recv_timeout(Duration::from_millis(10)).unwrap_err();
        assert_eq!(err, CursorError::Timeout { duration_ms: 10 });
    }

    #[test]
    fn test_close_wakes_blocked_reader() {
        let (_tx, cursor, closes) = counted_cursor();
        let cursor = Arc::new(cursor);

        let reader = {
            let cursor = Arc::clone(&cursor);
            thread::spawn(move || cursor.recv())
        };

        thread::sleep(Duration::from_millis(20));
        cursor.close();

        assert_eq!(reader.join().unwrap(), Err(CursorError::Closed));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_closed_cursor_rejects_reads_even_with_buffered_events() {
        let (tx, cursor, _) = counted_cursor();
        tx.send(event()).unwrap();
        cursor.close();
        assert_eq!(cursor.recv(), Err(CursorError::Closed));
        assert_eq!(cursor.try_next(), Err(CursorError::Closed));
        assert_eq!(cursor.iter().count(), 0);
    }
}
