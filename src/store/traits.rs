//! Abstract change-stream source.

use crate::document::Document;
use crate::error::StoreError;
use crate::resource::ResourcePath;

use super::cursor::ChangeCursor;

/// A backing store that can open live change cursors.
///
/// # Contract
/// - `watch` returns as soon as the stream is established; it never waits
///   for the first event.
/// - The returned cursor owns the server-side watch. Closing or dropping it
///   must release that watch exactly once.
pub trait ChangeStreamSource: Send + Sync {
    /// Opens a change cursor over `resource` filtered by `stages`.
    fn watch(&self, resource: &ResourcePath, stages: &[Document]) -> Result<ChangeCursor, StoreError>;
}
