use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};

use crate::document::Document;
use crate::resource::ResourcePath;
use crate::store::ChangeCursor;

/// A registered change-feed subscription awaiting (or serving) a delivery
/// session.
///
/// Immutable after creation apart from the cursor read position, which
/// belongs to the delivery side, and the attached flag.
#[derive(Debug)]
pub struct FeedSubscription {
    handle: String,
    uri: String,
    resource: ResourcePath,
    operation: String,
    resolved_query: Vec<Document>,
    created_at: DateTime<Utc>,
    cursor: ChangeCursor,
    attached: AtomicBool,
}

impl FeedSubscription {
    /// Creates a subscription owning `cursor`.
    #[must_use]
    pub fn new(
        handle: impl Into<String>,
        uri: impl Into<String>,
        resource: ResourcePath,
        operation: impl Into<String>,
        resolved_query: Vec<Document>,
        cursor: ChangeCursor,
    ) -> Self {
        Self {
            handle: handle.into(),
            uri: uri.into(),
            resource,
            operation: operation.into(),
            resolved_query,
            created_at: Utc::now(),
            cursor,
            attached: AtomicBool::new(false),
        }
    }

    /// Subscription handle.
    #[must_use]
    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// Subscription URI, also the cache key.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Watched resource.
    #[must_use]
    pub const fn resource(&self) -> &ResourcePath {
        &self.resource
    }

    /// Feed operation name.
    #[must_use]
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// The bound pipeline the cursor was opened with.
    #[must_use]
    pub fn resolved_query(&self) -> &[Document] {
        &self.resolved_query
    }

    /// Registration time.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The owned change cursor. Only the delivery side reads from it.
    #[must_use]
    pub const fn cursor(&self) -> &ChangeCursor {
        &self.cursor
    }

    /// True until the cursor is closed.
    #[must_use]
    pub fn is_live(&self) -> bool {
        !self.cursor.is_closed()
    }

    /// True once a delivery session has attached.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    /// Marks the subscription attached. Returns false if it already was.
    pub fn mark_attached(&self) -> bool {
        !self.attached.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn close(&self) -> bool {
        self.cursor.close()
    }
}
