//! Feed subscriptions and the cache that hands them from the HTTP path to
//! the delivery path.
//!
//! The HTTP task registers a subscription and returns immediately; a later,
//! independent delivery task looks it up by URI, drains its cursor, and
//! releases it on disconnect. The cache is the only state the two share.

/// Subscription cache.
pub mod cache;
/// Subscription entry type.
pub mod entry;
/// Orphan eviction worker.
pub mod reaper;

pub use cache::{CacheConfig, SubscriptionCache};
pub use entry::FeedSubscription;
pub use reaper::SubscriptionReaper;
