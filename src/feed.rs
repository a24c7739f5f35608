//! Feed subscription service.
//!
//! Resolve → open cursor → register → respond. The cursor is never read on
//! this path; the delivery side drains it later through the cache.

use std::sync::Arc;

use serde::Serialize;

use crate::document::Document;
use crate::error::{FeedResult, SubscriptionError};
use crate::id::{generate_handle, subscription_uri};
use crate::resolver::{OperationResolver, PipelineResolver};
use crate::resource::ResourceConfig;
use crate::store::ChangeStreamSource;
use crate::subscription::{FeedSubscription, SubscriptionCache};

/// A successfully opened feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedOpened {
    /// Subscription handle (generated or client supplied).
    pub handle: String,
    /// Where the client connects for live updates; also the cache key.
    pub uri: String,
}

/// Opens feed subscriptions and registers them for delivery.
pub struct FeedSubscriptionService {
    store: Arc<dyn ChangeStreamSource>,
    cache: Arc<SubscriptionCache>,
    resolver: Arc<dyn OperationResolver>,
}

impl FeedSubscriptionService {
    /// Creates a service using the default pipeline resolver.
    #[must_use]
    pub fn new(store: Arc<dyn ChangeStreamSource>, cache: Arc<SubscriptionCache>) -> Self {
        Self::with_resolver(store, cache, Arc::new(PipelineResolver))
    }

    /// Creates a service with a custom operation resolver.
    #[must_use]
    pub fn with_resolver(
        store: Arc<dyn ChangeStreamSource>,
        cache: Arc<SubscriptionCache>,
        resolver: Arc<dyn OperationResolver>,
    ) -> Self {
        Self {
            store,
            cache,
            resolver,
        }
    }

    /// The cache subscriptions are registered in.
    #[must_use]
    pub fn cache(&self) -> &Arc<SubscriptionCache> {
        &self.cache
    }

    /// Opens a subscription to `operation` on `config`'s resource.
    ///
    /// `identifier` is used verbatim as the handle when given; otherwise a
    /// fresh handle is generated.
    ///
    /// # Errors
    /// - `OperationNotFound` / `UnboundVariable` / `InvalidVariable` from resolution;
    ///   the cache is left untouched.
    /// - `DuplicateKey` when a live subscription already uses the handle.
    /// - Store errors when the cursor cannot be opened.
    pub fn open(
        &self,
        config: &ResourceConfig,
        operation: &str,
        vars: &Document,
        identifier: Option<&str>,
    ) -> FeedResult<FeedOpened> {
        let stages = self.resolver.resolve(config, operation, vars)?;

        let handle = identifier.map_or_else(generate_handle, str::to_string);
        let uri = subscription_uri(config.path(), operation, &handle);

        // Skip opening a watch we already know put() would reject.
        if self.cache.contains(&uri) {
            return Err(SubscriptionError::DuplicateKey { key: uri }.into());
        }

        let cursor = self.store.watch(config.path(), &stages)?;
        let subscription = FeedSubscription::new(
            handle.clone(),
            uri.clone(),
            config.path().clone(),
            operation,
            stages,
            cursor,
        );

        self.cache.put(uri.clone(), subscription)?;

        tracing::info!(
            resource = %config.path(),
            operation,
            uri = %uri,
            client_handle = identifier.is_some(),
            "feed opened"
        );

        Ok(FeedOpened { handle, uri })
    }
}
