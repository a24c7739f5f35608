//! HTTP mapping of the subscription-open request.

use std::sync::Arc;

use http::header::LOCATION;
use http::{HeaderValue, StatusCode};

use crate::context::{Exchange, RequestContext};
use crate::error::{FeedError, ResolveError};
use crate::feed::{FeedOpened, FeedSubscriptionService};

/// Message returned when the requested operation is not declared.
pub const QUERY_NOT_FOUND_MESSAGE: &str = "query does not exist";

/// Handles "open feed" requests: 201 on success, an explicit client-visible
/// status on failure. Never panics on bad input.
pub struct FeedEndpoint {
    service: Arc<FeedSubscriptionService>,
}

impl FeedEndpoint {
    /// Creates an endpoint backed by `service`.
    #[must_use]
    pub fn new(service: Arc<FeedSubscriptionService>) -> Self {
        Self { service }
    }

    /// The subscription service.
    #[must_use]
    pub fn service(&self) -> &Arc<FeedSubscriptionService> {
        &self.service
    }

    /// Opens the feed described by `ctx` and writes the response into `exchange`.
    ///
    /// Returns the opened feed on success so callers can log or test it.
    /// An exchange an earlier stage already ended with an error is left as
    /// is and no feed is opened.
    pub fn handle(&self, exchange: &mut Exchange, ctx: &RequestContext) -> Option<FeedOpened> {
        if exchange.response().is_error() {
            tracing::debug!(
                path = exchange.path(),
                status = exchange.response().status().map(|s| s.as_u16()),
                "request already failed, feed not opened"
            );
            return None;
        }

        let Some(config) = ctx.resource() else {
            exchange.end_with_message(ctx, StatusCode::NOT_FOUND, "resource does not exist");
            return None;
        };
        let Some(operation) = ctx.feed_operation() else {
            exchange.end_with_message(ctx, StatusCode::BAD_REQUEST, "feed operation is required");
            return None;
        };

        match self
            .service
            .open(config, operation, ctx.vars(), ctx.feed_identifier())
        {
            Ok(opened) => {
                if let Ok(location) = HeaderValue::from_str(&opened.uri) {
                    exchange.response_mut().headers_mut().insert(LOCATION, location);
                }
                exchange.end_with_message(
                    ctx,
                    StatusCode::CREATED,
                    format!("waiting for client ws at {}", opened.uri),
                );
                Some(opened)
            }
            Err(FeedError::Resolve(ResolveError::OperationNotFound { .. })) => {
                exchange.end_with_message(ctx, StatusCode::NOT_FOUND, QUERY_NOT_FOUND_MESSAGE);
                None
            }
            Err(err) => {
                let status = err.status();
                if status.is_server_error() {
                    tracing::warn!(operation, error = %err, "failed to open feed");
                }
                exchange.end_with_message(ctx, status, err.to_string());
                None
            }
        }
    }
}
