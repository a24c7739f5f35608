//! Request-facing facade.
//!
//! Owns the shared pieces (subscription cache, orphan reaper, hook registry)
//! and runs one request through hooks and then the feed endpoint.

use std::sync::Arc;

use crate::config::FeedHookConfig;
use crate::context::{Exchange, RequestContext};
use crate::delivery::FeedSession;
use crate::endpoint::FeedEndpoint;
use crate::error::{FeedError, FeedResult};
use crate::feed::{FeedOpened, FeedSubscriptionService};
use crate::hooks::{HookCatalog, HookDispatcher, HookRegistry};
use crate::store::ChangeStreamSource;
use crate::subscription::{SubscriptionCache, SubscriptionReaper};

/// Everything needed to serve feed and hook requests for one process.
pub struct FeedGateway {
    cache: Arc<SubscriptionCache>,
    dispatcher: HookDispatcher,
    endpoint: FeedEndpoint,
    reaper: Option<SubscriptionReaper>,
}

impl FeedGateway {
    /// Builds the gateway and starts the orphan reaper.
    ///
    /// # Errors
    /// `Config` when `config` fails validation, `Internal` when the reaper
    /// thread cannot be spawned.
    pub fn from_config(
        config: &FeedHookConfig,
        store: Arc<dyn ChangeStreamSource>,
        catalog: &HookCatalog,
    ) -> FeedResult<Self> {
        config.validate()?;

        let cache = Arc::new(SubscriptionCache::with_config(config.cache_config()));
        let reaper = SubscriptionReaper::spawn(Arc::clone(&cache))
            .map_err(|e| FeedError::internal(format!("failed to spawn reaper: {e}")))?;

        let registry = Arc::new(HookRegistry::from_specs(&config.singletons, catalog));
        let service = Arc::new(FeedSubscriptionService::new(store, Arc::clone(&cache)));

        tracing::info!(
            hooks = registry.len(),
            max_subscriptions = config.cache.max_subscriptions,
            "feed gateway started"
        );

        Ok(Self {
            cache,
            dispatcher: HookDispatcher::new(registry),
            endpoint: FeedEndpoint::new(service),
            reaper: Some(reaper),
        })
    }

    /// Runs the resource's hooks, then opens the requested feed unless a
    /// hook ended the exchange with an error.
    pub fn open_feed(&self, exchange: &mut Exchange, ctx: &mut RequestContext) -> Option<FeedOpened> {
        self.dispatcher.dispatch(exchange, ctx);
        self.endpoint.handle(exchange, ctx)
    }

    /// Runs the resource's hooks only, for requests served elsewhere.
    pub fn dispatch_hooks(&self, exchange: &mut Exchange, ctx: &mut RequestContext) {
        self.dispatcher.dispatch(exchange, ctx);
    }

    /// Attaches a delivery session to the subscription at `uri`.
    #[must_use]
    pub fn attach(&self, uri: &str) -> Option<FeedSession> {
        FeedSession::attach(Arc::clone(&self.cache), uri)
    }

    /// The shared subscription cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<SubscriptionCache> {
        &self.cache
    }

    /// The hook registry built at startup.
    #[must_use]
    pub fn registry(&self) -> &Arc<HookRegistry> {
        self.dispatcher.registry()
    }

    /// Stops the reaper and releases every open subscription.
    pub fn shutdown(mut self) {
        self.close();
    }

    fn close(&mut self) {
        if let Some(reaper) = self.reaper.take() {
            reaper.stop();
            let released = self.cache.release_all();
            tracing::info!(released, "feed gateway stopped");
        }
    }
}

impl Drop for FeedGateway {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HookError;
    use crate::hooks::{Hook, HOOKS_GROUP};
    use crate::resource::{ResourceConfig, ResourcePath};
    use crate::store::InMemoryChangeStore;
    use http::{Method, StatusCode};
    use serde_json::{json, Value};

    struct Deny;

    impl Hook for Deny {
        fn supports(&self, _ctx: &RequestContext) -> bool {
            true
        }

        fn hook(
            &self,
            exchange: &mut Exchange,
            ctx: &mut RequestContext,
            _args: &Value,
            _conf_args: Option<&Value>,
        ) -> Result<(), HookError> {
            exchange.end_with_message(ctx, StatusCode::FORBIDDEN, "not allowed");
            Ok(())
        }
    }

    fn gateway(store: &InMemoryChangeStore) -> FeedGateway {
        let config = FeedHookConfig::from_json_str(
            r#"{"singletons": [{"name": "cors", "kind": "response_header",
                                "args": {"headers": {"access-control-allow-origin": "*"}}}]}"#,
        )
        .unwrap();
        FeedGateway::from_config(&config, Arc::new(store.clone()), &HookCatalog::with_builtins()).unwrap()
    }

    fn request() -> RequestContext {
        let config = ResourceConfig::from_value(
            ResourcePath::new("db", "orders"),
            json!({
                "feeds": [{"uri": "all", "stages": []}],
                "hooks": [{"name": "cors"}, {"name": "missing"}]
            }),
        );
        RequestContext::new(Method::POST, Some(config)).with_feed("all", None)
    }

    #[test]
    fn test_hooks_run_before_the_feed_opens() {
        let store = InMemoryChangeStore::new();
        let gw = gateway(&store);

        let mut ex = Exchange::new("/db/orders/_feeds/all");
        let mut ctx = request();
        let opened = gw.open_feed(&mut ex, &mut ctx).unwrap();

        assert_eq!(ex.response().status(), Some(StatusCode::CREATED));
        assert_eq!(ex.response().headers()["access-control-allow-origin"], "*");
        let warnings = &ex.response().body().unwrap()["_warnings"];
        assert_eq!(warnings.as_array().map(Vec::len), Some(1));
        assert!(gw.cache().contains(&opened.uri));
    }

    #[test]
    fn test_denying_hook_stops_the_feed_from_opening() {
        let store = InMemoryChangeStore::new();
        let mut catalog = HookCatalog::with_builtins();
        catalog.register("deny", |_| Ok(Arc::new(Deny) as Arc<dyn Hook>));
        let config = FeedHookConfig::from_json_str(r#"{"singletons": [{"name": "deny", "kind": "deny"}]}"#).unwrap();
        let gw = FeedGateway::from_config(&config, Arc::new(store.clone()), &catalog).unwrap();
        assert!(gw.registry().contains(HOOKS_GROUP, "deny"));

        let resource = ResourceConfig::from_value(
            ResourcePath::new("db", "orders"),
            json!({"feeds": [{"uri": "all", "stages": []}], "hooks": [{"name": "deny"}]}),
        );
        let mut ctx = RequestContext::new(Method::POST, Some(resource)).with_feed("all", None);
        let mut ex = Exchange::new("/db/orders/_feeds/all");

        assert!(gw.open_feed(&mut ex, &mut ctx).is_none());
        assert_eq!(ex.response().status(), Some(StatusCode::FORBIDDEN));
        assert!(gw.cache().is_empty());
        assert_eq!(store.active_watches(), 0);
    }

    #[test]
    fn test_shutdown_releases_everything() {
        let store = InMemoryChangeStore::new();
        let gw = gateway(&store);
        gw.open_feed(&mut Exchange::new("/"), &mut request()).unwrap();
        assert_eq!(store.active_watches(), 1);

        gw.shutdown();
        assert_eq!(store.active_watches(), 0);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = FeedHookConfig::default();
        config.cache.max_subscriptions = 0;
        let result = FeedGateway::from_config(
            &config,
            Arc::new(InMemoryChangeStore::new()),
            &HookCatalog::with_builtins(),
        );
        assert!(matches!(result, Err(FeedError::Config(_))));
    }
}
