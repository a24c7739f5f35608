//! # feedhook - Change-feed subscriptions and collection hooks
//!
//! feedhook covers two request-path concerns of a document REST gateway:
//!
//! - **Feeds**: a collection declares named change-stream queries. A client
//!   opens one, gets back a subscription URI, and a real-time delivery
//!   channel later attaches to that URI to receive matching change events.
//! - **Hooks**: a collection declares named hooks with per-collection args.
//!   Each request runs them in order against a registry of singletons built
//!   at startup. A broken hook costs the client a warning, never the request.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use feedhook::{FeedGateway, FeedHookConfig, HookCatalog, InMemoryChangeStore};
//!
//! let store = InMemoryChangeStore::new();
//! let gateway = FeedGateway::from_config(
//!     &FeedHookConfig::default(),
//!     Arc::new(store.clone()),
//!     &HookCatalog::with_builtins(),
//! )?;
//!
//! let opened = gateway.open_feed(&mut exchange, &mut ctx);
//! let session = gateway.attach(&opened.unwrap().uri);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod context;
pub mod document;
pub mod error;
pub mod id;
pub mod meta;
pub mod resource;

// Feed subscriptions
pub mod delivery;
pub mod endpoint;
pub mod feed;
pub mod resolver;
pub mod store;
pub mod subscription;

// Hooks and wiring
pub mod config;
pub mod gateway;
pub mod hooks;

pub use config::FeedHookConfig;
pub use context::{Exchange, RequestContext, Response};
pub use delivery::FeedSession;
pub use document::Document;
pub use endpoint::{FeedEndpoint, QUERY_NOT_FOUND_MESSAGE};
pub use error::{
    ConfigError, CursorError, FeedError, FeedResult, HookError, RegistryError, ResolveError,
    StoreError, SubscriptionError,
};
pub use feed::{FeedOpened, FeedSubscriptionService};
pub use gateway::FeedGateway;
pub use hooks::{Hook, HookCatalog, HookDispatcher, HookRegistry, SingletonSpec, HOOKS_GROUP};
pub use id::{generate_handle, subscription_uri, HANDLE_LEN};
pub use meta::{FeedOperation, HookDeclaration};
pub use resolver::{OperationResolver, PipelineResolver};
pub use resource::{ResourceConfig, ResourcePath};
pub use store::{ChangeCursor, ChangeEvent, ChangeStreamSource, InMemoryChangeStore, OperationType};
pub use subscription::{CacheConfig, FeedSubscription, SubscriptionCache, SubscriptionReaper};
