//! Declarative request hooks.
//!
//! A collection lists hook names under its `hooks` property. At request time
//! the [`HookDispatcher`] resolves each name in the [`HookRegistry`] and runs
//! the matching implementation. A hook that is missing, fails to initialize,
//! returns an error or panics costs the request a warning, never the request
//! itself.

/// Built-in hook implementations.
pub mod builtin;
/// Hook dispatch engine.
pub mod dispatch;
/// Hook capability trait.
pub mod hook;
/// Named-singleton registry and factories.
pub mod registry;

pub use builtin::{ResponseHeaderHook, SnooperHook};
pub use dispatch::HookDispatcher;
pub use hook::Hook;
pub use registry::{HookCatalog, HookFactory, HookRegistry, NamedSingletons, Resolved, SingletonSpec, HOOKS_GROUP};
