//! Declarative metadata read from collection properties.
//!
//! Feed operations describe named change queries a client may subscribe to;
//! hook declarations list the hooks that run against every request to the
//! collection.

/// Feed operation declarations and variable binding.
pub mod feed;
/// Hook declarations.
pub mod hook;

pub use feed::{FeedOperation, VAR_OPERATOR};
pub use hook::HookDeclaration;
