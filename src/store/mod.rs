//! Backing document-store seam.
//!
//! The store owns change events: it decides how writes become events and
//! evaluates pipelines against them. This crate consumes events only through
//! [`ChangeStreamSource::watch`] and the [`ChangeCursor`] it returns. An
//! in-memory backend is provided for embedded use and tests.

pub mod cursor;
pub mod event;
pub mod memory;
pub mod pipeline;
pub mod traits;

pub use cursor::ChangeCursor;
pub use event::{ChangeEvent, OperationType};
pub use memory::{InMemoryChangeStore, MemoryStoreConfig};
pub use pipeline::Pipeline;
pub use traits::ChangeStreamSource;
