//! Resource addressing and collection configuration.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::Document;
use crate::error::{HookError, ResolveError};
use crate::meta::{FeedOperation, HookDeclaration};

/// Path of a collection resource: `/<db>/<collection>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourcePath {
    /// Database name.
    pub db: String,
    /// Collection name.
    #[serde(rename = "coll")]
    pub collection: String,
}

impl ResourcePath {
    /// Creates a resource path.
    #[must_use]
    pub fn new(db: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            db: db.into(),
            collection: collection.into(),
        }
    }

    /// Parses `/<db>/<collection>`. Returns `None` for any other shape.
    #[must_use]
    pub fn parse(path: &str) -> Option<Self> {
        let mut parts = path.strip_prefix('/')?.split('/');
        let db = parts.next().filter(|s| !s.is_empty())?;
        let collection = parts.next().filter(|s| !s.is_empty())?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self::new(db, collection))
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.db, self.collection)
    }
}

/// Collection properties as configured by the resource owner.
///
/// Read-only at request time. Feed declarations live under [`FEEDS_KEY`] and
/// hook declarations under [`HOOKS_KEY`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceConfig {
    path: ResourcePath,
    props: Document,
}

/// Collection property holding the feed declarations.
pub const FEEDS_KEY: &str = "feeds";

/// Collection property holding the hook declarations.
pub const HOOKS_KEY: &str = "hooks";

impl ResourceConfig {
    /// Creates a config from a properties document.
    #[must_use]
    pub fn new(path: ResourcePath, props: Document) -> Self {
        Self { path, props }
    }

    /// Creates a config from a JSON value; non-object values yield empty properties.
    #[must_use]
    pub fn from_value(path: ResourcePath, props: Value) -> Self {
        match props {
            Value::Object(map) => Self::new(path, map),
            _ => Self::new(path, Document::new()),
        }
    }

    /// The resource path.
    #[must_use]
    pub const fn path(&self) -> &ResourcePath {
        &self.path
    }

    /// The raw properties document.
    #[must_use]
    pub const fn props(&self) -> &Document {
        &self.props
    }

    /// True when the resource declares any hooks. Cheap: no parsing.
    #[must_use]
    pub fn has_hooks(&self) -> bool {
        self.props.contains_key(HOOKS_KEY)
    }

    /// Parses the declared feed operations.
    pub fn feed_operations(&self) -> Result<Vec<FeedOperation>, ResolveError> {
        FeedOperation::from_props(&self.props)
    }

    /// Parses the declared hooks, in declaration order.
    pub fn hook_declarations(&self) -> Result<Vec<HookDeclaration>, HookError> {
        HookDeclaration::from_props(&self.props)
    }
}
