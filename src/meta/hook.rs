use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::Document;
use crate::error::HookError;
use crate::resource::HOOKS_KEY;

/// One entry of a collection's `hooks` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookDeclaration {
    /// Registry name of the hook.
    pub name: String,
    /// Per-collection arguments passed on every invocation.
    #[serde(default)]
    pub args: Value,
}

impl HookDeclaration {
    /// Creates a declaration.
    #[must_use]
    pub fn new(name: impl Into<String>, args: Value) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Parses the `hooks` list of a collection properties document, keeping
    /// declaration order. A missing key means no hooks.
    pub fn from_props(props: &Document) -> Result<Vec<Self>, HookError> {
        let Some(raw) = props.get(HOOKS_KEY) else {
            return Ok(Vec::new());
        };

        let decls: Vec<Self> =
            serde_json::from_value(raw.clone()).map_err(|e| HookError::InvalidMetadata {
                reason: format!("'{HOOKS_KEY}' must be an array of {{name, args}} objects: {e}"),
            })?;

        if let Some(blank) = decls.iter().position(|d| d.name.trim().is_empty()) {
            return Err(HookError::InvalidMetadata {
                reason: format!("hook #{blank} has an empty name"),
            });
        }

        Ok(decls)
    }
}
