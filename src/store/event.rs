//! Change event type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::resource::ResourcePath;

/// Kind of mutation a change event describes.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Insert,
    Update,
    Replace,
    Delete,
}

/// A single data mutation reported by the backing store.
///
/// Serialized with the field names pipeline stages match against
/// (`operationType`, `fullDocument.*`, `documentKey.*`, `ns.coll`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    /// Event id.
    #[serde(rename = "_id")]
    pub id: Uuid,
    /// Kind of mutation.
    pub operation_type: OperationType,
    /// Namespace the mutation happened in.
    pub ns: ResourcePath,
    /// Key of the mutated document.
    pub document_key: Value,
    /// Post-image of the document, absent for deletes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_document: Option<Value>,
    /// Commit time.
    pub cluster_time: DateTime<Utc>,
}

impl ChangeEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(
        operation_type: OperationType,
        ns: ResourcePath,
        document_key: Value,
        full_document: Option<Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation_type,
            ns,
            document_key,
            full_document,
            cluster_time: Utc::now(),
        }
    }

    /// An insert of `doc`, keyed by its `_id` field.
    #[must_use]
    pub fn insert(ns: ResourcePath, doc: Value) -> Self {
        let key = document_key_of(&doc);
        Self::new(OperationType::Insert, ns, key, Some(doc))
    }

    /// An update producing `doc`, keyed by its `_id` field.
    #[must_use]
    pub fn update(ns: ResourcePath, doc: Value) -> Self {
        let key = document_key_of(&doc);
        Self::new(OperationType::Update, ns, key, Some(doc))
    }

    /// A delete of the document with `id`.
    #[must_use]
    pub fn delete(ns: ResourcePath, id: Value) -> Self {
        Self::new(OperationType::Delete, ns, serde_json::json!({ "_id": id }), None)
    }

    /// The event as the JSON document pipelines are evaluated against.
    #[must_use]
    pub fn to_document(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn document_key_of(doc: &Value) -> Value {
    serde_json::json!({ "_id": doc.get("_id").cloned().unwrap_or(Value::Null) })
}
