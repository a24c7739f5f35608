//! Feed operation declarations.
//!
//! A collection declares its feeds under the `feeds` property:
//!
//! ```json
//! { "feeds": [ { "uri": "new-orders",
//!                "stages": [ { "$match": { "fullDocument.status": { "$var": "status" } } } ] } ] }
//! ```
//!
//! Stage templates may reference request variables with `{"$var": "name"}`, or
//! `{"$var": ["name", default]}` to fall back to `default` when unbound.

use serde_json::Value;

use crate::document::{find_operator_key, Document};
use crate::error::ResolveError;
use crate::resource::FEEDS_KEY;

/// Placeholder operator in stage templates.
pub const VAR_OPERATOR: &str = "$var";

/// A named change query declared on a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedOperation {
    uri: String,
    stages: Vec<Document>,
}

fn invalid(reason: impl Into<String>) -> ResolveError {
    ResolveError::InvalidMetadata {
        reason: reason.into(),
    }
}

impl FeedOperation {
    /// Creates a feed operation from a uri and stage templates.
    #[must_use]
    pub fn new(uri: impl Into<String>, stages: Vec<Document>) -> Self {
        Self {
            uri: uri.into(),
            stages,
        }
    }

    /// The operation name clients request.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The unbound stage templates.
    #[must_use]
    pub fn stages(&self) -> &[Document] {
        &self.stages
    }

    /// Parses every feed declared in a collection properties document.
    ///
    /// A missing `feeds` key means no feeds.
    pub fn from_props(props: &Document) -> Result<Vec<Self>, ResolveError> {
        let Some(raw) = props.get(FEEDS_KEY) else {
            return Ok(Vec::new());
        };

        let Value::Array(items) = raw else {
            return Err(invalid(format!("'{FEEDS_KEY}' must be an array")));
        };

        items.iter().map(Self::from_value).collect()
    }

    fn from_value(value: &Value) -> Result<Self, ResolveError> {
        let Value::Object(obj) = value else {
            return Err(invalid("feed declaration must be an object"));
        };

        let uri = obj
            .get("uri")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| invalid("feed declaration requires a non-empty string 'uri'"))?;

        let Some(Value::Array(raw_stages)) = obj.get("stages") else {
            return Err(invalid(format!("feed '{uri}' requires a 'stages' array")));
        };

        let stages = raw_stages
            .iter()
            .map(|s| match s {
                Value::Object(stage) => Ok(stage.clone()),
                _ => Err(invalid(format!("feed '{uri}' has a stage that is not an object"))),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::new(uri, stages))
    }

    /// Binds `vars` into the stage templates.
    ///
    /// Bound values may not carry `$`-prefixed keys: variables supply data,
    /// never query operators.
    pub fn resolve_stages(&self, vars: &Document) -> Result<Vec<Document>, ResolveError> {
        for (name, value) in vars {
            if let Some(op) = find_operator_key(value) {
                return Err(ResolveError::InvalidVariable {
                    variable: name.clone(),
                    reason: format!("operator '{op}' is not allowed in variable values"),
                });
            }
        }

        self.stages
            .iter()
            .map(|stage| {
                let mut out = Document::new();
                for (k, v) in stage {
                    out.insert(k.clone(), bind(v, vars)?);
                }
                Ok(out)
            })
            .collect()
    }
}

fn bind(template: &Value, vars: &Document) -> Result<Value, ResolveError> {
    match template {
        Value::Object(obj) => {
            if obj.len() == 1 {
                if let Some(spec) = obj.get(VAR_OPERATOR) {
                    return bind_var(spec, vars);
                }
            }
            let mut out = Document::new();
            for (k, v) in obj {
                out.insert(k.clone(), bind(v, vars)?);
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => items
            .iter()
            .map(|v| bind(v, vars))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Ok(other.clone()),
    }
}

fn bind_var(spec: &Value, vars: &Document) -> Result<Value, ResolveError> {
    match spec {
        Value::String(name) => vars
            .get(name)
            .cloned()
            .ok_or_else(|| ResolveError::UnboundVariable {
                variable: name.clone(),
            }),
        Value::Array(pair) => match pair.as_slice() {
            [Value::String(name), default] => {
                Ok(vars.get(name).cloned().unwrap_or_else(|| default.clone()))
            }
            _ => Err(invalid(format!(
                "'{VAR_OPERATOR}' must be a name or a [name, default] pair"
            ))),
        },
        _ => Err(invalid(format!(
            "'{VAR_OPERATOR}' must be a name or a [name, default] pair"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(v: Value) -> Document {
        v.as_object().cloned().unwrap()
    }

    fn vars(v: Value) -> Document {
        props(v)
    }

    #[test]
    fn test_missing_feeds_key_yields_no_operations() {
        let ops = FeedOperation::from_props(&Document::new()).unwrap();
        assert!(ops.is_empty());
    }

    #[test]
    fn test_parses_declarations_in_order() {
        let ops = FeedOperation::from_props(&props(json!({
            "feeds": [
                {"uri": "a", "stages": [{"$match": {"x": 1}}]},
                {"uri": "b", "stages": []}
            ]
        })))
        .unwrap();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].uri(), "a");
        assert_eq!(ops[0].stages().len(), 1);
        assert_eq!(ops[1].uri(), "b");
    }

    #[test]
    fn test_rejects_malformed_declarations() {
        for bad in [
            json!({"feeds": {}}),
            json!({"feeds": [1]}),
            json!({"feeds": [{"stages": []}]}),
            json!({"feeds": [{"uri": "a"}]}),
            json!({"feeds": [{"uri": "a", "stages": [1]}]}),
        ] {
            let err = FeedOperation::from_props(&props(bad)).unwrap_err();
            assert!(matches!(err, ResolveError::InvalidMetadata { .. }));
        }
    }

    #[test]
    fn test_binds_variables_and_defaults() {
        let op = FeedOperation::from_props(&props(json!({
            "feeds": [{"uri": "by-status", "stages": [
                {"$match": {"fullDocument.status": {"$var": "status"},
                            "fullDocument.region": {"$var": ["region", "eu"]}}}
            ]}]
        })))
        .unwrap()
        .remove(0);

        let stages = op.resolve_stages(&vars(json!({"status": "new"}))).unwrap();
        assert_eq!(
            Value::Object(stages[0].clone()),
            json!({"$match": {"fullDocument.status": "new", "fullDocument.region": "eu"}})
        );
    }

    #[test]
    fn test_unbound_variable_is_reported_by_name() {
        let op = FeedOperation::new(
            "x",
            vec![props(json!({"$match": {"a": {"$var": "missing"}}}))],
        );
        let err = op.resolve_stages(&Document::new()).unwrap_err();
        assert!(matches!(err, ResolveError::UnboundVariable { variable } if variable == "missing"));
    }

    #[test]
    fn test_operator_in_variable_value_is_rejected() {
        let op = FeedOperation::new("x", vec![props(json!({"$match": {"a": {"$var": "v"}}}))]);
        let err = op
            .resolve_stages(&vars(json!({"v": {"$ne": null}})))
            .unwrap_err();
        assert!(matches!(err, ResolveError::InvalidVariable { variable, .. } if variable == "v"));
    }

    #[test]
    fn test_objects_with_extra_keys_are_not_placeholders() {
        let op = FeedOperation::new(
            "x",
            vec![props(json!({"$match": {"a": {"$var": "v", "other": 1}}}))],
        );
        let stages = op.resolve_stages(&Document::new()).unwrap();
        assert_eq!(
            Value::Object(stages[0].clone()),
            json!({"$match": {"a": {"$var": "v", "other": 1}}})
        );
    }
}
