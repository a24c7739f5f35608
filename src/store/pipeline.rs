//! Pipeline evaluation for the in-memory backend.
//!
//! Supports `$match` stages with dotted-path fields and the predicates
//! `$eq`, `$ne`, `$in`, `$nin` and `$exists`; a bare value means `$eq`.
//! Any other stage kind is rejected when the pipeline is compiled.

use serde_json::Value;

use crate::document::{get_path, Document};
use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq)]
enum Predicate {
    Eq(Value),
    Ne(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    Exists(bool),
}

#[derive(Debug, Clone, PartialEq)]
struct FieldFilter {
    path: String,
    predicates: Vec<Predicate>,
}

/// A compiled pipeline: a conjunction of `$match` filters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    filters: Vec<FieldFilter>,
}

fn invalid(reason: impl Into<String>) -> StoreError {
    StoreError::InvalidStage {
        reason: reason.into(),
    }
}

impl Pipeline {
    /// Compiles stage documents.
    pub fn compile(stages: &[Document]) -> Result<Self, StoreError> {
        let mut filters = Vec::new();

        for stage in stages {
            let mut entries = stage.iter();
            let (Some((kind, body)), None) = (entries.next(), entries.next()) else {
                return Err(invalid("a stage must have exactly one key"));
            };

            if kind != "$match" {
                return Err(StoreError::UnsupportedStage {
                    stage: kind.clone(),
                });
            }

            let Value::Object(conditions) = body else {
                return Err(invalid("$match body must be an object"));
            };

            for (path, cond) in conditions {
                if path.starts_with('$') {
                    return Err(invalid(format!("unsupported top-level operator '{path}'")));
                }
                filters.push(FieldFilter {
                    path: path.clone(),
                    predicates: compile_condition(cond)?,
                });
            }
        }

        Ok(Self { filters })
    }

    /// True when `doc` passes every filter.
    #[must_use]
    pub fn matches(&self, doc: &Value) -> bool {
        self.filters.iter().all(|f| {
            let field = get_path(doc, &f.path);
            f.predicates.iter().all(|p| evaluate(p, field))
        })
    }
}

fn compile_condition(cond: &Value) -> Result<Vec<Predicate>, StoreError> {
    let Value::Object(ops) = cond else {
        return Ok(vec![Predicate::Eq(cond.clone())]);
    };

    if ops.is_empty() || !ops.keys().all(|k| k.starts_with('$')) {
        return Ok(vec![Predicate::Eq(cond.clone())]);
    }

    ops.iter()
        .map(|(op, arg)| match op.as_str() {
            "$eq" => Ok(Predicate::Eq(arg.clone())),
            "$ne" => Ok(Predicate::Ne(arg.clone())),
            "$in" | "$nin" => {
                let Value::Array(items) = arg else {
                    return Err(invalid(format!("{op} requires an array")));
                };
                Ok(if op == "$in" {
                    Predicate::In(items.clone())
                } else {
                    Predicate::Nin(items.clone())
                })
            }
            "$exists" => arg
                .as_bool()
                .map(Predicate::Exists)
                .ok_or_else(|| invalid("$exists requires a boolean")),
            other => Err(invalid(format!("unsupported operator '{other}'"))),
        })
        .collect()
}

/// Field equality; an array field also matches when any element is equal.
fn field_eq(field: Option<&Value>, expected: &Value) -> bool {
    match field {
        None => expected.is_null(),
        Some(v) if v == expected => true,
        Some(Value::Array(items)) => items.iter().any(|i| i == expected),
        Some(_) => false,
    }
}

fn evaluate(pred: &Predicate, field: Option<&Value>) -> bool {
    match pred {
        Predicate::Eq(v) => field_eq(field, v),
        Predicate::Ne(v) => !field_eq(field, v),
        Predicate::In(vs) => vs.iter().any(|v| field_eq(field, v)),
        Predicate::Nin(vs) => !vs.iter().any(|v| field_eq(field, v)),
        Predicate::Exists(want) => field.is_some() == *want,
    }
}
