//! Operation resolution.
//!
//! Maps a requested feed operation name onto concrete, fully bound pipeline
//! stages. Pure: no side effects, safe to call concurrently.

use crate::document::Document;
use crate::error::ResolveError;
use crate::resource::ResourceConfig;

/// Resolves a feed operation into pipeline stages.
pub trait OperationResolver: Send + Sync {
    /// Resolves `operation` declared on `config`, binding `vars`.
    ///
    /// # Errors
    /// - `OperationNotFound` when no declared feed has `operation` as its uri.
    /// - `UnboundVariable` when a template references a variable missing from `vars`.
    fn resolve(
        &self,
        config: &ResourceConfig,
        operation: &str,
        vars: &Document,
    ) -> Result<Vec<Document>, ResolveError>;
}

/// Default resolver over the `feeds` collection property.
#[derive(Debug, Default, Clone, Copy)]
pub struct PipelineResolver;

impl OperationResolver for PipelineResolver {
    fn resolve(
        &self,
        config: &ResourceConfig,
        operation: &str,
        vars: &Document,
    ) -> Result<Vec<Document>, ResolveError> {
        let feeds = config.feed_operations()?;
        let feed = feeds
            .iter()
            .find(|f| f.uri() == operation)
            .ok_or_else(|| ResolveError::OperationNotFound {
                operation: operation.to_string(),
            })?;

        feed.resolve_stages(vars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourcePath;
    use serde_json::{json, Value};

    fn orders() -> ResourceConfig {
        ResourceConfig::from_value(
            ResourcePath::new("db", "orders"),
            json!({"feeds": [
                {"uri": "new-orders", "stages": [{"$match": {"fullDocument.status": "new"}}]},
                {"uri": "by-status", "stages": [{"$match": {"fullDocument.status": {"$var": "s"}}}]}
            ]}),
        )
    }

    #[test]
    fn test_resolves_declared_operation() {
        let stages = PipelineResolver
            .resolve(&orders(), "new-orders", &Document::new())
            .unwrap();
        assert_eq!(
            Value::Object(stages[0].clone()),
            json!({"$match": {"fullDocument.status": "new"}})
        );
    }

    #[test]
    fn test_unknown_operation_is_not_found() {
        let err = PipelineResolver
            .resolve(&orders(), "nonexistent", &Document::new())
            .unwrap_err();
        assert!(matches!(err, ResolveError::OperationNotFound { operation } if operation == "nonexistent"));
    }

    #[test]
    fn test_missing_binding_is_unbound() {
        let err = PipelineResolver
            .resolve(&orders(), "by-status", &Document::new())
            .unwrap_err();
        assert!(matches!(err, ResolveError::UnboundVariable { .. }));
    }

    #[test]
    fn test_resource_without_feeds_has_no_operations() {
        let config = ResourceConfig::from_value(ResourcePath::new("db", "c"), json!({}));
        let err = PipelineResolver
            .resolve(&config, "anything", &Document::new())
            .unwrap_err();
        assert!(matches!(err, ResolveError::OperationNotFound { .. }));
    }
}
