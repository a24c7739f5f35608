//! Named-singleton registry.
//!
//! Maps `(group, name)` to a shared instance plus the static arguments it was
//! configured with. Populated once at startup from [`SingletonSpec`]s, whose
//! `kind` selects a constructor in a [`HookCatalog`]; read-only afterwards.
//! Resolution is a hash lookup, never construction.

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{HookError, RegistryError};

use super::builtin::{ResponseHeaderHook, SnooperHook};
use super::hook::Hook;

/// Registry group holding request hooks.
pub const HOOKS_GROUP: &str = "hooks";

enum Slot<T: ?Sized> {
    Ready { instance: Arc<T>, conf_args: Option<Value> },
    Failed { message: String },
}

/// A resolved singleton.
pub struct Resolved<T: ?Sized> {
    /// Shared instance.
    pub instance: Arc<T>,
    /// Static configuration arguments, if any were configured.
    pub conf_args: Option<Value>,
}

impl<T: ?Sized> Clone for Resolved<T> {
    fn clone(&self) -> Self {
        Self {
            instance: Arc::clone(&self.instance),
            conf_args: self.conf_args.clone(),
        }
    }
}

/// Startup-populated mapping from `(group, name)` to singletons.
pub struct NamedSingletons<T: ?Sized> {
    groups: HashMap<String, HashMap<String, Slot<T>>>,
}

/// Registry of hook singletons.
pub type HookRegistry = NamedSingletons<dyn Hook>;

impl<T: ?Sized> Default for NamedSingletons<T> {
    fn default() -> Self {
        Self {
            groups: HashMap::new(),
        }
    }
}

impl<T: ?Sized> fmt::Debug for NamedSingletons<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (group, slots) in &self.groups {
            let mut names: Vec<&str> = slots.keys().map(String::as_str).collect();
            names.sort_unstable();
            map.entry(group, &names);
        }
        map.finish()
    }
}

impl<T: ?Sized> NamedSingletons<T> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a ready instance, replacing any previous entry of that name.
    pub fn insert(
        &mut self,
        group: impl Into<String>,
        name: impl Into<String>,
        instance: Arc<T>,
        conf_args: Option<Value>,
    ) {
        self.groups
            .entry(group.into())
            .or_default()
            .insert(name.into(), Slot::Ready { instance, conf_args });
    }

    /// Records an entry that failed to initialize. Resolving it reports
    /// `InitializationFailed` with `message`.
    pub fn insert_failed(&mut self, group: impl Into<String>, name: impl Into<String>, message: impl Into<String>) {
        self.groups.entry(group.into()).or_default().insert(
            name.into(),
            Slot::Failed {
                message: message.into(),
            },
        );
    }

    /// Looks up `name` in `group`.
    ///
    /// # Errors
    /// - `SingletonNotFound` when nothing is registered under that name.
    /// - `InitializationFailed` when the entry could not be constructed at startup.
    pub fn resolve(&self, group: &str, name: &str) -> Result<Resolved<T>, RegistryError> {
        match self.groups.get(group).and_then(|g| g.get(name)) {
            Some(Slot::Ready { instance, conf_args }) => Ok(Resolved {
                instance: Arc::clone(instance),
                conf_args: conf_args.clone(),
            }),
            Some(Slot::Failed { message }) => Err(RegistryError::InitializationFailed {
                group: group.to_string(),
                name: name.to_string(),
                message: message.clone(),
            }),
            None => Err(RegistryError::SingletonNotFound {
                group: group.to_string(),
                name: name.to_string(),
            }),
        }
    }

    /// True when any entry, ready or failed, is registered under `name`.
    #[must_use]
    pub fn contains(&self, group: &str, name: &str) -> bool {
        self.groups.get(group).is_some_and(|g| g.contains_key(name))
    }

    /// Registered names in `group`, sorted.
    #[must_use]
    pub fn names(&self, group: &str) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .groups
            .get(group)
            .map(|g| g.keys().map(String::as_str).collect())
            .unwrap_or_default();
        names.sort_unstable();
        names
    }

    /// Total number of entries across groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.values().map(HashMap::len).sum()
    }

    /// True when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One singleton to create at startup.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SingletonSpec {
    /// Registry group.
    #[serde(default = "default_group")]
    pub group: String,
    /// Name collections refer to.
    pub name: String,
    /// Catalog factory to build it with.
    pub kind: String,
    /// Static configuration arguments.
    #[serde(default)]
    pub args: Option<Value>,
}

fn default_group() -> String {
    HOOKS_GROUP.to_string()
}

impl SingletonSpec {
    /// A singleton in the hooks group.
    #[must_use]
    pub fn hook(name: impl Into<String>, kind: impl Into<String>, args: Option<Value>) -> Self {
        Self {
            group: default_group(),
            name: name.into(),
            kind: kind.into(),
            args,
        }
    }
}

/// Constructor for a hook kind, given its static args.
pub type HookFactory = Box<dyn Fn(Option<&Value>) -> Result<Arc<dyn Hook>, HookError> + Send + Sync>;

/// The closed set of hook kinds this process can instantiate.
#[derive(Default)]
pub struct HookCatalog {
    factories: HashMap<String, HookFactory>,
}

impl fmt::Debug for HookCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        f.debug_struct("HookCatalog").field("kinds", &kinds).finish()
    }
}

impl HookCatalog {
    /// An empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog holding the built-in kinds: `snooper` and `response_header`.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        catalog.register(SnooperHook::KIND, |_| Ok(Arc::new(SnooperHook) as Arc<dyn Hook>));
        catalog.register(ResponseHeaderHook::KIND, |args| {
            ResponseHeaderHook::from_conf(args).map(|h| Arc::new(h) as Arc<dyn Hook>)
        });
        catalog
    }

    /// Registers a factory for `kind`, replacing any previous one.
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(Option<&Value>) -> Result<Arc<dyn Hook>, HookError> + Send + Sync + 'static,
    {
        self.factories.insert(kind.into(), Box::new(factory));
    }

    /// True when `kind` can be built.
    #[must_use]
    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Builds an instance of `kind`. A panicking factory is reported as an error.
    pub fn build(&self, kind: &str, args: Option<&Value>) -> Result<Arc<dyn Hook>, HookError> {
        let factory = self
            .factories
            .get(kind)
            .ok_or_else(|| HookError::execution(format!("unknown hook kind '{kind}'")))?;

        catch_unwind(AssertUnwindSafe(|| factory(args)))
            .unwrap_or_else(|_| Err(HookError::execution(format!("factory for '{kind}' panicked"))))
    }
}

impl HookRegistry {
    /// Populates a registry from startup specs.
    ///
    /// Specs outside [`HOOKS_GROUP`] are ignored. A spec that cannot be built
    /// is still registered, as a failed entry, so requests naming it get a
    /// warning that explains why.
    #[must_use]
    pub fn from_specs(specs: &[SingletonSpec], catalog: &HookCatalog) -> Self {
        let mut registry = Self::new();

        for spec in specs {
            if spec.group != HOOKS_GROUP {
                tracing::warn!(group = %spec.group, name = %spec.name, "singleton group not supported, skipped");
                continue;
            }
            if registry.contains(&spec.group, &spec.name) {
                tracing::warn!(name = %spec.name, "duplicate singleton name, later definition wins");
            }

            match catalog.build(&spec.kind, spec.args.as_ref()) {
                Ok(instance) => {
                    tracing::info!(name = %spec.name, kind = %spec.kind, "hook registered");
                    registry.insert(&spec.group, &spec.name, instance, spec.args.clone());
                }
                Err(err) => {
                    tracing::warn!(name = %spec.name, kind = %spec.kind, error = %err, "hook failed to initialize");
                    registry.insert_failed(&spec.group, &spec.name, err.to_string());
                }
            }
        }

        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolves_ready_entries_with_conf_args() {
        let registry = HookRegistry::from_specs(
            &[SingletonSpec::hook("snoop", SnooperHook::KIND, Some(json!({"level": 1})))],
            &HookCatalog::with_builtins(),
        );
        let resolved = registry.resolve(HOOKS_GROUP, "snoop").unwrap();
        assert_eq!(resolved.conf_args, Some(json!({"level": 1})));
    }

    #[test]
    fn test_missing_entry_is_not_found() {
        let registry = HookRegistry::new();
        let err = registry.resolve(HOOKS_GROUP, "ghost").err().unwrap();
        assert!(matches!(err, RegistryError::SingletonNotFound { name, .. } if name == "ghost"));
    }

    #[test]
    fn test_unknown_kind_becomes_failed_entry() {
        let registry = HookRegistry::from_specs(
            &[SingletonSpec::hook("x", "no-such-kind", None)],
            &HookCatalog::with_builtins(),
        );
        assert!(registry.contains(HOOKS_GROUP, "x"));
        let err = registry.resolve(HOOKS_GROUP, "x").err().unwrap();
        assert!(matches!(err, RegistryError::InitializationFailed { message, .. } if message.contains("no-such-kind")));
    }

    #[test]
    fn test_panicking_factory_becomes_failed_entry() {
        let mut catalog = HookCatalog::new();
        catalog.register("boom", |_| panic!("cannot build"));
        let registry = HookRegistry::from_specs(&[SingletonSpec::hook("b", "boom", None)], &catalog);
        assert!(matches!(
            registry.resolve(HOOKS_GROUP, "b").err().unwrap(),
            RegistryError::InitializationFailed { .. }
        ));
    }

    #[test]
    fn test_other_groups_are_skipped() {
        let spec = SingletonSpec {
            group: "checkers".to_string(),
            ..SingletonSpec::hook("s", SnooperHook::KIND, None)
        };
        let registry = HookRegistry::from_specs(&[spec], &HookCatalog::with_builtins());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_spec_deserializes_with_default_group() {
        let spec: SingletonSpec = serde_json::from_value(json!({"name": "n", "kind": "snooper"})).unwrap();
        assert_eq!(spec.group, HOOKS_GROUP);
        assert_eq!(spec.args, None);
    }

    #[test]
    fn test_names_are_sorted() {
        let mut registry = HookRegistry::new();
        registry.insert(HOOKS_GROUP, "b", Arc::new(SnooperHook), None);
        registry.insert(HOOKS_GROUP, "a", Arc::new(SnooperHook), None);
        assert_eq!(registry.names(HOOKS_GROUP), vec!["a", "b"]);
        assert_eq!(registry.len(), 2);
    }
}
