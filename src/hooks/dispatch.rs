//! Per-request hook dispatch.
//!
//! Runs the hooks a collection declares, in order, against the current
//! exchange. Every failure on this path degrades to a warning on the request
//! context; [`HookDispatcher::dispatch`] has no error channel.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::context::{Exchange, RequestContext};
use crate::error::RegistryError;
use crate::meta::HookDeclaration;

use super::registry::{HookRegistry, Resolved, HOOKS_GROUP};

/// Invokes declared hooks for each request.
#[derive(Debug, Clone)]
pub struct HookDispatcher {
    registry: Arc<HookRegistry>,
}

impl HookDispatcher {
    /// Creates a dispatcher resolving hooks in `registry`.
    #[must_use]
    pub fn new(registry: Arc<HookRegistry>) -> Self {
        Self { registry }
    }

    /// The registry hooks are resolved in.
    #[must_use]
    pub fn registry(&self) -> &Arc<HookRegistry> {
        &self.registry
    }

    /// Runs the hooks declared on the request's resource.
    ///
    /// A request with no resource, or whose resource declares no hooks, is a
    /// no-op and leaves `ctx` untouched.
    pub fn dispatch(&self, exchange: &mut Exchange, ctx: &mut RequestContext) {
        let declarations = match ctx.resource() {
            Some(resource) if resource.has_hooks() => resource.hook_declarations(),
            _ => {
                tracing::trace!(path = exchange.path(), "no hooks declared");
                return;
            }
        };

        let declarations = match declarations {
            Ok(decls) => decls,
            Err(err) => {
                tracing::warn!(path = exchange.path(), error = %err, "cannot parse hook declarations");
                ctx.add_warning(err.to_string());
                return;
            }
        };

        for decl in &declarations {
            self.run_one(decl, exchange, ctx);
        }
    }

    fn run_one(&self, decl: &HookDeclaration, exchange: &mut Exchange, ctx: &mut RequestContext) {
        let Resolved { instance, conf_args } = match self.registry.resolve(HOOKS_GROUP, &decl.name) {
            Ok(resolved) => resolved,
            Err(err @ RegistryError::SingletonNotFound { .. }) => {
                tracing::warn!(hook = %decl.name, "hook not registered");
                ctx.add_warning(err.to_string());
                return;
            }
            Err(RegistryError::InitializationFailed { message, .. }) => {
                record_failure(ctx, &decl.name, &message);
                return;
            }
        };

        match catch_unwind(AssertUnwindSafe(|| instance.supports(ctx))) {
            Ok(true) => {}
            Ok(false) => return,
            Err(payload) => {
                record_failure(ctx, &decl.name, &panic_message(payload.as_ref()));
                return;
            }
        }

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            instance.hook(exchange, ctx, &decl.args, conf_args.as_ref())
        }));

        match outcome {
            Ok(Ok(())) => tracing::debug!(hook = %decl.name, "hook executed"),
            Ok(Err(err)) => record_failure(ctx, &decl.name, &err.to_string()),
            Err(payload) => record_failure(ctx, &decl.name, &panic_message(payload.as_ref())),
        }
    }
}

fn record_failure(ctx: &mut RequestContext, name: &str, message: &str) {
    tracing::warn!(hook = name, error = message, "hook failed");
    ctx.add_warning(format!("Error executing hook '{name}': {message}"));
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "hook panicked".to_string())
}
