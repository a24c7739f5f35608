use serde_json::Value;

use crate::context::{Exchange, RequestContext};
use crate::error::HookError;

/// A pluggable unit of request-time behavior.
///
/// Implementations are shared across requests and threads.
pub trait Hook: Send + Sync {
    /// Whether this hook applies to the request. Unsupported requests are
    /// skipped silently.
    fn supports(&self, ctx: &RequestContext) -> bool;

    /// Runs the hook.
    ///
    /// `args` are the per-collection arguments from the declaration;
    /// `conf_args` the static arguments the registry entry was configured
    /// with. The hook may mutate the exchange and add warnings to `ctx`.
    fn hook(
        &self,
        exchange: &mut Exchange,
        ctx: &mut RequestContext,
        args: &Value,
        conf_args: Option<&Value>,
    ) -> Result<(), HookError>;
}
