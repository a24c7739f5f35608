//! Hooks available without registering a custom kind.

use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;
use serde_json::Value;

use crate::context::{Exchange, RequestContext};
use crate::error::HookError;

use super::hook::Hook;

/// Logs every request it sees. Never touches the exchange.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnooperHook;

impl SnooperHook {
    /// Catalog kind name.
    pub const KIND: &'static str = "snooper";
}

impl Hook for SnooperHook {
    fn supports(&self, _ctx: &RequestContext) -> bool {
        true
    }

    fn hook(
        &self,
        exchange: &mut Exchange,
        ctx: &mut RequestContext,
        args: &Value,
        conf_args: Option<&Value>,
    ) -> Result<(), HookError> {
        tracing::info!(
            method = %ctx.method(),
            path = exchange.path(),
            status = exchange.response().status().map(|s| s.as_u16()),
            args = %args,
            conf_args = ?conf_args,
            "snooped request"
        );
        Ok(())
    }
}

/// Sets response headers.
///
/// Configured as `{"headers": {"name": "value", ...}}`. Per-collection args
/// use the same shape and win over the static configuration.
#[derive(Debug, Clone, Default)]
pub struct ResponseHeaderHook {
    defaults: HeaderMap,
}

impl ResponseHeaderHook {
    /// Catalog kind name.
    pub const KIND: &'static str = "response_header";

    /// Builds the hook from its static configuration.
    ///
    /// # Errors
    /// `InvalidArgs` when the configuration is not a valid header object.
    pub fn from_conf(conf_args: Option<&Value>) -> Result<Self, HookError> {
        let defaults = conf_args.map_or_else(|| Ok(HeaderMap::new()), parse_headers)?;
        Ok(Self { defaults })
    }

    /// Headers from the static configuration.
    #[must_use]
    pub const fn defaults(&self) -> &HeaderMap {
        &self.defaults
    }
}

impl Hook for ResponseHeaderHook {
    fn supports(&self, _ctx: &RequestContext) -> bool {
        true
    }

    fn hook(
        &self,
        exchange: &mut Exchange,
        _ctx: &mut RequestContext,
        args: &Value,
        _conf_args: Option<&Value>,
    ) -> Result<(), HookError> {
        let overrides = parse_headers(args)?;
        let headers = exchange.response_mut().headers_mut();
        for (name, value) in &self.defaults {
            headers.insert(name.clone(), value.clone());
        }
        for (name, value) in &overrides {
            headers.insert(name.clone(), value.clone());
        }
        Ok(())
    }
}

/// Parses `{"headers": {...}}`. Null means no headers.
fn parse_headers(args: &Value) -> Result<HeaderMap, HookError> {
    let mut map = HeaderMap::new();
    let entries = match args {
        Value::Null => return Ok(map),
        Value::Object(obj) => match obj.get("headers") {
            None | Some(Value::Null) => return Ok(map),
            Some(Value::Object(headers)) => headers,
            Some(other) => {
                return Err(HookError::InvalidArgs {
                    reason: format!("'headers' must be an object, got {other}"),
                })
            }
        },
        other => {
            return Err(HookError::InvalidArgs {
                reason: format!("expected an object, got {other}"),
            })
        }
    };

    for (name, value) in entries {
        let Some(text) = value.as_str() else {
            return Err(HookError::InvalidArgs {
                reason: format!("header '{name}' must be a string"),
            });
        };
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| HookError::InvalidArgs {
            reason: format!("invalid header name '{name}': {e}"),
        })?;
        let value = HeaderValue::from_str(text).map_err(|e| HookError::InvalidArgs {
            reason: format!("invalid value for header '{name}': {e}"),
        })?;
        map.insert(name, value);
    }
    Ok(map)
}
