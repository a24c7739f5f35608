//! Per-request state.
//!
//! [`RequestContext`] carries what routing resolved for the request (target
//! resource, feed parameters) and accumulates advisory warnings.
//! [`Exchange`] is the request/response pair hooks and handlers may mutate.

use http::{HeaderMap, Method, StatusCode};
use serde_json::{json, Value};

use crate::document::Document;
use crate::resource::ResourceConfig;

/// Routing results and accumulated warnings for one request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    method: Method,
    resource: Option<ResourceConfig>,
    feed_operation: Option<String>,
    feed_identifier: Option<String>,
    vars: Document,
    warnings: Vec<String>,
}

impl RequestContext {
    /// Creates a context for a request against `resource`.
    #[must_use]
    pub fn new(method: Method, resource: Option<ResourceConfig>) -> Self {
        Self {
            method,
            resource,
            feed_operation: None,
            feed_identifier: None,
            vars: Document::new(),
            warnings: Vec::new(),
        }
    }

    /// Sets the requested feed operation and optional client-chosen handle.
    #[must_use]
    pub fn with_feed(mut self, operation: impl Into<String>, identifier: Option<String>) -> Self {
        self.feed_operation = Some(operation.into());
        self.feed_identifier = identifier;
        self
    }

    /// Sets the variable bindings for pipeline templates.
    #[must_use]
    pub fn with_vars(mut self, vars: Document) -> Self {
        self.vars = vars;
        self
    }

    /// HTTP method of the request.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Configuration of the target resource, if routing found one.
    #[must_use]
    pub const fn resource(&self) -> Option<&ResourceConfig> {
        self.resource.as_ref()
    }

    /// Requested feed operation name.
    #[must_use]
    pub fn feed_operation(&self) -> Option<&str> {
        self.feed_operation.as_deref()
    }

    /// Client-chosen subscription handle.
    #[must_use]
    pub fn feed_identifier(&self) -> Option<&str> {
        self.feed_identifier.as_deref()
    }

    /// Variable bindings for pipeline templates.
    #[must_use]
    pub const fn vars(&self) -> &Document {
        &self.vars
    }

    /// Records an advisory warning returned alongside the response.
    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Warnings recorded so far, in order.
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

/// Response under construction.
#[derive(Debug, Clone, Default)]
pub struct Response {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Option<Value>,
}

impl Response {
    /// Status, once a handler has set one.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// True once a client or server error status has been set.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status
            .is_some_and(|s| s.is_client_error() || s.is_server_error())
    }

    /// Sets the status.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    /// Response headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable response headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// JSON body, if set.
    #[must_use]
    pub const fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Replaces the body.
    pub fn set_body(&mut self, body: Value) {
        self.body = Some(body);
    }
}

/// An HTTP request and the response being built for it.
#[derive(Debug, Clone)]
pub struct Exchange {
    path: String,
    request_headers: HeaderMap,
    request_body: Option<Value>,
    response: Response,
}

impl Exchange {
    /// Creates an exchange for a request to `path`.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            request_headers: HeaderMap::new(),
            request_body: None,
            response: Response::default(),
        }
    }

    /// Attaches a JSON request body.
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.request_body = Some(body);
        self
    }

    /// Request path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Request headers.
    #[must_use]
    pub const fn request_headers(&self) -> &HeaderMap {
        &self.request_headers
    }

    /// Mutable request headers.
    pub fn request_headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.request_headers
    }

    /// JSON request body, if any.
    #[must_use]
    pub const fn request_body(&self) -> Option<&Value> {
        self.request_body.as_ref()
    }

    /// The response under construction.
    #[must_use]
    pub const fn response(&self) -> &Response {
        &self.response
    }

    /// Mutable response.
    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    /// Ends the exchange with `status` and a message body carrying the
    /// context's warnings.
    pub fn end_with_message(&mut self, ctx: &RequestContext, status: StatusCode, message: impl Into<String>) {
        let mut body = json!({
            "http status code": status.as_u16(),
            "http status description": status.canonical_reason().unwrap_or(""),
            "message": message.into(),
        });
        if !ctx.warnings().is_empty() {
            body["_warnings"] = json!(ctx.warnings());
        }
        self.response.set_status(status);
        self.response.set_body(body);
    }
}
