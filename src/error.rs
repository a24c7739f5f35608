//! Error types for feedhook.
//!
//! All errors are strongly typed using thiserror. The subscription path turns
//! them into request-scoped HTTP failures; the hook path degrades them into
//! warnings on the request context.

use http::StatusCode;
use thiserror::Error;

/// Errors raised while turning a requested operation into concrete stages.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The operation is not declared on the resource.
    #[error("query does not exist: {operation}")]
    OperationNotFound {
        /// Requested operation name.
        operation: String,
    },

    /// A placeholder names a variable with no binding and no default.
    #[error("variable '{variable}' is not bound")]
    UnboundVariable {
        /// Variable name.
        variable: String,
    },

    /// A bound value is not allowed in a pipeline.
    #[error("variable '{variable}' is invalid: {reason}")]
    InvalidVariable {
        /// Variable name.
        variable: String,
        /// What is wrong.
        reason: String,
    },

    /// The declarations themselves are malformed.
    #[error("invalid feed metadata: {reason}")]
    InvalidMetadata {
        /// What is wrong.
        reason: String,
    },
}

/// Errors raised by the subscription cache.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// A live subscription already uses the key.
    #[error("a live subscription is already registered at {key}")]
    DuplicateKey {
        /// Cache key.
        key: String,
    },

    /// The cache holds its maximum number of subscriptions.
    #[error("subscription cache is full (max: {max})")]
    CapacityExceeded {
        /// Configured maximum.
        max: usize,
    },
}

/// Errors raised by a backing change-stream source.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend cannot evaluate this stage kind.
    #[error("unsupported pipeline stage '{stage}'")]
    UnsupportedStage {
        /// Stage operator.
        stage: String,
    },

    /// A stage is malformed.
    #[error("invalid pipeline stage: {reason}")]
    InvalidStage {
        /// What is wrong.
        reason: String,
    },

    /// The backend failed.
    #[error("store backend error: {message}")]
    Backend {
        /// Failure message.
        message: String,
    },
}

/// Errors observed while reading a change cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CursorError {
    /// No event arrived in time.
    #[error("no change event within {duration_ms}ms")]
    Timeout {
        /// How long the read waited.
        duration_ms: u64,
    },

    /// The cursor was closed.
    #[error("change cursor is closed")]
    Closed,
}

/// Errors raised while resolving a named singleton.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Nothing is registered under the name.
    #[error("Cannot find singleton '{name}' in singleton group '{group}'")]
    SingletonNotFound {
        /// Registry group.
        group: String,
        /// Singleton name.
        name: String,
    },

    /// The entry could not be built at startup.
    #[error("singleton '{name}' in group '{group}' failed to initialize: {message}")]
    InitializationFailed {
        /// Registry group.
        group: String,
        /// Singleton name.
        name: String,
        /// Failure message.
        message: String,
    },
}

/// Errors raised by hook metadata or hook implementations.
#[derive(Debug, Error)]
pub enum HookError {
    /// The declarations themselves are malformed.
    #[error("invalid hook metadata: {reason}")]
    InvalidMetadata {
        /// What is wrong.
        reason: String,
    },

    /// Hook arguments have the wrong shape.
    #[error("invalid hook args: {reason}")]
    InvalidArgs {
        /// What is wrong.
        reason: String,
    },

    /// The hook failed while running.
    #[error("{message}")]
    Execution {
        /// Failure message.
        message: String,
    },
}

impl HookError {
    /// Creates an execution error.
    #[must_use]
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
        }
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Config file path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid configuration JSON.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range.
    #[error("invalid config: {reason}")]
    Invalid {
        /// What is wrong.
        reason: String,
    },
}

/// Top-level error type for feedhook.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Operation resolution failed.
    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    /// The cache rejected the subscription.
    #[error("Subscription error: {0}")]
    Subscription(#[from] SubscriptionError),

    /// The change-stream source failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Singleton resolution failed.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Hook metadata or execution failed.
    #[error("Hook error: {0}")]
    Hook(#[from] HookError),

    /// Configuration is unusable.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Unexpected internal failure.
    #[error("Internal error: {message}")]
    Internal {
        /// Failure message.
        message: String,
    },
}

impl FeedError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// HTTP status the subscription path reports for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Resolve(ResolveError::OperationNotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Resolve(_) | Self::Hook(HookError::InvalidMetadata { .. }) => StatusCode::BAD_REQUEST,
            Self::Subscription(SubscriptionError::DuplicateKey { .. }) => StatusCode::CONFLICT,
            Self::Subscription(SubscriptionError::CapacityExceeded { .. }) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Store(StoreError::UnsupportedStage { .. } | StoreError::InvalidStage { .. }) => {
                StatusCode::BAD_REQUEST
            }
            Self::Store(StoreError::Backend { .. })
            | Self::Registry(_)
            | Self::Hook(_)
            | Self::Config(_)
            | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns true if the client caused this error; retrying the same request won't help.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }
}

/// Result type alias for feedhook operations.
pub type FeedResult<T> = Result<T, FeedError>;
