/// Unified error handling for the cluster router
///
/// Routing and configuration errors are raised before any pool is touched,
/// availability errors only after the fallback chain has been walked, and
/// pool errors are passed through without reinterpretation.

use std::fmt;
use thiserror::Error;

pub use crate::config::ConfigError;

/// Main error type for router operations
#[derive(Debug, Error)]
pub enum RouterError {
    /// Conflicting request flags or an unusable cluster definition
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// No live endpoint satisfies the requested role
    #[error("Cluster unavailable: {message}")]
    ClusterUnavailable { message: String },

    /// Misuse of the routing machinery (e.g. falling back from master)
    #[error("Cluster error: {message}")]
    Cluster { message: String },

    /// Caller broke a usage contract
    #[error("Logic error: {message}")]
    Logic { message: String },

    /// Errors raised by the pool of the selected endpoint
    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    /// Configuration file errors
    #[error("Configuration file error: {0}")]
    Config(#[from] ConfigError),

    /// Internal errors (should not happen in normal operation)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Errors produced inside a single endpoint's connection pool
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("pool for {host_port} is closed")]
    Closed { host_port: String },

    #[error("pool for {host_port} exhausted ({max_size} contexts in use)")]
    Exhausted { host_port: String, max_size: usize },

    #[error("execution failed on {host_port}: {message}")]
    Execution { host_port: String, message: String },
}

/// Result type alias for router operations
pub type RouterResult<T> = Result<T, RouterError>;

/// Convenience methods for creating specific error types
impl RouterError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        RouterError::Configuration {
            message: message.into(),
        }
    }

    /// Create a cluster-unavailable error
    pub fn unavailable<S: Into<String>>(message: S) -> Self {
        RouterError::ClusterUnavailable {
            message: message.into(),
        }
    }

    /// Create a fatal cluster error
    pub fn cluster<S: Into<String>>(message: S) -> Self {
        RouterError::Cluster {
            message: message.into(),
        }
    }

    /// Create a logic error
    pub fn logic<S: Into<String>>(message: S) -> Self {
        RouterError::Logic {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        RouterError::Internal {
            message: message.into(),
        }
    }

    /// Check if this error is recoverable (caller may retry with backoff)
    pub fn is_recoverable(&self) -> bool {
        match self {
            RouterError::ClusterUnavailable { .. } => true,
            RouterError::Pool(e) => e.is_recoverable(),
            _ => false,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            RouterError::Configuration { .. } => ErrorSeverity::Critical,
            RouterError::Config(_) => ErrorSeverity::Critical,
            RouterError::Cluster { .. } => ErrorSeverity::Critical,
            RouterError::Logic { .. } => ErrorSeverity::Critical,
            RouterError::Internal { .. } => ErrorSeverity::Critical,
            RouterError::ClusterUnavailable { .. } => ErrorSeverity::Warning,
            RouterError::Pool(_) => ErrorSeverity::Error,
        }
    }
}

impl PoolError {
    pub fn execution<S: Into<String>>(host_port: S, message: S) -> Self {
        PoolError::Execution {
            host_port: host_port.into(),
            message: message.into(),
        }
    }

    pub fn is_recoverable(&self) -> bool {
        !matches!(self, PoolError::Closed { .. })
    }
}

/// Error severity levels for logging and monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Programming or configuration errors that require immediate attention
    Critical,
    /// Errors that affect functionality but don't crash the system
    Error,
    /// Transient conditions, usually resolved by a retry
    Warning,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Warning => write!(f, "WARNING"),
        }
    }
}
