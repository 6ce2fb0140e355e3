/// Per-endpoint connection pools, seen from the router
///
/// Connection lifecycle and queueing belong to the pool implementation; the
/// router only needs the operations of [`ConnectionPool`].
pub mod tracking;

pub use tracking::{TrackingPool, TrackingPoolFactory};

use crate::config::{CommandControlConfig, Config};
use crate::core::Endpoint;
use crate::error::PoolError;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Timeouts applied to operations of a transaction or statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommandControl {
    pub execute_timeout: Duration,
    pub statement_timeout: Duration,
}

impl CommandControl {
    pub fn new(execute_timeout: Duration, statement_timeout: Duration) -> Self {
        Self {
            execute_timeout,
            statement_timeout,
        }
    }
}

impl From<&CommandControlConfig> for CommandControl {
    fn from(config: &CommandControlConfig) -> Self {
        Self::new(
            Duration::from_millis(config.execute_timeout_ms),
            Duration::from_millis(config.statement_timeout_ms),
        )
    }
}

impl Default for CommandControl {
    fn default() -> Self {
        Self::from(&Config::default().command_control)
    }
}

/// Where a default command control came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandControlSource {
    /// Dynamic/global configuration; never overrides a user value
    GlobalConfig,
    /// Explicitly set by the service code
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    #[default]
    ReadCommitted,
    RepeatableRead,
    Serializable,
    ReadUncommitted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionMode {
    #[default]
    ReadWrite,
    ReadOnly,
    /// Read-only and deferrable (serializable snapshot without aborts)
    Deferrable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransactionOptions {
    pub isolation_level: IsolationLevel,
    pub mode: TransactionMode,
}

impl TransactionOptions {
    pub fn read_write() -> Self {
        Self::default()
    }

    pub fn read_only() -> Self {
        Self {
            mode: TransactionMode::ReadOnly,
            ..Self::default()
        }
    }

    pub fn with_isolation_level(mut self, isolation_level: IsolationLevel) -> Self {
        self.isolation_level = isolation_level;
        self
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self.mode, TransactionMode::ReadOnly | TransactionMode::Deferrable)
    }
}

/// Releases a pool slot when dropped
pub struct Lease {
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Lease {
    pub fn new<F>(release: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Lease holding no slot
    pub fn detached() -> Self {
        Self { release: None }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for Lease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("held", &self.release.is_some())
            .finish()
    }
}

/// Transaction context bound to one endpoint
#[derive(Debug)]
pub struct Transaction {
    endpoint_index: usize,
    host_port: String,
    options: TransactionOptions,
    command_control: CommandControl,
    _lease: Lease,
}

impl Transaction {
    pub fn new(
        endpoint: &Endpoint,
        options: TransactionOptions,
        command_control: CommandControl,
        lease: Lease,
    ) -> Self {
        Self {
            endpoint_index: endpoint.index,
            host_port: endpoint.host_port(),
            options,
            command_control,
            _lease: lease,
        }
    }

    pub fn endpoint_index(&self) -> usize {
        self.endpoint_index
    }

    pub fn host_port(&self) -> &str {
        &self.host_port
    }

    pub fn options(&self) -> TransactionOptions {
        self.options
    }

    pub fn command_control(&self) -> CommandControl {
        self.command_control
    }
}

/// Single-statement context bound to one endpoint
#[derive(Debug)]
pub struct NonTransaction {
    endpoint_index: usize,
    host_port: String,
    command_control: CommandControl,
    _lease: Lease,
}

impl NonTransaction {
    pub fn new(endpoint: &Endpoint, command_control: CommandControl, lease: Lease) -> Self {
        Self {
            endpoint_index: endpoint.index,
            host_port: endpoint.host_port(),
            command_control,
            _lease: lease,
        }
    }

    pub fn endpoint_index(&self) -> usize {
        self.endpoint_index
    }

    pub fn host_port(&self) -> &str {
        &self.host_port
    }

    pub fn command_control(&self) -> CommandControl {
        self.command_control
    }
}

/// Counters reported by a pool
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolStatistics {
    pub transactions_started: u64,
    pub statements_started: u64,
    pub rejected: u64,
    pub in_use: usize,
    pub max_size: usize,
    pub closed: bool,
}

/// Execution channel to one endpoint
#[async_trait]
pub trait ConnectionPool: Send + Sync {
    fn endpoint(&self) -> &Endpoint;

    /// Start a transaction; `None` uses the pool default command control
    async fn begin(
        &self,
        options: TransactionOptions,
        command_control: Option<CommandControl>,
    ) -> Result<Transaction, PoolError>;

    /// Start a single-statement context
    async fn start(&self, command_control: Option<CommandControl>) -> Result<NonTransaction, PoolError>;

    fn statistics(&self) -> PoolStatistics;

    fn set_default_command_control(&self, control: CommandControl, source: CommandControlSource);

    fn default_command_control(&self) -> CommandControl;
}

/// Settings every pool of a cluster is created with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_size: usize,
    pub command_control: CommandControl,
}

impl PoolSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_size: config.pool.max_size,
            command_control: CommandControl::from(&config.command_control),
        }
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_size: 10,
            command_control: CommandControl::default(),
        }
    }
}

/// Creates the pool of one endpoint
pub trait PoolFactory: Send + Sync {
    fn create(&self, endpoint: &Endpoint, settings: &PoolSettings) -> Arc<dyn ConnectionPool>;
}

/// One pool per endpoint, in endpoint order
pub fn create_pools(
    endpoints: &[Endpoint],
    factory: &dyn PoolFactory,
    settings: &PoolSettings,
) -> Vec<Arc<dyn ConnectionPool>> {
    endpoints
        .iter()
        .map(|endpoint| factory.create(endpoint, settings))
        .collect()
}
