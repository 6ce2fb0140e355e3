/// Bookkeeping pool: hands out contexts bound to its endpoint and keeps
/// counters, without holding real connections
use super::{
    CommandControl, CommandControlSource, ConnectionPool, Lease, NonTransaction, PoolFactory,
    PoolSettings, PoolStatistics, Transaction, TransactionOptions,
};
use crate::core::Endpoint;
use crate::error::PoolError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
struct DefaultControl {
    control: CommandControl,
    source: CommandControlSource,
}

pub struct TrackingPool {
    endpoint: Endpoint,
    max_size: usize,
    in_use: Arc<AtomicUsize>,
    closed: AtomicBool,
    transactions_started: AtomicU64,
    statements_started: AtomicU64,
    rejected: AtomicU64,
    default_control: RwLock<DefaultControl>,
}

impl TrackingPool {
    pub fn new(endpoint: Endpoint, settings: &PoolSettings) -> Self {
        Self {
            endpoint,
            max_size: settings.max_size,
            in_use: Arc::new(AtomicUsize::new(0)),
            closed: AtomicBool::new(false),
            transactions_started: AtomicU64::new(0),
            statements_started: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            default_control: RwLock::new(DefaultControl {
                control: settings.command_control,
                source: CommandControlSource::GlobalConfig,
            }),
        }
    }

    /// Reject every further request; open contexts stay valid
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            log::info!("Pool for {} closed", self.endpoint);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn acquire(&self) -> Result<Lease, PoolError> {
        if self.is_closed() {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(PoolError::Closed {
                host_port: self.endpoint.host_port(),
            });
        }

        let reserved = self
            .in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |in_use| {
                (in_use < self.max_size).then_some(in_use + 1)
            });
        if reserved.is_err() {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(PoolError::Exhausted {
                host_port: self.endpoint.host_port(),
                max_size: self.max_size,
            });
        }

        let in_use = Arc::clone(&self.in_use);
        Ok(Lease::new(move || {
            in_use.fetch_sub(1, Ordering::AcqRel);
        }))
    }

    fn effective_control(&self, requested: Option<CommandControl>) -> CommandControl {
        requested.unwrap_or_else(|| self.default_command_control())
    }
}

#[async_trait]
impl ConnectionPool for TrackingPool {
    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn begin(
        &self,
        options: TransactionOptions,
        command_control: Option<CommandControl>,
    ) -> Result<Transaction, PoolError> {
        let lease = self.acquire()?;
        self.transactions_started.fetch_add(1, Ordering::Relaxed);
        Ok(Transaction::new(
            &self.endpoint,
            options,
            self.effective_control(command_control),
            lease,
        ))
    }

    async fn start(&self, command_control: Option<CommandControl>) -> Result<NonTransaction, PoolError> {
        let lease = self.acquire()?;
        self.statements_started.fetch_add(1, Ordering::Relaxed);
        Ok(NonTransaction::new(
            &self.endpoint,
            self.effective_control(command_control),
            lease,
        ))
    }

    fn statistics(&self) -> PoolStatistics {
        PoolStatistics {
            transactions_started: self.transactions_started.load(Ordering::Relaxed),
            statements_started: self.statements_started.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            in_use: self.in_use.load(Ordering::Acquire),
            max_size: self.max_size,
            closed: self.is_closed(),
        }
    }

    fn set_default_command_control(&self, control: CommandControl, source: CommandControlSource) {
        let mut current = self.default_control.write();
        if source == CommandControlSource::GlobalConfig
            && current.source == CommandControlSource::User
        {
            log::debug!(
                "Pool for {} keeps user command control, ignoring global config update",
                self.endpoint
            );
            return;
        }
        *current = DefaultControl { control, source };
    }

    fn default_command_control(&self) -> CommandControl {
        self.default_control.read().control
    }
}

/// Builds a [`TrackingPool`] per endpoint
pub struct TrackingPoolFactory;

impl PoolFactory for TrackingPoolFactory {
    fn create(&self, endpoint: &Endpoint, settings: &PoolSettings) -> Arc<dyn ConnectionPool> {
        Arc::new(TrackingPool::new(endpoint.clone(), settings))
    }
}
