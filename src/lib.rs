pub mod config;
pub mod error;
/// Quorum Router - topology tracker and host router for replicated SQL clusters
///
/// A background monitor probes every endpoint and publishes immutable
/// role/liveness snapshots; each request is routed by role and strategy
/// against the latest snapshot and handed to the chosen endpoint's pool:
/// 1. Topology: periodic probes, stale-role retention, lock-free publication
/// 2. Routing: role validation, fallback to master, round-robin or nearest
pub mod cluster;
pub mod core;
pub mod health;
pub mod pool;
pub mod router;
pub mod stats;
pub mod topology;
pub mod utils;

use crate::cluster::Cluster;
use crate::config::Config;
use crate::core::EndpointRegistry;
use crate::error::RouterResult;
use crate::health::tcp::TcpProbe;
use crate::health::HostProbe;
use crate::pool::TrackingPoolFactory;
use std::sync::Arc;
use std::time::Duration;

/// Validated runtime settings of the router
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub endpoints: Vec<String>,
    pub probe_interval_ms: u64,
    pub probe_timeout_ms: u64,
    pub max_pool_size: usize,
}

impl RouterConfig {
    /// Create a new router configuration with validation
    pub fn new(
        endpoints: Vec<String>,
        probe_interval_ms: u64,
        probe_timeout_ms: u64,
        max_pool_size: usize,
    ) -> Result<Self, String> {
        if endpoints.is_empty() {
            return Err("At least one endpoint DSN is required".to_string());
        }

        if endpoints.iter().any(|dsn| dsn.trim().is_empty()) {
            return Err("Endpoint DSN cannot be empty".to_string());
        }

        if probe_interval_ms == 0 {
            return Err("Probe interval must be greater than 0".to_string());
        }

        if probe_timeout_ms == 0 || probe_timeout_ms >= probe_interval_ms {
            return Err("Probe timeout must be greater than 0 and less than the probe interval".to_string());
        }

        if max_pool_size == 0 {
            return Err("Max pool size must be greater than 0".to_string());
        }

        Ok(Self {
            endpoints,
            probe_interval_ms,
            probe_timeout_ms,
            max_pool_size,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, String> {
        Self::new(
            config.dsn_list(),
            config.topology.probe_interval_ms,
            config.topology.probe_timeout_ms,
            config.pool.max_size,
        )
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Check if the configuration is valid
    pub fn is_valid(&self) -> bool {
        !self.endpoints.is_empty()
            && self.probe_interval_ms > 0
            && self.probe_timeout_ms > 0
            && self.probe_timeout_ms < self.probe_interval_ms
            && self.max_pool_size > 0
    }
}

/// Router runtime: a cluster over TCP-probed endpoints and tracking pools
pub struct QuorumRouter {
    settings: RouterConfig,
    cluster: Arc<Cluster>,
}

impl QuorumRouter {
    pub fn new(config: &Config) -> RouterResult<Self> {
        let settings = RouterConfig::from_config(config).map_err(error::RouterError::configuration)?;
        let cluster = Cluster::from_config(
            config,
            |registry: &EndpointRegistry| {
                Box::new(TcpProbe::from_config(config, registry)) as Box<dyn HostProbe>
            },
            &TrackingPoolFactory,
        )?;

        Ok(Self {
            settings,
            cluster: Arc::new(cluster),
        })
    }

    /// Probe once so the first request sees a real topology, then keep probing
    pub async fn start(&self) {
        let monitor = self.cluster.monitor();
        monitor.check_once(self.settings.probe_timeout()).await;
        monitor.start(self.settings.probe_interval(), self.settings.probe_timeout());
    }

    pub fn shutdown(&self) {
        self.cluster.monitor().stop();
    }

    pub fn cluster(&self) -> &Arc<Cluster> {
        &self.cluster
    }

    pub fn settings(&self) -> &RouterConfig {
        &self.settings
    }
}
