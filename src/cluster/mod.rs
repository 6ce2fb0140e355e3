/// Cluster facade: routes requests to per-endpoint pools
///
/// Every request is routed from one loaded [`TopologyState`](crate::topology::TopologyState),
/// so role and liveness are always judged together. Routing and flag errors
/// surface before any pool is touched; pool errors are returned unchanged.
use crate::config::Config;
use crate::core::{EndpointRegistry, HostRole, RequestFlags};
use crate::error::{RouterError, RouterResult};
use crate::health::HostProbe;
use crate::pool::{
    create_pools, CommandControl, CommandControlSource, ConnectionPool, NonTransaction,
    PoolFactory, PoolSettings, Transaction, TransactionOptions,
};
use crate::router::{DiscoveryOrder, HostRouter, LatencyRanking, ProbeRttRanking, StaticRanking};
use crate::stats::{ClusterStatistics, InstanceStatsDescriptor};
use crate::topology::TopologyMonitor;
use log::{debug, info, trace};
use std::sync::Arc;

pub struct Cluster {
    registry: Arc<EndpointRegistry>,
    monitor: Arc<TopologyMonitor>,
    router: HostRouter,
    pools: Vec<Arc<dyn ConnectionPool>>,
}

impl Cluster {
    /// Assemble a cluster from a monitor and one pool per monitored endpoint
    pub fn new(
        monitor: Arc<TopologyMonitor>,
        pools: Vec<Arc<dyn ConnectionPool>>,
        ranking: Box<dyn LatencyRanking>,
    ) -> RouterResult<Self> {
        let registry = monitor.registry();
        if registry.is_empty() {
            return Err(RouterError::configuration(
                "Cannot create a cluster from an empty DSN list",
            ));
        }
        if pools.len() != registry.len() {
            return Err(RouterError::configuration(format!(
                "Expected {} pools, got {}",
                registry.len(),
                pools.len()
            )));
        }

        info!("Cluster created with {} endpoints", registry.len());

        Ok(Self {
            registry,
            monitor,
            router: HostRouter::new(ranking),
            pools,
        })
    }

    /// Build the registry, monitor and pools described by `config`.
    ///
    /// The monitor is created but not started.
    pub fn from_config<P>(config: &Config, probe: P, factory: &dyn PoolFactory) -> RouterResult<Self>
    where
        P: FnOnce(&EndpointRegistry) -> Box<dyn HostProbe>,
    {
        if config.cluster.endpoints.is_empty() {
            return Err(RouterError::configuration(
                "Cannot create a cluster from an empty DSN list",
            ));
        }
        config.validate()?;

        let registry = Arc::new(EndpointRegistry::new(config.dsn_list())?);
        let pools = create_pools(registry.as_slice(), factory, &PoolSettings::from_config(config));
        let probe = probe(&registry);
        let monitor = Arc::new(TopologyMonitor::new(registry, probe));

        Self::new(monitor, pools, ranking_from_config(config))
    }

    /// Start a transaction.
    ///
    /// Read-write transactions always go to the master; asking for one on an
    /// explicitly non-master role set fails without looking at the topology.
    /// Read-only transactions without a role go to a slave.
    pub async fn begin(
        &self,
        flags: RequestFlags,
        options: TransactionOptions,
        command_control: Option<CommandControl>,
    ) -> RouterResult<Transaction> {
        let flags = if options.is_read_only() {
            if flags.has_roles() {
                flags
            } else {
                flags.with_role(HostRole::Slave)
            }
        } else {
            if flags.has_roles() && !flags.contains_role(HostRole::Master) {
                return Err(RouterError::unavailable(format!(
                    "Cannot start RW-transaction on a non-master role ({})",
                    flags
                )));
            }
            flags.without_roles().with_role(HostRole::Master)
        };

        let pool = self.find_pool(&flags)?;
        debug!(
            "Starting transaction on {} ({}, {:?})",
            pool.endpoint(),
            flags,
            options
        );
        Ok(pool.begin(options, command_control).await?)
    }

    /// Start a single-statement context; a role is mandatory
    pub async fn start(
        &self,
        flags: RequestFlags,
        command_control: Option<CommandControl>,
    ) -> RouterResult<NonTransaction> {
        if !flags.has_roles() {
            return Err(RouterError::logic(
                "Host role must be specified for execution of a single statement",
            ));
        }

        let pool = self.find_pool(&flags)?;
        debug!("Starting statement on {} ({})", pool.endpoint(), flags);
        Ok(pool.start(command_control).await?)
    }

    /// Index of the endpoint a request with `flags` would be sent to now
    pub fn select_endpoint(&self, flags: &RequestFlags) -> RouterResult<usize> {
        let state = self.monitor.current();
        self.router.select(flags, &state)
    }

    pub fn find_pool(&self, flags: &RequestFlags) -> RouterResult<&Arc<dyn ConnectionPool>> {
        let index = self.select_endpoint(flags)?;
        trace!("Selected endpoint #{} for {}", index, flags);
        self.pools.get(index).ok_or_else(|| {
            RouterError::internal(format!("No pool for endpoint #{}", index))
        })
    }

    pub fn set_default_command_control(&self, control: CommandControl, source: CommandControlSource) {
        for pool in &self.pools {
            pool.set_default_command_control(control, source);
        }
    }

    /// Default of the first pool; every pool holds the same value
    pub fn default_command_control(&self) -> CommandControl {
        self.pools
            .first()
            .map(|pool| pool.default_command_control())
            .unwrap_or_default()
    }

    /// Role-partitioned statistics of every endpoint
    pub fn statistics(&self) -> ClusterStatistics {
        let state = self.monitor.current();
        ClusterStatistics::aggregate(&state.roles, &state.alive, |index| {
            InstanceStatsDescriptor {
                index,
                host_port: self.registry[index].host_port(),
                alive: state.alive.contains(index),
                stats: self.pools[index].statistics(),
                probe_rtt_ms: self
                    .monitor
                    .rtt_histogram(index)
                    .map(|histogram| histogram.to_vec())
                    .unwrap_or_default(),
            }
        })
    }

    pub fn monitor(&self) -> &Arc<TopologyMonitor> {
        &self.monitor
    }

    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    pub fn pools(&self) -> &[Arc<dyn ConnectionPool>] {
        &self.pools
    }
}

/// Latency ranking selected by the routing section
pub fn ranking_from_config(config: &Config) -> Box<dyn LatencyRanking> {
    match &config.routing.nearest_order {
        Some(order) => Box::new(StaticRanking::new(order.clone())),
        None if config.routing.rank_by_probe_rtt => Box::new(ProbeRttRanking),
        None => Box::new(DiscoveryOrder),
    }
}
