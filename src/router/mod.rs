/// Host routing: role resolution with fallback, then strategy selection
///
/// The router is pure computation over one [`TopologyState`]; it never waits
/// and never touches a pool.
pub mod strategy;

pub use strategy::{
    DiscoveryOrder, LatencyRanking, Nearest, ProbeRttRanking, RoundRobin, SelectionAlgorithm,
    StaticRanking,
};

use crate::core::{HostRole, RequestFlags, RoleTarget, RouteRequest, Strategy};
use crate::error::{RouterError, RouterResult};
use crate::topology::TopologyState;
use log::{trace, warn};

/// Outcome of resolving a validated request against a topology state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Selected(usize),
    Unavailable(String),
    ConfigError(String),
}

impl Selection {
    pub fn into_result(self) -> RouterResult<usize> {
        match self {
            Selection::Selected(index) => Ok(index),
            Selection::Unavailable(reason) => Err(RouterError::unavailable(reason)),
            Selection::ConfigError(reason) => Err(RouterError::configuration(reason)),
        }
    }
}

/// Next role to try when `role` has no live endpoint
pub fn fallback(role: HostRole) -> RouterResult<HostRole> {
    match role {
        HostRole::SyncSlave | HostRole::Slave => Ok(HostRole::Master),
        HostRole::Master | HostRole::Unknown => Err(RouterError::cluster(format!(
            "Cannot fall back from {} role",
            role
        ))),
    }
}

pub struct HostRouter {
    round_robin: RoundRobin,
    nearest: Nearest,
}

impl HostRouter {
    pub fn new(ranking: Box<dyn LatencyRanking>) -> Self {
        Self {
            round_robin: RoundRobin::new(),
            nearest: Nearest::new(ranking),
        }
    }

    /// Validate `flags` and pick an endpoint index from `state`
    pub fn select(&self, flags: &RequestFlags, state: &TopologyState) -> RouterResult<usize> {
        let request = flags.validate()?;
        let index = self.resolve(&request, state)?.into_result()?;
        trace!(
            "Routed {} to endpoint #{} (generation {})",
            flags,
            index,
            state.generation
        );
        Ok(index)
    }

    /// Walk the fallback chain for a validated request.
    ///
    /// `Err` is reserved for misuse of the chain itself.
    pub fn resolve(&self, request: &RouteRequest, state: &TopologyState) -> RouterResult<Selection> {
        let mut role = match request.target {
            RoleTarget::AnyAlive => {
                let candidates = state.alive.indices();
                if candidates.is_empty() {
                    return Ok(Selection::Unavailable("No alive endpoints".to_string()));
                }
                return Ok(self.pick(request.strategy, state, &candidates));
            }
            RoleTarget::Role(role) => role,
        };

        loop {
            let bucket = state.roles.bucket(role);
            if let Some(&stray) = bucket.iter().find(|&&index| index >= state.endpoint_count()) {
                return Ok(Selection::ConfigError(format!(
                    "Topology lists endpoint #{} as {} but only {} endpoints are configured",
                    stray,
                    role,
                    state.endpoint_count()
                )));
            }

            let mut live = state.alive.intersect(bucket);
            if !live.is_empty() {
                if role == HostRole::Master {
                    live.truncate(1);
                }
                return Ok(self.pick(request.strategy, state, &live));
            }

            if role == HostRole::Master {
                return Ok(Selection::Unavailable(format!(
                    "No alive endpoints with {} role",
                    role
                )));
            }

            let next = fallback(role)?;
            warn!("No alive {} endpoints, falling back to {}", role, next);
            role = next;
        }
    }

    fn pick(&self, strategy: Strategy, state: &TopologyState, bucket: &[usize]) -> Selection {
        let algorithm: &dyn SelectionAlgorithm = match strategy {
            Strategy::RoundRobin => &self.round_robin,
            Strategy::Nearest => &self.nearest,
        };

        match algorithm.select(state, bucket) {
            Some(index) => Selection::Selected(index),
            None => Selection::Unavailable(format!("No endpoint selected by {}", strategy)),
        }
    }
}

impl Default for HostRouter {
    fn default() -> Self {
        Self::new(Box::new(DiscoveryOrder))
    }
}
