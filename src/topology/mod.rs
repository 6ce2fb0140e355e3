/// Cluster topology: immutable role/liveness snapshots and the monitor that
/// keeps them fresh
///
/// A [`TopologyState`] is published as a whole by [`TopologyMonitor`] and
/// shared through `Arc`; a reader keeps the state it loaded alive for as long
/// as it holds the handle, no matter how many newer states get published.
pub mod classify;
pub mod guard;
pub mod monitor;

pub use classify::classify;
pub use guard::TryLockGuard;
pub use monitor::TopologyMonitor;

use crate::core::HostRole;
use fnv::FnvHashMap;
use std::sync::Arc;
use std::time::Duration;

/// Role → endpoint indices, index order preserved within each role
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleSnapshot {
    buckets: FnvHashMap<HostRole, Vec<usize>>,
}

impl RoleSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_buckets<I>(buckets: I) -> Self
    where
        I: IntoIterator<Item = (HostRole, Vec<usize>)>,
    {
        let mut snapshot = Self::new();
        for (role, indices) in buckets {
            for index in indices {
                snapshot.push(role, index);
            }
        }
        snapshot
    }

    pub fn push(&mut self, role: HostRole, index: usize) {
        self.buckets.entry(role).or_default().push(index);
    }

    /// Indices classified under `role`, empty if none
    pub fn bucket(&self, role: HostRole) -> &[usize] {
        self.buckets.get(&role).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Highest-precedence role claiming `index`
    pub fn role_of(&self, index: usize) -> HostRole {
        HostRole::PRECEDENCE
            .into_iter()
            .find(|role| self.bucket(*role).contains(&index))
            .unwrap_or(HostRole::Unknown)
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.values().all(Vec::is_empty)
    }
}

/// Set of endpoint indices that answered the last probe
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LivenessSnapshot {
    alive: Vec<bool>,
}

impl LivenessSnapshot {
    /// Nobody alive
    pub fn none(endpoint_count: usize) -> Self {
        Self {
            alive: vec![false; endpoint_count],
        }
    }

    pub fn from_indices<I>(endpoint_count: usize, indices: I) -> Self
    where
        I: IntoIterator<Item = usize>,
    {
        let mut snapshot = Self::none(endpoint_count);
        for index in indices {
            if let Some(slot) = snapshot.alive.get_mut(index) {
                *slot = true;
            }
        }
        snapshot
    }

    pub fn contains(&self, index: usize) -> bool {
        self.alive.get(index).copied().unwrap_or(false)
    }

    /// Live indices in ascending order
    pub fn indices(&self) -> Vec<usize> {
        self.alive
            .iter()
            .enumerate()
            .filter_map(|(index, alive)| alive.then_some(index))
            .collect()
    }

    pub fn count(&self) -> usize {
        self.alive.iter().filter(|alive| **alive).count()
    }

    /// Size of the endpoint index space the snapshot was built for
    pub fn endpoint_count(&self) -> usize {
        self.alive.len()
    }

    /// Members of `bucket` that are alive, in bucket order
    pub fn intersect(&self, bucket: &[usize]) -> Vec<usize> {
        bucket
            .iter()
            .copied()
            .filter(|index| self.contains(*index))
            .collect()
    }
}

/// Jointly published role and liveness view
#[derive(Debug, Clone, PartialEq)]
pub struct TopologyState {
    /// Increases by one with every publication; 0 before the first one
    pub generation: u64,
    pub roles: Arc<RoleSnapshot>,
    pub alive: Arc<LivenessSnapshot>,
    /// Round trip of the last successful probe, per endpoint index
    pub rtt: Vec<Option<Duration>>,
}

impl TopologyState {
    /// State before any probe cycle finished: no roles, nothing alive
    pub fn initial(endpoint_count: usize) -> Self {
        Self {
            generation: 0,
            roles: Arc::new(RoleSnapshot::new()),
            alive: Arc::new(LivenessSnapshot::none(endpoint_count)),
            rtt: vec![None; endpoint_count],
        }
    }

    /// Live members of the role bucket
    pub fn live_bucket(&self, role: HostRole) -> Vec<usize> {
        self.alive.intersect(self.roles.bucket(role))
    }

    pub fn endpoint_count(&self) -> usize {
        self.alive.endpoint_count()
    }

    pub fn rtt_of(&self, index: usize) -> Option<Duration> {
        self.rtt.get(index).copied().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_roles() -> RoleSnapshot {
        RoleSnapshot::from_buckets([
            (HostRole::Master, vec![0]),
            (HostRole::Slave, vec![1, 2]),
        ])
    }

    #[test]
    fn test_role_snapshot_buckets() {
        let roles = sample_roles();
        assert_eq!(roles.bucket(HostRole::Master), &[0]);
        assert_eq!(roles.bucket(HostRole::Slave), &[1, 2]);
        assert!(roles.bucket(HostRole::SyncSlave).is_empty());
        assert!(!roles.is_empty());
        assert!(RoleSnapshot::new().is_empty());
    }

    #[test]
    fn test_role_of_uses_precedence() {
        let mut roles = sample_roles();
        roles.push(HostRole::SyncSlave, 2);

        assert_eq!(roles.role_of(0), HostRole::Master);
        assert_eq!(roles.role_of(1), HostRole::Slave);
        assert_eq!(roles.role_of(2), HostRole::SyncSlave);
        assert_eq!(roles.role_of(7), HostRole::Unknown);
    }

    #[test]
    fn test_liveness_intersection_keeps_bucket_order() {
        let alive = LivenessSnapshot::from_indices(4, [3, 0, 2]);
        assert_eq!(alive.indices(), vec![0, 2, 3]);
        assert_eq!(alive.count(), 3);
        assert_eq!(alive.intersect(&[3, 1, 2]), vec![3, 2]);
        assert!(!alive.contains(1));
        assert!(!alive.contains(9));
    }

    #[test]
    fn test_liveness_ignores_out_of_range() {
        let alive = LivenessSnapshot::from_indices(2, [1, 5]);
        assert_eq!(alive.indices(), vec![1]);
    }

    #[test]
    fn test_initial_state() {
        let state = TopologyState::initial(3);
        assert_eq!(state.generation, 0);
        assert!(state.roles.is_empty());
        assert_eq!(state.alive.count(), 0);
        assert_eq!(state.endpoint_count(), 3);
        assert!(state.live_bucket(HostRole::Master).is_empty());
        assert_eq!(state.rtt_of(1), None);
    }
}
