/// Role-partitioned cluster statistics
pub mod aggregated;

pub use aggregated::AggregatedValues;

use crate::core::HostRole;
use crate::pool::PoolStatistics;
use crate::topology::{LivenessSnapshot, RoleSnapshot};
use serde::Serialize;
use std::fmt;

/// Statistics of one endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceStatsDescriptor {
    pub index: usize,
    pub host_port: String,
    pub alive: bool,
    pub stats: PoolStatistics,
    /// Probe round-trip histogram, milliseconds, log2 buckets
    pub probe_rtt_ms: Vec<i64>,
}

/// Which endpoint indices report under which role
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    pub master: Option<usize>,
    pub sync_slave: Option<usize>,
    pub slaves: Vec<usize>,
    pub unknown: Vec<usize>,
}

impl Partition {
    /// Split every endpoint of `alive` into four disjoint groups.
    ///
    /// Precedence is master, sync slave, slave. Master and sync slave take
    /// the first unclaimed live member of their bucket, so a dead endpoint
    /// still holding a stale role never shadows the one requests are routed
    /// to; a dead member is reported only when its bucket has no live one.
    /// Everything never claimed ends up in `unknown`.
    pub fn new(roles: &RoleSnapshot, alive: &LivenessSnapshot) -> Self {
        let endpoint_count = alive.endpoint_count();
        let mut seen = vec![false; endpoint_count];

        let master = claim_leader(&mut seen, roles.bucket(HostRole::Master), alive);
        let sync_slave = claim_leader(&mut seen, roles.bucket(HostRole::SyncSlave), alive);
        let slaves: Vec<usize> = roles
            .bucket(HostRole::Slave)
            .iter()
            .copied()
            .filter(|&index| claim(&mut seen, index))
            .collect();
        let unknown: Vec<usize> = (0..endpoint_count)
            .filter(|&index| claim(&mut seen, index))
            .collect();

        Self {
            master,
            sync_slave,
            slaves,
            unknown,
        }
    }
}

fn claim(seen: &mut [bool], index: usize) -> bool {
    match seen.get_mut(index) {
        Some(slot) if !*slot => {
            *slot = true;
            true
        }
        _ => false,
    }
}

fn claim_leader(seen: &mut [bool], bucket: &[usize], alive: &LivenessSnapshot) -> Option<usize> {
    let unclaimed = |index: &usize| seen.get(*index).map_or(false, |slot| !*slot);
    let leader = bucket
        .iter()
        .copied()
        .filter(|index| unclaimed(index))
        .find(|&index| alive.contains(index))
        .or_else(|| bucket.iter().copied().find(|index| unclaimed(index)))?;
    seen[leader] = true;
    Some(leader)
}

/// Statistics of the whole cluster, grouped by role
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClusterStatistics {
    pub master: Option<InstanceStatsDescriptor>,
    pub sync_slave: Option<InstanceStatsDescriptor>,
    pub slaves: Vec<InstanceStatsDescriptor>,
    pub unknown: Vec<InstanceStatsDescriptor>,
}

impl ClusterStatistics {
    /// Build the report, `describe` is called once per endpoint index
    pub fn aggregate<F>(roles: &RoleSnapshot, alive: &LivenessSnapshot, mut describe: F) -> Self
    where
        F: FnMut(usize) -> InstanceStatsDescriptor,
    {
        let partition = Partition::new(roles, alive);
        Self {
            master: partition.master.map(&mut describe),
            sync_slave: partition.sync_slave.map(&mut describe),
            slaves: partition.slaves.into_iter().map(&mut describe).collect(),
            unknown: partition.unknown.into_iter().map(&mut describe).collect(),
        }
    }

    /// Every descriptor, with the role it is reported under
    pub fn iter(&self) -> impl Iterator<Item = (HostRole, &InstanceStatsDescriptor)> {
        self.master
            .iter()
            .map(|d| (HostRole::Master, d))
            .chain(self.sync_slave.iter().map(|d| (HostRole::SyncSlave, d)))
            .chain(self.slaves.iter().map(|d| (HostRole::Slave, d)))
            .chain(self.unknown.iter().map(|d| (HostRole::Unknown, d)))
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for ClusterStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (role, descriptor) in self.iter() {
            writeln!(
                f,
                "{:<10} #{} {} {} tx={} stmt={} rejected={} in_use={}/{}",
                role.as_str(),
                descriptor.index,
                descriptor.host_port,
                if descriptor.alive { "alive" } else { "dead" },
                descriptor.stats.transactions_started,
                descriptor.stats.statements_started,
                descriptor.stats.rejected,
                descriptor.stats.in_use,
                descriptor.stats.max_size,
            )?;
        }
        Ok(())
    }
}
