/// Turning one round of probe outcomes into role and liveness snapshots
use super::{LivenessSnapshot, RoleSnapshot};
use crate::core::{EndpointRegistry, HostRole};
use crate::health::ProbeOutcome;
use std::collections::HashSet;

/// Classify every endpoint from this cycle's probe outcomes.
///
/// Live endpoints are classified from their reported replication state. An
/// endpoint that failed its probe drops out of liveness but keeps the role it
/// had in `previous`.
pub fn classify(
    registry: &EndpointRegistry,
    outcomes: &[ProbeOutcome],
    previous: &RoleSnapshot,
) -> (RoleSnapshot, LivenessSnapshot) {
    let alive = LivenessSnapshot::from_indices(
        registry.len(),
        outcomes
            .iter()
            .enumerate()
            .filter(|(_, outcome)| outcome.status.is_alive())
            .map(|(index, _)| index),
    );

    let masters: Vec<usize> = outcomes
        .iter()
        .enumerate()
        .filter(|(_, outcome)| {
            outcome
                .status
                .replication()
                .map_or(false, |r| r.in_recovery == Some(false))
        })
        .map(|(index, _)| index)
        .collect();

    if masters.len() > 1 {
        tracing::warn!(
            "{} endpoints report themselves as master ({:?}), using #{}",
            masters.len(),
            masters,
            masters[0]
        );
    }

    let sync_standbys: HashSet<&str> = masters
        .first()
        .and_then(|&index| outcomes[index].status.replication())
        .map(|r| r.sync_standbys.iter().map(String::as_str).collect())
        .unwrap_or_default();

    let mut roles = RoleSnapshot::new();
    for endpoint in registry {
        let outcome = outcomes.get(endpoint.index);
        let role = match outcome.and_then(|o| o.status.replication()) {
            Some(replication) => match replication.in_recovery {
                Some(false) => HostRole::Master,
                Some(true) if sync_standbys.contains(endpoint.replication_name()) => {
                    HostRole::SyncSlave
                }
                Some(true) => HostRole::Slave,
                None => HostRole::Unknown,
            },
            None => previous.role_of(endpoint.index),
        };
        roles.push(role, endpoint.index);
    }

    (roles, alive)
}
