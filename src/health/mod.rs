/// Endpoint probing for the topology monitor
pub mod tcp;

use crate::core::Endpoint;
use futures::future::join_all;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::timeout;

/// Replication state reported by a live node
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReplicationStatus {
    /// `Some(false)` for a master, `Some(true)` for a replica, `None` if the
    /// node did not say
    pub in_recovery: Option<bool>,
    /// Replication names of the standbys a master waits on for commit
    pub sync_standbys: Vec<String>,
}

impl ReplicationStatus {
    pub fn master<I, S>(sync_standbys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            in_recovery: Some(false),
            sync_standbys: sync_standbys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn replica() -> Self {
        Self {
            in_recovery: Some(true),
            sync_standbys: Vec::new(),
        }
    }

    pub fn unreported() -> Self {
        Self::default()
    }
}

/// Result of probing one endpoint
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeStatus {
    Alive(ReplicationStatus),
    Unreachable { reason: String },
    Timeout,
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeStatus::Alive(status) => match status.in_recovery {
                Some(false) => write!(f, "Alive (primary)"),
                Some(true) => write!(f, "Alive (in recovery)"),
                None => write!(f, "Alive"),
            },
            ProbeStatus::Unreachable { reason } => write!(f, "Unreachable: {}", reason),
            ProbeStatus::Timeout => write!(f, "Timeout"),
        }
    }
}

impl ProbeStatus {
    pub fn is_alive(&self) -> bool {
        matches!(self, ProbeStatus::Alive(_))
    }

    pub fn replication(&self) -> Option<&ReplicationStatus> {
        match self {
            ProbeStatus::Alive(status) => Some(status),
            _ => None,
        }
    }
}

/// Probe outcome with the measured round trip
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    pub status: ProbeStatus,
    /// Only set for live endpoints
    pub rtt: Option<Duration>,
}

/// Lightweight status query against one endpoint
#[async_trait::async_trait]
pub trait HostProbe: Send + Sync {
    async fn probe(&self, endpoint: &Endpoint) -> ProbeStatus;
}

/// Runs a [`HostProbe`] with timeouts over the whole endpoint set
pub struct ProbeManager {
    probe: Box<dyn HostProbe>,
}

impl ProbeManager {
    pub fn new(probe: Box<dyn HostProbe>) -> Self {
        Self { probe }
    }

    /// Probe one endpoint, bounded by `probe_timeout`
    pub async fn probe_endpoint(&self, endpoint: &Endpoint, probe_timeout: Duration) -> ProbeOutcome {
        let started = Instant::now();

        let status = match timeout(probe_timeout, self.probe.probe(endpoint)).await {
            Ok(status) => status,
            Err(_) => ProbeStatus::Timeout,
        };

        match &status {
            ProbeStatus::Alive(_) => {
                tracing::trace!("Endpoint {} is alive", endpoint);
            }
            ProbeStatus::Unreachable { reason } => {
                tracing::warn!("Endpoint {} is unreachable: {}", endpoint, reason);
            }
            ProbeStatus::Timeout => {
                tracing::warn!("Probe timeout for endpoint {}", endpoint);
            }
        }

        let rtt = status.is_alive().then(|| started.elapsed());
        ProbeOutcome { status, rtt }
    }

    /// Probe every endpoint concurrently; outcomes are in endpoint order
    pub async fn probe_all(&self, endpoints: &[Endpoint], probe_timeout: Duration) -> Vec<ProbeOutcome> {
        join_all(
            endpoints
                .iter()
                .map(|endpoint| self.probe_endpoint(endpoint, probe_timeout)),
        )
        .await
    }
}
