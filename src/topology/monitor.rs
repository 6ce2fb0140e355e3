/// Background topology monitor
use super::{classify, LivenessSnapshot, RoleSnapshot, TopologyState, TryLockGuard};
use crate::core::{EndpointRegistry, HostRole};
use crate::health::{HostProbe, ProbeManager, ProbeOutcome};
use crate::stats::AggregatedValues;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Number of probe round-trip buckets, in milliseconds (last bucket: 8s+)
pub const RTT_BUCKETS: usize = 14;

pub type RttHistogram = AggregatedValues<RTT_BUCKETS>;

/// Probes every endpoint periodically and publishes [`TopologyState`]s.
///
/// Readers never wait for a probe cycle: [`current`](Self::current) is a
/// single atomic load.
pub struct TopologyMonitor {
    registry: Arc<EndpointRegistry>,
    state: ArcSwap<TopologyState>,
    generation: AtomicU64,
    probes: ProbeManager,
    check_running: AtomicBool,
    rtt_histograms: Vec<RttHistogram>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TopologyMonitor {
    pub fn new(registry: Arc<EndpointRegistry>, probe: Box<dyn HostProbe>) -> Self {
        let endpoint_count = registry.len();
        Self {
            state: ArcSwap::from_pointee(TopologyState::initial(endpoint_count)),
            generation: AtomicU64::new(0),
            probes: ProbeManager::new(probe),
            check_running: AtomicBool::new(false),
            rtt_histograms: (0..endpoint_count).map(|_| RttHistogram::new()).collect(),
            task: Mutex::new(None),
            registry,
        }
    }

    /// Start periodic probing. A cycle still running when the next tick fires
    /// makes that tick a no-op.
    pub fn start(self: &Arc<Self>, probe_interval: Duration, probe_timeout: Duration) {
        let weak: Weak<Self> = Arc::downgrade(self);

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(probe_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;

                let Some(monitor) = weak.upgrade() else {
                    break;
                };
                tokio::spawn(async move {
                    monitor.check_once(probe_timeout).await;
                });
            }
        });

        if let Some(previous) = self.task.lock().replace(handle) {
            previous.abort();
        }

        tracing::info!(
            "Topology monitor started for {} endpoints (interval {:?}, timeout {:?})",
            self.registry.len(),
            probe_interval,
            probe_timeout
        );
    }

    /// Stop periodic probing; published state stays readable
    pub fn stop(&self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
            tracing::info!("Topology monitor stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }

    /// Run one probe cycle unless another one is in flight.
    ///
    /// Returns `false` when the cycle was skipped.
    pub async fn check_once(&self, probe_timeout: Duration) -> bool {
        let guard = TryLockGuard::new(&self.check_running);
        if !guard.acquired() {
            tracing::debug!("Previous topology check is still running, skipping");
            return false;
        }

        let outcomes = self
            .probes
            .probe_all(self.registry.as_slice(), probe_timeout)
            .await;
        self.record_rtts(&outcomes);

        let previous = self.state.load_full();
        let (roles, alive) = classify(&self.registry, &outcomes, &previous.roles);
        let rtt = outcomes.iter().map(|outcome| outcome.rtt).collect();
        self.install(roles, alive, rtt);

        true
    }

    /// Atomically replace the visible state; RTTs of the previous state are kept.
    ///
    /// Shares the overlap guard with [`check_once`](Self::check_once): returns
    /// `false` and publishes nothing while a probe cycle is in flight.
    pub fn publish(&self, roles: RoleSnapshot, alive: LivenessSnapshot) -> bool {
        let guard = TryLockGuard::new(&self.check_running);
        if !guard.acquired() {
            tracing::debug!("Topology check in flight, rejecting manual publish");
            return false;
        }

        let rtt = self.state.load().rtt.clone();
        self.install(roles, alive, rtt);
        true
    }

    fn install(&self, roles: RoleSnapshot, alive: LivenessSnapshot, rtt: Vec<Option<Duration>>) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let next = Arc::new(TopologyState {
            generation,
            roles: Arc::new(roles),
            alive: Arc::new(alive),
            rtt,
        });

        let previous = self.state.swap(Arc::clone(&next));
        self.log_changes(&previous, &next);
    }

    fn record_rtts(&self, outcomes: &[ProbeOutcome]) {
        for (histogram, outcome) in self.rtt_histograms.iter().zip(outcomes) {
            if let Some(rtt) = outcome.rtt {
                histogram.add(rtt.as_millis() as u64, 1);
            }
        }
    }

    fn log_changes(&self, previous: &TopologyState, current: &TopologyState) {
        if previous.roles == current.roles && previous.alive == current.alive {
            tracing::debug!(
                "Topology generation {} unchanged ({} of {} endpoints alive)",
                current.generation,
                current.alive.count(),
                self.registry.len()
            );
            return;
        }

        for endpoint in self.registry.iter() {
            let index = endpoint.index;
            let (was_role, is_role) = (previous.roles.role_of(index), current.roles.role_of(index));
            let (was_alive, is_alive) = (previous.alive.contains(index), current.alive.contains(index));

            if was_role != is_role || was_alive != is_alive {
                tracing::info!(
                    "Endpoint {}: {} ({}) -> {} ({})",
                    endpoint,
                    was_role,
                    liveness_label(was_alive),
                    is_role,
                    liveness_label(is_alive)
                );
            }
        }

        if current.live_bucket(HostRole::Master).is_empty() {
            tracing::warn!(
                "Topology generation {} has no live master",
                current.generation
            );
        }
    }

    /// Current jointly published state
    pub fn current(&self) -> Arc<TopologyState> {
        self.state.load_full()
    }

    /// Role part of the current state.
    ///
    /// Two separate calls to this and [`current_live_endpoints`](Self::current_live_endpoints)
    /// may observe different generations; route from [`current`](Self::current).
    pub fn current_role_snapshot(&self) -> Arc<RoleSnapshot> {
        Arc::clone(&self.state.load().roles)
    }

    /// Liveness part of the current state, see [`current_role_snapshot`](Self::current_role_snapshot)
    pub fn current_live_endpoints(&self) -> Arc<LivenessSnapshot> {
        Arc::clone(&self.state.load().alive)
    }

    pub fn endpoints(&self) -> &EndpointRegistry {
        &self.registry
    }

    pub fn registry(&self) -> Arc<EndpointRegistry> {
        Arc::clone(&self.registry)
    }

    /// Probe round-trip histogram of one endpoint, in milliseconds
    pub fn rtt_histogram(&self, index: usize) -> Option<[i64; RTT_BUCKETS]> {
        self.rtt_histograms.get(index).map(RttHistogram::snapshot)
    }
}

impl Drop for TopologyMonitor {
    fn drop(&mut self) {
        if let Some(handle) = self.task.get_mut().take() {
            handle.abort();
        }
    }
}

fn liveness_label(alive: bool) -> &'static str {
    if alive {
        "alive"
    } else {
        "dead"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Endpoint;
    use crate::health::{ProbeStatus, ReplicationStatus};
    use async_trait::async_trait;
    use parking_lot::RwLock;
    use std::sync::atomic::AtomicUsize;

    /// Probe answering from a mutable script
    struct ScriptedProbe {
        statuses: Arc<RwLock<Vec<ProbeStatus>>>,
        delay: Duration,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl HostProbe for ScriptedProbe {
        async fn probe(&self, endpoint: &Endpoint) -> ProbeStatus {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.statuses.read()[endpoint.index].clone()
        }
    }

    struct Fixture {
        monitor: Arc<TopologyMonitor>,
        statuses: Arc<RwLock<Vec<ProbeStatus>>>,
        calls: Arc<AtomicUsize>,
    }

    fn fixture(delay: Duration) -> Fixture {
        let registry = Arc::new(
            EndpointRegistry::new([
                "host=a application_name=pg-a",
                "host=b application_name=pg-b",
                "host=c application_name=pg-c",
            ])
            .unwrap(),
        );
        let statuses = Arc::new(RwLock::new(vec![
            ProbeStatus::Alive(ReplicationStatus::master(["pg-b"])),
            ProbeStatus::Alive(ReplicationStatus::replica()),
            ProbeStatus::Alive(ReplicationStatus::replica()),
        ]));
        let calls = Arc::new(AtomicUsize::new(0));
        let probe = ScriptedProbe {
            statuses: Arc::clone(&statuses),
            delay,
            calls: Arc::clone(&calls),
        };

        Fixture {
            monitor: Arc::new(TopologyMonitor::new(registry, Box::new(probe))),
            statuses,
            calls,
        }
    }

    #[tokio::test]
    async fn test_check_once_publishes_state() {
        let f = fixture(Duration::ZERO);
        assert_eq!(f.monitor.current().generation, 0);

        assert!(f.monitor.check_once(Duration::from_millis(100)).await);

        let state = f.monitor.current();
        assert_eq!(state.generation, 1);
        assert_eq!(state.roles.bucket(HostRole::Master), &[0]);
        assert_eq!(state.roles.bucket(HostRole::SyncSlave), &[1]);
        assert_eq!(state.roles.bucket(HostRole::Slave), &[2]);
        assert_eq!(state.alive.indices(), vec![0, 1, 2]);
        assert!(state.rtt_of(0).is_some());
        assert_eq!(f.monitor.rtt_histogram(0).unwrap().iter().sum::<i64>(), 1);
    }

    #[tokio::test]
    async fn test_failed_probe_keeps_stale_role() {
        let f = fixture(Duration::ZERO);
        f.monitor.check_once(Duration::from_millis(100)).await;

        f.statuses.write()[2] = ProbeStatus::Unreachable {
            reason: "connection refused".to_string(),
        };
        f.monitor.check_once(Duration::from_millis(100)).await;

        let state = f.monitor.current();
        assert_eq!(state.roles.bucket(HostRole::Slave), &[2]);
        assert!(!state.alive.contains(2));
        assert!(state.live_bucket(HostRole::Slave).is_empty());
        assert_eq!(state.rtt_of(2), None);
    }

    #[tokio::test]
    async fn test_overlapping_check_is_skipped() {
        let f = fixture(Duration::from_millis(100));
        let timeout = Duration::from_secs(1);

        let (first, second) = tokio::join!(f.monitor.check_once(timeout), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            f.monitor.check_once(timeout).await
        });

        assert!(first);
        assert!(!second);
        assert_eq!(f.calls.load(Ordering::SeqCst), 3);
        assert_eq!(f.monitor.current().generation, 1);

        // guard released after the cycle completed
        assert!(f.monitor.check_once(timeout).await);
    }

    #[tokio::test]
    async fn test_publish_rejected_during_check() {
        let f = fixture(Duration::from_millis(100));

        let (checked, published) = tokio::join!(
            f.monitor.check_once(Duration::from_secs(1)),
            async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                f.monitor.publish(
                    RoleSnapshot::from_buckets([(HostRole::Master, vec![2])]),
                    LivenessSnapshot::from_indices(3, [2]),
                )
            }
        );

        assert!(checked);
        assert!(!published);
        let state = f.monitor.current();
        assert_eq!(state.generation, 1);
        assert_eq!(state.roles.bucket(HostRole::Master), &[0]);

        assert!(f.monitor.publish(
            RoleSnapshot::from_buckets([(HostRole::Master, vec![2])]),
            LivenessSnapshot::from_indices(3, [2]),
        ));
        assert_eq!(f.monitor.current().roles.bucket(HostRole::Master), &[2]);
    }

    #[tokio::test]
    async fn test_readers_keep_old_state() {
        let f = fixture(Duration::ZERO);
        f.monitor.check_once(Duration::from_millis(100)).await;
        let held = f.monitor.current();

        assert!(f.monitor.publish(
            RoleSnapshot::from_buckets([(HostRole::Master, vec![2])]),
            LivenessSnapshot::from_indices(3, [2]),
        ));

        assert_eq!(held.generation, 1);
        assert_eq!(held.roles.bucket(HostRole::Master), &[0]);
        assert_eq!(held.alive.count(), 3);

        let fresh = f.monitor.current();
        assert_eq!(fresh.generation, 2);
        assert_eq!(fresh.roles.bucket(HostRole::Master), &[2]);
        assert_eq!(f.monitor.current_role_snapshot().bucket(HostRole::Master), &[2]);
        assert_eq!(f.monitor.current_live_endpoints().indices(), vec![2]);
        // RTTs survive a manual publish
        assert!(fresh.rtt_of(0).is_some());
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let f = fixture(Duration::ZERO);
        f.monitor
            .start(Duration::from_millis(20), Duration::from_millis(10));
        assert!(f.monitor.is_running());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(f.monitor.current().generation >= 1);

        f.monitor.stop();
        assert!(!f.monitor.is_running());
        // let a cycle spawned right before the stop finish
        tokio::time::sleep(Duration::from_millis(10)).await;
        let generation = f.monitor.current().generation;
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(f.monitor.current().generation, generation);
    }

    #[tokio::test]
    async fn test_probe_timeout_marks_dead() {
        let f = fixture(Duration::from_millis(200));
        f.monitor.check_once(Duration::from_millis(20)).await;

        let state = f.monitor.current();
        assert_eq!(state.alive.count(), 0);
        assert_eq!(state.roles.bucket(HostRole::Unknown), &[0, 1, 2]);
    }
}
