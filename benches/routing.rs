use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use quorum_router::core::{Endpoint, EndpointRegistry, HostRole, RequestFlags, Strategy};
use quorum_router::health::{HostProbe, ProbeStatus, ReplicationStatus};
use quorum_router::router::{HostRouter, ProbeRttRanking};
use quorum_router::stats::Partition;
use quorum_router::topology::{LivenessSnapshot, RoleSnapshot, TopologyMonitor, TopologyState};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

/// Endpoint 0 is the master, everything else a replica
struct StaticProbe;

#[async_trait]
impl HostProbe for StaticProbe {
    async fn probe(&self, endpoint: &Endpoint) -> ProbeStatus {
        if endpoint.index == 0 {
            ProbeStatus::Alive(ReplicationStatus::master(["pg-1"]))
        } else {
            ProbeStatus::Alive(ReplicationStatus::replica())
        }
    }
}

/// Master at 0, sync slave at 1, slaves after that; every third slave dead
fn create_test_state(endpoint_count: usize) -> TopologyState {
    let roles = RoleSnapshot::from_buckets([
        (HostRole::Master, vec![0]),
        (HostRole::SyncSlave, vec![1]),
        (HostRole::Slave, (2..endpoint_count).collect()),
    ]);
    let alive = LivenessSnapshot::from_indices(
        endpoint_count,
        (0..endpoint_count).filter(|index| index < &2 || index % 3 != 0),
    );

    TopologyState {
        generation: 1,
        roles: Arc::new(roles),
        alive: Arc::new(alive),
        rtt: (0..endpoint_count)
            .map(|index| Some(Duration::from_micros(100 + (index as u64 * 37) % 500)))
            .collect(),
    }
}

fn bench_host_router(c: &mut Criterion) {
    let mut group = c.benchmark_group("host_router");

    for endpoint_count in [3, 16, 128].iter() {
        let state = create_test_state(*endpoint_count);
        let router = HostRouter::new(Box::new(ProbeRttRanking));

        let cases = [
            ("slave_round_robin", RequestFlags::role(HostRole::Slave)),
            (
                "slave_nearest",
                RequestFlags::role(HostRole::Slave).with_strategy(Strategy::Nearest),
            ),
            ("master", RequestFlags::role(HostRole::Master)),
            ("any_node", RequestFlags::any_node()),
        ];

        for (name, flags) in cases {
            group.bench_with_input(BenchmarkId::new(name, endpoint_count), &flags, |b, flags| {
                b.iter(|| black_box(router.select(flags, &state)));
            });
        }
    }

    group.finish();
}

fn bench_fallback(c: &mut Criterion) {
    let router = HostRouter::default();
    let roles = RoleSnapshot::from_buckets([
        (HostRole::Master, vec![0]),
        (HostRole::SyncSlave, vec![1]),
    ]);
    let state = TopologyState {
        generation: 1,
        roles: Arc::new(roles),
        alive: Arc::new(LivenessSnapshot::from_indices(2, [0])),
        rtt: vec![None; 2],
    };
    let flags = RequestFlags::role(HostRole::SyncSlave);

    c.bench_function("sync_slave_fallback_to_master", |b| {
        b.iter(|| black_box(router.select(&flags, &state)));
    });
}

fn bench_statistics_partition(c: &mut Criterion) {
    let mut group = c.benchmark_group("statistics_partition");

    for endpoint_count in [3, 128, 1024].iter() {
        let state = create_test_state(*endpoint_count);
        group.bench_with_input(
            BenchmarkId::new("partition", endpoint_count),
            &state,
            |b, state| {
                b.iter(|| black_box(Partition::new(&state.roles, &state.alive)));
            },
        );
    }

    group.finish();
}

fn bench_probe_cycle(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("probe_cycle");

    for endpoint_count in [3, 32].iter() {
        let dsns: Vec<String> = (0..*endpoint_count)
            .map(|index| format!("host=10.0.0.{} application_name=pg-{}", index + 1, index))
            .collect();
        let registry = Arc::new(EndpointRegistry::new(dsns).unwrap());
        let monitor = TopologyMonitor::new(registry, Box::new(StaticProbe));

        group.bench_with_input(
            BenchmarkId::new("check_once", endpoint_count),
            endpoint_count,
            |b, _| {
                b.to_async(&rt)
                    .iter(|| async { black_box(monitor.check_once(Duration::from_millis(100)).await) });
            },
        );

        group.bench_function(BenchmarkId::new("current", endpoint_count), |b| {
            b.iter(|| black_box(monitor.current()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_host_router,
    bench_fallback,
    bench_statistics_partition,
    bench_probe_cycle
);

criterion_main!(benches);
