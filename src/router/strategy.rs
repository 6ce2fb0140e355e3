/// Selection strategies applied within a resolved role bucket
use crate::topology::TopologyState;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Pick one endpoint index out of a non-empty bucket of live endpoints
pub trait SelectionAlgorithm: Send + Sync {
    /// Returns a member of `bucket`, or `None` if the bucket is empty
    fn select(&self, state: &TopologyState, bucket: &[usize]) -> Option<usize>;
}

/// Externally supplied latency signal used by [`Nearest`]
pub trait LatencyRanking: Send + Sync {
    /// Best-ranked member of `bucket`, `None` if the ranking has no opinion
    fn top_ranked(&self, state: &TopologyState, bucket: &[usize]) -> Option<usize>;
}

/// Round-robin over the bucket.
///
/// The cursor is shared by every bucket the router ever selects from, so
/// fairness is statistical rather than per-bucket exact under concurrency.
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self {
            counter: AtomicUsize::new(0),
        }
    }
}

impl Default for RoundRobin {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionAlgorithm for RoundRobin {
    fn select(&self, _state: &TopologyState, bucket: &[usize]) -> Option<usize> {
        match bucket.len() {
            0 => None,
            1 => Some(bucket[0]),
            len => {
                let position = self.counter.fetch_add(1, Ordering::Relaxed) % len;
                Some(bucket[position])
            }
        }
    }
}

/// Top-ranked member by a [`LatencyRanking`], first member when unranked
pub struct Nearest {
    ranking: Box<dyn LatencyRanking>,
}

impl Nearest {
    pub fn new(ranking: Box<dyn LatencyRanking>) -> Self {
        Self { ranking }
    }
}

impl SelectionAlgorithm for Nearest {
    fn select(&self, state: &TopologyState, bucket: &[usize]) -> Option<usize> {
        self.ranking
            .top_ranked(state, bucket)
            .filter(|index| bucket.contains(index))
            .or_else(|| bucket.first().copied())
    }
}

/// No latency information: discovery (index) order
pub struct DiscoveryOrder;

impl LatencyRanking for DiscoveryOrder {
    fn top_ranked(&self, _state: &TopologyState, bucket: &[usize]) -> Option<usize> {
        bucket.first().copied()
    }
}

/// Fixed preference order of endpoint indices, e.g. from configuration
pub struct StaticRanking {
    order: Vec<usize>,
}

impl StaticRanking {
    pub fn new(order: Vec<usize>) -> Self {
        Self { order }
    }
}

impl LatencyRanking for StaticRanking {
    fn top_ranked(&self, _state: &TopologyState, bucket: &[usize]) -> Option<usize> {
        self.order
            .iter()
            .copied()
            .find(|index| bucket.contains(index))
    }
}

/// Lowest probe round trip recorded in the snapshot
pub struct ProbeRttRanking;

impl LatencyRanking for ProbeRttRanking {
    fn top_ranked(&self, state: &TopologyState, bucket: &[usize]) -> Option<usize> {
        bucket
            .iter()
            .filter_map(|&index| state.rtt_of(index).map(|rtt| (rtt, index)))
            .min()
            .map(|(_, index)| index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn state_with_rtts(rtts: Vec<Option<u64>>) -> TopologyState {
        let mut state = TopologyState::initial(rtts.len());
        state.rtt = rtts
            .into_iter()
            .map(|ms| ms.map(Duration::from_millis))
            .collect();
        state
    }

    #[test]
    fn test_round_robin() {
        let rr = RoundRobin::new();
        let state = TopologyState::initial(4);
        let bucket = [1, 2, 3];

        // Test that it cycles through the bucket members
        assert_eq!(rr.select(&state, &bucket), Some(1));
        assert_eq!(rr.select(&state, &bucket), Some(2));
        assert_eq!(rr.select(&state, &bucket), Some(3));
        assert_eq!(rr.select(&state, &bucket), Some(1));
    }

    #[test]
    fn test_round_robin_single_and_empty() {
        let rr = RoundRobin::new();
        let state = TopologyState::initial(3);

        assert_eq!(rr.select(&state, &[2]), Some(2));
        assert_eq!(rr.select(&state, &[2]), Some(2));
        assert_eq!(rr.select(&state, &[]), None);
        // single-element buckets do not advance the cursor
        assert_eq!(rr.counter.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_nearest_with_discovery_order() {
        let nearest = Nearest::new(Box::new(DiscoveryOrder));
        let state = TopologyState::initial(3);
        assert_eq!(nearest.select(&state, &[2, 1]), Some(2));
        assert_eq!(nearest.select(&state, &[]), None);
    }

    #[test]
    fn test_static_ranking() {
        let nearest = Nearest::new(Box::new(StaticRanking::new(vec![2, 0, 1])));
        let state = TopologyState::initial(3);

        assert_eq!(nearest.select(&state, &[0, 1, 2]), Some(2));
        assert_eq!(nearest.select(&state, &[0, 1]), Some(0));
        assert_eq!(nearest.select(&state, &[1]), Some(1));
    }

    #[test]
    fn test_static_ranking_without_opinion_uses_first() {
        let nearest = Nearest::new(Box::new(StaticRanking::new(vec![5])));
        let state = TopologyState::initial(3);
        assert_eq!(nearest.select(&state, &[1, 2]), Some(1));
    }

    #[test]
    fn test_probe_rtt_ranking() {
        let nearest = Nearest::new(Box::new(ProbeRttRanking));
        let state = state_with_rtts(vec![Some(9), Some(3), None]);

        assert_eq!(nearest.select(&state, &[0, 1, 2]), Some(1));
        assert_eq!(nearest.select(&state, &[0, 2]), Some(0));
        // no RTT known for anyone in the bucket
        assert_eq!(nearest.select(&state, &[2]), Some(2));
    }
}
