/// Values aggregated into power-of-two buckets
///
/// Bucket `k` counts keys in `[2^k, 2^(k+1))` (bucket 0 also takes 0 and 1);
/// keys beyond the last bucket land in the last bucket.
use std::sync::atomic::{AtomicI64, Ordering};

#[derive(Debug)]
pub struct AggregatedValues<const N: usize> {
    values: [AtomicI64; N],
}

impl<const N: usize> AggregatedValues<N> {
    pub fn new() -> Self {
        Self {
            values: std::array::from_fn(|_| AtomicI64::new(0)),
        }
    }

    pub fn bucket_for(key: u64) -> usize {
        let bucket = match key {
            0 | 1 => 0,
            k => (u64::BITS - 1 - k.leading_zeros()) as usize,
        };
        bucket.min(N - 1)
    }

    pub fn add(&self, key: u64, delta: i64) {
        self.values[Self::bucket_for(key)].fetch_add(delta, Ordering::Relaxed);
    }

    pub fn get(&self, bucket: usize) -> i64 {
        self.values[bucket].load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> [i64; N] {
        std::array::from_fn(|i| self.get(i))
    }

    /// Human readable bucket range, e.g. `4-7` or `512-x` for the last one
    pub fn bucket_label(bucket: usize) -> String {
        let low = if bucket == 0 { 0 } else { 1u64 << bucket };
        if bucket + 1 >= N {
            format!("{}-x", low)
        } else {
            format!("{}-{}", low, (1u64 << (bucket + 1)) - 1)
        }
    }
}

impl<const N: usize> Default for AggregatedValues<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucketing() {
        type Values = AggregatedValues<4>;
        assert_eq!(Values::bucket_for(0), 0);
        assert_eq!(Values::bucket_for(1), 0);
        assert_eq!(Values::bucket_for(2), 1);
        assert_eq!(Values::bucket_for(3), 1);
        assert_eq!(Values::bucket_for(4), 2);
        assert_eq!(Values::bucket_for(7), 2);
        assert_eq!(Values::bucket_for(8), 3);
        assert_eq!(Values::bucket_for(1 << 40), 3);
    }

    #[test]
    fn test_add_and_snapshot() {
        let values = AggregatedValues::<4>::new();
        values.add(1, 1);
        values.add(5, 2);
        values.add(1000, 1);
        assert_eq!(values.snapshot(), [1, 0, 2, 1]);
    }

    #[test]
    fn test_labels() {
        assert_eq!(AggregatedValues::<4>::bucket_label(0), "0-1");
        assert_eq!(AggregatedValues::<4>::bucket_label(2), "4-7");
        assert_eq!(AggregatedValues::<4>::bucket_label(3), "8-x");
    }
}
