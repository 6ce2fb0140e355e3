/// Utility functions and helpers
use crate::stats::AggregatedValues;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Generate a unique ID based on timestamp and random component
pub fn generate_id(prefix: &str) -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();

    let random: u32 = rand::random();
    format!("{}-{}-{:x}", prefix, timestamp, random)
}

/// Format duration for human-readable output
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs == 0 {
        format!("{}ms", duration.as_millis())
    } else if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m{}s", secs / 60, secs % 60)
    } else {
        format!("{}h{}m{}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

/// Non-empty histogram buckets as `range:count`, e.g. `0-1:12 2-3:1`
pub fn format_histogram<const N: usize>(counts: &[i64]) -> String {
    let buckets: Vec<String> = counts
        .iter()
        .enumerate()
        .filter(|(_, count)| **count != 0)
        .map(|(bucket, count)| format!("{}:{}", AggregatedValues::<N>::bucket_label(bucket), count))
        .collect();

    if buckets.is_empty() {
        "-".to_string()
    } else {
        buckets.join(" ")
    }
}
