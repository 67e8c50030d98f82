//! Observability setup: structured logging and merge metrics.

use std::time::Duration;

use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber with structured logging.
///
/// `RUST_LOG` wins over `default_filter` when set.
pub fn init_tracing(default_filter: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init();
}

/// Which merge path served a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeKind {
    Iterator,
    Distinct,
    AggregationDistinct,
}

impl MergeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeKind::Iterator => "iterator",
            MergeKind::Distinct => "distinct",
            MergeKind::AggregationDistinct => "aggregation_distinct",
        }
    }
}

/// Record one shard drain: rows pulled into memory and wall time spent.
pub fn record_shard_drain(shard_id: u64, rows: usize, elapsed: Duration) {
    metrics::counter!("shard_merge_rows_drained_total", "shard" => shard_id.to_string())
        .increment(rows as u64);
    metrics::histogram!("shard_merge_drain_duration_us")
        .record(elapsed.as_micros() as f64);
}

/// Record one completed merge construction. `output_rows` is unknown for streamed merges.
pub fn record_merge(kind: MergeKind, shards: usize, output_rows: Option<usize>, elapsed: Duration) {
    metrics::counter!("shard_merge_queries_total", "kind" => kind.as_str()).increment(1);
    metrics::histogram!("shard_merge_fan_out", "kind" => kind.as_str()).record(shards as f64);
    if let Some(rows) = output_rows {
        metrics::histogram!("shard_merge_output_rows", "kind" => kind.as_str())
            .record(rows as f64);
    }
    metrics::histogram!("shard_merge_duration_us", "kind" => kind.as_str())
        .record(elapsed.as_micros() as f64);
}

/// Record a shard failure surfaced by the merge layer.
pub fn record_shard_failure(shard_id: u64) {
    metrics::counter!("shard_merge_shard_failures_total", "shard" => shard_id.to_string())
        .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_twice_is_harmless() {
        init_tracing("warn");
        init_tracing("debug");
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_shard_drain(1, 10, Duration::from_millis(3));
        record_merge(MergeKind::Distinct, 2, Some(5), Duration::from_micros(40));
        record_merge(MergeKind::Iterator, 2, None, Duration::from_micros(4));
        record_shard_failure(1);
        assert_eq!(MergeKind::AggregationDistinct.as_str(), "aggregation_distinct");
    }
}
