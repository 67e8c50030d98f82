//! Parallel drain of shard cursors into memory.

use std::time::{Duration, Instant};

use shard_common::config::MergeSectionConfig;
use shard_common::error::{ErrorContext, MergeError, MergeResult};
use shard_common::types::ShardId;

use crate::cursor::ShardCursor;
use crate::memory::{MemoryQueryResult, RowBudget};

/// One shard's live result cursor, as handed over by the execution layer.
pub struct ShardSource {
    pub shard_id: ShardId,
    pub cursor: Box<dyn ShardCursor>,
}

impl ShardSource {
    pub fn new(shard_id: ShardId, cursor: Box<dyn ShardCursor>) -> Self {
        Self { shard_id, cursor }
    }
}

/// Metrics collected while draining shards.
#[derive(Debug, Clone, Default)]
pub struct DrainMetrics {
    pub shards_participated: usize,
    pub total_rows_drained: usize,
    pub max_shard_latency_us: u64,
    pub total_latency_us: u64,
    pub per_shard_latency_us: Vec<(ShardId, u64)>,
    pub per_shard_row_count: Vec<(ShardId, usize)>,
    pub failed_shards: Vec<ShardId>,
}

struct Drained {
    shard_id: ShardId,
    result: MergeResult<MemoryQueryResult>,
    elapsed: Duration,
}

fn drain_one(source: ShardSource, budget: &RowBudget) -> Drained {
    let start = Instant::now();
    let shard_id = source.shard_id;
    let result =
        MemoryQueryResult::from_cursor_within(shard_id, source.cursor, budget).ctx("stage=drain");
    Drained {
        shard_id,
        result,
        elapsed: start.elapsed(),
    }
}

/// Drain every shard cursor into a `MemoryQueryResult`, in shard order.
///
/// With `parallel_drain` each shard is drained on its own scoped thread. Any shard
/// failure fails the whole drain with that shard's error: a merge over a subset of shards
/// would be silently wrong.
///
/// `max_rows_buffered` is one budget across all shards, charged row by row as the shards
/// drain; crossing it stops every drain at its next row.
pub fn drain_shards(
    sources: Vec<ShardSource>,
    config: &MergeSectionConfig,
) -> MergeResult<(Vec<MemoryQueryResult>, DrainMetrics)> {
    let total_start = Instant::now();
    let shard_count = sources.len();
    let budget = RowBudget::new(config.max_rows_buffered);
    let budget = &budget;

    let drained: Vec<Drained> = if config.parallel_drain && shard_count > 1 {
        std::thread::scope(|s| {
            let handles: Vec<_> = sources
                .into_iter()
                .map(|source| {
                    let shard_id = source.shard_id;
                    (shard_id, s.spawn(move || drain_one(source, budget)))
                })
                .collect();
            handles
                .into_iter()
                .map(|(shard_id, h)| {
                    h.join().unwrap_or_else(|_| Drained {
                        shard_id,
                        result: Err(MergeError::internal_bug(
                            "E-DRAIN-001",
                            format!("Drain thread for {shard_id} panicked"),
                            "std::thread::ScopedJoinHandle returned Err",
                        )),
                        elapsed: Duration::ZERO,
                    })
                })
                .collect()
        })
    } else {
        sources
            .into_iter()
            .map(|source| drain_one(source, budget))
            .collect()
    };

    let mut metrics = DrainMetrics {
        shards_participated: shard_count,
        ..Default::default()
    };
    let mut results = Vec::with_capacity(shard_count);
    let mut first_error = None;
    let slow = Duration::from_millis(config.slow_shard_warn_ms);
    for d in drained {
        let latency_us = d.elapsed.as_micros() as u64;
        metrics.per_shard_latency_us.push((d.shard_id, latency_us));
        metrics.max_shard_latency_us = metrics.max_shard_latency_us.max(latency_us);
        if d.elapsed > slow {
            tracing::warn!(
                "{} drain took {}ms (threshold {}ms)",
                d.shard_id,
                d.elapsed.as_millis(),
                config.slow_shard_warn_ms
            );
        }
        match d.result {
            Ok(result) => {
                let rows = result.row_count();
                shard_observability::record_shard_drain(d.shard_id.0, rows, d.elapsed);
                metrics.per_shard_row_count.push((d.shard_id, rows));
                metrics.total_rows_drained += rows;
                results.push(result);
            }
            Err(e @ MergeError::RowLimitExceeded { .. }) => {
                tracing::warn!("{} drain stopped: {}", d.shard_id, e);
                first_error.get_or_insert(e);
            }
            Err(e) => {
                tracing::warn!("{} failed during drain: {}", d.shard_id, e);
                e.log_if_internal_bug();
                shard_observability::record_shard_failure(d.shard_id.0);
                metrics.failed_shards.push(d.shard_id);
                first_error.get_or_insert(e);
            }
        }
    }
    metrics.total_latency_us = total_start.elapsed().as_micros() as u64;

    if let Some(e) = first_error {
        return Err(e);
    }
    tracing::debug!(
        shards = shard_count,
        rows = metrics.total_rows_drained,
        latency_us = metrics.total_latency_us,
        "shards drained"
    );
    Ok((results, metrics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::{ColumnDescriptor, RowSetCursor};
    use shard_common::datum::RawCell;
    use shard_common::types::SqlType;

    fn source(id: u64, rows: usize) -> ShardSource {
        let cursor = RowSetCursor::new(
            vec![ColumnDescriptor::new("id", SqlType::BigInt)],
            (0..rows)
                .map(|i| vec![Some(RawCell::Int(i as i64))])
                .collect(),
        );
        ShardSource::new(ShardId(id), Box::new(cursor))
    }

    fn sources(counts: &[usize]) -> Vec<ShardSource> {
        counts
            .iter()
            .enumerate()
            .map(|(i, &n)| source(i as u64, n))
            .collect()
    }

    #[test]
    fn test_parallel_drain_keeps_shard_order() {
        let (results, metrics) =
            drain_shards(sources(&[3, 0, 5]), &MergeSectionConfig::default()).unwrap();
        let counts: Vec<usize> = results.iter().map(|r| r.row_count()).collect();
        assert_eq!(counts, vec![3, 0, 5]);
        assert_eq!(metrics.total_rows_drained, 8);
        assert_eq!(metrics.shards_participated, 3);
        assert_eq!(results[2].shard_id(), ShardId(2));
    }

    #[test]
    fn test_sequential_drain() {
        let config = MergeSectionConfig {
            parallel_drain: false,
            ..Default::default()
        };
        let (results, _) = drain_shards(sources(&[1, 2]), &config).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_failing_shard_fails_the_drain() {
        let mut all = sources(&[2]);
        all.push(ShardSource::new(
            ShardId(7),
            Box::new(
                RowSetCursor::new(
                    vec![ColumnDescriptor::new("id", SqlType::BigInt)],
                    vec![vec![Some(RawCell::Int(1))], vec![Some(RawCell::Int(2))]],
                )
                .failing_after(1),
            ),
        ));
        let err = drain_shards(all, &MergeSectionConfig::default()).unwrap_err();
        assert_eq!(err.shard_id(), Some(ShardId(7)));
        assert!(err.is_io());
    }

    #[test]
    fn test_row_limit() {
        let config = MergeSectionConfig {
            max_rows_buffered: 4,
            ..Default::default()
        };
        let err = drain_shards(sources(&[3, 2]), &config).unwrap_err();
        assert!(matches!(err, MergeError::RowLimitExceeded { rows: 5, limit: 4 }));

        let sequential = MergeSectionConfig {
            max_rows_buffered: 4,
            parallel_drain: false,
            ..Default::default()
        };
        let err = drain_shards(sources(&[3, 2]), &sequential).unwrap_err();
        assert!(matches!(err, MergeError::RowLimitExceeded { rows: 5, limit: 4 }));

        let unlimited = MergeSectionConfig {
            max_rows_buffered: 0,
            ..Default::default()
        };
        assert!(drain_shards(sources(&[3, 2]), &unlimited).is_ok());
    }

    #[test]
    fn test_row_limit_stops_drain_before_shard_is_exhausted() {
        // One shard far past the limit: the drain must give up at row 3, not row 10_000.
        let big = RowSetCursor::new(
            vec![ColumnDescriptor::new("id", SqlType::BigInt)],
            (0..10_000).map(|i| vec![Some(RawCell::Int(i))]).collect(),
        );
        let closed = big.close_handle();
        let config = MergeSectionConfig {
            max_rows_buffered: 2,
            parallel_drain: false,
            ..Default::default()
        };
        let err = drain_shards(vec![ShardSource::new(ShardId(0), Box::new(big))], &config)
            .unwrap_err();
        assert!(matches!(err, MergeError::RowLimitExceeded { rows: 3, limit: 2 }));
        assert!(closed.load(std::sync::atomic::Ordering::Acquire));
    }
}
