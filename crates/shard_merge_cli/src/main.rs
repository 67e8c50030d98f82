mod dump;

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use shard_common::{MergeConfig, ShardId, TargetType};
use shard_merge::{
    AggregationDistinctSelectItem, AggregationType, MergeEngine, MergePlan, QueryResult,
};

use crate::dump::ShardDump;

#[derive(Parser, Debug)]
#[command(
    name = "shardmerge",
    about = "Merge per-shard result dumps the way the sharding layer merges live cursors"
)]
struct Cli {
    /// Config file path.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the default configuration as TOML and exit.
    #[arg(long)]
    print_default_config: bool,

    /// Deduplicate rows. With `--distinct=a,b`, deduplicate on those columns only.
    #[arg(long, value_delimiter = ',', num_args = 0..=1, require_equals = true)]
    distinct: Option<Vec<String>>,

    /// DISTINCT aggregation as TYPE:column_label:distinct_column_label, e.g.
    /// `COUNT:c:order_id`. AVG items expect AVG_DERIVED_COUNT_n / AVG_DERIVED_SUM_n
    /// columns, numbered in the order the AVG items are given.
    #[arg(long = "agg", value_parser = parse_aggregation)]
    aggregations: Vec<(AggregationType, String, String)>,

    /// GROUP BY column label (repeatable); only with --agg.
    #[arg(long = "group-by")]
    group_by: Vec<String>,

    /// One JSON dump per shard, in shard order.
    dumps: Vec<PathBuf>,
}

fn parse_aggregation(s: &str) -> Result<(AggregationType, String, String), String> {
    let mut parts = s.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(kind), Some(label), Some(distinct)) if !label.is_empty() && !distinct.is_empty() => {
            let kind = kind.parse::<AggregationType>().map_err(|e| e.to_string())?;
            Ok((kind, label.to_string(), distinct.to_string()))
        }
        _ => Err(format!("expected TYPE:label:distinct_label, got '{s}'")),
    }
}

impl Cli {
    fn plan(&self) -> MergePlan {
        let mut avg_count = 0;
        let items: Vec<AggregationDistinctSelectItem> = self
            .aggregations
            .iter()
            .map(|(kind, label, distinct)| match kind {
                AggregationType::Avg => {
                    let item =
                        AggregationDistinctSelectItem::avg(label.as_str(), distinct.as_str(), avg_count);
                    avg_count += 1;
                    item
                }
                _ => AggregationDistinctSelectItem::new(*kind, label.as_str(), distinct.as_str()),
            })
            .collect();

        let plan = if !items.is_empty() {
            MergePlan::aggregation_distinct(items)
        } else if let Some(labels) = &self.distinct {
            MergePlan::distinct(labels.clone())
        } else {
            MergePlan::passthrough()
        };
        plan.with_group_by(self.group_by.clone())
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.print_default_config {
        println!("{}", MergeConfig::default().to_toml()?);
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => MergeConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => MergeConfig::default(),
    };
    shard_observability::init_tracing(&config.logging.filter);
    tracing::debug!("Config: {:?}", config);

    if cli.dumps.is_empty() {
        anyhow::bail!("no shard dumps given");
    }
    let sources = cli
        .dumps
        .iter()
        .enumerate()
        .map(|(i, path)| ShardDump::load(path)?.into_source(ShardId(i as u64)))
        .collect::<Result<Vec<_>>>()?;

    let plan = cli.plan();
    tracing::info!(kind = plan.kind().as_str(), shards = sources.len(), "merging shard dumps");
    let engine = MergeEngine::new(config.merge);
    let mut merged = engine.merge(&plan, sources)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    print_result(merged.as_mut(), &mut out)?;
    out.flush()?;
    Ok(())
}

/// Tab-separated rows under a header of column labels; NULL prints as `NULL`.
fn print_result(result: &mut dyn QueryResult, out: &mut impl Write) -> Result<()> {
    let mut header = Vec::with_capacity(result.column_count());
    for index in 1..=result.column_count() {
        header.push(result.column_label(index)?.to_string());
    }
    writeln!(out, "{}", header.join("\t"))?;

    let mut rows = 0usize;
    while result.next()? {
        let mut cells = Vec::with_capacity(header.len());
        for index in 1..=header.len() {
            let value = result.get_value(index, TargetType::Native)?;
            cells.push(if result.was_null() {
                "NULL".to_string()
            } else {
                value.to_string()
            });
        }
        writeln!(out, "{}", cells.join("\t"))?;
        rows += 1;
    }
    tracing::info!(rows, "merge complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHARD_0: &str = r#"{"columns": [{"label": "order_id", "type": "BIGINT"},
                                          {"label": "c", "type": "BIGINT"}],
                              "rows": [[10, 1], [20, 1]]}"#;
    const SHARD_1: &str = r#"{"columns": [{"label": "order_id", "type": "BIGINT"},
                                          {"label": "c", "type": "BIGINT"}],
                              "rows": [[20, 1], [30, 1]]}"#;

    fn run(args: &[&str]) -> String {
        let cli = Cli::parse_from(std::iter::once("shardmerge").chain(args.iter().copied()));
        let sources = [SHARD_0, SHARD_1]
            .iter()
            .enumerate()
            .map(|(i, d)| ShardDump::parse(d).unwrap().into_source(ShardId(i as u64)).unwrap())
            .collect();
        let mut merged = MergeEngine::default().merge(&cli.plan(), sources).unwrap();
        let mut out = Vec::new();
        print_result(merged.as_mut(), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_parse_aggregation() {
        assert_eq!(
            parse_aggregation("count:c:order_id").unwrap(),
            (AggregationType::Count, "c".to_string(), "order_id".to_string())
        );
        assert!(parse_aggregation("COUNT:c").is_err());
        assert!(parse_aggregation("MEDIAN:c:order_id").is_err());
    }

    #[test]
    fn test_avg_items_number_their_derived_columns() {
        let cli = Cli::parse_from([
            "shardmerge", "--agg", "AVG:a:x", "--agg", "SUM:s:y", "--agg", "AVG:b:z",
        ]);
        let plan = cli.plan();
        let derived: Vec<String> = plan
            .aggregation_distinct_items
            .iter()
            .flat_map(|i| i.derived_items.iter().map(|d| d.column_label.clone()))
            .collect();
        assert_eq!(
            derived,
            vec![
                "AVG_DERIVED_COUNT_0",
                "AVG_DERIVED_SUM_0",
                "AVG_DERIVED_COUNT_1",
                "AVG_DERIVED_SUM_1"
            ]
        );
    }

    #[test]
    fn test_passthrough_output() {
        assert_eq!(run(&[]), "order_id\tc\n10\t1\n20\t1\n20\t1\n30\t1\n");
    }

    #[test]
    fn test_distinct_flag_without_labels() {
        let cli = Cli::parse_from(["shardmerge", "--distinct", "a.json"]);
        assert_eq!(cli.distinct, Some(Vec::new()));
        assert_eq!(cli.dumps, vec![PathBuf::from("a.json")]);
    }

    #[test]
    fn test_distinct_output() {
        assert_eq!(run(&["--distinct=order_id"]), "order_id\tc\n10\t1\n20\t1\n30\t1\n");
    }

    #[test]
    fn test_count_distinct_output() {
        assert_eq!(run(&["--agg", "COUNT:c:order_id"]), "order_id\tc\n10\t3\n");
    }
}
