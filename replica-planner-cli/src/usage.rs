use anyhow::Result;
use clap::Args;
use prettytable::{format, Cell, Row, Table};
use replica_planner::UsageBook;
use std::path::PathBuf;

use crate::snapshot::load_snapshot;

#[derive(Debug, Args)]
pub(crate) struct Usage {
    #[arg(long, help = "Cluster snapshot JSON file")]
    snapshot: PathBuf,
    #[arg(long, value_parser = ["json"], help = "Output format: json (default: table)")]
    output: Option<String>,
}

pub(crate) fn handle_command(usage: Usage) -> Result<()> {
    let snapshot = load_snapshot(&usage.snapshot)?;
    let mut book = UsageBook::new(&snapshot.brokers);
    book.recompute(&snapshot, &[])?;

    if matches!(usage.output.as_deref(), Some("json")) {
        let serializable: Vec<serde_json::Value> = book
            .iter()
            .map(|b| {
                serde_json::json!({
                    "broker_id": b.broker_id(),
                    "rack": b.broker.rack,
                    "replicas": b.actual.replicas,
                    "leaders": b.actual.leaders,
                    "size": b.actual.size,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&serializable)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
    table.add_row(Row::new(vec![
        Cell::new("BROKER ID"),
        Cell::new("RACK"),
        Cell::new("REPLICAS"),
        Cell::new("LEADERS"),
        Cell::new("SIZE (BYTES)"),
    ]));
    for broker in book.iter() {
        table.add_row(Row::new(vec![
            Cell::new(&broker.broker_id().to_string()),
            Cell::new(&broker.broker.rack),
            Cell::new(&broker.actual.replicas.to_string()),
            Cell::new(&broker.actual.leaders.to_string()),
            Cell::new(&broker.actual.size.to_string()),
        ]));
    }
    table.printstd();
    Ok(())
}
