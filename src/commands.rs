//! CLI command implementations.
//!
//! Each command opens the production service, runs one operation, and
//! prints the result to stdout as pretty JSON.

use anyhow::Result;
use serde::Serialize;

use draw_ledger_core::win::Ticket;

use crate::config::Config;
use crate::service::{open_service, LoadRequest, RangeQuery};

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn run_query(config: &Config, query: RangeQuery) -> Result<()> {
    let service = open_service(config).await?;
    let answer = service.answer_range(&query).await?;
    print_json(&answer)
}

/// Foreground bulk load. Prints the report once every batch has run.
pub async fn run_load(config: &Config, request: LoadRequest) -> Result<()> {
    let service = open_service(config).await?;
    let summary = service.load_range(&request).await?;
    print_json(&summary)?;
    if !summary.report.is_complete() {
        eprintln!(
            "{} round(s) could not be loaded: {:?}",
            summary.report.unresolved_ids.len(),
            summary.report.unresolved_ids
        );
    }
    Ok(())
}

pub async fn run_check(config: &Config, round: u32, numbers: &str) -> Result<()> {
    let ticket = Ticket::parse(numbers)?;
    let service = open_service(config).await?;
    let result = service.check_ticket(round, &ticket).await?;
    print_json(&result)
}

pub async fn run_latest(config: &Config) -> Result<()> {
    let service = open_service(config).await?;
    let resolved = service.latest().await;
    println!("{} (via {})", resolved.id, resolved.strategy);
    Ok(())
}
