//! `repscout run <store>`: check every due number and write results back.

use crate::config::{self, CommonArgs};
use crate::ledger::{self, RunLedger};
use anyhow::{Context, Result};
use clap::Args;
use repscout::{progress, JsonFileStore, Orchestrator, RunStatistics, WorkSelector};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// JSON store with the numbers to check
    pub store: PathBuf,

    /// Re-check every active number, however recently it was checked
    #[arg(long)]
    pub force: bool,

    /// Check at most this many numbers
    #[arg(long)]
    pub limit: Option<usize>,

    /// Lookups in flight at once
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Ledger file (default: ~/.repscout/ledger.jsonl)
    #[arg(long, conflicts_with = "no_ledger")]
    pub ledger: Option<PathBuf>,

    /// Do not write a ledger
    #[arg(long)]
    pub no_ledger: bool,

    /// Print the final statistics as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

pub async fn run(args: RunArgs) -> Result<()> {
    let mut config = args.common.resolve();
    if let Some(c) = args.concurrency {
        config.concurrency = c.max(1);
    }

    let store = Arc::new(
        JsonFileStore::open(&args.store)
            .await
            .with_context(|| format!("failed to open store {}", args.store.display()))?,
    );
    let source = args.common.egress_source(&config)?;
    let pool = config::load_pool(&config, source).await?;
    let chain = config::extraction_chain(&config)?;
    let transport = args.common.transport()?;
    tracing::info!("fetching via {} transport", transport.name());

    let (tx, rx) = progress::channel_for(config.concurrency);
    let ledger_task = if args.no_ledger {
        drop(rx);
        None
    } else {
        let path = args.ledger.clone().unwrap_or_else(ledger::default_path);
        let ledger = RunLedger::open(&path)?;
        tracing::info!("recording items to {}", ledger.path().display());
        Some(ledger::spawn(ledger, rx))
    };

    let selector = WorkSelector::new(config.stale_after)
        .force(args.force)
        .limit(args.limit);
    let orchestrator = Orchestrator::new(config, transport)
        .with_pool(pool)
        .with_chain(chain)
        .with_sink(store.clone())
        .with_progress(tx);

    let stats = orchestrator.run_from(store.as_ref(), &selector).await;
    drop(orchestrator);

    if let Some(task) = ledger_task {
        match task.await {
            Ok(Ok(lines)) => tracing::debug!("ledger recorded {lines} item(s)"),
            Ok(Err(e)) => tracing::warn!("ledger stopped early: {e:#}"),
            Err(e) => tracing::warn!("ledger task failed: {e}"),
        }
    }

    let stats = stats.context("failed to load worklist")?;
    let distribution = store.distribution().await;

    if args.json {
        super::print_json(&serde_json::json!({
            "statistics": stats,
            "distribution": distribution,
        }));
    } else {
        print_report(&stats, &distribution);
    }
    Ok(())
}

fn print_report(stats: &RunStatistics, distribution: &BTreeMap<String, usize>) {
    if stats.attempted == 0 {
        println!("Nothing due for a check.");
    } else {
        let secs = stats.elapsed_ms as f64 / 1000.0;
        let rate = if secs > 0.0 {
            stats.attempted as f64 / secs
        } else {
            0.0
        };
        println!("{}", "=".repeat(50));
        println!("Total:        {}", stats.attempted);
        println!(
            "Successful:   {} ({:.1}%)",
            stats.succeeded,
            stats.success_rate()
        );
        println!(
            "Failed:       {} ({:.1}%)",
            stats.failed,
            100.0 - stats.success_rate()
        );
        println!("Total time:   {secs:.1}s");
        println!("Average rate: {rate:.1}/s");
        if stats.write_failures > 0 {
            println!("Store writes failed: {}", stats.write_failures);
        }
        if !stats.failure_reasons.is_empty() {
            println!("\nFailures:");
            for (reason, count) in &stats.failure_reasons {
                println!("  {reason}: {count}");
            }
        }
    }

    println!("\nReputation distribution:");
    for (status, count) in distribution {
        println!("  {status}: {count}");
    }
}
