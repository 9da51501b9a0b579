use std::fmt::Write as _;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use mxverify_lib::{CsvAccountStore, PruneReport, Pruner, Verifier};
use tracing::info;

use crate::args::{Cli, PruneArgs};
use crate::output;

pub fn run(cli: &Cli, args: &PruneArgs) -> Result<PruneReport> {
    let mut store = CsvAccountStore::load(&args.accounts)
        .with_context(|| format!("load accounts from {}", args.accounts))?;
    let verifier =
        Verifier::from_system_conf(cli.verifier_options()).context("verifier configuration")?;
    let pruner = Pruner::new(args.prune_options());

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock before 1970")?
        .as_secs();
    let now = i64::try_from(now).context("system clock out of range")?;

    let report = pruner.run(&mut store, &verifier, now)?;
    if !report.dry_run {
        info!(path = %store.path().display(), "account table updated");
    }

    match cli.out.as_deref() {
        Some(path) => {
            let json = serde_json::to_string_pretty(&report).context("serialize report")?;
            output::write_all_atomically(path, json.as_bytes())?;
        }
        None => print!("{}", render_summary(&report)),
    }
    Ok(report)
}

fn render_summary(report: &PruneReport) -> String {
    let mut text = String::new();
    let mode = if report.dry_run { "dry-run" } else { "applied" };
    let _ = writeln!(text, "candidates: {} ({mode})", report.candidates);
    for (idx, batch) in report.batches.iter().enumerate() {
        let _ = writeln!(
            text,
            "  batch {}: valid={} invalid={} errors={}",
            idx + 1,
            batch.valid,
            batch.invalid,
            batch.errors
        );
    }
    let totals = &report.totals;
    let _ = writeln!(
        text,
        "total: valid={} invalid={} errors={}",
        totals.valid, totals.invalid, totals.errors
    );
    if !report.flagged_user_ids.is_empty() {
        let ids: Vec<String> = report.flagged_user_ids.iter().map(u64::to_string).collect();
        let _ = writeln!(text, "flagged: {}", ids.join(", "));
    }
    text
}
