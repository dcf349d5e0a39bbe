//! Cache command - inspect and prune the artifact store

use crate::cache::{format_bytes, Artifact, ArtifactStore, CacheState};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::cli::context::print_json;
use crate::config::{Config, ConfigManager};
use crate::error::KilnResult;
use crate::ui::{self, UiContext};
use chrono::Utc;
use console::style;
use tracing::debug;

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config, format: OutputFormat) -> KilnResult<()> {
    let store = ArtifactStore::open(ConfigManager::cache_dir(config))?;
    let ctx = UiContext::detect();

    match args.action {
        CacheAction::List => list_artifacts(&store, format),
        CacheAction::Gc { days, dry_run } => gc_artifacts(&store, config, days, dry_run),
        CacheAction::Clear { yes } => clear_artifacts(&store, &ctx.with_auto_yes(yes)).await,
    }
}

fn list_artifacts(store: &ArtifactStore, format: OutputFormat) -> KilnResult<()> {
    let artifacts = store.list()?;

    if format == OutputFormat::Json {
        let records: Vec<_> = artifacts.iter().map(|a| &a.record).collect();
        return print_json(&records);
    }

    if artifacts.is_empty() {
        println!("No artifacts in {}", store.root().display());
        return Ok(());
    }

    println!(
        "{:<8} {:<14} {:<28} {:<10} {:>10} {:<16}",
        "KIND", "KEY", "LABEL", "STATE", "SIZE", "CREATED"
    );
    println!("{}", "-".repeat(90));
    for artifact in &artifacts {
        print_row(artifact);
    }
    println!();
    println!(
        "Total: {} artifact(s), {}",
        artifacts.len(),
        format_bytes(store.total_size())
    );
    Ok(())
}

fn print_row(artifact: &Artifact) {
    let record = &artifact.record;
    let state = match record.state {
        CacheState::Complete => style("complete").green().to_string(),
        CacheState::Building => style("building").yellow().to_string(),
        CacheState::Miss => style("miss").dim().to_string(),
    };
    let size = record
        .size_bytes
        .map(format_bytes)
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{:<8} {:<14} {:<28} {:<10} {:>10} {:<16}",
        record.kind.dir_name(),
        record.key,
        record.label,
        state,
        size,
        record.created_at.format("%Y-%m-%d %H:%M")
    );
}

fn gc_artifacts(
    store: &ArtifactStore,
    config: &Config,
    days_override: Option<u32>,
    dry_run: bool,
) -> KilnResult<()> {
    let days = days_override.unwrap_or(config.cache.gc_days);
    if days == 0 {
        println!("Cache GC is disabled (gc_days = 0)");
        return Ok(());
    }

    let expired: Vec<Artifact> = store
        .list()?
        .into_iter()
        .filter(|a| a.record.is_older_than_days(days))
        .collect();
    if expired.is_empty() {
        println!("No artifacts older than {} days.", days);
        return Ok(());
    }

    println!("Found {} artifact(s) older than {} days:", expired.len(), days);
    for artifact in &expired {
        let age = (Utc::now() - artifact.record.created_at).num_days();
        println!(
            "  {} {} {} ({} days old)",
            style("•").red(),
            artifact.record.label,
            artifact.record.key,
            age
        );
    }

    if dry_run {
        println!();
        println!("Dry run - no artifacts removed.");
        return Ok(());
    }

    let report = store.gc(days)?;
    debug!("GC removed {:?}", report.removed);
    println!(
        "{} removed {} artifact(s), freed {}",
        style("✓").green(),
        report.removed.len(),
        format_bytes(report.freed_bytes)
    );
    Ok(())
}

async fn clear_artifacts(store: &ArtifactStore, ctx: &UiContext) -> KilnResult<()> {
    let artifacts = store.list()?;
    if artifacts.is_empty() {
        println!("No artifacts to clear.");
        return Ok(());
    }

    let prompt = format!(
        "Remove {} artifact(s) ({}) from {}?",
        artifacts.len(),
        format_bytes(store.total_size()),
        store.root().display()
    );
    if !ui::confirm(ctx, &prompt, false).await? {
        println!("Aborted.");
        return Ok(());
    }

    let removed = store.clear()?;
    println!("{} cleared {} artifact(s)", style("✓").green(), removed);
    Ok(())
}
