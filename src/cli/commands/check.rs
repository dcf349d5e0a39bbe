//! Check command - run the workspace check suite

use crate::checks::{self, CheckKind, CheckSuite};
use crate::cli::args::CheckArgs;
use crate::cli::context::{print_json, CommandContext};
use crate::config::Config;
use crate::error::{KilnError, KilnResult};
use crate::ui::{self, BuildProgress};
use console::style;
use std::sync::Arc;

/// Execute the check command
pub async fn execute(args: CheckArgs, ctx: &CommandContext) -> KilnResult<()> {
    if args.list {
        list_checks(ctx);
        return Ok(());
    }

    let config = effective_config(&ctx.config, &args);
    let selection = checks::select(&config, &args.checks)?;

    if !ctx.json() {
        ui::intro(&ctx.ui, &format!("kiln check ({} checks)", selection.len()));
    }

    let common = ctx.common_config().await?;
    let progress = Arc::new(BuildProgress::new(&ctx.ui, "Checking"));
    let sink_progress = Arc::clone(&progress);
    let deps = ctx.dependency_cache(Some(Arc::new(move |line| sink_progress.on_line(line))))?;
    let report = CheckSuite::new(&ctx.workspace, &config, &common, &deps)
        .run(&selection)
        .await;
    progress.finish();

    let run_log = ctx.run_log();
    for result in &report.results {
        run_log
            .record(
                "check.completed",
                &serde_json::json!({
                    "check": result.kind,
                    "passed": result.passed,
                    "duration": result.duration.as_secs_f64(),
                    "diagnostic": result.diagnostic,
                }),
            )
            .await;
    }

    if ctx.json() {
        print_json(&report)?;
    } else {
        for result in &report.results {
            let duration = format!("{:.1}s", result.duration.as_secs_f64());
            if result.passed {
                ui::step_ok_detail(&ctx.ui, result.kind.name(), &duration);
            } else {
                ui::step_error_detail(
                    &ctx.ui,
                    result.kind.name(),
                    result.diagnostic.as_deref().unwrap_or("failed"),
                );
                let max = if args.tail == 0 {
                    result.log.len()
                } else {
                    args.tail
                };
                ui::log_tail(&ctx.ui, &result.log, max);
            }
        }
    }

    let failed = report.failed();
    if failed.is_empty() {
        if !ctx.json() {
            ui::outro_success(
                &ctx.ui,
                &format!("All {} checks passed", report.results.len()),
            );
        }
        return Ok(());
    }

    let names: Vec<&str> = failed.iter().map(|r| r.kind.name()).collect();
    if !ctx.json() {
        ui::outro_error(&ctx.ui, &format!("{} checks failed", failed.len()));
    }
    Err(KilnError::User(format!(
        "{} of {} checks failed: {}",
        failed.len(),
        report.results.len(),
        names.join(", ")
    )))
}

fn list_checks(ctx: &CommandContext) {
    let enabled = checks::select(&ctx.config, &[]).unwrap_or_default();
    for kind in CheckKind::ALL {
        let marker = if enabled.contains(&kind) {
            style("*").green()
        } else {
            style(" ").dim()
        };
        println!(
            "{} {:<10} {}",
            marker,
            kind.name(),
            style(kind.description()).dim()
        );
    }
}

/// Configuration with the command-line overrides applied
fn effective_config(base: &Config, args: &CheckArgs) -> Config {
    let mut config = base.clone();
    if let Some(partitions) = args.partitions {
        config.checks.test_partitions = partitions;
    }
    config
}
