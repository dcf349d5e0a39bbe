//! Build command - build packages on top of the shared dependency artifact

use crate::build::PackageBuilder;
use crate::cli::args::BuildArgs;
use crate::cli::context::{print_json, CommandContext};
use crate::error::{KilnError, KilnResult};
use crate::ui::{self, BuildProgress};
use std::sync::Arc;

/// Execute the build command
pub async fn execute(args: BuildArgs, ctx: &CommandContext) -> KilnResult<()> {
    let packages = if args.packages.is_empty() {
        ctx.workspace.buildable().map(|p| p.name.clone()).collect()
    } else {
        for name in &args.packages {
            ctx.workspace.package(name)?;
        }
        args.packages
    };

    if !ctx.json() {
        ui::intro(&ctx.ui, &format!("kiln build ({} packages)", packages.len()));
    }

    let common = ctx.common_config().await?;
    let progress = Arc::new(BuildProgress::new(&ctx.ui, "Building"));
    let sink_progress = Arc::clone(&progress);
    let deps = ctx.dependency_cache(Some(Arc::new(move |line| sink_progress.on_line(line))))?;
    let builder = PackageBuilder::new(&ctx.workspace, &ctx.config, &common, &deps)
        .with_output(Arc::new({
            let progress = Arc::clone(&progress);
            move |line| progress.on_line(line)
        }));

    let results = builder.build_many(&packages).await;
    progress.finish();

    let run_log = ctx.run_log();
    let mut failed = Vec::new();
    let mut outcomes = Vec::new();
    for (name, result) in results {
        match result {
            Ok(outcome) => {
                run_log.record("build.completed", &outcome).await;
                if !ctx.json() {
                    let detail = if outcome.cache_hit {
                        format!("cached, {}", outcome.key)
                    } else {
                        format!(
                            "{:.1}s, {} outputs",
                            outcome.duration.as_secs_f64(),
                            outcome.outputs
                        )
                    };
                    ui::step_ok_detail(
                        &ctx.ui,
                        &format!("{}@{}", outcome.package, outcome.version),
                        &detail,
                    );
                }
                outcomes.push(outcome);
            }
            Err(e) => {
                run_log
                    .record(
                        "build.failed",
                        &serde_json::json!({"package": name, "error": e.to_string()}),
                    )
                    .await;
                if !ctx.json() {
                    ui::step_error(&ctx.ui, &name);
                    eprintln!("{}", e);
                }
                failed.push(name);
            }
        }
    }

    if ctx.json() {
        print_json(&outcomes)?;
    }

    if failed.is_empty() {
        if !ctx.json() {
            ui::outro_success(&ctx.ui, &format!("Built {} packages", outcomes.len()));
        }
        Ok(())
    } else {
        if !ctx.json() {
            ui::outro_error(&ctx.ui, &format!("{} builds failed", failed.len()));
        }
        Err(KilnError::User(format!(
            "{} of {} builds failed: {}",
            failed.len(),
            packages.len(),
            failed.join(", ")
        )))
    }
}
