//! Deps command - build or reuse the shared dependency artifact

use crate::cli::context::{print_json, CommandContext};
use crate::error::KilnResult;
use crate::ui::{self, BuildProgress};
use std::sync::Arc;

/// Execute the deps command
pub async fn execute(ctx: &CommandContext) -> KilnResult<()> {
    let common = ctx.common_config().await?;
    let key = common.key();

    let progress = Arc::new(BuildProgress::new(&ctx.ui, "Building dependencies"));
    let sink_progress = Arc::clone(&progress);
    let deps = ctx.dependency_cache(Some(Arc::new(move |line| sink_progress.on_line(line))))?;
    let result = deps.get_or_build(&common, &ctx.workspace).await;
    progress.finish();
    let artifact = result?;

    ctx.run_log()
        .record(
            "deps.completed",
            &serde_json::json!({"key": artifact.key, "reused": artifact.reused}),
        )
        .await;

    if ctx.json() {
        return print_json(&serde_json::json!({
            "key": key,
            "reused": artifact.reused,
            "target_dir": artifact.target_dir,
        }));
    }

    let detail = if artifact.reused { "reused" } else { "built" };
    ui::step_ok_detail(&ctx.ui, &format!("Dependencies {}", key), detail);
    ui::key_value(&ctx.ui, "Target", &artifact.target_dir.display().to_string());
    Ok(())
}
