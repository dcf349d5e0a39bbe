//! Plan command - show what a package build would include

use crate::build::BuildPlan;
use crate::cli::args::PlanArgs;
use crate::cli::context::{print_json, CommandContext};
use crate::error::KilnResult;
use crate::ui;

/// Execute the plan command
pub async fn execute(args: PlanArgs, ctx: &CommandContext) -> KilnResult<()> {
    let common = ctx.common_config().await?;
    let plan = BuildPlan::new(&ctx.workspace, &ctx.config, &common, &args.package)?;

    if ctx.json() {
        return print_json(&plan);
    }

    ui::section(&ctx.ui, &plan.label());
    ui::key_value(&ctx.ui, "Build key", &plan.key);
    ui::key_value(&ctx.ui, "Config key", &plan.config_key);
    let declared = if plan.declared.is_empty() {
        "(none)".to_string()
    } else {
        plan.declared.join(", ")
    };
    ui::key_value(&ctx.ui, "Workspace deps", &declared);
    ui::key_value(&ctx.ui, "Source files", &plan.files.len().to_string());
    if !plan.build_args.is_empty() {
        ui::key_value(&ctx.ui, "Build args", &plan.build_args.join(" "));
    }
    if !plan.undeclared.is_empty() {
        ui::step_warn_hint(
            &ctx.ui,
            &format!("Undeclared dependencies: {}", plan.undeclared.join(", ")),
            &format!("Add them to packages.{}.deps in kiln.toml", plan.package),
        );
    }

    if args.files {
        for file in &plan.files {
            println!("  {}", file.display());
        }
    }
    Ok(())
}
