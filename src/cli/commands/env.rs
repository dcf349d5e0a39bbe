//! Env command - show the development environment of the enabled checks

use crate::cli::context::{print_json, CommandContext};
use crate::env::{DevEnvironment, ToolRole};
use crate::error::KilnResult;
use crate::ui::{self, TaskSpinner};

/// Execute the env command
pub async fn execute(ctx: &CommandContext) -> KilnResult<()> {
    let env = DevEnvironment::compose(&ctx.config)?;
    let mut spinner = TaskSpinner::new(&ctx.ui);
    if !ctx.json() {
        spinner.start(&format!("Probing {} tools...", env.tools.len()));
    }
    let status = env.probe(ctx.runner.as_ref(), ctx.workspace.root()).await;

    if ctx.json() {
        return print_json(&serde_json::json!({
            "checks": env.checks,
            "tools": env.tools,
            "status": status,
        }));
    }

    let available = status.iter().filter(|s| s.available).count();
    spinner.stop(&format!("{} of {} tools available", available, status.len()));

    ui::section(&ctx.ui, "Checks");
    ui::key_value(&ctx.ui, "Enabled", &env.check_list());

    ui::section(&ctx.ui, "Tools");
    let mut missing = 0;
    for (tool, state) in env.tools.iter().zip(&status) {
        let mut value = match tool.role {
            ToolRole::Toolchain => "toolchain".to_string(),
            ToolRole::Auxiliary => "auxiliary".to_string(),
            ToolRole::PlatformInput => format!("{} input", std::env::consts::OS),
            ToolRole::Extra => "extra".to_string(),
            ToolRole::Check => String::new(),
        };
        if !tool.required_by.is_empty() {
            let by: Vec<&str> = tool.required_by.iter().map(|k| k.name()).collect();
            if !value.is_empty() {
                value.push_str(", ");
            }
            value.push_str(&format!("for {}", by.join(", ")));
        }
        if !state.available {
            missing += 1;
            value.push_str(" (missing)");
        }
        ui::key_value_status(&ctx.ui, &tool.name, &value, state.available);
    }

    if missing > 0 {
        ui::remark(
            &ctx.ui,
            &format!("{} tools missing; checks that need them will fail", missing),
        );
    }
    Ok(())
}
