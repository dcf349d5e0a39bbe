//! Hakari command - verify or regenerate the shared dependency package

use crate::checks::consistency;
use crate::cli::args::{HakariAction, HakariArgs};
use crate::cli::context::{print_json, CommandContext};
use crate::error::{KilnError, KilnResult};
use crate::ui;
use console::style;

/// Execute the hakari command
pub async fn execute(args: HakariArgs, ctx: &CommandContext) -> KilnResult<()> {
    match args.action {
        HakariAction::Verify => verify(ctx),
        HakariAction::Generate => generate(ctx),
    }
}

fn verify(ctx: &CommandContext) -> KilnResult<()> {
    let report = consistency::verify(&ctx.workspace)?;

    if ctx.json() {
        print_json(&report)?;
    } else if report.passed() {
        ui::step_ok(&ctx.ui, &format!("{} is up to date", report.hack_package));
    } else {
        ui::step_error(&ctx.ui, &format!("{} has drifted", report.hack_package));
        for line in report.render_diff() {
            let styled = match line.chars().next() {
                Some('+') => style(line).green(),
                Some('-') => style(line).red(),
                _ => style(line).yellow(),
            };
            println!("  {}", styled);
        }
    }

    if report.passed() {
        Ok(())
    } else {
        Err(KilnError::User(format!(
            "{} is out of date; run `kiln hakari generate`",
            report.hack_package
        )))
    }
}

fn generate(ctx: &CommandContext) -> KilnResult<()> {
    let changed = consistency::generate(&ctx.workspace)?;
    let hack = ctx.workspace.hack()?;
    let path = ctx.workspace.root().join(hack.manifest_path());

    if ctx.json() {
        return print_json(&serde_json::json!({"changed": changed, "manifest": path}));
    }
    if changed {
        ui::step_ok_detail(&ctx.ui, "Regenerated", &path.display().to_string());
    } else {
        ui::step_ok(&ctx.ui, &format!("{} already up to date", hack.name));
    }

    let missing = consistency::verify(&ctx.workspace)?.missing_dependents;
    if !missing.is_empty() {
        ui::step_warn_hint(
            &ctx.ui,
            &format!("Members without {}: {}", hack.name, missing.join(", ")),
            &format!("Add `{} = {{ path = ... }}` to their [dependencies]", hack.name),
        );
    }
    Ok(())
}
