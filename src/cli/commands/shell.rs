//! Shell command - interactive shell with the check environment exported

use crate::cli::context::CommandContext;
use crate::env::DevEnvironment;
use crate::error::{KilnError, KilnResult};
use crate::ui;
use tracing::info;

/// Execute the shell command
pub async fn execute(ctx: &CommandContext) -> KilnResult<()> {
    let env = DevEnvironment::compose(&ctx.config)?;
    let common = ctx.common_config().await?;
    let invocation = env.shell_invocation(ctx.workspace.root(), &common.key());

    ui::step_info(
        &ctx.ui,
        &format!(
            "Entering {} for {} (checks: {})",
            env.shell,
            ctx.workspace.root().display(),
            env.check_list()
        ),
    );
    info!("Starting shell: {}", invocation);

    let code = ctx.runner.run_interactive(&invocation).await?;
    if code == 0 {
        Ok(())
    } else {
        Err(KilnError::User(format!("shell exited with {}", code)))
    }
}
