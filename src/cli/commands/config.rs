//! Config command - show or initialize configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager, LOCAL_CONFIG_NAME};
use crate::error::{KilnError, KilnResult};
use crate::ui::{self, UiContext};
use std::path::Path;
use tokio::fs;

/// Template for project-local config
const LOCAL_TEMPLATE: &str = r#"# kiln project configuration
# Settings here override the global config (~/.config/kiln/config.toml)

[build]
# profile = "release"           # dev, release or a custom profile
# strict = true                 # deny warnings in every build and check
# env = { RUSTFLAGS = "-C target-cpu=native" }

[workspace]
# hack_package = "workspace-hack"

# [packages.my-service]
# deps = ["my-lib"]             # intra-workspace packages built with it
# build_args = ["--features", "metrics"]

[checks]
# enabled = ["clippy", "fmt", "nextest", "hakari"]
# test_partitions = 4
# partition_mode = "hash"       # count or hash
# advisory_db = "/var/lib/advisory-db"
# accepted_advisories = []

[cache]
# dir = "/var/cache/kiln"
# gc_days = 30
"#;

/// Execute the config command
pub async fn execute(args: ConfigArgs, config: &Config, manager: &ConfigManager) -> KilnResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config),
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force, local }) => {
            if local {
                let cwd = std::env::current_dir()
                    .map_err(|e| KilnError::io("getting current directory", e))?;
                init_local(&cwd, force).await?
            } else {
                init_global(manager, force).await?
            }
        }
    }
    Ok(())
}

fn show_config(config: &Config) {
    let toml =
        toml::to_string_pretty(config).unwrap_or_else(|_| "Error serializing config".to_string());
    println!("{}", toml);
}

async fn init_global(manager: &ConfigManager, force: bool) -> KilnResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        ui::step_warn_hint(
            &ctx,
            &format!("Config already exists at {}", path.display()),
            "Use --force to overwrite",
        );
        return Ok(());
    }

    manager.save(&Config::default()).await?;
    ui::step_ok_detail(&ctx, "Configuration initialized", &path.display().to_string());
    Ok(())
}

async fn init_local(dir: &Path, force: bool) -> KilnResult<()> {
    let ctx = UiContext::detect();
    let path = dir.join(LOCAL_CONFIG_NAME);

    if path.exists() && !force {
        return Err(KilnError::User(format!(
            "{} already exists. Use --force to overwrite.",
            path.display()
        )));
    }

    fs::write(&path, LOCAL_TEMPLATE)
        .await
        .map_err(|e| KilnError::io(format!("writing {}", path.display()), e))?;
    ui::step_ok_detail(&ctx, "Created project config", &path.display().to_string());
    Ok(())
}
