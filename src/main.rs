//! Kiln - incremental builds and checks for Cargo workspaces
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use kiln::cli::{Cli, CommandContext, Commands};
use kiln::config::ConfigManager;
use kiln::error::{KilnError, KilnResult};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> KilnResult<()> {
    let cli = Cli::parse();

    // Completions need neither config nor logging
    if let Commands::Completions(args) = cli.command {
        kiln::cli::commands::completions(args);
        return Ok(());
    }

    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };

    let local_config_path = if cli.no_local {
        None
    } else {
        let start = match cli.root {
            Some(ref root) => root.clone(),
            None => std::env::current_dir()
                .map_err(|e| KilnError::io("getting current directory", e))?,
        };
        ConfigManager::find_local_config(&start)
    };

    let config = config_manager
        .load_merged(local_config_path.as_deref())
        .await?;

    // 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("kiln=warn"),
        1 => EnvFilter::new("kiln=info"),
        _ => EnvFilter::new("kiln=debug"),
    };
    if config.general.log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .without_time()
            .with_writer(std::io::stderr)
            .init();
    }
    kiln::ui::init_theme();

    if cli.no_local {
        debug!("Local config discovery disabled (--no-local)");
    } else if let Some(ref path) = local_config_path {
        debug!("Found local config: {}", path.display());
    }

    ConfigManager::ensure_state_dirs().await?;

    let format = cli.format;
    match cli.command {
        Commands::Completions(_) => unreachable!("Completions handled above"),
        Commands::Config(args) => {
            kiln::cli::commands::config(args, &config, &config_manager).await
        }
        Commands::Cache(args) => kiln::cli::commands::cache(args, &config, format).await,
        command => {
            let ctx = CommandContext::open(config, cli.root.as_deref(), format)?;
            match command {
                Commands::Build(args) => kiln::cli::commands::build(args, &ctx).await,
                Commands::Check(args) => kiln::cli::commands::check(args, &ctx).await,
                Commands::Deps => kiln::cli::commands::deps(&ctx).await,
                Commands::Plan(args) => kiln::cli::commands::plan(args, &ctx).await,
                Commands::Hakari(args) => kiln::cli::commands::hakari(args, &ctx).await,
                Commands::Env => kiln::cli::commands::env(&ctx).await,
                Commands::Shell => kiln::cli::commands::shell(&ctx).await,
                Commands::Completions(_) | Commands::Config(_) | Commands::Cache(_) => {
                    unreachable!("handled above")
                }
            }
        }
    }
}
