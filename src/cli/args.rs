//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

/// Kiln - incremental builds and checks for Cargo workspaces
///
/// Compiles external dependencies once per build configuration, builds each
/// package from the minimal set of sources it needs, and runs the workspace
/// check suite concurrently on top of the shared dependency artifact.
#[derive(Parser, Debug)]
#[command(name = "kiln")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "KILN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip local kiln.toml discovery
    #[arg(long, global = true)]
    pub no_local: bool,

    /// Workspace root (defaults to the nearest workspace above the current directory)
    #[arg(long, global = true, env = "KILN_ROOT")]
    pub root: Option<PathBuf>,

    /// Output format for reports
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build packages from their minimal source sets
    Build(BuildArgs),

    /// Run workspace checks
    Check(CheckArgs),

    /// Build (or reuse) the shared dependency artifact
    Deps,

    /// Show what a package build would include, without building
    Plan(PlanArgs),

    /// Verify or regenerate the shared dependency package
    Hakari(HakariArgs),

    /// Show the tools the enabled checks need and whether they are installed
    Env,

    /// Start a shell with the check environment exported
    Shell,

    /// Manage the artifact store
    Cache(CacheArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Arguments for the build command
#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Packages to build (defaults to every member except the shared dependency package)
    pub packages: Vec<String>,
}

/// Arguments for the check command
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Checks to run (defaults to checks.enabled, then all)
    #[arg(env = "KILN_CHECKS", value_delimiter = ',')]
    pub checks: Vec<String>,

    /// List available checks and exit
    #[arg(long)]
    pub list: bool,

    /// Override the number of test partitions
    #[arg(long)]
    pub partitions: Option<u32>,

    /// Lines of output shown for each failed check (0 = all)
    #[arg(long, default_value = "20")]
    pub tail: usize,
}

/// Arguments for the plan command
#[derive(Parser, Debug)]
pub struct PlanArgs {
    /// Package to plan
    pub package: String,

    /// List every file in the minimal source set
    #[arg(long)]
    pub files: bool,
}

/// Arguments for the hakari command
#[derive(Parser, Debug)]
pub struct HakariArgs {
    #[command(subcommand)]
    pub action: HakariAction,
}

/// Hakari subcommands
#[derive(Subcommand, Debug)]
pub enum HakariAction {
    /// Rewrite the shared dependency package from the members' requirements
    Generate,

    /// Fail if the shared dependency package has drifted
    Verify,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List stored artifacts
    List,

    /// Remove artifacts older than N days
    Gc {
        /// Age threshold in days (default: cache.gc_days)
        #[arg(long)]
        days: Option<u32>,

        /// Show what would be removed
        #[arg(long)]
        dry_run: bool,
    },

    /// Remove every artifact
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Show the global configuration file path
    Path,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,

        /// Write kiln.toml in the current directory instead of the global file
        #[arg(long)]
        local: bool,
    },
}

/// Arguments for the completions command
#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Report output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    Text,
    /// JSON on stdout
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn cli_parses_build_packages() {
        let cli = Cli::parse_from(["kiln", "build", "mjl", "mjp"]);
        match cli.command {
            Commands::Build(args) => assert_eq!(args.packages, vec!["mjl", "mjp"]),
            _ => panic!("expected Build command"),
        }
    }

    #[test]
    #[serial]
    fn cli_parses_check_names() {
        std::env::remove_var("KILN_CHECKS");
        let cli = Cli::parse_from(["kiln", "check", "fmt,clippy", "--partitions", "4"]);
        match cli.command {
            Commands::Check(args) => {
                assert_eq!(args.checks, vec!["fmt", "clippy"]);
                assert_eq!(args.partitions, Some(4));
                assert!(!args.list);
            }
            _ => panic!("expected Check command"),
        }
    }

    #[test]
    #[serial]
    fn check_names_default_from_environment() {
        std::env::set_var("KILN_CHECKS", "deny,audit");
        let cli = Cli::parse_from(["kiln", "check"]);
        std::env::remove_var("KILN_CHECKS");
        match cli.command {
            Commands::Check(args) => assert_eq!(args.checks, vec!["deny", "audit"]),
            _ => panic!("expected Check command"),
        }
    }

    #[test]
    fn cli_parses_hakari_actions() {
        let cli = Cli::parse_from(["kiln", "hakari", "verify"]);
        assert!(matches!(
            cli.command,
            Commands::Hakari(HakariArgs {
                action: HakariAction::Verify
            })
        ));
    }

    #[test]
    fn cli_parses_cache_gc() {
        let cli = Cli::parse_from(["kiln", "cache", "gc", "--days", "7", "--dry-run"]);
        match cli.command {
            Commands::Cache(CacheArgs {
                action: CacheAction::Gc { days, dry_run },
            }) => {
                assert_eq!(days, Some(7));
                assert!(dry_run);
            }
            _ => panic!("expected cache gc"),
        }
    }

    #[test]
    fn cli_global_flags() {
        let cli = Cli::parse_from(["kiln", "--no-local", "-vv", "--format", "json", "deps"]);
        assert!(cli.no_local);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(matches!(cli.command, Commands::Deps));
    }

    #[test]
    fn cli_parses_completions() {
        let cli = Cli::parse_from(["kiln", "completions", "zsh"]);
        match cli.command {
            Commands::Completions(args) => assert_eq!(args.shell, Shell::Zsh),
            _ => panic!("expected Completions command"),
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
