//! Shared state for commands that operate on a workspace

use crate::cache::{detect_toolchain, ArtifactStore, CommonBuildConfig, DependencyCache, OutputSink};
use crate::cli::args::OutputFormat;
use crate::config::{Config, ConfigManager};
use crate::error::{KilnError, KilnResult};
use crate::runner::{ProcessRunner, StepRunner};
use crate::runlog::RunLog;
use crate::ui::UiContext;
use crate::workspace::Workspace;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Loaded configuration, workspace and process runner
pub struct CommandContext {
    pub config: Config,
    pub workspace: Workspace,
    pub runner: Arc<dyn StepRunner>,
    pub ui: UiContext,
    pub format: OutputFormat,
}

impl CommandContext {
    /// Load the workspace at `root`, or the nearest one above the current directory
    pub fn open(config: Config, root: Option<&Path>, format: OutputFormat) -> KilnResult<Self> {
        let hack = config.workspace.hack_package.as_str();
        let workspace = match root {
            Some(root) => Workspace::load(root, hack)?,
            None => {
                let cwd = std::env::current_dir()
                    .map_err(|e| KilnError::io("getting current directory", e))?;
                Workspace::discover(&cwd, hack)?
            }
        };
        debug!(
            "Loaded workspace {} ({} packages)",
            workspace.root().display(),
            workspace.packages().len()
        );

        let runner: Arc<dyn StepRunner> = Arc::new(ProcessRunner::new());
        debug!("Using {} step runner", runner.runner_name());

        Ok(Self {
            config,
            workspace,
            runner,
            ui: UiContext::detect(),
            format,
        })
    }

    /// Whether reports go to stdout as JSON
    pub fn json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Common build configuration for this workspace and toolchain
    pub async fn common_config(&self) -> KilnResult<CommonBuildConfig> {
        let toolchain = detect_toolchain(self.runner.as_ref(), self.workspace.root()).await;
        CommonBuildConfig::from_workspace(&self.workspace, &self.config.build, toolchain)
    }

    /// Open the artifact store, collecting expired artifacts first
    pub fn store(&self) -> KilnResult<ArtifactStore> {
        open_store(&self.config)
    }

    /// Dependency cache over the artifact store
    pub fn dependency_cache(&self, sink: Option<OutputSink>) -> KilnResult<DependencyCache> {
        let cache = DependencyCache::new(self.store()?, Arc::clone(&self.runner));
        Ok(match sink {
            Some(sink) => cache.with_output(sink),
            None => cache,
        })
    }

    /// Run log for this invocation
    pub fn run_log(&self) -> RunLog {
        RunLog::new(&self.config)
    }
}

/// Open the configured artifact store, applying `cache.gc_days`
pub fn open_store(config: &Config) -> KilnResult<ArtifactStore> {
    let store = ArtifactStore::open(ConfigManager::cache_dir(config))?;
    if config.cache.gc_days > 0 {
        let report = store.gc(config.cache.gc_days)?;
        if !report.removed.is_empty() {
            debug!(
                "Removed {} expired artifacts from {}",
                report.removed.len(),
                store.root().display()
            );
        }
    }
    Ok(store)
}

/// Print a value as pretty JSON on stdout
pub fn print_json<T: Serialize>(value: &T) -> KilnResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
