//! Dependency artifact cache
//!
//! Compiles the workspace's external dependencies once per `ConfigKey` and
//! hands the resulting target directory to every package build and check.
//! Within a process the result is memoized per key; across processes it is
//! reused through the artifact store.

use crate::cache::config::{CommonBuildConfig, ConfigKey};
use crate::cache::store::{copy_dir, ArtifactKind, ArtifactStore};
use crate::error::{KilnError, KilnResult};
use crate::runner::StepRunner;
use crate::workspace::{Skeleton, Workspace};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

/// Label recorded for dependency artifacts
pub const DEPS_LABEL: &str = "dependencies";

/// Line observer for streamed tool output
pub type OutputSink = Arc<dyn Fn(String) + Send + Sync>;

/// Handle to a complete dependency artifact
#[derive(Debug, Clone)]
pub struct DepsArtifact {
    /// Configuration the artifact was built for
    pub key: ConfigKey,
    /// Compiled target directory (read-only)
    pub target_dir: PathBuf,
    /// Whether a stored artifact was reused instead of built
    pub reused: bool,
}

impl DepsArtifact {
    /// Copy the artifact into a consumer's own target directory
    pub fn seed(&self, target_dir: &Path) -> KilnResult<u64> {
        let copied = copy_dir(&self.target_dir, target_dir)?;
        debug!(
            "Seeded {} with {} files from {}",
            target_dir.display(),
            copied,
            self.key
        );
        Ok(copied)
    }
}

type Slot = Arc<OnceCell<Result<DepsArtifact, String>>>;

/// Process-wide memo of dependency artifacts keyed by `ConfigKey`
pub struct DependencyCache {
    store: ArtifactStore,
    runner: Arc<dyn StepRunner>,
    slots: Mutex<HashMap<ConfigKey, Slot>>,
    builds: AtomicUsize,
    sink: Option<OutputSink>,
}

impl DependencyCache {
    /// Create an empty cache over a store
    pub fn new(store: ArtifactStore, runner: Arc<dyn StepRunner>) -> Self {
        Self {
            store,
            runner,
            slots: Mutex::new(HashMap::new()),
            builds: AtomicUsize::new(0),
            sink: None,
        }
    }

    /// Forward dependency build output to `sink`
    pub fn with_output(mut self, sink: OutputSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Artifact store backing the cache
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Step runner used for dependency builds
    pub fn runner(&self) -> Arc<dyn StepRunner> {
        Arc::clone(&self.runner)
    }

    /// Number of dependency builds this cache has executed
    pub fn builds_executed(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    /// Get the artifact for `config`, building it at most once per key
    ///
    /// Concurrent callers with the same key wait for the single producer.
    /// A failed build is remembered: every caller gets the same
    /// `DependencyBuild` error and nothing is retried in this process.
    pub async fn get_or_build(
        &self,
        config: &CommonBuildConfig,
        workspace: &Workspace,
    ) -> KilnResult<DepsArtifact> {
        let key = config.key();
        let slot = {
            let mut slots = self.slots.lock().await;
            Arc::clone(slots.entry(key.clone()).or_default())
        };

        let result = slot
            .get_or_init(|| async { self.produce(&key, config, workspace).await })
            .await;

        match result {
            Ok(artifact) => Ok(artifact.clone()),
            Err(output) => Err(KilnError::DependencyBuild {
                key: key.to_string(),
                output: output.clone(),
            }),
        }
    }

    async fn produce(
        &self,
        key: &ConfigKey,
        config: &CommonBuildConfig,
        workspace: &Workspace,
    ) -> Result<DepsArtifact, String> {
        match self.store.complete(ArtifactKind::Deps, key.as_str()) {
            Ok(Some(existing)) => {
                info!("Reusing dependency artifact {}", key);
                return Ok(DepsArtifact {
                    key: key.clone(),
                    target_dir: existing.content_dir(),
                    reused: true,
                });
            }
            Ok(None) => {}
            Err(e) => debug!("Ignoring unreadable dependency artifact {}: {}", key, e),
        }

        self.builds.fetch_add(1, Ordering::SeqCst);
        info!("Building dependencies for configuration {}", key);
        self.build(key, config, workspace)
            .await
            .map_err(|e| match e {
                KilnError::BuildFailed { output, .. } => output,
                other => other.to_string(),
            })
    }

    async fn build(
        &self,
        key: &ConfigKey,
        config: &CommonBuildConfig,
        workspace: &Workspace,
    ) -> KilnResult<DepsArtifact> {
        let artifact = match self.store.begin(ArtifactKind::Deps, key.as_str(), DEPS_LABEL) {
            Ok(artifact) => artifact,
            // Another process finished the same key first
            Err(KilnError::Internal(_)) => {
                if let Some(done) = self.store.complete(ArtifactKind::Deps, key.as_str())? {
                    return Ok(DepsArtifact {
                        key: key.clone(),
                        target_dir: done.content_dir(),
                        reused: true,
                    });
                }
                return Err(KilnError::Internal(format!("dependency artifact {} vanished", key)));
            }
            Err(e) => return Err(e),
        };

        let scratch = self.store.scratch("deps")?;
        Skeleton::plan(workspace)?.stage(workspace.root(), scratch.path())?;
        let target_dir = artifact.content_dir();

        for subcommand in ["check", "build"] {
            let invocation = config
                .cargo(scratch.path())
                .args([subcommand, "--workspace", "--locked", "--all-targets"])
                .args(config.profile_args())
                .env("CARGO_TARGET_DIR", target_dir.to_string_lossy());

            let sink = self.sink.clone();
            let on_output = move |line: String| {
                if let Some(sink) = &sink {
                    sink(line);
                }
            };
            let output = match self.runner.run(&invocation, &on_output).await {
                Ok(output) => output,
                Err(e) => {
                    self.store.discard(&artifact)?;
                    return Err(e);
                }
            };
            if !output.success() {
                self.store.discard(&artifact)?;
                return Err(KilnError::BuildFailed {
                    package: DEPS_LABEL.to_string(),
                    output: output.tail(),
                });
            }
        }

        let artifact = self.store.finalize(artifact)?;
        Ok(DepsArtifact {
            key: key.clone(),
            target_dir: artifact.content_dir(),
            reused: false,
        })
    }
}
