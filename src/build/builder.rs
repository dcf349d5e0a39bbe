//! Package builder
//!
//! Builds one package from its minimal source set on top of the shared
//! dependency artifact. A complete package artifact for the same build key
//! is a cache hit and never invokes the toolchain.

use crate::build::plan::BuildPlan;
use crate::cache::{ArtifactKind, CommonBuildConfig, DependencyCache, OutputSink};
use crate::config::Config;
use crate::error::{KilnError, KilnResult};
use crate::workspace::{Skeleton, Workspace};
use futures_util::future::join_all;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Result of one package build
#[derive(Debug, Clone, Serialize)]
pub struct BuildOutcome {
    pub package: String,
    pub version: String,
    pub key: String,
    /// Served from the artifact store without running cargo
    pub cache_hit: bool,
    /// Directory holding the build outputs
    pub output_dir: PathBuf,
    /// Number of output files
    pub outputs: usize,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }
}

/// Builds workspace packages against a shared dependency cache
pub struct PackageBuilder<'a> {
    workspace: &'a Workspace,
    config: &'a Config,
    common: &'a CommonBuildConfig,
    deps: &'a DependencyCache,
    sink: Option<OutputSink>,
}

impl<'a> PackageBuilder<'a> {
    /// Create a builder
    pub fn new(
        workspace: &'a Workspace,
        config: &'a Config,
        common: &'a CommonBuildConfig,
        deps: &'a DependencyCache,
    ) -> Self {
        Self {
            workspace,
            config,
            common,
            deps,
            sink: None,
        }
    }

    /// Forward cargo output lines to `sink`
    pub fn with_output(mut self, sink: OutputSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Plan the build of `name` without running it
    pub fn plan(&self, name: &str) -> KilnResult<BuildPlan> {
        BuildPlan::new(self.workspace, self.config, self.common, name)
    }

    /// Build one package
    pub async fn build(&self, name: &str) -> KilnResult<BuildOutcome> {
        let started = Instant::now();
        let plan = self.plan(name)?;
        if !plan.undeclared.is_empty() {
            warn!(
                "{} depends on {} without declaring it; its source set is incomplete",
                plan.package,
                plan.undeclared.join(", ")
            );
        }

        let store = self.deps.store();
        if let Some(done) = store.complete(ArtifactKind::Package, &plan.key)? {
            info!("{} is up to date ({})", plan.label(), plan.key);
            return Ok(BuildOutcome {
                package: plan.package,
                version: plan.version,
                key: plan.key,
                cache_hit: true,
                outputs: count_files(&done.content_dir()),
                output_dir: done.content_dir(),
                duration: started.elapsed(),
            });
        }

        let deps = self.deps.get_or_build(self.common, self.workspace).await?;

        let artifact = store.begin(ArtifactKind::Package, &plan.key, &plan.label())?;
        let scratch = store.scratch("build")?;
        let src = scratch.path().join("src");
        let target = scratch.path().join("target");

        // Other members are present as stubs so cargo can load the workspace
        Skeleton::plan(self.workspace)?.stage(self.workspace.root(), &src)?;
        plan.source_set.stage(self.workspace.root(), &src)?;
        deps.seed(&target)?;

        let invocation = self
            .common
            .cargo(&src)
            .args(["build", "--locked", "-p", plan.package.as_str()])
            .args(self.common.profile_args())
            .args(plan.build_args.iter().cloned())
            .env("CARGO_TARGET_DIR", target.to_string_lossy());

        let sink = self.sink.clone();
        let on_output = move |line: String| {
            if let Some(sink) = &sink {
                sink(line);
            }
        };
        let output = match self.deps.runner().run(&invocation, &on_output).await {
            Ok(output) => output,
            Err(e) => {
                store.discard(&artifact)?;
                return Err(e);
            }
        };
        if !output.success() {
            store.discard(&artifact)?;
            return Err(KilnError::BuildFailed {
                package: plan.package,
                output: output.tail(),
            });
        }

        let outputs = collect_outputs(
            &target.join(self.common.profile_dir()),
            &artifact.content_dir(),
        )?;
        let artifact = store.finalize(artifact)?;
        info!(
            "Built {} ({} outputs, key {})",
            plan.label(),
            outputs,
            plan.key
        );

        Ok(BuildOutcome {
            package: plan.package,
            version: plan.version,
            key: plan.key,
            cache_hit: false,
            output_dir: artifact.content_dir(),
            outputs,
            duration: started.elapsed(),
        })
    }

    /// Build several packages concurrently; each result is independent
    ///
    /// Repeated names are built once.
    pub async fn build_many(&self, names: &[String]) -> Vec<(String, KilnResult<BuildOutcome>)> {
        let mut seen = HashSet::new();
        let unique: Vec<&String> = names.iter().filter(|n| seen.insert(n.as_str())).collect();
        let builds = unique.into_iter().map(|name| async move {
            let result = self.build(name).await;
            if let Err(e) = &result {
                debug!("Build of {} failed: {}", name, e);
            }
            (name.clone(), result)
        });
        join_all(builds).await
    }
}

/// Copy the top-level files of a profile directory (binaries, libraries)
fn collect_outputs(profile_dir: &Path, out: &Path) -> KilnResult<usize> {
    let Ok(entries) = fs::read_dir(profile_dir) else {
        return Ok(0);
    };
    let mut copied = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name();
        if !path.is_file() || name.to_string_lossy().starts_with('.') {
            continue;
        }
        fs::copy(&path, out.join(&name))
            .map_err(|e| KilnError::io(format!("copying output {}", path.display()), e))?;
        copied += 1;
    }
    Ok(copied)
}

fn count_files(dir: &Path) -> usize {
    fs::read_dir(dir)
        .map(|entries| entries.flatten().filter(|e| e.path().is_file()).count())
        .unwrap_or(0)
}
