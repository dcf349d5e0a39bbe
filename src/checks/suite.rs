//! Check suite orchestration
//!
//! Runs the selected checks concurrently over the full workspace. Checks
//! that compile share one dependency artifact, each in its own seeded
//! target directory. Every check reports independently; a dependency build
//! failure fails only the checks that needed it.

use crate::cache::{CommonBuildConfig, DependencyCache, DepsArtifact, OutputSink};
use crate::checks::consistency;
use crate::checks::kind::CheckKind;
use crate::checks::partition::{Partition, PartitionMode};
use crate::config::Config;
use crate::error::KilnResult;
use crate::runner::{Invocation, StepOutput};
use crate::workspace::Workspace;
use futures_util::future::join_all;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Outcome of one check
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub kind: CheckKind,
    pub passed: bool,
    #[serde(serialize_with = "serialize_secs")]
    pub duration: Duration,
    /// Output lines of every step the check ran
    pub log: Vec<String>,
    /// Short failure reason
    pub diagnostic: Option<String>,
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

impl CheckResult {
    fn failed(kind: CheckKind, started: Instant, log: Vec<String>, diagnostic: String) -> Self {
        Self {
            kind,
            passed: false,
            duration: started.elapsed(),
            log,
            diagnostic: Some(diagnostic),
        }
    }
}

/// Results of a suite run, in selection order
#[derive(Debug, Clone, Default, Serialize)]
pub struct SuiteReport {
    pub results: Vec<CheckResult>,
}

impl SuiteReport {
    /// Whether every check passed
    pub fn passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }

    /// Checks that failed
    pub fn failed(&self) -> Vec<&CheckResult> {
        self.results.iter().filter(|r| !r.passed).collect()
    }

    /// Result of one check, if it ran
    pub fn get(&self, kind: CheckKind) -> Option<&CheckResult> {
        self.results.iter().find(|r| r.kind == kind)
    }
}

/// Resolve check names to kinds
///
/// No names selects `checks.enabled` from configuration, or every check
/// when that list is empty. Duplicates are dropped.
pub fn select(config: &Config, names: &[String]) -> KilnResult<Vec<CheckKind>> {
    let names = if names.is_empty() {
        &config.checks.enabled
    } else {
        names
    };
    if names.is_empty() {
        return Ok(CheckKind::ALL.to_vec());
    }
    let mut selection = Vec::new();
    for name in names {
        let kind: CheckKind = name.parse()?;
        if !selection.contains(&kind) {
            selection.push(kind);
        }
    }
    Ok(selection)
}

/// Runs checks against one workspace
pub struct CheckSuite<'a> {
    workspace: &'a Workspace,
    config: &'a Config,
    common: &'a CommonBuildConfig,
    deps: &'a DependencyCache,
    sink: Option<OutputSink>,
}

impl<'a> CheckSuite<'a> {
    /// Create a suite
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

    /// Forward tool output lines to `sink`
    pub fn with_output(mut self, sink: OutputSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Run the selected checks concurrently
    pub async fn run(&self, selection: &[CheckKind]) -> SuiteReport {
        let results = join_all(selection.iter().map(|kind| self.run_check(*kind))).await;
        let report = SuiteReport { results };
        info!(
            "{} of {} checks passed",
            report.results.len() - report.failed().len(),
            report.results.len()
        );
        report
    }

    /// Run one check
    pub async fn run_check(&self, kind: CheckKind) -> CheckResult {
        let started = Instant::now();
        debug!("Starting check {}", kind);

        if kind == CheckKind::Hakari {
            return self.run_consistency(started).await;
        }

        let deps = if kind.uses_deps_cache() {
            match self.deps.get_or_build(self.common, self.workspace).await {
                Ok(deps) => Some(deps),
                Err(e) => {
                    warn!("Check {} cannot run: {}", kind, e);
                    return CheckResult::failed(kind, started, vec![], e.to_string());
                }
            }
        } else {
            None
        };

        let invocations = match self.invocations(kind) {
            Ok(invocations) => invocations,
            Err(e) => return CheckResult::failed(kind, started, vec![], e.to_string()),
        };

        let steps = join_all(
            invocations
                .into_iter()
                .map(|invocation| self.run_step(invocation, deps.as_ref())),
        )
        .await;

        let mut log = Vec::new();
        let mut failures = Vec::new();
        for step in steps {
            match step {
                Ok((invocation, output)) => {
                    log.extend(output.lines.iter().cloned());
                    if !output.success() {
                        failures.push(format!(
                            "`{}` exited with {}",
                            invocation,
                            output
                                .code
                                .map(|c| c.to_string())
                                .unwrap_or_else(|| "a signal".to_string())
                        ));
                    }
                }
                Err(e) => failures.push(e.to_string()),
            }
        }

        if failures.is_empty() {
            CheckResult {
                kind,
                passed: true,
                duration: started.elapsed(),
                log,
                diagnostic: None,
            }
        } else {
            CheckResult::failed(kind, started, log, failures.join("; "))
        }
    }

    /// Run one step, in its own seeded target directory when it compiles
    async fn run_step(
        &self,
        invocation: Invocation,
        deps: Option<&DepsArtifact>,
    ) -> KilnResult<(Invocation, StepOutput)> {
        let scratch = match deps {
            Some(deps) => {
                let scratch = self.deps.store().scratch("check")?;
                let target = scratch.path().join("target");
                deps.seed(&target)?;
                Some((scratch, target))
            }
            None => None,
        };
        let invocation = match &scratch {
            Some((_, target)) => invocation.env("CARGO_TARGET_DIR", target.to_string_lossy()),
            None => invocation,
        };

        let sink = self.sink.clone();
        let on_output = move |line: String| {
            if let Some(sink) = &sink {
                sink(line);
            }
        };
        let output = self.deps.runner().run(&invocation, &on_output).await?;
        Ok((invocation, output))
    }

    async fn run_consistency(&self, started: Instant) -> CheckResult {
        let kind = CheckKind::Hakari;
        let report = match consistency::verify(self.workspace) {
            Ok(report) => report,
            Err(e) => return CheckResult::failed(kind, started, vec![], e.to_string()),
        };
        let mut log = report.render_diff();
        let mut failures = Vec::new();
        if !report.passed() {
            failures.push(format!(
                "{} is out of date ({} drift, {} members without it); run `kiln hakari generate`",
                report.hack_package,
                report.drift.len(),
                report.missing_dependents.len()
            ));
        }

        if self.config.checks.hakari_verify {
            let invocation = self.cargo().args(["hakari", "verify"]);
            match self.run_step(invocation, None).await {
                Ok((invocation, output)) => {
                    log.extend(output.lines.iter().cloned());
                    if !output.success() {
                        failures.push(format!("`{}` failed", invocation));
                    }
                }
                Err(e) => failures.push(e.to_string()),
            }
        }

        if failures.is_empty() {
            CheckResult {
                kind,
                passed: true,
                duration: started.elapsed(),
                log,
                diagnostic: None,
            }
        } else {
            CheckResult::failed(kind, started, log, failures.join("; "))
        }
    }

    fn cargo(&self) -> Invocation {
        self.common.cargo(self.workspace.root())
    }

    /// The commands a check runs (several for partitioned tests)
    pub fn invocations(&self, kind: CheckKind) -> KilnResult<Vec<Invocation>> {
        let checks = &self.config.checks;
        let root = self.workspace.root();
        let profile = self.common.profile_args();

        let invocations = match kind {
            CheckKind::Clippy => vec![self
                .cargo()
                .args(["clippy", "--workspace", "--all-targets", "--locked"])
                .args(profile)
                .args(["--", "--deny", "warnings"])],
            CheckKind::Doc => vec![self
                .cargo()
                .args(["doc", "--workspace", "--no-deps", "--locked"])
                .args(profile)
                .env("RUSTDOCFLAGS", "-D warnings")],
            CheckKind::Fmt => vec![self.cargo().args(["fmt", "--all", "--", "--check"])],
            CheckKind::TomlFmt => {
                let files = toml_files(root);
                if files.is_empty() {
                    return Ok(vec![]);
                }
                vec![Invocation::new("taplo", root)
                    .args(["fmt", "--check"])
                    .args(files.iter().map(|f| f.to_string_lossy().into_owned()))]
            }
            CheckKind::Audit => {
                let mut inv = self.cargo().arg("audit");
                if let Some(db) = &checks.advisory_db {
                    inv = inv.arg("--db").arg(db.to_string_lossy());
                }
                inv = inv.arg("--no-fetch");
                for id in &checks.accepted_advisories {
                    inv = inv.arg("--ignore").arg(id);
                }
                vec![inv]
            }
            CheckKind::Deny => {
                let mut inv = self.cargo().args(["deny", "--workspace", "check"]);
                if let Some(path) = &checks.deny_config {
                    inv = inv.arg("--config").arg(path.to_string_lossy());
                }
                vec![inv]
            }
            CheckKind::Nextest => {
                let mode: PartitionMode = checks.partition_mode.parse()?;
                let nextest_profile = nextest_profile_args(&profile);
                Partition::all(mode, checks.test_partitions)?
                    .into_iter()
                    .map(|partition| {
                        self.cargo()
                            .args(["nextest", "run", "--workspace", "--locked"])
                            .args(nextest_profile.iter().cloned())
                            .arg("--partition")
                            .arg(partition.arg())
                            .arg("--no-tests=pass")
                    })
                    .collect()
            }
            CheckKind::Hakari => {
                let mut invocations = Vec::new();
                if checks.hakari_verify {
                    invocations.push(self.cargo().args(["hakari", "verify"]));
                }
                invocations
            }
        };
        Ok(invocations)
    }
}

/// nextest's `--profile` selects a nextest profile; cargo's is `--cargo-profile`
fn nextest_profile_args(cargo_args: &[String]) -> Vec<String> {
    cargo_args
        .iter()
        .map(|a| {
            if a == "--profile" {
                "--cargo-profile".to_string()
            } else {
                a.clone()
            }
        })
        .collect()
}

/// Every TOML file in the workspace, relative to the root
fn toml_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            e.depth() == 0
                || !e.file_type().is_dir()
                || (name != "target" && (!name.starts_with('.') || name == ".cargo"))
        })
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "toml"))
        .filter_map(|e| e.path().strip_prefix(root).ok().map(Path::to_path_buf))
        .collect();
    files.sort();
    files
}
