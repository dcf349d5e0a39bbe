//! Common build configuration and its fingerprint
//!
//! Every dependency build and every check that compiles shares one
//! configuration. Its `ConfigKey` keys the dependency artifact cache: two
//! requests with equal keys are served by one artifact.

use crate::cache::fingerprint::Fingerprint;
use crate::config::BuildConfig;
use crate::error::KilnResult;
use crate::runner::{Invocation, StepRunner};
use crate::workspace::{Workspace, LOCKFILE_NAME};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Printable fingerprint of a `CommonBuildConfig`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigKey(String);

impl ConfigKey {
    /// Key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Inputs shared by every compilation in the workspace
#[derive(Debug, Clone)]
pub struct CommonBuildConfig {
    /// Workspace root
    pub root: PathBuf,
    /// Digests of the root manifest, lockfile and member manifests
    pub input_digests: BTreeMap<PathBuf, String>,
    /// Target platform (`<arch>-<os>`)
    pub platform: String,
    /// Platform-specific extra build inputs
    pub platform_inputs: Vec<String>,
    /// Warnings are errors
    pub strict: bool,
    /// Cargo profile
    pub profile: String,
    /// Toolchain identity (`rustc -vV` summary)
    pub toolchain: String,
    /// Cargo executable
    pub cargo: String,
    /// Extra environment for cargo
    pub env: BTreeMap<String, String>,
}

impl CommonBuildConfig {
    /// Collect the configuration for a loaded workspace
    pub fn from_workspace(
        workspace: &Workspace,
        build: &BuildConfig,
        toolchain: impl Into<String>,
    ) -> KilnResult<Self> {
        let root = workspace.root();
        let mut input_digests = BTreeMap::new();
        let mut inputs = workspace.manifest_paths();
        inputs.push(PathBuf::from(LOCKFILE_NAME));
        for rel in inputs {
            let mut fp = Fingerprint::new("input");
            fp.file(root, &rel)?;
            input_digests.insert(rel, fp.finish());
        }

        let platform_inputs = build.current_platform_inputs();

        Ok(Self {
            root: root.to_path_buf(),
            input_digests,
            platform: format!("{}-{}", std::env::consts::ARCH, std::env::consts::OS),
            platform_inputs,
            strict: build.strict,
            profile: build.profile.clone(),
            toolchain: toolchain.into(),
            cargo: build.cargo.clone(),
            env: build.env.clone(),
        })
    }

    /// Fingerprint of every field
    pub fn key(&self) -> ConfigKey {
        let mut fp = Fingerprint::new("common-build-config");
        fp.field("root", &self.root.to_string_lossy());
        for (path, digest) in &self.input_digests {
            fp.field(&path.to_string_lossy(), digest);
        }
        fp.field("platform", &self.platform)
            .field("platform-inputs", &self.platform_inputs.join(","))
            .field("strict", if self.strict { "true" } else { "false" })
            .field("profile", &self.profile)
            .field("toolchain", &self.toolchain)
            .field("cargo", &self.cargo);
        for (k, v) in &self.env {
            fp.field(k, v);
        }
        ConfigKey(fp.finish_short())
    }

    /// Cargo arguments selecting the profile
    pub fn profile_args(&self) -> Vec<String> {
        match self.profile.as_str() {
            "dev" | "debug" => vec![],
            "release" => vec!["--release".to_string()],
            other => vec!["--profile".to_string(), other.to_string()],
        }
    }

    /// Directory under the target dir that holds the profile's output
    pub fn profile_dir(&self) -> &str {
        match self.profile.as_str() {
            "dev" | "debug" => "debug",
            other => other,
        }
    }

    /// Environment for every cargo invocation
    pub fn cargo_env(&self) -> BTreeMap<String, String> {
        let mut env = self.env.clone();
        if self.strict {
            let flags = match env.get("RUSTFLAGS") {
                Some(existing) if !existing.is_empty() => format!("{} -D warnings", existing),
                _ => "-D warnings".to_string(),
            };
            env.insert("RUSTFLAGS".to_string(), flags);
        }
        env
    }

    /// A cargo invocation in `cwd` with the common environment applied
    pub fn cargo(&self, cwd: &Path) -> Invocation {
        Invocation::new(&self.cargo, cwd).envs(&self.cargo_env())
    }
}

/// Identify the active toolchain from `rustc -vV`
///
/// Falls back to `unknown` when rustc cannot be run, which still yields a
/// stable key on that machine.
pub async fn detect_toolchain(runner: &dyn StepRunner, cwd: &Path) -> String {
    let invocation = Invocation::new("rustc", cwd).arg("-vV");
    match runner.run(&invocation, &|_: String| {}).await {
        Ok(output) if output.success() => {
            let summary: Vec<&str> = output
                .lines
                .iter()
                .filter(|l| {
                    l.starts_with("release:")
                        || l.starts_with("host:")
                        || l.starts_with("commit-hash:")
                })
                .map(String::as_str)
                .collect();
            if summary.is_empty() {
                "unknown".to_string()
            } else {
                summary.join(";")
            }
        }
        Ok(_) | Err(_) => {
            debug!("Could not determine toolchain version");
            "unknown".to_string()
        }
    }
}
