//! Configuration schema for kiln
//!
//! Global configuration is stored at `~/.config/kiln/config.toml`; a
//! project-local `kiln.toml` at the workspace root overrides it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Common build configuration
    pub build: BuildConfig,

    /// Workspace layout settings
    pub workspace: WorkspaceConfig,

    /// Per-package build settings, keyed by package name
    pub packages: BTreeMap<String, PackageConfig>,

    /// Check suite settings
    pub checks: ChecksConfig,

    /// Artifact cache settings
    pub cache: CacheConfig,

    /// Development shell settings
    pub shell: ShellConfig,
}

impl Config {
    /// Settings for one package (defaults when not configured)
    pub fn package(&self, name: &str) -> PackageConfig {
        self.packages.get(name).cloned().unwrap_or_default()
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,

    /// Record build and check outcomes in the run log
    pub run_log: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            run_log: true,
        }
    }
}

/// Inputs shared by every package build and check
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Cargo profile used for dependency and package builds
    pub profile: String,

    /// Treat compiler and lint warnings as errors
    pub strict: bool,

    /// Extra native build inputs per platform (e.g. `macos = ["libiconv"]`)
    pub platform_inputs: HashMap<String, Vec<String>>,

    /// Environment variables passed to every cargo invocation
    pub env: BTreeMap<String, String>,

    /// Cargo executable
    pub cargo: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        let mut platform_inputs = HashMap::new();
        platform_inputs.insert("macos".to_string(), vec!["libiconv".to_string()]);
        Self {
            profile: "release".to_string(),
            strict: true,
            platform_inputs,
            env: BTreeMap::new(),
            cargo: "cargo".to_string(),
        }
    }
}

impl BuildConfig {
    /// Extra native inputs for the platform kiln is running on, sorted
    pub fn current_platform_inputs(&self) -> Vec<String> {
        let mut inputs = self
            .platform_inputs
            .get(std::env::consts::OS)
            .cloned()
            .unwrap_or_default();
        inputs.sort();
        inputs.dedup();
        inputs
    }
}

/// Workspace layout settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Name of the synthetic package unifying external dependency features
    pub hack_package: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            hack_package: "workspace-hack".to_string(),
        }
    }
}

/// Per-package build settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageConfig {
    /// Intra-workspace packages this package is built with.
    /// When unset, the list is derived from the manifest graph.
    pub deps: Option<Vec<String>>,

    /// Extra arguments appended to `cargo build`
    pub build_args: Vec<String>,
}

/// Check suite settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChecksConfig {
    /// Checks run by `kiln check` without arguments (empty = all)
    pub enabled: Vec<String>,

    /// Number of test partitions
    pub test_partitions: u32,

    /// Partition mode: "count" or "hash"
    pub partition_mode: String,

    /// Local advisory database used by the audit check
    pub advisory_db: Option<PathBuf>,

    /// Advisory IDs explicitly accepted by the audit check
    pub accepted_advisories: Vec<String>,

    /// cargo-deny configuration file (defaults to deny.toml discovery)
    pub deny_config: Option<PathBuf>,

    /// Also run `cargo hakari verify` in the consistency check
    pub hakari_verify: bool,
}

impl Default for ChecksConfig {
    fn default() -> Self {
        Self {
            enabled: vec![],
            test_partitions: 1,
            partition_mode: "count".to_string(),
            advisory_db: None,
            accepted_advisories: vec![],
            deny_config: None,
            hakari_verify: false,
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Artifact store directory (defaults to the user cache dir)
    pub dir: Option<PathBuf>,

    /// Auto-remove artifacts older than N days (0 = disabled)
    pub gc_days: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            gc_days: 30,
        }
    }
}

/// Development shell configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Shell started by `kiln shell`
    pub shell: String,

    /// Additional tools expected in the development environment
    pub extra_tools: Vec<String>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            shell: std::env::var("SHELL").unwrap_or_else(|_| "/bin/bash".to_string()),
            extra_tools: vec![],
        }
    }
}
