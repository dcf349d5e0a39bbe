//! Cargo manifest parsing
//!
//! Only the parts of `Cargo.toml` the orchestrator needs are modelled:
//! package identity, workspace membership, dependency tables and the
//! explicitly declared build targets.

use crate::error::{KilnError, KilnResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Parsed `Cargo.toml`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CargoManifest {
    /// `[package]` section (absent for virtual manifests)
    pub package: Option<PackageSection>,

    /// `[workspace]` section (root manifest only)
    pub workspace: Option<WorkspaceSection>,

    /// Normal dependencies
    #[serde(default)]
    pub dependencies: BTreeMap<String, DependencySpec>,

    /// Dev dependencies
    #[serde(default, rename = "dev-dependencies", alias = "dev_dependencies")]
    pub dev_dependencies: BTreeMap<String, DependencySpec>,

    /// Build dependencies
    #[serde(default, rename = "build-dependencies", alias = "build_dependencies")]
    pub build_dependencies: BTreeMap<String, DependencySpec>,

    /// Platform-specific dependency tables
    #[serde(default)]
    pub target: BTreeMap<String, PlatformDependencies>,

    /// Explicit `[lib]` target
    pub lib: Option<TargetSection>,

    /// Explicit `[[bin]]` targets
    #[serde(default)]
    pub bin: Vec<TargetSection>,

    /// Explicit `[[example]]` targets
    #[serde(default)]
    pub example: Vec<TargetSection>,

    /// Explicit `[[test]]` targets
    #[serde(default)]
    pub test: Vec<TargetSection>,

    /// Explicit `[[bench]]` targets
    #[serde(default)]
    pub bench: Vec<TargetSection>,
}

/// `[package]` section
#[derive(Debug, Clone, Deserialize)]
pub struct PackageSection {
    pub name: String,
    pub version: Option<InheritableString>,
    pub build: Option<BuildScript>,
}

/// A string field that may be inherited from `[workspace.package]`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum InheritableString {
    Value(String),
    Inherited { workspace: bool },
}

/// `package.build`: either a path or `false`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BuildScript {
    Enabled(bool),
    Path(String),
}

/// `[workspace]` section
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkspaceSection {
    #[serde(default)]
    pub members: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<String>,

    #[serde(default)]
    pub dependencies: BTreeMap<String, DependencySpec>,

    pub package: Option<WorkspacePackage>,
}

/// `[workspace.package]` inheritable fields
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkspacePackage {
    pub version: Option<String>,
}

/// `[target.'cfg(..)'.*dependencies]`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlatformDependencies {
    #[serde(default)]
    pub dependencies: BTreeMap<String, DependencySpec>,

    #[serde(default, rename = "dev-dependencies", alias = "dev_dependencies")]
    pub dev_dependencies: BTreeMap<String, DependencySpec>,

    #[serde(default, rename = "build-dependencies", alias = "build_dependencies")]
    pub build_dependencies: BTreeMap<String, DependencySpec>,
}

/// An explicitly declared build target
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TargetSection {
    pub name: Option<String>,
    pub path: Option<String>,
}

/// A dependency entry, either `name = "1.0"` or a detailed table
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DependencySpec {
    Version(String),
    Detailed(DetailedDependency),
}

/// Detailed dependency table
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetailedDependency {
    pub version: Option<String>,
    pub path: Option<String>,
    pub git: Option<String>,
    pub branch: Option<String>,
    pub tag: Option<String>,
    pub rev: Option<String>,
    pub registry: Option<String>,
    pub package: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(rename = "default-features", alias = "default_features")]
    pub default_features: Option<bool>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub workspace: bool,
}

/// Where a dependency comes from when it is not a path dependency
///
/// All fields empty means the default registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DependencySource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
}

impl DependencySource {
    /// Whether this is the default registry
    pub fn is_default(&self) -> bool {
        self.entries().is_empty()
    }

    /// Manifest keys in the order cargo documents them
    pub fn entries(&self) -> Vec<(&'static str, &str)> {
        [
            ("git", &self.git),
            ("branch", &self.branch),
            ("tag", &self.tag),
            ("rev", &self.rev),
            ("registry", &self.registry),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.as_deref().map(|v| (key, v)))
        .collect()
    }
}

impl std::fmt::Display for DependencySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_default() {
            return write!(f, "crates.io");
        }
        let parts: Vec<String> = self
            .entries()
            .iter()
            .map(|(key, value)| format!("{} {}", key, value))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// Which dependency table an entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DependencyKind {
    Normal,
    Build,
    Dev,
}

impl DependencyKind {
    /// Whether this kind is needed to compile the package itself
    pub fn is_compile(&self) -> bool {
        matches!(self, Self::Normal | Self::Build)
    }
}

impl DependencySpec {
    fn detailed(&self) -> Option<&DetailedDependency> {
        match self {
            Self::Version(_) => None,
            Self::Detailed(d) => Some(d),
        }
    }

    /// Version requirement, if any
    pub fn version_req(&self) -> Option<&str> {
        match self {
            Self::Version(v) => Some(v),
            Self::Detailed(d) => d.version.as_deref(),
        }
    }

    /// Path for path dependencies
    pub fn path(&self) -> Option<&str> {
        self.detailed().and_then(|d| d.path.as_deref())
    }

    /// Git or alternate-registry source
    pub fn source(&self) -> DependencySource {
        match self.detailed() {
            Some(d) => DependencySource {
                git: d.git.clone(),
                branch: d.branch.clone(),
                tag: d.tag.clone(),
                rev: d.rev.clone(),
                registry: d.registry.clone(),
            },
            None => DependencySource::default(),
        }
    }

    /// Explicitly enabled features
    pub fn features(&self) -> &[String] {
        self.detailed().map(|d| d.features.as_slice()).unwrap_or(&[])
    }

    /// Whether `default-features` is left enabled (None when unspecified)
    pub fn default_features(&self) -> Option<bool> {
        self.detailed().and_then(|d| d.default_features)
    }

    /// Whether the entry is `{ workspace = true }`
    pub fn is_workspace(&self) -> bool {
        self.detailed().is_some_and(|d| d.workspace)
    }

    /// Whether the dependency is optional
    pub fn is_optional(&self) -> bool {
        self.detailed().is_some_and(|d| d.optional)
    }

    /// Real package name (honours `package = "..."` renames)
    pub fn package_name<'a>(&'a self, key: &'a str) -> &'a str {
        self.detailed()
            .and_then(|d| d.package.as_deref())
            .unwrap_or(key)
    }
}

/// A dependency with workspace inheritance applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDependency {
    /// Real package name
    pub name: String,
    /// Table the dependency was declared in
    pub kind: DependencyKind,
    /// Version requirement
    pub version_req: Option<String>,
    /// Path relative to the workspace root, for path dependencies
    pub path: Option<std::path::PathBuf>,
    /// Git or registry source
    pub source: DependencySource,
    /// Enabled features
    pub features: BTreeSet<String>,
    /// Whether default features are enabled
    pub default_features: bool,
    /// Only compiled when a feature enables it
    pub optional: bool,
}

impl CargoManifest {
    /// Parse a manifest from a file on disk
    pub fn from_file(path: &Path) -> KilnResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| KilnError::io(format!("reading manifest {}", path.display()), e))?;
        Self::parse(&content).map_err(|e| match e {
            KilnError::ManifestInvalid { reason, .. } => KilnError::manifest(path, reason),
            other => other,
        })
    }

    /// Parse a manifest from a TOML string
    pub fn parse(content: &str) -> KilnResult<Self> {
        toml::from_str(content).map_err(|e| KilnError::manifest("Cargo.toml", e.to_string()))
    }

    /// Package name, if this manifest declares a package
    pub fn package_name(&self) -> Option<&str> {
        self.package.as_ref().map(|p| p.name.as_str())
    }

    /// All dependency tables flattened with their kind, platform tables included
    pub fn dependency_entries(&self) -> Vec<(DependencyKind, &str, &DependencySpec)> {
        let mut entries = Vec::new();
        let tables = [
            (DependencyKind::Normal, &self.dependencies),
            (DependencyKind::Build, &self.build_dependencies),
            (DependencyKind::Dev, &self.dev_dependencies),
        ];
        for (kind, table) in tables {
            entries.extend(table.iter().map(|(k, v)| (kind, k.as_str(), v)));
        }
        for platform in self.target.values() {
            let tables = [
                (DependencyKind::Normal, &platform.dependencies),
                (DependencyKind::Build, &platform.build_dependencies),
                (DependencyKind::Dev, &platform.dev_dependencies),
            ];
            for (kind, table) in tables {
                entries.extend(table.iter().map(|(k, v)| (kind, k.as_str(), v)));
            }
        }
        entries
    }

    /// Whether a build script is compiled for this package
    pub fn build_script(&self, package_dir: &Path) -> Option<String> {
        match self.package.as_ref().and_then(|p| p.build.as_ref()) {
            Some(BuildScript::Enabled(false)) => None,
            Some(BuildScript::Path(path)) => Some(path.clone()),
            Some(BuildScript::Enabled(true)) | None => package_dir
                .join("build.rs")
                .is_file()
                .then(|| "build.rs".to_string()),
        }
    }
}
