//! Workspace discovery and the intra-workspace dependency graph

use crate::error::{KilnError, KilnResult};
use crate::workspace::manifest::{CargoManifest, InheritableString, ResolvedDependency};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Root manifest file name
pub const MANIFEST_NAME: &str = "Cargo.toml";
/// Workspace lockfile name
pub const LOCKFILE_NAME: &str = "Cargo.lock";

/// A workspace member
#[derive(Debug, Clone)]
pub struct Package {
    /// Package name
    pub name: String,
    /// Package version
    pub version: semver::Version,
    /// Package directory relative to the workspace root (empty for a root package)
    pub dir: PathBuf,
    /// Parsed manifest
    pub manifest: CargoManifest,
    /// Dependencies with workspace inheritance applied
    pub dependencies: Vec<ResolvedDependency>,
}

impl Package {
    /// Manifest path relative to the workspace root
    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_NAME)
    }
}

/// A loaded Cargo workspace
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    root_manifest: CargoManifest,
    packages: Vec<Package>,
    by_name: HashMap<String, usize>,
    hack_package: String,
}

impl Workspace {
    /// Find the workspace root at or above `start` and load it
    pub fn discover(start: &Path, hack_package: &str) -> KilnResult<Self> {
        let root = start
            .ancestors()
            .find(|dir| {
                let manifest = dir.join(MANIFEST_NAME);
                manifest.is_file()
                    && CargoManifest::from_file(&manifest)
                        .map(|m| m.workspace.is_some())
                        .unwrap_or(false)
            })
            .ok_or_else(|| KilnError::WorkspaceNotFound(start.to_path_buf()))?;
        Self::load(root, hack_package)
    }

    /// Load the workspace rooted at `root`
    pub fn load(root: &Path, hack_package: &str) -> KilnResult<Self> {
        let root = root
            .canonicalize()
            .map_err(|e| KilnError::io(format!("resolving {}", root.display()), e))?;
        let manifest_path = root.join(MANIFEST_NAME);
        if !manifest_path.is_file() {
            return Err(KilnError::WorkspaceNotFound(root));
        }
        let root_manifest = CargoManifest::from_file(&manifest_path)?;

        let lockfile = root.join(LOCKFILE_NAME);
        if !lockfile.is_file() {
            return Err(KilnError::LockfileMissing(lockfile));
        }

        let member_dirs = expand_members(&root, &root_manifest)?;
        let mut packages = Vec::with_capacity(member_dirs.len());
        for dir in member_dirs {
            let manifest = if dir.as_os_str().is_empty() {
                root_manifest.clone()
            } else {
                CargoManifest::from_file(&root.join(&dir).join(MANIFEST_NAME))?
            };
            packages.push(load_package(&root, &root_manifest, dir, manifest)?);
        }
        packages.sort_by(|a, b| a.name.cmp(&b.name));

        let mut by_name = HashMap::new();
        for (idx, pkg) in packages.iter().enumerate() {
            if by_name.insert(pkg.name.clone(), idx).is_some() {
                return Err(KilnError::DuplicatePackage(pkg.name.clone()));
            }
        }

        let workspace = Self {
            root,
            root_manifest,
            packages,
            by_name,
            hack_package: hack_package.to_string(),
        };
        workspace.ensure_acyclic()?;

        debug!(
            "Loaded workspace {} with {} packages",
            workspace.root.display(),
            workspace.packages.len()
        );
        Ok(workspace)
    }

    /// Absolute workspace root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Root manifest
    pub fn root_manifest(&self) -> &CargoManifest {
        &self.root_manifest
    }

    /// Root manifest and lockfile, relative to the root
    pub fn root_files(&self) -> [PathBuf; 2] {
        [PathBuf::from(MANIFEST_NAME), PathBuf::from(LOCKFILE_NAME)]
    }

    /// All members, sorted by name
    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    /// Look up a member by name
    pub fn package(&self, name: &str) -> KilnResult<&Package> {
        self.by_name
            .get(name)
            .map(|idx| &self.packages[*idx])
            .ok_or_else(|| KilnError::PackageNotFound(name.to_string()))
    }

    /// Name of the shared internal dependency
    pub fn hack_name(&self) -> &str {
        &self.hack_package
    }

    /// The shared internal dependency package
    pub fn hack(&self) -> KilnResult<&Package> {
        self.by_name
            .get(&self.hack_package)
            .map(|idx| &self.packages[*idx])
            .ok_or_else(|| KilnError::HackPackageMissing(self.hack_package.clone()))
    }

    /// Whether `name` is a workspace member
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Member directories, relative to the root
    pub fn member_dirs(&self) -> Vec<&Path> {
        self.packages.iter().map(|p| p.dir.as_path()).collect()
    }

    /// Every manifest in the workspace (root first), relative to the root
    pub fn manifest_paths(&self) -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(MANIFEST_NAME)];
        paths.extend(
            self.packages
                .iter()
                .filter(|p| !p.dir.as_os_str().is_empty())
                .map(Package::manifest_path),
        );
        paths
    }

    /// Member name for a dependency, if it points into the workspace
    pub fn member_for(&self, dep: &ResolvedDependency) -> Option<&Package> {
        let path = dep.path.as_ref()?;
        self.packages.iter().find(|p| &p.dir == path)
    }

    /// Direct intra-workspace dependencies of a package
    pub fn workspace_dependencies(
        &self,
        name: &str,
        include_dev: bool,
    ) -> KilnResult<BTreeSet<String>> {
        let package = self.package(name)?;
        Ok(package
            .dependencies
            .iter()
            .filter(|d| include_dev || d.kind.is_compile())
            .filter_map(|d| self.member_for(d))
            .map(|p| p.name.clone())
            .filter(|n| n != name)
            .collect())
    }

    /// Transitive intra-workspace dependencies of a package (excluding itself)
    ///
    /// Dev-dependencies are followed because cargo loads their manifests when
    /// resolving any build of the package.
    pub fn transitive_dependencies(&self, name: &str) -> KilnResult<BTreeSet<String>> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![name.to_string()];
        while let Some(current) = stack.pop() {
            for dep in self.workspace_dependencies(&current, true)? {
                if dep != name && seen.insert(dep.clone()) {
                    stack.push(dep);
                }
            }
        }
        Ok(seen)
    }

    /// Members that are not the shared internal dependency
    pub fn buildable(&self) -> impl Iterator<Item = &Package> {
        self.packages.iter().filter(|p| p.name != self.hack_package)
    }

    fn ensure_acyclic(&self) -> KilnResult<()> {
        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        let nodes: BTreeMap<&str, NodeIndex> = self
            .packages
            .iter()
            .map(|p| (p.name.as_str(), graph.add_node(p.name.as_str())))
            .collect();

        for package in &self.packages {
            for dep in self.workspace_dependencies(&package.name, false)? {
                graph.add_edge(nodes[package.name.as_str()], nodes[dep.as_str()], ());
            }
        }

        for component in tarjan_scc(&graph) {
            if component.len() > 1 {
                let mut names: Vec<&str> = component.iter().map(|idx| graph[*idx]).collect();
                names.sort_unstable();
                return Err(KilnError::DependencyCycle(names.join(" -> ")));
            }
        }
        Ok(())
    }
}

/// Expand `[workspace].members` globs into member directories
fn expand_members(root: &Path, manifest: &CargoManifest) -> KilnResult<Vec<PathBuf>> {
    let mut dirs = BTreeSet::new();
    if manifest.package.is_some() {
        dirs.insert(PathBuf::new());
    }

    let Some(section) = manifest.workspace.as_ref() else {
        return Ok(dirs.into_iter().collect());
    };

    let excluded: BTreeSet<PathBuf> = section
        .exclude
        .iter()
        .map(|e| normalize(Path::new(e)))
        .collect();

    for pattern in &section.members {
        let full = root.join(pattern);
        let full = full.to_string_lossy();
        let entries = glob::glob(&full).map_err(|e| {
            KilnError::manifest(
                root.join(MANIFEST_NAME),
                format!("invalid member pattern '{}': {}", pattern, e),
            )
        })?;
        for entry in entries.flatten() {
            if !entry.join(MANIFEST_NAME).is_file() {
                continue;
            }
            let Ok(rel) = entry.strip_prefix(root) else {
                continue;
            };
            let rel = normalize(rel);
            // `exclude` entries cover everything beneath them
            if !excluded.iter().any(|e| rel.starts_with(e)) {
                dirs.insert(rel);
            }
        }
    }

    Ok(dirs.into_iter().collect())
}

fn load_package(
    root: &Path,
    root_manifest: &CargoManifest,
    dir: PathBuf,
    manifest: CargoManifest,
) -> KilnResult<Package> {
    let manifest_path = root.join(&dir).join(MANIFEST_NAME);
    let section = manifest
        .package
        .as_ref()
        .ok_or_else(|| KilnError::manifest(&manifest_path, "member has no [package] section"))?;

    let workspace_section = root_manifest.workspace.as_ref();
    let version = match &section.version {
        Some(InheritableString::Value(v)) => v.clone(),
        Some(InheritableString::Inherited { .. }) => workspace_section
            .and_then(|w| w.package.as_ref())
            .and_then(|p| p.version.clone())
            .ok_or_else(|| {
                KilnError::manifest(&manifest_path, "version inherited but not set in workspace")
            })?,
        None => "0.0.0".to_string(),
    };
    let version = semver::Version::parse(&version)
        .map_err(|e| KilnError::manifest(&manifest_path, format!("invalid version: {}", e)))?;

    let mut dependencies = Vec::new();
    for (kind, key, spec) in manifest.dependency_entries() {
        let resolved = if spec.is_workspace() {
            let inherited = workspace_section
                .and_then(|w| w.dependencies.get(key))
                .ok_or_else(|| {
                    KilnError::manifest(
                        &manifest_path,
                        format!(
                            "dependency '{}' inherits from workspace but is not declared there",
                            key
                        ),
                    )
                })?;
            let mut features: BTreeSet<String> = inherited.features().iter().cloned().collect();
            features.extend(spec.features().iter().cloned());
            ResolvedDependency {
                name: inherited.package_name(key).to_string(),
                kind,
                version_req: inherited.version_req().map(str::to_string),
                path: inherited.path().map(|p| normalize(Path::new(p))),
                source: inherited.source(),
                features,
                default_features: inherited.default_features().unwrap_or(true),
                optional: spec.is_optional(),
            }
        } else {
            ResolvedDependency {
                name: spec.package_name(key).to_string(),
                kind,
                version_req: spec.version_req().map(str::to_string),
                path: spec.path().map(|p| normalize(&dir.join(p))),
                source: spec.source(),
                features: spec.features().iter().cloned().collect(),
                default_features: spec.default_features().unwrap_or(true),
                optional: spec.is_optional(),
            }
        };
        dependencies.push(resolved);
    }

    Ok(Package {
        name: section.name.clone(),
        version,
        dir,
        manifest,
        dependencies,
    })
}

/// Lexically normalize a relative path (drops `.`, folds `..`)
pub fn normalize(path: &Path) -> PathBuf {
    let mut out: Vec<Component> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.last(), Some(Component::Normal(_))) {
                    out.pop();
                } else {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out.iter().collect()
}
