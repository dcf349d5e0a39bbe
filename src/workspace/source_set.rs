//! Minimal source sets
//!
//! The minimal source set of a package is the root manifest and lockfile
//! plus the common source files of the shared internal dependency, the
//! package itself and every declared intra-workspace dependency. It is the
//! input identity of a package build: files outside it never invalidate
//! that build.

use crate::cache::fingerprint::Fingerprint;
use crate::config::Config;
use crate::error::{KilnError, KilnResult};
use crate::workspace::discover::{Workspace, MANIFEST_NAME};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// Files of one package that cargo needs to compile it
///
/// `Cargo.toml`, every `*.rs` file and `.cargo/config(.toml)`. Skips
/// `target/`, hidden directories other than `.cargo`, and nested
/// directories that hold another package.
pub fn common_source_files(root: &Path, package_dir: &Path) -> KilnResult<BTreeSet<PathBuf>> {
    let base = root.join(package_dir);
    if !base.is_dir() {
        return Err(KilnError::PathNotFound(base));
    }

    let mut files = BTreeSet::new();
    let walker = WalkDir::new(&base)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || keep_entry(entry));

    for entry in walker {
        let entry = entry.map_err(|e| {
            KilnError::io(
                format!("walking {}", base.display()),
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("filesystem loop")),
            )
        })?;
        if !entry.file_type().is_file() || !is_source_file(entry.path()) {
            continue;
        }
        if let Ok(rel) = entry.path().strip_prefix(root) {
            files.insert(rel.to_path_buf());
        }
    }

    Ok(files)
}

fn keep_entry(entry: &DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return true;
    }
    let name = entry.file_name().to_string_lossy();
    if name == "target" || (name.starts_with('.') && name != ".cargo") {
        return false;
    }
    // A nested package is resolved on its own
    !entry.path().join(MANIFEST_NAME).is_file()
}

fn is_source_file(path: &Path) -> bool {
    let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
        return false;
    };
    if name == MANIFEST_NAME || path.extension().is_some_and(|ext| ext == "rs") {
        return true;
    }
    let in_cargo_dir = path
        .parent()
        .and_then(Path::file_name)
        .is_some_and(|dir| dir == ".cargo");
    in_cargo_dir && (name == "config" || name == "config.toml")
}

/// The computed minimal source set for one target package
#[derive(Debug, Clone)]
pub struct MinimalSourceSet {
    /// Target package
    pub target: String,
    /// Packages whose files are included (target, hack, declared dependencies)
    pub packages: BTreeSet<String>,
    /// Files relative to the workspace root
    pub files: BTreeSet<PathBuf>,
}

impl MinimalSourceSet {
    /// Fingerprint of every file's path and contents
    pub fn fingerprint(&self, root: &Path) -> KilnResult<String> {
        let mut fp = Fingerprint::new("source-set");
        for file in &self.files {
            fp.file(root, file)?;
        }
        Ok(fp.finish())
    }

    /// Copy the set into `dest`, preserving relative paths
    pub fn stage(&self, root: &Path, dest: &Path) -> KilnResult<()> {
        for file in &self.files {
            let to = dest.join(file);
            if let Some(parent) = to.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| KilnError::io(format!("creating {}", parent.display()), e))?;
            }
            std::fs::copy(root.join(file), &to)
                .map_err(|e| KilnError::io(format!("staging {}", file.display()), e))?;
        }
        debug!("Staged {} files for {}", self.files.len(), self.target);
        Ok(())
    }

    /// Whether any file of the set lives under `dir`
    pub fn covers_dir(&self, dir: &Path) -> bool {
        self.files
            .iter()
            .any(|f| f.parent().is_some_and(|p| p.starts_with(dir)))
    }
}

/// Computes minimal source sets over a loaded workspace
pub struct SourceSetResolver<'a> {
    workspace: &'a Workspace,
}

impl<'a> SourceSetResolver<'a> {
    /// Create a resolver for a workspace
    pub fn new(workspace: &'a Workspace) -> Self {
        Self { workspace }
    }

    /// Resolve the minimal source set of `target` built together with `declared`
    ///
    /// `declared` must list every intra-workspace package the target needs.
    /// An omission is not detected here.
    pub fn resolve(&self, target: &str, declared: &[String]) -> KilnResult<MinimalSourceSet> {
        let ws = self.workspace;
        let root = ws.root();

        let mut packages = BTreeSet::new();
        packages.insert(ws.package(target)?.name.clone());
        packages.insert(ws.hack()?.name.clone());
        for name in declared {
            packages.insert(ws.package(name)?.name.clone());
        }

        let mut files: BTreeSet<PathBuf> = ws.root_files().into_iter().collect();
        for name in &packages {
            let package = ws.package(name)?;
            files.extend(common_source_files(root, &package.dir)?);
        }

        debug!(
            "Resolved {} files across {} packages for {}",
            files.len(),
            packages.len(),
            target
        );
        Ok(MinimalSourceSet {
            target: target.to_string(),
            packages,
            files,
        })
    }

    /// Declared dependency list for a package
    ///
    /// Uses `[packages.<name>].deps` from configuration when present,
    /// otherwise the transitive closure from the manifest graph.
    pub fn declared_dependencies(&self, target: &str, config: &Config) -> KilnResult<Vec<String>> {
        if let Some(deps) = config.package(target).deps {
            return Ok(deps);
        }
        Ok(self
            .workspace
            .transitive_dependencies(target)?
            .into_iter()
            .filter(|d| d != self.workspace.hack_name())
            .collect())
    }

    /// Real transitive dependencies missing from a declared list
    pub fn undeclared_dependencies(
        &self,
        target: &str,
        declared: &[String],
    ) -> KilnResult<Vec<String>> {
        let declared: BTreeSet<&str> = declared.iter().map(String::as_str).collect();
        Ok(self
            .workspace
            .transitive_dependencies(target)?
            .into_iter()
            .filter(|d| d != self.workspace.hack_name() && !declared.contains(d.as_str()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::testing::WorkspaceFixture;

    fn load(fixture: &WorkspaceFixture) -> Workspace {
        Workspace::load(fixture.path(), "workspace-hack").unwrap()
    }

    #[test]
    fn common_sources_skip_docs_and_fixtures() {
        let fixture = WorkspaceFixture::two_packages();
        let files = common_source_files(fixture.path(), Path::new("crates/mjl")).unwrap();

        assert!(files.contains(Path::new("crates/mjl/Cargo.toml")));
        assert!(files.contains(Path::new("crates/mjl/src/lib.rs")));
        assert!(files.contains(Path::new("crates/mjl/src/token.rs")));
        assert!(files.contains(Path::new("crates/mjl/tests/lexer.rs")));
        assert!(!files.contains(Path::new("crates/mjl/README.md")));
        assert!(!files.contains(Path::new("crates/mjl/tests/fixtures/sample.json")));
    }

    #[test]
    fn common_sources_include_cargo_config_and_skip_target() {
        let fixture = WorkspaceFixture::two_packages();
        fixture.write("crates/mjl/.cargo/config.toml", "[build]\n");
        fixture.write("crates/mjl/target/debug/junk.rs", "");
        fixture.write("crates/mjl/.git/hooks.rs", "");

        let files = common_source_files(fixture.path(), Path::new("crates/mjl")).unwrap();
        assert!(files.contains(Path::new("crates/mjl/.cargo/config.toml")));
        assert!(!files.iter().any(|f| f.starts_with("crates/mjl/target")));
        assert!(!files.iter().any(|f| f.starts_with("crates/mjl/.git")));
    }

    #[test]
    fn dependent_includes_dependency_files() {
        let fixture = WorkspaceFixture::two_packages();
        let ws = load(&fixture);
        let resolver = SourceSetResolver::new(&ws);

        let set = resolver.resolve("mjp", &["mjl".to_string()]).unwrap();

        assert!(set.files.contains(Path::new("Cargo.toml")));
        assert!(set.files.contains(Path::new("Cargo.lock")));
        assert!(set.files.contains(Path::new("crates/mjp/src/bin/mjp.rs")));
        assert!(set.files.contains(Path::new("crates/mjl/src/lib.rs")));
        assert!(set.files.contains(Path::new("crates/workspace-hack/build.rs")));
        assert!(!set.files.contains(Path::new("README.md")));
    }

    #[test]
    fn dependency_excludes_dependent_files() {
        let fixture = WorkspaceFixture::two_packages();
        let ws = load(&fixture);
        let resolver = SourceSetResolver::new(&ws);

        let set = resolver.resolve("mjl", &[]).unwrap();

        assert!(set.covers_dir(Path::new("crates/mjl")));
        assert!(!set.covers_dir(Path::new("crates/mjp")));
        assert!(set.files.iter().all(|f| fixture.path().join(f).is_file()));
    }

    #[test]
    fn fingerprint_ignores_files_outside_the_set() {
        let fixture = WorkspaceFixture::two_packages();
        let ws = load(&fixture);
        let resolver = SourceSetResolver::new(&ws);
        let before = resolver.resolve("mjl", &[]).unwrap().fingerprint(ws.root()).unwrap();

        fixture.write("crates/mjp/src/lib.rs", "pub fn parse() { /* changed */ }\n");
        fixture.write("crates/mjl/README.md", "changed docs\n");
        let after = resolver.resolve("mjl", &[]).unwrap().fingerprint(ws.root()).unwrap();
        assert_eq!(before, after);

        fixture.write("crates/mjl/src/token.rs", "pub enum Token { Comma }\n");
        let changed = resolver.resolve("mjl", &[]).unwrap().fingerprint(ws.root()).unwrap();
        assert_ne!(before, changed);
    }

    #[test]
    fn omitted_dependency_is_silent_but_diagnosable() {
        let fixture = WorkspaceFixture::two_packages();
        let ws = load(&fixture);
        let resolver = SourceSetResolver::new(&ws);

        let set = resolver.resolve("mjp", &[]).unwrap();
        assert!(!set.covers_dir(Path::new("crates/mjl")));

        let missing = resolver.undeclared_dependencies("mjp", &[]).unwrap();
        assert_eq!(missing, vec!["mjl".to_string()]);
        assert!(resolver
            .undeclared_dependencies("mjp", &["mjl".to_string()])
            .unwrap()
            .is_empty());
    }

    #[test]
    fn declared_dependencies_prefer_configuration() {
        let fixture = WorkspaceFixture::two_packages();
        let ws = load(&fixture);
        let resolver = SourceSetResolver::new(&ws);

        let derived = resolver
            .declared_dependencies("mjp", &Config::default())
            .unwrap();
        assert_eq!(derived, vec!["mjl".to_string()]);

        let config: Config = toml::from_str("[packages.mjp]\ndeps = []\n").unwrap();
        assert!(resolver.declared_dependencies("mjp", &config).unwrap().is_empty());
    }

    #[test]
    fn stage_copies_only_the_set() {
        let fixture = WorkspaceFixture::two_packages();
        let ws = load(&fixture);
        let set = SourceSetResolver::new(&ws).resolve("mjl", &[]).unwrap();
        let dest = tempfile::TempDir::new().unwrap();

        set.stage(ws.root(), dest.path()).unwrap();

        assert!(dest.path().join("crates/mjl/src/lib.rs").is_file());
        assert!(dest.path().join("Cargo.lock").is_file());
        assert!(!dest.path().join("crates/mjp").exists());
    }

    #[test]
    fn unknown_declared_dependency_errors() {
        let fixture = WorkspaceFixture::two_packages();
        let ws = load(&fixture);
        let err = SourceSetResolver::new(&ws)
            .resolve("mjp", &["ghost".to_string()])
            .unwrap_err();
        assert!(matches!(err, KilnError::PackageNotFound(_)));
    }
}
