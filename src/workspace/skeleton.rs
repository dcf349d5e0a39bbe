//! Dependency-only workspace skeleton
//!
//! A skeleton is the workspace with every member's real sources replaced
//! by empty target roots. Building it compiles the external dependencies
//! and nothing else, so its output depends only on manifests, the lockfile
//! and the common build configuration.

use crate::error::{KilnError, KilnResult};
use crate::workspace::discover::{Package, Workspace, LOCKFILE_NAME, MANIFEST_NAME};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const DUMMY_LIB: &str = "";
const DUMMY_MAIN: &str = "fn main() {}\n";

/// How a skeleton file is produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkeletonFile {
    /// Copied verbatim from the workspace
    Copy,
    /// Replaced by a stub with the given contents
    Stub(&'static str),
}

/// Planned skeleton, keyed by path relative to the workspace root
#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    files: BTreeMap<PathBuf, SkeletonFile>,
}

impl Skeleton {
    /// Plan the skeleton of a workspace
    pub fn plan(workspace: &Workspace) -> KilnResult<Self> {
        let root = workspace.root();
        let mut files = BTreeMap::new();

        files.insert(PathBuf::from(LOCKFILE_NAME), SkeletonFile::Copy);
        for manifest in workspace.manifest_paths() {
            files.insert(manifest, SkeletonFile::Copy);
        }
        for name in ["config", "config.toml"] {
            let rel = Path::new(".cargo").join(name);
            if root.join(&rel).is_file() {
                files.insert(rel, SkeletonFile::Copy);
            }
        }

        for package in workspace.packages() {
            for (path, stub) in target_roots(root, package) {
                files.entry(path).or_insert(SkeletonFile::Stub(stub));
            }
        }

        Ok(Self { files })
    }

    /// Planned files
    pub fn files(&self) -> &BTreeMap<PathBuf, SkeletonFile> {
        &self.files
    }

    /// Write the skeleton into `dest`
    pub fn stage(&self, root: &Path, dest: &Path) -> KilnResult<()> {
        for (rel, kind) in &self.files {
            let to = dest.join(rel);
            if let Some(parent) = to.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| KilnError::io(format!("creating {}", parent.display()), e))?;
            }
            match kind {
                SkeletonFile::Copy => {
                    fs::copy(root.join(rel), &to)
                        .map_err(|e| KilnError::io(format!("staging {}", rel.display()), e))?;
                }
                SkeletonFile::Stub(contents) => {
                    fs::write(&to, contents)
                        .map_err(|e| KilnError::io(format!("writing stub {}", rel.display()), e))?;
                }
            }
        }
        debug!("Staged skeleton with {} files", self.files.len());
        Ok(())
    }
}

/// Every compilation root of a package: explicit targets plus cargo's
/// autodiscovery locations
fn target_roots(root: &Path, package: &Package) -> Vec<(PathBuf, &'static str)> {
    let dir = root.join(&package.dir);
    let manifest = &package.manifest;
    let mut roots = Vec::new();

    let lib = manifest
        .lib
        .as_ref()
        .and_then(|l| l.path.clone())
        .unwrap_or_else(|| "src/lib.rs".to_string());
    if dir.join(&lib).is_file() {
        roots.push((package.dir.join(lib), DUMMY_LIB));
    }

    if let Some(script) = manifest.build_script(&dir) {
        roots.push((package.dir.join(script), DUMMY_MAIN));
    }

    let explicit = manifest
        .bin
        .iter()
        .chain(&manifest.example)
        .chain(&manifest.test)
        .chain(&manifest.bench)
        .filter_map(|t| t.path.as_deref());
    for path in explicit {
        roots.push((package.dir.join(path), DUMMY_MAIN));
    }

    if dir.join("src/main.rs").is_file() {
        roots.push((package.dir.join("src/main.rs"), DUMMY_MAIN));
    }
    for auto_dir in ["src/bin", "examples", "tests", "benches"] {
        for rel in discover_targets(&dir, Path::new(auto_dir)) {
            roots.push((package.dir.join(rel), DUMMY_MAIN));
        }
    }

    roots
}

/// `<dir>/*.rs` and `<dir>/*/main.rs`, relative to the package directory
fn discover_targets(package_dir: &Path, auto_dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(package_dir.join(auto_dir)) else {
        return Vec::new();
    };
    let mut found = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name();
        if path.is_file() && path.extension().is_some_and(|e| e == "rs") {
            found.push(auto_dir.join(name));
        } else if path.join("main.rs").is_file() && !path.join(MANIFEST_NAME).is_file() {
            found.push(auto_dir.join(name).join("main.rs"));
        }
    }
    found.sort();
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::testing::WorkspaceFixture;

    #[test]
    fn plan_stubs_every_target_root() {
        let fixture = WorkspaceFixture::two_packages();
        let ws = Workspace::load(fixture.path(), "workspace-hack").unwrap();
        let skeleton = Skeleton::plan(&ws).unwrap();
        let files = skeleton.files();

        assert_eq!(files[Path::new("Cargo.toml")], SkeletonFile::Copy);
        assert_eq!(files[Path::new("Cargo.lock")], SkeletonFile::Copy);
        assert_eq!(files[Path::new("crates/mjp/Cargo.toml")], SkeletonFile::Copy);
        assert_eq!(
            files[Path::new("crates/mjl/src/lib.rs")],
            SkeletonFile::Stub(DUMMY_LIB)
        );
        assert_eq!(
            files[Path::new("crates/mjl/tests/lexer.rs")],
            SkeletonFile::Stub(DUMMY_MAIN)
        );
        assert_eq!(
            files[Path::new("crates/mjp/src/bin/mjp.rs")],
            SkeletonFile::Stub(DUMMY_MAIN)
        );
        assert_eq!(
            files[Path::new("crates/workspace-hack/build.rs")],
            SkeletonFile::Stub(DUMMY_MAIN)
        );
        // Non-root modules are not needed
        assert!(!files.contains_key(Path::new("crates/mjl/src/token.rs")));
    }

    #[test]
    fn stage_replaces_sources_with_stubs() {
        let fixture = WorkspaceFixture::two_packages();
        let ws = Workspace::load(fixture.path(), "workspace-hack").unwrap();
        let dest = tempfile::TempDir::new().unwrap();

        Skeleton::plan(&ws).unwrap().stage(ws.root(), dest.path()).unwrap();

        let lib = fs::read_to_string(dest.path().join("crates/mjl/src/lib.rs")).unwrap();
        assert!(lib.is_empty());
        let manifest = fs::read_to_string(dest.path().join("crates/mjl/Cargo.toml")).unwrap();
        assert!(manifest.contains("lazy_static"));
        assert!(!dest.path().join("README.md").exists());
    }

    #[test]
    fn explicit_targets_and_disabled_build_script() {
        let fixture = WorkspaceFixture::two_packages();
        fixture.write(
            "crates/mjp/Cargo.toml",
            r#"[package]
name = "mjp"
version = "0.2.0"
build = false

[lib]
path = "lib/parser.rs"

[[bench]]
name = "throughput"
path = "perf/throughput.rs"
"#,
        );
        fixture.write("crates/mjp/lib/parser.rs", "pub fn parse() {}\n");
        fixture.write("crates/mjp/build.rs", "fn main() { panic!() }\n");

        let ws = Workspace::load(fixture.path(), "workspace-hack").unwrap();
        let skeleton = Skeleton::plan(&ws).unwrap();
        let files = skeleton.files();

        assert!(files.contains_key(Path::new("crates/mjp/lib/parser.rs")));
        assert!(files.contains_key(Path::new("crates/mjp/perf/throughput.rs")));
        assert!(!files.contains_key(Path::new("crates/mjp/build.rs")));
    }
}
