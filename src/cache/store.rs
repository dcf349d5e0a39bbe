//! On-disk artifact store
//!
//! Artifacts live in `<store>/<kind>/<key>/` with a `meta.json` record and
//! a content directory (`target/` for dependency artifacts, `out/` for
//! package artifacts). A record moves from `building` to `complete` exactly
//! once; complete artifacts are never written again.

use crate::error::{KilnError, KilnResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

const RECORD_FILE: &str = "meta.json";
const SCRATCH_DIR: &str = "scratch";
/// A `building` record older than this belongs to a crashed run
const ABANDONED_AFTER_HOURS: i64 = 2;

/// Format bytes as human-readable size (e.g., "1.5 GB")
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// State of an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheState {
    /// No artifact exists
    Miss,
    /// Being produced, or abandoned by a crashed run
    Building,
    /// Finalized and immutable
    Complete,
}

impl fmt::Display for CacheState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Miss => write!(f, "miss"),
            Self::Building => write!(f, "building"),
            Self::Complete => write!(f, "complete"),
        }
    }
}

/// What an artifact holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Compiled external dependencies for one configuration
    Deps,
    /// Build output of one package
    Package,
}

impl ArtifactKind {
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Deps => "deps",
            Self::Package => "packages",
        }
    }

    fn content_dir(&self) -> &'static str {
        match self {
            Self::Deps => "target",
            Self::Package => "out",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deps => write!(f, "deps"),
            Self::Package => write!(f, "package"),
        }
    }
}

/// Persisted `meta.json` record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub kind: ArtifactKind,
    pub key: String,
    /// `name@version` for packages, `dependencies` for deps
    pub label: String,
    pub state: CacheState,
    pub created_at: DateTime<Utc>,
    pub size_bytes: Option<u64>,
}

impl ArtifactRecord {
    /// Check if this artifact is older than the given number of days
    pub fn is_older_than_days(&self, days: u32) -> bool {
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(days));
        self.created_at < cutoff
    }

    /// Whether a `building` record is old enough to be a crashed run
    pub fn is_abandoned(&self) -> bool {
        self.state == CacheState::Building
            && self.created_at < Utc::now() - chrono::Duration::hours(ABANDONED_AFTER_HOURS)
    }
}

/// An artifact record with its location
#[derive(Debug, Clone)]
pub struct Artifact {
    pub record: ArtifactRecord,
    pub dir: PathBuf,
}

impl Artifact {
    /// Directory holding the artifact's files
    pub fn content_dir(&self) -> PathBuf {
        self.dir.join(self.record.kind.content_dir())
    }

    fn record_path(&self) -> PathBuf {
        self.dir.join(RECORD_FILE)
    }
}

/// Outcome of garbage collection
#[derive(Debug, Default)]
pub struct GcReport {
    pub removed: Vec<ArtifactRecord>,
    pub freed_bytes: u64,
}

/// A scratch directory removed on drop
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.path) {
            debug!("Failed to remove scratch dir {}: {}", self.path.display(), e);
        }
    }
}

/// Content-addressed artifact store rooted at a directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Open a store, creating its directory
    pub fn open(root: impl Into<PathBuf>) -> KilnResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|e| KilnError::io(format!("creating artifact store {}", root.display()), e))?;
        Ok(Self { root })
    }

    /// Store directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn artifact_dir(&self, kind: ArtifactKind, key: &str) -> PathBuf {
        self.root.join(kind.dir_name()).join(key)
    }

    /// Read an artifact record, if one exists
    pub fn lookup(&self, kind: ArtifactKind, key: &str) -> KilnResult<Option<Artifact>> {
        let dir = self.artifact_dir(kind, key);
        if !dir.join(RECORD_FILE).is_file() {
            return Ok(None);
        }
        read_artifact(&dir).map(Some)
    }

    /// State of an artifact (`Miss` when absent)
    pub fn state(&self, kind: ArtifactKind, key: &str) -> KilnResult<CacheState> {
        Ok(self
            .lookup(kind, key)?
            .map(|a| a.record.state)
            .unwrap_or(CacheState::Miss))
    }

    /// A complete artifact, if present
    pub fn complete(&self, kind: ArtifactKind, key: &str) -> KilnResult<Option<Artifact>> {
        Ok(self
            .lookup(kind, key)?
            .filter(|a| a.record.state == CacheState::Complete))
    }

    /// Start producing an artifact
    ///
    /// Leftovers of an abandoned `building` artifact with the same key are
    /// discarded. A recent `building` record is another run in progress and
    /// yields `ArtifactBusy`. Starting over a complete artifact is an error.
    pub fn begin(&self, kind: ArtifactKind, key: &str, label: &str) -> KilnResult<Artifact> {
        let dir = self.artifact_dir(kind, key);
        if let Some(existing) = self.lookup(kind, key)? {
            if existing.record.state == CacheState::Complete {
                return Err(KilnError::Internal(format!(
                    "{} artifact {} is already complete",
                    kind, key
                )));
            }
            if !existing.record.is_abandoned() {
                return Err(KilnError::ArtifactBusy {
                    kind: kind.to_string(),
                    key: key.to_string(),
                });
            }
            debug!("Discarding abandoned {} artifact {}", kind, key);
        }
        if dir.exists() {
            fs::remove_dir_all(&dir)
                .map_err(|e| KilnError::io(format!("removing {}", dir.display()), e))?;
        }

        let artifact = Artifact {
            record: ArtifactRecord {
                kind,
                key: key.to_string(),
                label: label.to_string(),
                state: CacheState::Building,
                created_at: Utc::now(),
                size_bytes: None,
            },
            dir,
        };
        let content = artifact.content_dir();
        fs::create_dir_all(&content)
            .map_err(|e| KilnError::io(format!("creating {}", content.display()), e))?;
        write_record(&artifact)?;
        Ok(artifact)
    }

    /// Mark an artifact complete, recording its size
    pub fn finalize(&self, mut artifact: Artifact) -> KilnResult<Artifact> {
        artifact.record.size_bytes = Some(dir_size(&artifact.content_dir()));
        artifact.record.state = CacheState::Complete;
        write_record(&artifact)?;
        debug!(
            "Finalized {} artifact {} ({})",
            artifact.record.kind, artifact.record.key, artifact.record.label
        );
        Ok(artifact)
    }

    /// Remove an artifact that failed to build
    pub fn discard(&self, artifact: &Artifact) -> KilnResult<()> {
        if artifact.dir.exists() {
            fs::remove_dir_all(&artifact.dir)
                .map_err(|e| KilnError::io(format!("removing {}", artifact.dir.display()), e))?;
        }
        Ok(())
    }

    /// All artifacts, newest first. Corrupt records are skipped with a warning.
    pub fn list(&self) -> KilnResult<Vec<Artifact>> {
        let mut artifacts = Vec::new();
        for kind in [ArtifactKind::Deps, ArtifactKind::Package] {
            let kind_dir = self.root.join(kind.dir_name());
            let Ok(entries) = fs::read_dir(&kind_dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let dir = entry.path();
                if !dir.join(RECORD_FILE).is_file() {
                    continue;
                }
                match read_artifact(&dir) {
                    Ok(artifact) => artifacts.push(artifact),
                    Err(e) => warn!("Skipping artifact: {}", e),
                }
            }
        }
        artifacts.sort_by(|a, b| b.record.created_at.cmp(&a.record.created_at));
        Ok(artifacts)
    }

    /// Remove artifacts older than `days`
    pub fn gc(&self, days: u32) -> KilnResult<GcReport> {
        let mut report = GcReport::default();
        for artifact in self.list()? {
            if !artifact.record.is_older_than_days(days) {
                continue;
            }
            report.freed_bytes += artifact
                .record
                .size_bytes
                .unwrap_or_else(|| dir_size(&artifact.dir));
            self.discard(&artifact)?;
            report.removed.push(artifact.record);
        }
        Ok(report)
    }

    /// Remove every artifact and scratch directory, returning the artifact count
    pub fn clear(&self) -> KilnResult<usize> {
        let count = self.list()?.len();
        for name in [
            ArtifactKind::Deps.dir_name(),
            ArtifactKind::Package.dir_name(),
            SCRATCH_DIR,
        ] {
            let dir = self.root.join(name);
            if dir.exists() {
                fs::remove_dir_all(&dir)
                    .map_err(|e| KilnError::io(format!("removing {}", dir.display()), e))?;
            }
        }
        Ok(count)
    }

    /// Total size of the store
    pub fn total_size(&self) -> u64 {
        dir_size(&self.root)
    }

    /// Create a fresh scratch directory inside the store
    pub fn scratch(&self, purpose: &str) -> KilnResult<ScratchDir> {
        let path = self
            .root
            .join(SCRATCH_DIR)
            .join(format!("{}-{}", purpose, uuid::Uuid::new_v4()));
        fs::create_dir_all(&path)
            .map_err(|e| KilnError::io(format!("creating {}", path.display()), e))?;
        Ok(ScratchDir { path })
    }
}

fn read_artifact(dir: &Path) -> KilnResult<Artifact> {
    let path = dir.join(RECORD_FILE);
    let content = fs::read_to_string(&path)
        .map_err(|e| KilnError::io(format!("reading {}", path.display()), e))?;
    let record: ArtifactRecord =
        serde_json::from_str(&content).map_err(|e| KilnError::ArtifactCorrupt {
            path: path.clone(),
            reason: e.to_string(),
        })?;
    Ok(Artifact {
        record,
        dir: dir.to_path_buf(),
    })
}

fn write_record(artifact: &Artifact) -> KilnResult<()> {
    let path = artifact.record_path();
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(&artifact.record)?;
    fs::write(&tmp, json).map_err(|e| KilnError::io(format!("writing {}", tmp.display()), e))?;
    fs::rename(&tmp, &path).map_err(|e| KilnError::io(format!("writing {}", path.display()), e))
}

/// Total size of the files under a directory
pub fn dir_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

/// Recursively copy a directory tree, returning the number of files copied
pub fn copy_dir(from: &Path, to: &Path) -> KilnResult<u64> {
    let mut copied = 0;
    for entry in WalkDir::new(from).follow_links(false) {
        let entry = entry.map_err(|e| {
            KilnError::io(
                format!("walking {}", from.display()),
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("filesystem loop")),
            )
        })?;
        let Ok(rel) = entry.path().strip_prefix(from) else {
            continue;
        };
        let dest = to.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest)
                .map_err(|e| KilnError::io(format!("creating {}", dest.display()), e))?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &dest)
                .map_err(|e| KilnError::io(format!("copying to {}", dest.display()), e))?;
            copied += 1;
        }
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, ArtifactStore) {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::open(dir.path().join("store")).unwrap();
        (dir, store)
    }

    #[test]
    fn format_bytes_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024 / 2), "1.5 GB");
    }

    #[test]
    fn lifecycle_miss_building_complete() {
        let (_dir, store) = store();
        assert_eq!(store.state(ArtifactKind::Deps, "abc").unwrap(), CacheState::Miss);

        let artifact = store.begin(ArtifactKind::Deps, "abc", "dependencies").unwrap();
        assert_eq!(store.state(ArtifactKind::Deps, "abc").unwrap(), CacheState::Building);
        assert!(store.complete(ArtifactKind::Deps, "abc").unwrap().is_none());

        fs::write(artifact.content_dir().join("libfoo.rlib"), vec![0u8; 100]).unwrap();
        let done = store.finalize(artifact).unwrap();

        assert_eq!(done.record.size_bytes, Some(100));
        let found = store.complete(ArtifactKind::Deps, "abc").unwrap().unwrap();
        assert_eq!(found.record.label, "dependencies");
        assert!(found.content_dir().ends_with("target"));
    }

    #[test]
    fn begin_over_complete_is_rejected() {
        let (_dir, store) = store();
        let artifact = store.begin(ArtifactKind::Package, "k1", "mjl@0.1.0").unwrap();
        store.finalize(artifact).unwrap();
        assert!(store.begin(ArtifactKind::Package, "k1", "mjl@0.1.0").is_err());
    }

    #[test]
    fn begin_replaces_abandoned_build() {
        let (_dir, store) = store();
        let mut stale = store.begin(ArtifactKind::Package, "k1", "mjl@0.1.0").unwrap();
        fs::write(stale.content_dir().join("partial"), "x").unwrap();
        stale.record.created_at = Utc::now() - chrono::Duration::hours(3);
        write_record(&stale).unwrap();

        let fresh = store.begin(ArtifactKind::Package, "k1", "mjl@0.1.0").unwrap();
        assert!(!fresh.content_dir().join("partial").exists());
    }

    #[test]
    fn begin_leaves_a_running_build_alone() {
        let (_dir, store) = store();
        let running = store.begin(ArtifactKind::Package, "k1", "mjl@0.1.0").unwrap();
        fs::write(running.content_dir().join("partial"), "x").unwrap();

        let err = store.begin(ArtifactKind::Package, "k1", "mjl@0.1.0").unwrap_err();

        assert!(matches!(err, KilnError::ArtifactBusy { .. }));
        assert!(running.content_dir().join("partial").exists());
        assert!(store.finalize(running).is_ok());
    }

    #[test]
    fn kinds_do_not_collide() {
        let (_dir, store) = store();
        let artifact = store.begin(ArtifactKind::Deps, "same", "dependencies").unwrap();
        store.finalize(artifact).unwrap();
        assert_eq!(store.state(ArtifactKind::Package, "same").unwrap(), CacheState::Miss);
    }

    #[test]
    fn gc_removes_only_old_artifacts() {
        let (_dir, store) = store();
        let old = store.begin(ArtifactKind::Deps, "old", "dependencies").unwrap();
        let mut old = store.finalize(old).unwrap();
        old.record.created_at = Utc::now() - chrono::Duration::days(45);
        write_record(&old).unwrap();
        let fresh = store.begin(ArtifactKind::Package, "new", "mjl@0.1.0").unwrap();
        store.finalize(fresh).unwrap();

        let report = store.gc(30).unwrap();

        assert_eq!(report.removed.len(), 1);
        assert_eq!(report.removed[0].key, "old");
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn corrupt_record_is_skipped_in_listing() {
        let (_dir, store) = store();
        let artifact = store.begin(ArtifactKind::Deps, "good", "dependencies").unwrap();
        store.finalize(artifact).unwrap();
        let bad = store.root().join("deps/bad");
        fs::create_dir_all(&bad).unwrap();
        fs::write(bad.join(RECORD_FILE), "not json").unwrap();

        assert_eq!(store.list().unwrap().len(), 1);
        assert!(matches!(
            store.lookup(ArtifactKind::Deps, "bad"),
            Err(KilnError::ArtifactCorrupt { .. })
        ));
    }

    #[test]
    fn clear_removes_everything() {
        let (_dir, store) = store();
        for key in ["a", "b"] {
            let artifact = store.begin(ArtifactKind::Package, key, "x@0.1.0").unwrap();
            store.finalize(artifact).unwrap();
        }
        let scratch = store.scratch("build").unwrap();
        assert!(scratch.path().is_dir());

        assert_eq!(store.clear().unwrap(), 2);
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn scratch_dir_is_removed_on_drop() {
        let (_dir, store) = store();
        let path = {
            let scratch = store.scratch("deps").unwrap();
            fs::write(scratch.path().join("f"), "x").unwrap();
            scratch.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn copy_dir_preserves_tree() {
        let src = TempDir::new().unwrap();
        fs::create_dir_all(src.path().join("release/deps")).unwrap();
        fs::write(src.path().join("release/deps/libx.rlib"), "x").unwrap();
        fs::write(src.path().join(".rustc_info.json"), "{}").unwrap();
        let dest = TempDir::new().unwrap();

        let copied = copy_dir(src.path(), &dest.path().join("target")).unwrap();

        assert_eq!(copied, 2);
        assert!(dest.path().join("target/release/deps/libx.rlib").is_file());
    }
}
