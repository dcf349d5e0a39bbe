//! Content fingerprints for cache keys
//!
//! Same inputs = same key. File sets are hashed by relative path and
//! contents in sorted order, so the key does not depend on traversal order.

use crate::error::{KilnError, KilnResult};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

/// Number of hex characters kept in a short key
pub const SHORT_KEY_LEN: usize = 12;

/// Incremental SHA256 fingerprint builder
#[derive(Clone, Default)]
pub struct Fingerprint {
    hasher: Sha256,
}

impl Fingerprint {
    /// Start a fingerprint in a named domain so different key kinds never collide
    pub fn new(domain: &str) -> Self {
        let mut fp = Self::default();
        fp.field("domain", domain);
        fp
    }

    /// Add a labelled string value
    pub fn field(&mut self, label: &str, value: &str) -> &mut Self {
        self.write(label.as_bytes());
        self.write(value.as_bytes());
        self
    }

    /// Add a file's relative path and contents
    pub fn file(&mut self, root: &Path, rel: &Path) -> KilnResult<&mut Self> {
        let path = root.join(rel);
        let contents = fs::read(&path)
            .map_err(|e| KilnError::io(format!("reading {}", path.display()), e))?;
        self.write(rel.to_string_lossy().as_bytes());
        self.write(&contents);
        Ok(self)
    }

    /// Length-prefix every chunk so ("ab","c") and ("a","bc") differ
    fn write(&mut self, bytes: &[u8]) {
        self.hasher.update((bytes.len() as u64).to_le_bytes());
        self.hasher.update(bytes);
    }

    /// Full hex digest
    pub fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }

    /// First `SHORT_KEY_LEN` hex characters of the digest
    pub fn finish_short(self) -> String {
        let mut full = self.finish();
        full.truncate(SHORT_KEY_LEN);
        full
    }
}

/// Hash a single file's contents, returning the short key
pub fn hash_file(path: &Path) -> KilnResult<String> {
    let contents =
        fs::read(path).map_err(|e| KilnError::io(format!("reading {}", path.display()), e))?;
    let mut hasher = Sha256::new();
    hasher.update(&contents);
    let mut hash = hex::encode(hasher.finalize());
    hash.truncate(SHORT_KEY_LEN);
    Ok(hash)
}
