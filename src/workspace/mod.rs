//! Cargo workspace model
//!
//! Loads the root manifest and its members, validates the intra-workspace
//! dependency graph and computes the file sets each build needs.

pub mod discover;
pub mod manifest;
pub mod skeleton;
pub mod source_set;

#[cfg(test)]
pub(crate) mod testing;

pub use discover::{normalize, Package, Workspace, LOCKFILE_NAME, MANIFEST_NAME};
pub use manifest::{CargoManifest, DependencyKind, DependencySource, ResolvedDependency};
pub use skeleton::Skeleton;
pub use source_set::{common_source_files, MinimalSourceSet, SourceSetResolver};
