//! Persistent cache system for build artifacts
//!
//! Provides content-addressed caching keyed by input fingerprints.
//! Artifacts are immutable once finalized.
//!
//! # Cache States
//!
//! | State | Description |
//! |-------|-------------|
//! | Miss | No artifact exists, will be built |
//! | Building | In progress or crashed, rebuilt on next request |
//! | Complete | Finalized, immutable, reused |

pub mod config;
pub mod deps;
pub mod fingerprint;
pub mod store;

pub use config::{detect_toolchain, CommonBuildConfig, ConfigKey};
pub use deps::{DependencyCache, DepsArtifact, OutputSink};
pub use fingerprint::{hash_file, Fingerprint};
pub use store::{format_bytes, Artifact, ArtifactKind, ArtifactRecord, ArtifactStore, CacheState};
