//! Error types for kiln
//!
//! All modules use `KilnResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for kiln operations
pub type KilnResult<T> = Result<T, KilnError>;

/// All errors that can occur in kiln
#[derive(Error, Debug)]
pub enum KilnError {
    // Workspace errors
    #[error("No Cargo workspace found at or above {0}")]
    WorkspaceNotFound(PathBuf),

    #[error("Workspace lockfile missing: {0}")]
    LockfileMissing(PathBuf),

    #[error("Invalid manifest {path}: {reason}")]
    ManifestInvalid { path: PathBuf, reason: String },

    #[error("Package not found in workspace: {0}")]
    PackageNotFound(String),

    #[error("Duplicate package name in workspace: {0}")]
    DuplicatePackage(String),

    #[error("Intra-workspace dependency cycle: {0}")]
    DependencyCycle(String),

    #[error("Shared dependency package '{0}' is not a workspace member")]
    HackPackageMissing(String),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown check: {0}")]
    UnknownCheck(String),

    #[error("Invalid test partition: {0}")]
    InvalidPartition(String),

    // Cache errors
    #[error("Dependency build failed for configuration {key}:\n{output}")]
    DependencyBuild { key: String, output: String },

    #[error("Artifact record corrupt at {path}: {reason}")]
    ArtifactCorrupt { path: PathBuf, reason: String },

    #[error("{kind} artifact {key} is being built by another kiln process")]
    ArtifactBusy { kind: String, key: String },

    // Build errors
    #[error("Build of package {package} failed:\n{output}")]
    BuildFailed { package: String, output: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("TOML edit error: {0}")]
    TomlEdit(#[from] toml_edit::TomlError),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl KilnError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a manifest error for the given file
    pub fn manifest(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ManifestInvalid {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::WorkspaceNotFound(_) => {
                Some("Run kiln from inside a Cargo workspace, or pass --root")
            }
            Self::LockfileMissing(_) => Some("Run: cargo generate-lockfile"),
            Self::HackPackageMissing(_) => {
                Some("Run: cargo hakari init, or set workspace.hack_package in kiln.toml")
            }
            Self::DependencyBuild { .. } => {
                Some("Every build and check sharing this configuration fails until it is fixed")
            }
            Self::UnknownCheck(_) => Some("Run: kiln env to list available checks"),
            Self::ArtifactBusy { .. } => Some(
                "Retry when the other run finishes; builds abandoned for 2 hours are reclaimed, or run: kiln cache clear",
            ),
            _ => None,
        }
    }
}
