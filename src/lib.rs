//! Kiln - incremental builds and checks for Cargo workspaces
//!
//! Compiles a workspace's external dependencies once per build
//! configuration, builds each package from the minimal set of sources it
//! needs on top of that artifact, and runs the workspace check suite
//! concurrently against the same artifact.

pub mod build;
pub mod cache;
pub mod checks;
pub mod cli;
pub mod config;
pub mod env;
pub mod error;
pub mod runlog;
pub mod runner;
pub mod ui;
pub mod workspace;

pub use error::{KilnError, KilnResult};
