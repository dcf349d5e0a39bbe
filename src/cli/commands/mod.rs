//! CLI command implementations

pub mod build;
pub mod cache;
pub mod check;
pub mod completions;
pub mod config;
pub mod deps;
pub mod env;
pub mod hakari;
pub mod plan;
pub mod shell;

pub use build::execute as build;
pub use cache::execute as cache;
pub use check::execute as check;
pub use completions::execute as completions;
pub use config::execute as config;
pub use deps::execute as deps;
pub use env::execute as env;
pub use hakari::execute as hakari;
pub use plan::execute as plan;
pub use shell::execute as shell;
