//! On-disk workspace fixtures for unit tests

use std::path::Path;
use tempfile::TempDir;

/// A temporary Cargo workspace
pub(crate) struct WorkspaceFixture {
    dir: TempDir,
}

impl WorkspaceFixture {
    /// Empty fixture directory
    pub(crate) fn empty() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    /// `mjl` (lexer), `mjp` (parser, depends on `mjl`) and `workspace-hack`
    pub(crate) fn two_packages() -> Self {
        let fixture = Self::empty();
        fixture.write(
            "Cargo.toml",
            r#"[workspace]
resolver = "2"
members = ["crates/*"]

[workspace.dependencies]
regex = { version = "1", features = ["unicode"] }
"#,
        );
        fixture.write("Cargo.lock", "version = 3\n");
        fixture.write("README.md", "# json\n");

        fixture.write(
            "crates/mjl/Cargo.toml",
            r#"[package]
name = "mjl"
version = "0.1.0"
edition = "2021"

[dependencies]
lazy_static = "1.4"
regex = { workspace = true }
workspace-hack = { version = "0.1", path = "../workspace-hack" }
"#,
        );
        fixture.write("crates/mjl/src/lib.rs", "pub mod token;\n");
        fixture.write("crates/mjl/src/token.rs", "pub enum Token {}\n");
        fixture.write("crates/mjl/tests/lexer.rs", "#[test]\nfn lexes() {}\n");
        fixture.write("crates/mjl/tests/fixtures/sample.json", "{}\n");
        fixture.write("crates/mjl/README.md", "lexer\n");

        fixture.write(
            "crates/mjp/Cargo.toml",
            r#"[package]
name = "mjp"
version = "0.2.0"
edition = "2021"

[dependencies]
mjl = { path = "../mjl" }
regex = { workspace = true }
workspace-hack = { version = "0.1", path = "../workspace-hack" }
"#,
        );
        fixture.write("crates/mjp/src/lib.rs", "pub fn parse() {}\n");
        fixture.write("crates/mjp/src/bin/mjp.rs", "fn main() {}\n");

        fixture.write(
            "crates/workspace-hack/Cargo.toml",
            r#"[package]
name = "workspace-hack"
version = "0.1.0"
edition = "2021"

[dependencies]
lazy_static = { version = "1.4" }
regex = { version = "1", features = ["unicode"] }
"#,
        );
        fixture.write("crates/workspace-hack/src/lib.rs", "");
        fixture.write("crates/workspace-hack/build.rs", "fn main() {}\n");
        fixture
    }

    /// Fixture root
    pub(crate) fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a file relative to the root, creating parent directories
    pub(crate) fn write(&self, rel: &str, content: &str) {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }
}
