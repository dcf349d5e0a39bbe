//! The fixed menu of workspace checks

use crate::error::KilnError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A workspace-wide validation task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckKind {
    /// Lints with warnings denied
    Clippy,
    /// Documentation build with warnings denied
    Doc,
    /// Source formatting
    Fmt,
    /// Manifest formatting
    TomlFmt,
    /// Security advisory audit
    Audit,
    /// Dependency policy audit
    Deny,
    /// Test execution
    Nextest,
    /// Shared-dependency consistency
    Hakari,
}

/// A tool a check needs, with the command that proves it is installed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolSpec {
    pub name: &'static str,
    /// Probe command; a leading `cargo` is replaced by the configured cargo
    pub probe: &'static [&'static str],
}

const CARGO_CLIPPY: ToolSpec = ToolSpec {
    name: "cargo-clippy",
    probe: &["cargo", "clippy", "--version"],
};
const RUSTDOC: ToolSpec = ToolSpec {
    name: "rustdoc",
    probe: &["rustdoc", "--version"],
};
const RUSTFMT: ToolSpec = ToolSpec {
    name: "rustfmt",
    probe: &["cargo", "fmt", "--version"],
};
const TAPLO: ToolSpec = ToolSpec {
    name: "taplo",
    probe: &["taplo", "--version"],
};
const CARGO_AUDIT: ToolSpec = ToolSpec {
    name: "cargo-audit",
    probe: &["cargo", "audit", "--version"],
};
const CARGO_DENY: ToolSpec = ToolSpec {
    name: "cargo-deny",
    probe: &["cargo", "deny", "--version"],
};
const CARGO_NEXTEST: ToolSpec = ToolSpec {
    name: "cargo-nextest",
    probe: &["cargo", "nextest", "--version"],
};
/// Only needed to regenerate or cross-check the shared dependency package
pub const CARGO_HAKARI: ToolSpec = ToolSpec {
    name: "cargo-hakari",
    probe: &["cargo", "hakari", "--version"],
};

impl CheckKind {
    /// Every check, in reporting order
    pub const ALL: [CheckKind; 8] = [
        Self::Clippy,
        Self::Doc,
        Self::Fmt,
        Self::TomlFmt,
        Self::Audit,
        Self::Deny,
        Self::Nextest,
        Self::Hakari,
    ];

    /// Name used on the command line and in configuration
    pub fn name(&self) -> &'static str {
        match self {
            Self::Clippy => "clippy",
            Self::Doc => "doc",
            Self::Fmt => "fmt",
            Self::TomlFmt => "toml-fmt",
            Self::Audit => "audit",
            Self::Deny => "deny",
            Self::Nextest => "nextest",
            Self::Hakari => "hakari",
        }
    }

    /// One-line description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Clippy => "Lint all targets with warnings denied",
            Self::Doc => "Build documentation with warnings denied",
            Self::Fmt => "Check source formatting",
            Self::TomlFmt => "Check manifest formatting",
            Self::Audit => "Audit dependencies against the advisory database",
            Self::Deny => "Enforce license, source and duplication policy",
            Self::Nextest => "Run every test, optionally partitioned",
            Self::Hakari => "Verify the shared dependency package is up to date",
        }
    }

    /// Whether the check compiles and so consumes the dependency artifact
    pub fn uses_deps_cache(&self) -> bool {
        matches!(self, Self::Clippy | Self::Doc | Self::Nextest)
    }

    /// External tools the check runs
    pub fn tools(&self) -> &'static [ToolSpec] {
        match self {
            Self::Clippy => &[CARGO_CLIPPY],
            Self::Doc => &[RUSTDOC],
            Self::Fmt => &[RUSTFMT],
            Self::TomlFmt => &[TAPLO],
            Self::Audit => &[CARGO_AUDIT],
            Self::Deny => &[CARGO_DENY],
            Self::Nextest => &[CARGO_NEXTEST],
            Self::Hakari => &[],
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CheckKind {
    type Err = KilnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| KilnError::UnknownCheck(s.to_string()))
    }
}
