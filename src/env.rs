//! Development environment composition
//!
//! Collects the tools the enabled checks need so the same environment can be
//! inspected (`kiln env`) or entered (`kiln shell`). Inside the shell,
//! `KILN_CHECKS` carries the enabled check list, which `kiln check` picks up
//! when run without names.

use crate::cache::ConfigKey;
use crate::checks::{self, CheckKind, ToolSpec, CARGO_HAKARI};
use crate::config::Config;
use crate::error::KilnResult;
use crate::runner::{Invocation, StepRunner};
use futures_util::future::join_all;
use serde::Serialize;
use std::path::Path;

/// Root of the workspace the shell was started for
pub const ENV_ROOT: &str = "KILN_ROOT";
/// Comma-separated enabled checks
pub const ENV_CHECKS: &str = "KILN_CHECKS";
/// Common build configuration key
pub const ENV_CONFIG_KEY: &str = "KILN_CONFIG_KEY";
/// Comma-separated platform inputs
pub const ENV_PLATFORM_INPUTS: &str = "KILN_PLATFORM_INPUTS";

/// Why a tool is part of the environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolRole {
    /// Needed by every build
    Toolchain,
    /// Run directly by one or more checks
    Check,
    /// Used around a check, never run by it
    Auxiliary,
    /// Native library listed in `build.platform_inputs` for this platform
    PlatformInput,
    /// Listed in `shell.extra_tools`
    Extra,
}

/// One tool of the environment
#[derive(Debug, Clone, Serialize)]
pub struct ToolRequirement {
    pub name: String,
    pub role: ToolRole,
    /// Checks that need the tool
    pub required_by: Vec<CheckKind>,
    /// Program and arguments proving the tool is installed
    pub probe: Vec<String>,
}

impl ToolRequirement {
    fn from_spec(spec: &ToolSpec, role: ToolRole, cargo: &str) -> Self {
        let probe = spec
            .probe
            .iter()
            .enumerate()
            .map(|(i, part)| {
                if i == 0 && *part == "cargo" {
                    cargo.to_string()
                } else {
                    part.to_string()
                }
            })
            .collect();
        Self {
            name: spec.name.to_string(),
            role,
            required_by: vec![],
            probe,
        }
    }

    fn invocation(&self, cwd: &Path) -> Invocation {
        let (program, args) = match self.probe.split_first() {
            Some((program, args)) => (program.as_str(), args),
            None => (self.name.as_str(), &[][..]),
        };
        Invocation::new(program, cwd).args(args.iter().cloned())
    }
}

/// Availability of one tool
#[derive(Debug, Clone, Serialize)]
pub struct ToolStatus {
    pub name: String,
    pub role: ToolRole,
    pub available: bool,
}

/// Enabled checks and everything needed to run them
#[derive(Debug, Clone, Serialize)]
pub struct DevEnvironment {
    pub checks: Vec<CheckKind>,
    pub tools: Vec<ToolRequirement>,
    pub shell: String,
}

impl DevEnvironment {
    /// Compose the environment for the configured checks
    pub fn compose(config: &Config) -> KilnResult<Self> {
        let checks = checks::select(config, &[])?;
        let cargo = config.build.cargo.as_str();

        let mut tools = vec![
            ToolRequirement {
                name: "cargo".to_string(),
                role: ToolRole::Toolchain,
                required_by: vec![],
                probe: vec![cargo.to_string(), "--version".to_string()],
            },
            ToolRequirement {
                name: "rustc".to_string(),
                role: ToolRole::Toolchain,
                required_by: vec![],
                probe: vec!["rustc".to_string(), "--version".to_string()],
            },
        ];

        for kind in &checks {
            for spec in kind.tools() {
                match tools.iter_mut().find(|t| t.name == spec.name) {
                    Some(existing) => existing.required_by.push(*kind),
                    None => {
                        let mut tool = ToolRequirement::from_spec(spec, ToolRole::Check, cargo);
                        tool.required_by.push(*kind);
                        tools.push(tool);
                    }
                }
            }
        }

        if checks.contains(&CheckKind::Hakari) {
            let mut tool = ToolRequirement::from_spec(&CARGO_HAKARI, ToolRole::Auxiliary, cargo);
            tool.required_by.push(CheckKind::Hakari);
            tools.push(tool);
        }

        for input in config.build.current_platform_inputs() {
            tools.push(ToolRequirement {
                probe: vec!["pkg-config".to_string(), "--exists".to_string(), input.clone()],
                name: input,
                role: ToolRole::PlatformInput,
                required_by: vec![],
            });
        }

        for extra in &config.shell.extra_tools {
            if tools.iter().any(|t| &t.name == extra) {
                continue;
            }
            tools.push(ToolRequirement {
                name: extra.clone(),
                role: ToolRole::Extra,
                required_by: vec![],
                probe: vec![extra.clone(), "--version".to_string()],
            });
        }

        Ok(Self {
            checks,
            tools,
            shell: config.shell.shell.clone(),
        })
    }

    /// Probe every tool concurrently
    pub async fn probe(&self, runner: &dyn StepRunner, cwd: &Path) -> Vec<ToolStatus> {
        let probes = self.tools.iter().map(|tool| async move {
            ToolStatus {
                name: tool.name.clone(),
                role: tool.role.clone(),
                available: runner.is_available(&tool.invocation(cwd)).await,
            }
        });
        join_all(probes).await
    }

    /// Comma-separated enabled check names
    pub fn check_list(&self) -> String {
        self.checks
            .iter()
            .map(CheckKind::name)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Interactive shell exporting the environment
    pub fn shell_invocation(&self, root: &Path, key: &ConfigKey) -> Invocation {
        Invocation::new(&self.shell, root)
            .env(ENV_ROOT, root.to_string_lossy())
            .env(ENV_CHECKS, self.check_list())
            .env(ENV_CONFIG_KEY, key.as_str())
            .env(ENV_PLATFORM_INPUTS, self.platform_inputs().join(","))
    }

    /// Names of the platform inputs
    pub fn platform_inputs(&self) -> Vec<&str> {
        self.tools
            .iter()
            .filter(|t| t.role == ToolRole::PlatformInput)
            .map(|t| t.name.as_str())
            .collect()
    }
}
