//! Process execution seam
//!
//! Every external tool (cargo, its subcommands, taplo, the user's shell) is
//! reached through one operation: run this program with these arguments and
//! environment in this directory, report exit status plus output.

use crate::error::KilnResult;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A single program invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Program name or path
    pub program: String,
    /// Arguments
    pub args: Vec<String>,
    /// Extra environment variables
    pub env: BTreeMap<String, String>,
    /// Working directory
    pub cwd: PathBuf,
}

impl Invocation {
    /// Create an invocation of `program` in `cwd`
    pub fn new(program: impl Into<String>, cwd: impl AsRef<Path>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            cwd: cwd.as_ref().to_path_buf(),
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set one environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set several environment variables
    pub fn envs<'a, I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Whether the arguments contain `needle`
    pub fn has_arg(&self, needle: &str) -> bool {
        self.args.iter().any(|a| a == needle)
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(' ') {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Result of running an invocation to completion
#[derive(Debug, Clone, Default)]
pub struct StepOutput {
    /// Exit code (None when killed by a signal)
    pub code: Option<i32>,
    /// Combined stdout and stderr lines in arrival order
    pub lines: Vec<String>,
    /// Wall-clock duration
    pub duration: Duration,
}

impl StepOutput {
    /// Whether the process exited with status zero
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// The diagnostic tail of the output
    pub fn tail(&self) -> String {
        super::build_error_output(&self.lines.join("\n"), "")
    }
}

/// Abstract process runner
///
/// `ProcessRunner` spawns real processes; tests substitute a runner that
/// records invocations and answers from a script.
#[async_trait]
pub trait StepRunner: Send + Sync {
    /// Run to completion, streaming each output line to `on_output`
    async fn run(
        &self,
        invocation: &Invocation,
        on_output: &(dyn Fn(String) + Send + Sync),
    ) -> KilnResult<StepOutput>;

    /// Run with the terminal attached, returning the exit code
    async fn run_interactive(&self, invocation: &Invocation) -> KilnResult<i32>;

    /// Whether the invocation can be started and exits successfully
    async fn is_available(&self, invocation: &Invocation) -> bool;

    /// Human-readable runner name for display
    fn runner_name(&self) -> &'static str;
}
