//! Step runner backed by real child processes

use crate::error::{KilnError, KilnResult};
use crate::runner::step::{Invocation, StepOutput, StepRunner};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::debug;

/// Runs invocations as tokio child processes
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Create a new process runner
    pub fn new() -> Self {
        Self
    }

    fn command(invocation: &Invocation) -> Command {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .envs(&invocation.env)
            .current_dir(&invocation.cwd);
        cmd
    }
}

#[async_trait]
impl StepRunner for ProcessRunner {
    async fn run(
        &self,
        invocation: &Invocation,
        on_output: &(dyn Fn(String) + Send + Sync),
    ) -> KilnResult<StepOutput> {
        debug!("Executing: {}", invocation);
        let started = Instant::now();

        let mut child = Self::command(invocation)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| KilnError::command_failed(invocation.to_string(), e))?;

        let lines = super::stream_child_output(&mut child, on_output).await?;

        let status = child
            .wait()
            .await
            .map_err(|e| KilnError::command_failed(invocation.to_string(), e))?;

        debug!(
            "{} exited with {:?} after {:.1?}",
            invocation.program,
            status.code(),
            started.elapsed()
        );
        Ok(StepOutput {
            code: status.code(),
            lines,
            duration: started.elapsed(),
        })
    }

    async fn run_interactive(&self, invocation: &Invocation) -> KilnResult<i32> {
        debug!("Executing interactively: {}", invocation);

        let status = Self::command(invocation)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| KilnError::command_failed(invocation.to_string(), e))?;

        Ok(status.code().unwrap_or(-1))
    }

    async fn is_available(&self, invocation: &Invocation) -> bool {
        Self::command(invocation)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn runner_name(&self) -> &'static str {
        "process"
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[tokio::test]
    async fn run_collects_both_streams() {
        let dir = tempfile::TempDir::new().unwrap();
        let inv = Invocation::new("sh", dir.path())
            .arg("-c")
            .arg("echo out; echo err 1>&2; exit 3");
        let seen = Mutex::new(Vec::new());

        let output = ProcessRunner::new()
            .run(&inv, &|line: String| seen.lock().unwrap().push(line))
            .await
            .unwrap();

        assert_eq!(output.code, Some(3));
        assert!(!output.success());
        assert!(output.lines.contains(&"out".to_string()));
        assert!(output.lines.contains(&"err".to_string()));
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn run_passes_env_and_cwd() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("marker"), "").unwrap();
        let inv = Invocation::new("sh", dir.path())
            .arg("-c")
            .arg("ls; echo $KILN_TEST_VAR")
            .env("KILN_TEST_VAR", "hello");

        let output = ProcessRunner::new().run(&inv, &|_: String| {}).await.unwrap();

        assert!(output.success());
        assert!(output.lines.contains(&"marker".to_string()));
        assert!(output.lines.contains(&"hello".to_string()));
    }

    #[tokio::test]
    async fn invalid_utf8_output_does_not_stall_the_child() {
        let dir = tempfile::TempDir::new().unwrap();
        let inv = Invocation::new("sh", dir.path()).arg("-c").arg(
            "printf 'bad \\377\\n'; head -c 1000000 /dev/zero | tr '\\0' a; echo; exit 7",
        );

        let output = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            ProcessRunner::new().run(&inv, &|_: String| {}),
        )
        .await
        .expect("child output was not drained")
        .unwrap();

        assert_eq!(output.code, Some(7));
        assert_eq!(output.lines[0], "bad \u{FFFD}");
        assert_eq!(output.lines[1].len(), 1_000_000);
    }

    #[tokio::test]
    async fn missing_program_is_command_failed() {
        let inv = Invocation::new("kiln-definitely-not-a-program", ".");
        let err = ProcessRunner::new().run(&inv, &|_: String| {}).await.unwrap_err();
        assert!(matches!(err, KilnError::CommandFailed { .. }));
        assert!(!ProcessRunner::new().is_available(&inv).await);
    }
}
