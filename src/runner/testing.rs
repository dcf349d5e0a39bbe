//! Scripted step runner for unit tests

use crate::error::KilnResult;
use crate::runner::step::{Invocation, StepOutput, StepRunner};
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

type Script = Box<dyn Fn(&Invocation) -> (i32, Vec<String>) + Send + Sync>;

/// Records every invocation and answers from a script
pub(crate) struct FakeRunner {
    calls: Mutex<Vec<Invocation>>,
    script: Script,
}

impl FakeRunner {
    /// Every invocation succeeds with no output
    pub(crate) fn succeeding() -> Self {
        Self::scripted(|_| (0, vec![]))
    }

    /// Answer each invocation with `(exit code, output lines)`
    pub(crate) fn scripted(
        script: impl Fn(&Invocation) -> (i32, Vec<String>) + Send + Sync + 'static,
    ) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            script: Box::new(script),
        }
    }

    /// Invocations seen so far
    pub(crate) fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of invocations whose arguments contain `arg`
    pub(crate) fn count_with_arg(&self, arg: &str) -> usize {
        self.calls().iter().filter(|c| c.has_arg(arg)).count()
    }
}

#[async_trait]
impl StepRunner for FakeRunner {
    async fn run(
        &self,
        invocation: &Invocation,
        on_output: &(dyn Fn(String) + Send + Sync),
    ) -> KilnResult<StepOutput> {
        self.calls.lock().unwrap().push(invocation.clone());
        let (code, lines) = (self.script)(invocation);
        for line in &lines {
            on_output(line.clone());
        }
        Ok(StepOutput {
            code: Some(code),
            lines,
            duration: Duration::from_millis(1),
        })
    }

    async fn run_interactive(&self, invocation: &Invocation) -> KilnResult<i32> {
        self.calls.lock().unwrap().push(invocation.clone());
        Ok((self.script)(invocation).0)
    }

    async fn is_available(&self, invocation: &Invocation) -> bool {
        (self.script)(invocation).0 == 0
    }

    fn runner_name(&self) -> &'static str {
        "fake"
    }
}
