//! External process execution
//!
//! `StepRunner` is the only way kiln reaches cargo and the other tools.
//! `ProcessRunner` is the real implementation.

mod process;
mod step;

#[cfg(test)]
pub(crate) mod testing;

pub use process::ProcessRunner;
pub use step::{Invocation, StepOutput, StepRunner};

use crate::error::{KilnError, KilnResult};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::warn;

/// Max number of output lines to include in failure diagnostics.
const ERROR_TAIL_LINES: usize = 50;

/// Extract the useful tail of tool output for error diagnostics.
///
/// Combines stdout and stderr, then returns the last `ERROR_TAIL_LINES`
/// lines so error messages are actionable without being overwhelming.
pub(crate) fn build_error_output(stdout: &str, stderr: &str) -> String {
    let lines: Vec<&str> = stdout.lines().chain(stderr.lines()).collect();
    let total = lines.len();
    let tail: Vec<&str> = if total > ERROR_TAIL_LINES {
        lines[total - ERROR_TAIL_LINES..].to_vec()
    } else {
        lines
    };
    tail.join("\n")
}

/// Read one line as lossy UTF-8, `None` at end of stream
///
/// Tool output is not guaranteed to be UTF-8 (test names, paths), so bytes
/// are decoded lossily instead of failing the read. `buf` keeps bytes of a
/// line interrupted by `select!` until the next call completes it.
async fn read_lossy_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let read = reader.read_until(b'\n', buf).await?;
    if read == 0 && buf.is_empty() {
        return Ok(None);
    }
    while matches!(buf.last(), Some(b'\n' | b'\r')) {
        buf.pop();
    }
    let line = String::from_utf8_lossy(buf).into_owned();
    buf.clear();
    Ok(Some(line))
}

/// Stream stdout+stderr from a child process, calling `on_output` for each line.
///
/// Both pipes are drained until end of stream so the child never blocks on a
/// full pipe. Returns all collected output lines for error reporting.
pub(crate) async fn stream_child_output(
    child: &mut tokio::process::Child,
    on_output: &(dyn Fn(String) + Send + Sync),
) -> KilnResult<Vec<String>> {
    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        return Err(KilnError::Internal("child output was not piped".to_string()));
    };

    let mut stderr_reader = BufReader::new(stderr);
    let mut stdout_reader = BufReader::new(stdout);
    let mut stderr_buf = Vec::new();
    let mut stdout_buf = Vec::new();

    let mut all_output = Vec::new();
    let mut stderr_done = false;
    let mut stdout_done = false;

    while !stderr_done || !stdout_done {
        tokio::select! {
            line = read_lossy_line(&mut stderr_reader, &mut stderr_buf), if !stderr_done => {
                match line {
                    Ok(Some(line)) => {
                        on_output(line.clone());
                        all_output.push(line);
                    }
                    Ok(None) => stderr_done = true,
                    Err(e) => {
                        warn!("Failed to read child stderr: {}", e);
                        stderr_done = true;
                    }
                }
            }
            line = read_lossy_line(&mut stdout_reader, &mut stdout_buf), if !stdout_done => {
                match line {
                    Ok(Some(line)) => {
                        on_output(line.clone());
                        all_output.push(line);
                    }
                    Ok(None) => stdout_done = true,
                    Err(e) => {
                        warn!("Failed to read child stdout: {}", e);
                        stdout_done = true;
                    }
                }
            }
        }
    }

    Ok(all_output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_output_keeps_short_output() {
        assert_eq!(build_error_output("a\nb", "c"), "a\nb\nc");
    }

    #[test]
    fn error_output_truncates_to_tail() {
        let long: Vec<String> = (0..120).map(|i| format!("line {i}")).collect();
        let tail = build_error_output(&long.join("\n"), "");
        let lines: Vec<&str> = tail.lines().collect();
        assert_eq!(lines.len(), ERROR_TAIL_LINES);
        assert_eq!(lines[0], "line 70");
        assert_eq!(lines[ERROR_TAIL_LINES - 1], "line 119");
    }

    #[tokio::test]
    async fn lossy_lines_survive_invalid_utf8() {
        let input: &[u8] = b"ok\nbad \xff\r\nlast";
        let mut reader = BufReader::new(input);
        let mut buf = Vec::new();

        let mut lines = Vec::new();
        while let Some(line) = read_lossy_line(&mut reader, &mut buf).await.unwrap() {
            lines.push(line);
        }

        assert_eq!(lines, ["ok", "bad \u{FFFD}", "last"]);
    }
}
