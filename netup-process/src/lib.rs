//! External-process execution for post-processing steps.
//!
//! Both standard streams are drained concurrently while the process runs; a
//! pipe that fills unread deadlocks the child, so the drains are not
//! optional. Cancellation is observed while awaiting exit, kills the
//! process tree best-effort, and is surfaced as its own error variant so
//! callers can re-throw it.

use camino::Utf8PathBuf;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// What to spawn and where.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<Utf8PathBuf>,
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env: Vec::new(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// Captured result of a finished process.
///
/// The runner never interprets exit codes beyond zero/non-zero; a failing
/// command is a *result*, and the calling step decides what severity it
/// maps to.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("process '{program}' cancelled")]
    Cancelled { program: String },
}

/// Spawn `spec` and wait for it, draining both streams continuously.
pub async fn run(
    spec: &CommandSpec,
    cancel: &CancellationToken,
) -> Result<ProcessOutput, ProcessError> {
    debug!(program = %spec.program, args = ?spec.args, "spawning process");

    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &spec.working_dir {
        command.current_dir(dir);
    }
    for (key, value) in &spec.env {
        command.env(key, value);
    }

    let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
        program: spec.program.clone(),
        source,
    })?;

    // Independent drains; started before the wait so neither pipe can fill.
    let mut stdout_pipe = child.stdout.take().expect("stdout was piped");
    let mut stderr_pipe = child.stderr.take().expect("stderr was piped");
    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = stdout_pipe.read_to_end(&mut buf).await;
        buf
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = stderr_pipe.read_to_end(&mut buf).await;
        buf
    });

    let status = tokio::select! {
        status = child.wait() => status,
        _ = cancel.cancelled() => {
            // Best-effort termination of the process tree; any error here
            // is swallowed and the cancellation re-thrown.
            if let Err(err) = child.start_kill() {
                warn!(program = %spec.program, "kill after cancellation failed: {err}");
            }
            let _ = child.wait().await;
            stdout_task.abort();
            stderr_task.abort();
            return Err(ProcessError::Cancelled {
                program: spec.program.clone(),
            });
        }
    };

    // Join both drains before building the result.
    let stdout = stdout_task.await.unwrap_or_default();
    let stderr = stderr_task.await.unwrap_or_default();

    let exit_code = match status {
        Ok(s) => s.code().unwrap_or(-1),
        Err(err) => {
            warn!(program = %spec.program, "waiting for process failed: {err}");
            -1
        }
    };

    debug!(program = %spec.program, exit_code, "process finished");
    Ok(ProcessOutput {
        exit_code,
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn captures_both_streams_and_exit_code() {
        let spec = CommandSpec::new("sh").args(["-c", "echo out; echo err >&2; exit 3"]);
        let output = run(&spec, &CancellationToken::new()).await.expect("run");

        assert_eq!(output.exit_code, 3);
        assert!(!output.success());
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[tokio::test]
    async fn zero_exit_is_success() {
        let spec = CommandSpec::new("sh").args(["-c", "true"]);
        let output = run(&spec, &CancellationToken::new()).await.expect("run");
        assert!(output.success());
    }

    #[tokio::test]
    async fn large_output_on_both_streams_does_not_deadlock() {
        // Far past any pipe buffer; hangs here mean a stream is not being
        // drained while the process runs.
        let script = "i=0; while [ $i -lt 20000 ]; do \
                      echo 0123456789012345678901234567890123456789; \
                      echo 0123456789012345678901234567890123456789 >&2; \
                      i=$((i+1)); done";
        let spec = CommandSpec::new("sh").args(["-c", script]);
        let output = run(&spec, &CancellationToken::new()).await.expect("run");

        assert!(output.success());
        assert_eq!(output.stdout.lines().count(), 20000);
        assert_eq!(output.stderr.lines().count(), 20000);
    }

    #[tokio::test]
    async fn cancellation_kills_and_rethrows() {
        let spec = CommandSpec::new("sh").args(["-c", "sleep 30"]);
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let started = std::time::Instant::now();
        let err = run(&spec, &cancel).await.expect_err("should cancel");
        assert!(matches!(err, ProcessError::Cancelled { .. }));
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let spec = CommandSpec::new("definitely-not-a-real-program-xyz");
        let err = run(&spec, &CancellationToken::new())
            .await
            .expect_err("should fail to spawn");
        assert!(matches!(err, ProcessError::Spawn { .. }));
    }

    #[tokio::test]
    async fn working_dir_and_env_are_applied() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let spec = CommandSpec::new("sh")
            .args(["-c", "pwd; printf '%s' \"$NETUP_TEST_VAR\" >&2"])
            .current_dir(dir.path().to_str().expect("utf8"))
            .env("NETUP_TEST_VAR", "hello");
        let output = run(&spec, &CancellationToken::new()).await.expect("run");

        assert!(output.success());
        assert_eq!(output.stderr, "hello");
    }
}
