//! Bounded execution of external commands.
//!
//! # Design Decisions
//! - Every external call has a deadline; the child is killed when it expires
//! - A non-zero exit is an error carrying stderr, never a silent `false`

use std::ffi::OsStr;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;

/// Errors raised while running an external command.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {secs}s")]
    Timeout { program: String, secs: u64 },

    #[error("{program} exited with {code:?}: {stderr}")]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// Captured output of a successful command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Run `program` with `args`, failing on timeout or non-zero exit.
pub async fn run<I, S>(program: &str, args: I, timeout: Duration) -> Result<CommandOutput, ProcessError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    run_accepting(program, args, timeout, &[0]).await
}

/// Like [`run`], treating every exit code in `ok_codes` as success.
pub async fn run_accepting<I, S>(
    program: &str,
    args: I,
    timeout: Duration,
    ok_codes: &[i32],
) -> Result<CommandOutput, ProcessError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    tracing::debug!(command = ?cmd, "Running external command");

    let output = match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(source)) => {
            return Err(ProcessError::Spawn {
                program: program.to_string(),
                source,
            })
        }
        Err(_) => {
            return Err(ProcessError::Timeout {
                program: program.to_string(),
                secs: timeout.as_secs(),
            })
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    match output.status.code() {
        Some(code) if ok_codes.contains(&code) => Ok(CommandOutput { stdout, stderr }),
        code => Err(ProcessError::Failed {
            program: program.to_string(),
            code,
            stderr: if stderr.is_empty() { stdout } else { stderr },
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn non_zero_exit_is_an_error() {
        let err = run("sh", ["-c", "echo boom >&2; exit 3"], Duration::from_secs(5))
            .await
            .unwrap_err();
        match err {
            ProcessError::Failed { code, stderr, .. } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn accepted_codes_succeed() {
        let out = run_accepting("sh", ["-c", "echo ok; exit 1"], Duration::from_secs(5), &[0, 1])
            .await
            .unwrap();
        assert_eq!(out.stdout, "ok");
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let err = run("sleep", ["5"], Duration::from_millis(100)).await.unwrap_err();
        assert!(matches!(err, ProcessError::Timeout { .. }));
    }

    #[tokio::test]
    async fn missing_program_fails_to_spawn() {
        let err = run("/nonexistent/tool", ["x"], Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
    }
}
