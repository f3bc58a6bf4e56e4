// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timed execution of composed shell commands.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Return code reported when a command exceeds its timeout.
pub const TIMEOUT_RETURN_CODE: i32 = 124;

/// Default timeout for scheduler submits and listings.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors crossing the process boundary. A non-zero exit status of the
/// child is not an error; only failing to run it at all is.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write log file {path}: {source}")]
    Log {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Execution options.
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    /// Defaults to [`DEFAULT_TIMEOUT`]
    pub timeout: Option<Duration>,
    /// Redirect stdout to this file instead of capturing it
    pub stdout_log: Option<PathBuf>,
    /// Redirect stderr to this file instead of capturing it
    pub stderr_log: Option<PathBuf>,
}

impl ExecOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Default::default()
        }
    }
}

/// Structured result of one command execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub return_code: i32,
    /// Captured stdout lines; empty when redirected to a log file
    pub stdout_lines: Vec<String>,
    /// Captured stderr lines; empty when redirected to a log file
    pub stderr_lines: Vec<String>,
    pub stdout_log: Option<PathBuf>,
    pub stderr_log: Option<PathBuf>,
}

impl ExecResult {
    pub fn is_success(&self) -> bool {
        self.return_code == 0
    }

    pub fn first_stderr_line(&self) -> &str {
        self.stderr_lines.first().map(String::as_str).unwrap_or("")
    }
}

/// Executes composed shell commands. The production implementation shells
/// out; tests script responses through [`FakeExecutor`].
#[async_trait::async_trait]
pub trait ShellExecutor: Send + Sync {
    async fn execute(&self, command: &str, opts: ExecOptions) -> Result<ExecResult, RemoteError>;
}

/// Production executor backed by `sh -c` under tokio.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioExecutor;

#[async_trait::async_trait]
impl ShellExecutor for TokioExecutor {
    async fn execute(&self, command: &str, opts: ExecOptions) -> Result<ExecResult, RemoteError> {
        let timeout = opts.timeout.unwrap_or(DEFAULT_TIMEOUT);
        tracing::debug!(command, timeout_secs = timeout.as_secs(), "executing");

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| RemoteError::Spawn {
            command: command.to_string(),
            source,
        })?;
        // The pipes are drained while we wait so a timed-out command still
        // surfaces whatever the child managed to write.
        let stdout_task = drain(child.stdout.take());
        let stderr_task = drain(child.stderr.take());

        let return_code = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => status.code().unwrap_or(-1),
            Ok(Err(source)) => {
                return Err(RemoteError::Spawn {
                    command: command.to_string(),
                    source,
                })
            }
            Err(_elapsed) => {
                tracing::warn!(command, timeout_secs = timeout.as_secs(), "command timed out");
                let _ = child.kill().await;
                TIMEOUT_RETURN_CODE
            }
        };

        // Killing the child closes its pipes, so both readers finish.
        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();

        let mut result = ExecResult {
            return_code,
            ..Default::default()
        };

        if let Some(path) = &opts.stdout_log {
            tokio::fs::write(path, &stdout)
                .await
                .map_err(|source| RemoteError::Log {
                    path: path.clone(),
                    source,
                })?;
            result.stdout_log = Some(path.clone());
        } else {
            result.stdout_lines = to_lines(&stdout);
        }

        if let Some(path) = &opts.stderr_log {
            tokio::fs::write(path, &stderr)
                .await
                .map_err(|source| RemoteError::Log {
                    path: path.clone(),
                    source,
                })?;
            result.stderr_log = Some(path.clone());
        } else {
            result.stderr_lines = to_lines(&stderr);
        }

        if return_code != 0 {
            tracing::debug!(command, return_code, "command exited non-zero");
        }
        Ok(result)
    }
}

fn drain<R>(pipe: Option<R>) -> tokio::task::JoinHandle<Vec<u8>>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = tokio::io::AsyncReadExt::read_to_end(&mut pipe, &mut buf).await;
        }
        buf
    })
}

fn to_lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::to_string)
        .collect()
}

/// Scripted executor for tests. Responses are matched by substring and
/// consumed in order, so retry sequences can be scripted.
#[cfg(any(test, feature = "test-support"))]
#[derive(Default)]
pub struct FakeExecutor {
    responses: parking_lot::Mutex<Vec<(String, ExecResult)>>,
    calls: parking_lot::Mutex<Vec<String>>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the next command containing `pattern`.
    pub fn respond(&self, pattern: impl Into<String>, result: ExecResult) {
        self.responses.lock().push((pattern.into(), result));
    }

    /// Queue a plain-stdout success response.
    pub fn respond_stdout(&self, pattern: impl Into<String>, lines: &[&str]) {
        self.respond(
            pattern,
            ExecResult {
                return_code: 0,
                stdout_lines: lines.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            },
        );
    }

    /// Commands executed so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait::async_trait]
impl ShellExecutor for FakeExecutor {
    async fn execute(&self, command: &str, _opts: ExecOptions) -> Result<ExecResult, RemoteError> {
        self.calls.lock().push(command.to_string());
        let mut responses = self.responses.lock();
        if let Some(pos) = responses.iter().position(|(p, _)| command.contains(p.as_str())) {
            let (_, result) = responses.remove(pos);
            return Ok(result);
        }
        Ok(ExecResult::default())
    }
}

#[cfg(test)]
#[path = "exec_tests.rs"]
mod tests;
