// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The rsync specialisation of the task protocol.
//!
//! Wraps rsync in dry-run (`-aunv`) and committing (`-auv`) modes and
//! interprets its textual summary into a typed [`RsyncResult`]. A missing
//! summary is a parse failure (`valid: false`), never a task failure.

use crate::broker::ExecutionOutcome;
use crate::protocol::{TaskError, TaskRequest, TaskRunner, TaskStatus};
use dm_core::{format_size, Clock};
use dm_remote::{build_rsync, RsyncParams};
use std::time::Duration;

const DRY_RUN_ARGS: &str = "-aunv";
const COMMIT_ARGS: &str = "-auv";
const SUMMARY_TRAILER: &str = "total size is";
const CREATED_DIRECTORY: &str = "created directory";

/// Interpreted outcome of a finished sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Dry run found differences
    SyncNeeded,
    /// Trees already match
    SyncNotNeeded,
    /// rsync exited non-zero
    SyncFailure,
    /// Committing run transferred files
    CompletedSuccess,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::SyncNeeded => "SYNC_NEEDED",
            SyncStatus::SyncNotNeeded => "SYNC_NOT_NEEDED",
            SyncStatus::SyncFailure => "SYNC_FAILURE",
            SyncStatus::CompletedSuccess => "COMPLETED_SUCCESS",
        }
    }
}

/// Parsed rsync summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RsyncResult {
    /// False when the summary trailer could not be located
    pub valid: bool,
    pub return_code: i32,
    pub number_of_files: usize,
    pub total_bytes: u64,
    /// `total_bytes` rendered for humans, e.g. `1.00MiB`
    pub total_size_str: String,
    pub message: String,
}

/// Status plus the parsed result, as delivered to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub status: SyncStatus,
    pub result: RsyncResult,
}

/// One study sync: where from, where to, and how it is tracked.
#[derive(Debug, Clone)]
pub struct SyncSpec {
    pub task_name: String,
    pub study_id: String,
    pub params: RsyncParams,
    pub min_rerun_interval: Duration,
    pub expires: Duration,
    pub stdout_log: Option<String>,
    pub stderr_log: Option<String>,
    /// Cap on file names carried into the message
    pub trimmed_files_count: Option<usize>,
}

/// Runs rsync jobs on the datamover queue through the task protocol.
#[derive(Clone)]
pub struct RsyncTask<C: Clock> {
    runner: TaskRunner<C>,
    queue: String,
}

impl<C: Clock> RsyncTask<C> {
    pub fn new(runner: TaskRunner<C>, queue: impl Into<String>) -> Self {
        Self {
            runner,
            queue: queue.into(),
        }
    }

    /// Start a non-mutating comparison of the two trees.
    pub async fn start_dry_run(&self, spec: &SyncSpec) -> Result<TaskStatus, TaskError> {
        self.start_mode(spec, DRY_RUN_ARGS).await
    }

    /// Start a committing sync.
    pub async fn start(&self, spec: &SyncSpec) -> Result<TaskStatus, TaskError> {
        self.start_mode(spec, COMMIT_ARGS).await
    }

    async fn start_mode(&self, spec: &SyncSpec, mode_args: &str) -> Result<TaskStatus, TaskError> {
        let active = self
            .runner
            .descriptors()
            .load(&spec.task_name, &spec.study_id)
            .await?
            .is_some_and(|d| !d.state.is_terminal());
        if !active {
            self.ensure_directories(spec).await?;
        }
        let mut params = spec.params.clone();
        params.extra_args = mode_args.to_string();
        let command = build_rsync(&params);
        let request = TaskRequest {
            task_name: spec.task_name.clone(),
            study_id: spec.study_id.clone(),
            queue: self.queue.clone(),
            command: Some(vec!["bash".to_string(), "-c".to_string(), command]),
            stdout_log: spec.stdout_log.clone(),
            stderr_log: spec.stderr_log.clone(),
            min_rerun_interval: spec.min_rerun_interval,
            expires: spec.expires,
        };
        self.runner.run_task(&request).await
    }

    /// Poll a previously started sync without resubmitting.
    pub async fn poll(&self, spec: &SyncSpec) -> Result<TaskStatus, TaskError> {
        let request = TaskRequest {
            task_name: spec.task_name.clone(),
            study_id: spec.study_id.clone(),
            queue: self.queue.clone(),
            command: None,
            stdout_log: spec.stdout_log.clone(),
            stderr_log: spec.stderr_log.clone(),
            min_rerun_interval: spec.min_rerun_interval,
            expires: spec.expires,
        };
        self.runner.run_task(&request).await
    }

    /// Source and target directories must exist before rsync runs; both
    /// are created on the datamover side, fire-and-forget. Skipped while
    /// a live descriptor marks the sync as already in flight.
    async fn ensure_directories(&self, spec: &SyncSpec) -> Result<(), TaskError> {
        let argv = vec![
            "mkdir".to_string(),
            "-p".to_string(),
            local_dir(&spec.params.source),
            local_dir(&spec.params.target),
        ];
        self.runner
            .broker()
            .enqueue(&self.queue, "create_folders", &argv, spec.expires)
            .await?;
        Ok(())
    }

    /// Interpret a terminal execution outcome.
    pub fn interpret(&self, spec: &SyncSpec, dry_run: bool, outcome: &ExecutionOutcome) -> SyncOutcome {
        interpret_outcome(dry_run, spec.trimmed_files_count, outcome)
    }
}

/// Strip a `user@host:` endpoint prefix; only local paths get `mkdir -p`.
fn local_dir(endpoint: &str) -> String {
    match endpoint.split_once(':') {
        Some((_, path)) => path.to_string(),
        None => endpoint.to_string(),
    }
}

pub(crate) fn interpret_outcome(
    dry_run: bool,
    trimmed_files_count: Option<usize>,
    outcome: &ExecutionOutcome,
) -> SyncOutcome {
    if outcome.return_code != 0 {
        return SyncOutcome {
            status: SyncStatus::SyncFailure,
            result: RsyncResult {
                valid: true,
                return_code: outcome.return_code,
                message: outcome.first_stderr_line().to_string(),
                ..Default::default()
            },
        };
    }

    let Some(summary) = parse_summary(&outcome.stdout_lines) else {
        return SyncOutcome {
            status: SyncStatus::SyncNotNeeded,
            result: RsyncResult {
                valid: false,
                message: "rsync summary not found in output".to_string(),
                ..Default::default()
            },
        };
    };

    let total = summary.files.len();
    let mut files = summary.files;
    let mut message = String::new();
    if let Some(cap) = trimmed_files_count {
        if total > cap {
            files.truncate(cap);
            message = format!("{total} files transferred, showing first {cap}: ");
        }
    }
    message.push_str(&files.join(", "));

    let status = match (total > 0, dry_run) {
        (true, true) => SyncStatus::SyncNeeded,
        (true, false) => SyncStatus::CompletedSuccess,
        (false, _) => SyncStatus::SyncNotNeeded,
    };
    SyncOutcome {
        status,
        result: RsyncResult {
            valid: true,
            return_code: 0,
            number_of_files: total,
            total_size_str: format_size(summary.total_bytes),
            total_bytes: summary.total_bytes,
            message,
        },
    }
}

struct ParsedSummary {
    files: Vec<String>,
    total_bytes: u64,
}

/// Locate the `total size is N` trailer and the transferred-file window.
///
/// The window is the lines strictly between the header (the file-list
/// banner, shifted by one when rsync announced `created directory …`) and
/// the `sent/received` statistics, blanks dropped.
fn parse_summary(stdout_lines: &[String]) -> Option<ParsedSummary> {
    let trailer_idx = stdout_lines
        .iter()
        .position(|l| l.trim_start().starts_with(SUMMARY_TRAILER))?;
    let trailer = stdout_lines[trailer_idx].trim_start();
    // `total(0) size(1) is(2) N(3) …`, thousands separators stripped
    let total_bytes: u64 = trailer
        .split_whitespace()
        .nth(3)?
        .replace(',', "")
        .parse()
        .ok()?;

    let mut header_idx = 0;
    if stdout_lines
        .first()
        .is_some_and(|l| l.starts_with(CREATED_DIRECTORY))
    {
        header_idx += 1;
    }

    let files = stdout_lines[header_idx + 1..trailer_idx]
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty() && !is_statistics_line(l))
        .map(str::to_string)
        .collect();
    Some(ParsedSummary { files, total_bytes })
}

/// The `sent X bytes  received Y bytes` line preceding the trailer.
fn is_statistics_line(line: &str) -> bool {
    line.starts_with("sent ") && line.contains("bytes")
}

#[cfg(test)]
#[path = "rsync_tests.rs"]
mod tests;
