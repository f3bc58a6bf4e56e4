// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task descriptors and their cache wire format.
//!
//! One descriptor exists per logical task `(task_name, study_id)`. It is
//! the cross-process record of a long-running operation and the mutual
//! exclusion token that stops the same task being submitted twice.
//!
//! The serialised value is a `|`-delimited string so any language binding
//! can read and write it:
//! `<job_id>|<state>|<last_update>|<done_time>|<stdout_log>|<stderr_log>`.
//! Readers tolerate missing trailing fields; a malformed value is treated
//! as absent, never as an error.

use serde::{Deserialize, Serialize};

/// Last observed broker state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Initiated,
    Submitted,
    Started,
    Retry,
    Success,
    Failure,
    Revoked,
    Pending,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Initiated => "INITIATED",
            TaskState::Submitted => "SUBMITTED",
            TaskState::Started => "STARTED",
            TaskState::Retry => "RETRY",
            TaskState::Success => "SUCCESS",
            TaskState::Failure => "FAILURE",
            TaskState::Revoked => "REVOKED",
            TaskState::Pending => "PENDING",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INITIATED" => Some(TaskState::Initiated),
            "SUBMITTED" => Some(TaskState::Submitted),
            "STARTED" => Some(TaskState::Started),
            "RETRY" => Some(TaskState::Retry),
            "SUCCESS" => Some(TaskState::Success),
            "FAILURE" => Some(TaskState::Failure),
            "REVOKED" => Some(TaskState::Revoked),
            "PENDING" => Some(TaskState::Pending),
            _ => None,
        }
    }

    /// States in which the task is still making progress.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            TaskState::Initiated
                | TaskState::Submitted
                | TaskState::Started
                | TaskState::Retry
                | TaskState::Pending
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Success | TaskState::Failure | TaskState::Revoked
        )
    }
}

/// Cache key for a task: `<task_name>:<study_id>`.
pub fn task_key(task_name: &str, study_id: &str) -> String {
    format!("{}:{}", task_name, study_id)
}

/// Per-task record stored in the shared cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    /// Broker/scheduler job id (opaque)
    pub job_id: String,
    pub state: TaskState,
    /// Epoch seconds of the last state observation
    pub last_update_epoch: u64,
    /// Epoch seconds of completion (0 while running)
    pub done_time_epoch: u64,
    /// Per-invocation stdout log filename ("" when captured in memory)
    pub stdout_log: String,
    /// Per-invocation stderr log filename ("" when captured in memory)
    pub stderr_log: String,
}

impl TaskDescriptor {
    pub fn new(job_id: impl Into<String>, state: TaskState, now_epoch: u64) -> Self {
        Self {
            job_id: job_id.into(),
            state,
            last_update_epoch: now_epoch,
            done_time_epoch: 0,
            stdout_log: String::new(),
            stderr_log: String::new(),
        }
    }

    /// Serialise to the delimited wire format.
    pub fn to_wire(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}",
            self.job_id,
            self.state.as_str(),
            self.last_update_epoch,
            self.done_time_epoch,
            self.stdout_log,
            self.stderr_log
        )
    }

    /// Parse the delimited wire format.
    ///
    /// Missing trailing fields default; an unparseable state or timestamp
    /// makes the whole value unusable and yields `None`.
    pub fn parse_wire(raw: &str) -> Option<Self> {
        let mut parts = raw.split('|');
        let job_id = parts.next()?.to_string();
        let state = TaskState::parse(parts.next()?)?;
        let last_update_epoch = match parts.next() {
            Some(v) if !v.is_empty() => v.parse().ok()?,
            _ => 0,
        };
        let done_time_epoch = match parts.next() {
            Some(v) if !v.is_empty() => v.parse().ok()?,
            _ => 0,
        };
        let stdout_log = parts.next().unwrap_or("").to_string();
        let stderr_log = parts.next().unwrap_or("").to_string();
        Some(Self {
            job_id,
            state,
            last_update_epoch,
            done_time_epoch,
            stdout_log,
            stderr_log,
        })
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
