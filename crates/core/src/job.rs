// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler job records and submission results.

use serde::{Deserialize, Serialize};

/// Common job state across workload managers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Pend,
    Run,
    Done,
    Unknown,
}

impl JobState {
    /// Map a scheduler-reported state string onto the common set.
    ///
    /// Accepts both LSF (`PEND`/`RUN`/`DONE`) and Slurm
    /// (`PENDING`/`RUNNING`/`COMPLETED`) spellings; anything else is
    /// `Unknown` rather than an error.
    pub fn from_scheduler(raw: &str) -> Self {
        match raw {
            "PEND" | "PENDING" => JobState::Pend,
            "RUN" | "RUNNING" => JobState::Run,
            "DONE" | "COMPLETED" => JobState::Done,
            _ => JobState::Unknown,
        }
    }
}

/// One row of scheduler list output; short-lived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerJob {
    pub job_id: String,
    pub state: JobState,
    pub name: String,
    /// Epoch seconds of submission; 0 when the timestamp did not parse
    pub submit_epoch: u64,
    pub queue: String,
}

/// Result of every scheduler submit/kill.
///
/// `job_ids` is length-1 on a successful submit and plural when a batch
/// of jobs was killed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub return_code: i32,
    pub job_ids: Vec<String>,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

impl SubmissionResult {
    pub fn is_success(&self) -> bool {
        self.return_code == 0 && !self.job_ids.is_empty()
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
