// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dm-cluster: batch scheduler adapters.
//!
//! One interface, two workload managers. Each prepends its own directive
//! preamble onto the user script, submits through the remote shell, and
//! parses job listings back into common [`SchedulerJob`] records.

pub mod lsf;
pub mod script;
pub mod slurm;

use dm_core::{SchedulerJob, SubmissionResult, WorkloadManagerKind};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

pub use lsf::LsfManager;
pub use slurm::SlurmManager;

/// Errors from scheduler interaction.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error(transparent)]
    Remote(#[from] dm_remote::RemoteError),
    #[error("failed to write submission script {path}: {source}")]
    Script {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse submission output: {stdout}")]
    SubmitParse { stdout: String },
    #[error("could not parse kill acknowledgement: {stdout}")]
    KillParse { stdout: String },
}

/// Parameters of one job submission.
#[derive(Debug, Clone)]
pub struct SubmitOptions {
    pub job_name: String,
    pub queue: String,
    pub runtime_limit_secs: u64,
    pub cpus: u32,
    pub memory_mb: u32,
    pub out_log: Option<String>,
    pub err_log: Option<String>,
    pub account: Option<String>,
}

impl SubmitOptions {
    pub fn new(job_name: impl Into<String>, queue: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            queue: queue.into(),
            runtime_limit_secs: 3600,
            cpus: 1,
            memory_mb: 2048,
            out_log: None,
            err_log: None,
            account: None,
        }
    }
}

/// Uniform scheduler interface.
#[async_trait::async_trait]
pub trait WorkloadManager: Send + Sync {
    /// Submit a user script. The script's shebang, if any, is replaced by
    /// the scheduler preamble.
    async fn submit(
        &self,
        script_body: &str,
        opts: &SubmitOptions,
    ) -> Result<SubmissionResult, ClusterError>;

    /// Kill a batch of jobs. With `failing_gracefully`, acknowledgement
    /// parse failures are suppressed.
    async fn kill(
        &self,
        job_ids: &[String],
        failing_gracefully: bool,
    ) -> Result<SubmissionResult, ClusterError>;

    /// List jobs belonging to the configured project prefix, optionally
    /// narrowed to names starting with `name_filter`.
    async fn list(&self, name_filter: Option<&str>) -> Result<Vec<SchedulerJob>, ClusterError>;

    /// Scheduler-specific runtime limit string.
    fn runtime_limit(&self, secs: u64) -> String;

    /// Environment variable carrying the job name inside a running job.
    fn job_name_env_var(&self) -> &'static str;
}

pub(crate) fn ssh_prefix(settings: &dm_core::ClusterSettings) -> String {
    dm_remote::build_ssh(&dm_remote::SshParams {
        host: settings.host.clone(),
        user: Some(settings.user.clone()),
        identity_file: settings
            .identity_file
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned()),
        tunnel_host: settings.tunnel_host.clone(),
        tunnel_user: settings.tunnel_user.clone(),
    })
}

/// Construct the manager configured for the cluster.
pub fn manager_for(
    kind: WorkloadManagerKind,
    executor: Arc<dyn dm_remote::ShellExecutor>,
    settings: dm_core::ClusterSettings,
) -> Arc<dyn WorkloadManager> {
    match kind {
        WorkloadManagerKind::Lsf => Arc::new(LsfManager::new(executor, settings)),
        WorkloadManagerKind::Slurm => Arc::new(SlurmManager::new(executor, settings)),
    }
}

/// Scripted manager for tests that drive scheduler interactions without
/// composing command lines.
#[cfg(any(test, feature = "test-support"))]
#[derive(Default)]
pub struct FakeManager {
    jobs: parking_lot::Mutex<Vec<SchedulerJob>>,
    submits: parking_lot::Mutex<Vec<(String, SubmitOptions)>>,
    kills: parking_lot::Mutex<Vec<Vec<String>>>,
    next_job_id: parking_lot::Mutex<u64>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the job listing returned by [`WorkloadManager::list`].
    pub fn set_jobs(&self, jobs: Vec<SchedulerJob>) {
        *self.jobs.lock() = jobs;
    }

    /// Submitted `(script, options)` pairs, in order.
    pub fn submits(&self) -> Vec<(String, SubmitOptions)> {
        self.submits.lock().clone()
    }

    /// Kill batches issued, in order.
    pub fn kills(&self) -> Vec<Vec<String>> {
        self.kills.lock().clone()
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait::async_trait]
impl WorkloadManager for FakeManager {
    async fn submit(
        &self,
        script_body: &str,
        opts: &SubmitOptions,
    ) -> Result<SubmissionResult, ClusterError> {
        let mut next = self.next_job_id.lock();
        *next += 1;
        self.submits
            .lock()
            .push((script_body.to_string(), opts.clone()));
        Ok(SubmissionResult {
            return_code: 0,
            job_ids: vec![next.to_string()],
            ..Default::default()
        })
    }

    async fn kill(
        &self,
        job_ids: &[String],
        _failing_gracefully: bool,
    ) -> Result<SubmissionResult, ClusterError> {
        self.kills.lock().push(job_ids.to_vec());
        self.jobs
            .lock()
            .retain(|job| !job_ids.contains(&job.job_id));
        Ok(SubmissionResult {
            return_code: 0,
            job_ids: job_ids.to_vec(),
            ..Default::default()
        })
    }

    async fn list(&self, name_filter: Option<&str>) -> Result<Vec<SchedulerJob>, ClusterError> {
        Ok(self
            .jobs
            .lock()
            .iter()
            .filter(|job| name_filter.is_none_or(|f| job.name.starts_with(f)))
            .cloned()
            .collect())
    }

    fn runtime_limit(&self, secs: u64) -> String {
        format!("{secs}s")
    }

    fn job_name_env_var(&self) -> &'static str {
        "FAKE_JOB_NAME"
    }
}
