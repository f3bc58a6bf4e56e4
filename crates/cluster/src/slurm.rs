// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Slurm workload manager.
//!
//! Two points diverge from the LSF adapter. Submission acknowledgements
//! are occasionally delayed, so an unparseable `sbatch` response is
//! retried up to [`MAX_SUBMIT_ATTEMPTS`] times with a fixed back-off.
//! And squeue has no project filter, so the project prefix is embedded
//! into every job name behind [`PROJECT_DELIMITER`], recovered by
//! grepping the listing, and stripped again before rows are returned so
//! callers see the same bare job names the LSF adapter reports.

use crate::script::{assemble, runtime_limit_hh_mm_ss, write_script};
use crate::{ssh_prefix, ClusterError, SubmitOptions, WorkloadManager};
use chrono::NaiveDateTime;
use dm_core::worker::PROJECT_DELIMITER;
use dm_core::{ClusterSettings, JobState, SchedulerJob, SubmissionResult};
use dm_remote::{quote, ExecOptions, ShellExecutor};
use std::sync::Arc;
use std::time::Duration;

/// Submission attempts before an unparseable acknowledgement is fatal.
pub const MAX_SUBMIT_ATTEMPTS: u32 = 10;

/// Back-off between submission attempts.
pub const SUBMIT_RETRY_DELAY: Duration = Duration::from_secs(20);

pub struct SlurmManager {
    executor: Arc<dyn ShellExecutor>,
    settings: ClusterSettings,
    ssh: String,
    retry_delay: Duration,
}

impl SlurmManager {
    pub fn new(executor: Arc<dyn ShellExecutor>, settings: ClusterSettings) -> Self {
        let ssh = ssh_prefix(&settings);
        Self {
            executor,
            settings,
            ssh,
            retry_delay: SUBMIT_RETRY_DELAY,
        }
    }

    /// Override the retry back-off (tests).
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn project_name(&self, job_name: &str) -> String {
        format!(
            "{}{}{}",
            self.settings.job_prefix, PROJECT_DELIMITER, job_name
        )
    }

    fn directives(&self, opts: &SubmitOptions) -> Vec<String> {
        let mut d = vec![
            format!("#SBATCH -J {}", self.project_name(&opts.job_name)),
            format!("#SBATCH -p {}", opts.queue),
            format!(
                "#SBATCH --time={}",
                runtime_limit_hh_mm_ss(opts.runtime_limit_secs)
            ),
            format!("#SBATCH --mem={}MB", opts.memory_mb),
            format!("#SBATCH -n {}", opts.cpus),
        ];
        if let Some(account) = &opts.account {
            d.push(format!("#SBATCH --mail-user={}", account));
            d.push("#SBATCH --mail-type=FAIL".to_string());
        }
        if let Some(out) = &opts.out_log {
            d.push(format!("#SBATCH -o {}", out));
        }
        if let Some(err) = &opts.err_log {
            d.push(format!("#SBATCH -e {}", err));
        }
        d
    }
}

/// Extract the job id from `Submitted batch job <N>`.
fn parse_submit_line(line: &str) -> Option<String> {
    let idx = line.find("batch job ")?;
    let id = line[idx + "batch job ".len()..].trim();
    (!id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())).then(|| id.to_string())
}

/// Parse one `squeue --format=%i::%P::%T::%u::%l::%A::%j::%V` row.
/// The name and submit time are the last two columns.
fn parse_list_row(line: &str) -> Option<SchedulerJob> {
    let parts: Vec<&str> = line.split("::").collect();
    if parts.len() < 7 {
        return None;
    }
    let name = parts[parts.len() - 2];
    let submit_raw = parts[parts.len() - 1];
    Some(SchedulerJob {
        job_id: parts[0].to_string(),
        queue: parts[1].to_string(),
        state: JobState::from_scheduler(parts[2]),
        name: name.to_string(),
        submit_epoch: parse_submit_time(submit_raw),
    })
}

fn parse_submit_time(raw: &str) -> u64 {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .map(|dt| dt.and_utc().timestamp().max(0) as u64)
        .unwrap_or(0)
}

#[async_trait::async_trait]
impl WorkloadManager for SlurmManager {
    async fn submit(
        &self,
        script_body: &str,
        opts: &SubmitOptions,
    ) -> Result<SubmissionResult, ClusterError> {
        let script = assemble(&self.directives(opts), script_body);
        let path = write_script(&self.settings.temp_dir, &opts.job_name, &script).await?;
        let command = format!("{} sbatch < {}", self.ssh, quote(&path.to_string_lossy()));

        let mut last_stdout = String::new();
        for attempt in 1..=MAX_SUBMIT_ATTEMPTS {
            let exec = self
                .executor
                .execute(
                    &command,
                    ExecOptions::with_timeout(Duration::from_secs(
                        self.settings.submit_timeout_secs,
                    )),
                )
                .await?;

            if exec.return_code != 0 {
                tracing::warn!(
                    job_name = %opts.job_name,
                    return_code = exec.return_code,
                    "sbatch failed"
                );
                return Ok(SubmissionResult {
                    return_code: exec.return_code,
                    job_ids: vec![],
                    stdout: exec.stdout_lines,
                    stderr: exec.stderr_lines,
                });
            }

            let first = exec.stdout_lines.first().map(String::as_str).unwrap_or("");
            if let Some(job_id) = parse_submit_line(first) {
                tracing::info!(job_name = %opts.job_name, job_id = %job_id, "submitted Slurm job");
                return Ok(SubmissionResult {
                    return_code: 0,
                    job_ids: vec![job_id],
                    stdout: exec.stdout_lines,
                    stderr: exec.stderr_lines,
                });
            }

            last_stdout = exec.stdout_lines.join("\n");
            if attempt < MAX_SUBMIT_ATTEMPTS {
                tracing::warn!(
                    job_name = %opts.job_name,
                    attempt,
                    "sbatch acknowledgement not parseable; retrying"
                );
                tokio::time::sleep(self.retry_delay).await;
            }
        }
        Err(ClusterError::SubmitParse { stdout: last_stdout })
    }

    async fn kill(
        &self,
        job_ids: &[String],
        _failing_gracefully: bool,
    ) -> Result<SubmissionResult, ClusterError> {
        let command = format!("{} scancel {}", self.ssh, job_ids.join(" "));
        let exec = self
            .executor
            .execute(
                &command,
                ExecOptions::with_timeout(Duration::from_secs(self.settings.kill_timeout_secs)),
            )
            .await?;

        // scancel is silent on success; acknowledge the requested batch.
        let acked = if exec.return_code == 0 {
            job_ids.to_vec()
        } else {
            vec![]
        };
        Ok(SubmissionResult {
            return_code: exec.return_code,
            job_ids: acked,
            stdout: exec.stdout_lines,
            stderr: exec.stderr_lines,
        })
    }

    async fn list(&self, name_filter: Option<&str>) -> Result<Vec<SchedulerJob>, ClusterError> {
        let grep_pattern = format!("{}{}", self.settings.job_prefix, PROJECT_DELIMITER);
        let command = format!(
            "{} squeue -h --format=%i::%P::%T::%u::%l::%A::%j::%V | grep {}",
            self.ssh,
            quote(&grep_pattern)
        );
        let exec = self
            .executor
            .execute(
                &command,
                ExecOptions::with_timeout(Duration::from_secs(self.settings.list_timeout_secs)),
            )
            .await?;
        // grep exits 1 on no matches.
        if exec.return_code != 0 && exec.return_code != 1 {
            tracing::warn!(return_code = exec.return_code, "squeue failed; treating as empty");
            return Ok(vec![]);
        }
        Ok(exec
            .stdout_lines
            .iter()
            .filter_map(|l| parse_list_row(l))
            .map(|mut job| {
                // The project prefix is a listing artefact; the rest of
                // the system knows workers by their bare job names.
                if let Some(bare) = job.name.strip_prefix(&grep_pattern) {
                    job.name = bare.to_string();
                }
                job
            })
            .filter(|job| name_filter.is_none_or(|f| job.name.starts_with(f)))
            .collect())
    }

    fn runtime_limit(&self, secs: u64) -> String {
        runtime_limit_hh_mm_ss(secs)
    }

    fn job_name_env_var(&self) -> &'static str {
        "SLURM_JOB_NAME"
    }
}

#[cfg(test)]
#[path = "slurm_tests.rs"]
mod tests;
