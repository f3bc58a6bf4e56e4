// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! LSF workload manager.
//!
//! Submission parse failures are fatal to the call — unlike the Slurm
//! adapter, which retries. The asymmetry matches observed scheduler
//! behaviour: LSF acknowledgements are reliable when bsub exits zero.

use crate::script::{assemble, runtime_limit_hh_mm, write_script};
use crate::{ssh_prefix, ClusterError, SubmitOptions, WorkloadManager};
use chrono::{Datelike, NaiveDateTime, Utc};
use dm_core::{ClusterSettings, JobState, SchedulerJob, SubmissionResult};
use dm_remote::{quote, ExecOptions, ShellExecutor};
use std::sync::Arc;
use std::time::Duration;

pub struct LsfManager {
    executor: Arc<dyn ShellExecutor>,
    settings: ClusterSettings,
    ssh: String,
}

impl LsfManager {
    pub fn new(executor: Arc<dyn ShellExecutor>, settings: ClusterSettings) -> Self {
        let ssh = ssh_prefix(&settings);
        Self {
            executor,
            settings,
            ssh,
        }
    }

    fn directives(&self, opts: &SubmitOptions) -> Vec<String> {
        let mut d = vec![
            format!("#BSUB -P {}", self.settings.job_prefix),
            format!("#BSUB -J {}", opts.job_name),
            format!("#BSUB -q {}", opts.queue),
            format!("#BSUB -W {}", runtime_limit_hh_mm(opts.runtime_limit_secs)),
            format!("#BSUB -R rusage[mem={}MB]", opts.memory_mb),
            format!("#BSUB -n {}", opts.cpus),
        ];
        if let Some(account) = &opts.account {
            d.push(format!("#BSUB -u {}", account));
        }
        if let Some(out) = &opts.out_log {
            d.push(format!("#BSUB -o {}", out));
        }
        if let Some(err) = &opts.err_log {
            d.push(format!("#BSUB -e {}", err));
        }
        d
    }
}

/// Extract the job id from `Job <N> is submitted to queue <Q>.`
fn parse_submit_line(line: &str) -> Option<String> {
    let rest = line.strip_prefix("Job <")?;
    let (id, tail) = rest.split_once('>')?;
    if !tail.contains("is submitted") || id.is_empty() {
        return None;
    }
    Some(id.to_string())
}

/// Extract the job id from a bkill acknowledgement line (`Job <N> is
/// being terminated` and variants).
fn parse_kill_line(line: &str) -> Option<String> {
    let rest = line.strip_prefix("Job <")?;
    let (id, _) = rest.split_once('>')?;
    (!id.is_empty()).then(|| id.to_string())
}

/// Parse one `bjobs -noheader -w` row.
///
/// Seven whitespace columns: job id, queue, state, user, host, name,
/// submit time (which itself spans tokens). An unparseable timestamp
/// becomes 0 and never fails the listing.
fn parse_list_row(line: &str) -> Option<SchedulerJob> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 7 {
        return None;
    }
    let submit_raw = tokens[6..].join(" ");
    Some(SchedulerJob {
        job_id: tokens[0].to_string(),
        queue: tokens[1].to_string(),
        state: JobState::from_scheduler(tokens[2]),
        name: tokens[5].to_string(),
        submit_epoch: parse_submit_time(&submit_raw),
    })
}

/// LSF prints `Mon DD HH:MM` without a year; assume the current one.
fn parse_submit_time(raw: &str) -> u64 {
    let with_year = format!("{} {}", Utc::now().year(), raw);
    NaiveDateTime::parse_from_str(&with_year, "%Y %b %d %H:%M")
        .map(|dt| dt.and_utc().timestamp().max(0) as u64)
        .unwrap_or(0)
}

#[async_trait::async_trait]
impl WorkloadManager for LsfManager {
    async fn submit(
        &self,
        script_body: &str,
        opts: &SubmitOptions,
    ) -> Result<SubmissionResult, ClusterError> {
        let script = assemble(&self.directives(opts), script_body);
        let path = write_script(&self.settings.temp_dir, &opts.job_name, &script).await?;
        let command = format!("{} bsub < {}", self.ssh, quote(&path.to_string_lossy()));

        let exec = self
            .executor
            .execute(
                &command,
                ExecOptions::with_timeout(Duration::from_secs(self.settings.submit_timeout_secs)),
            )
            .await?;

        if exec.return_code != 0 {
            tracing::warn!(
                job_name = %opts.job_name,
                return_code = exec.return_code,
                "bsub failed"
            );
            return Ok(SubmissionResult {
                return_code: exec.return_code,
                job_ids: vec![],
                stdout: exec.stdout_lines,
                stderr: exec.stderr_lines,
            });
        }

        let first = exec.stdout_lines.first().map(String::as_str).unwrap_or("");
        let job_id = parse_submit_line(first).ok_or_else(|| ClusterError::SubmitParse {
            stdout: exec.stdout_lines.join("\n"),
        })?;
        tracing::info!(job_name = %opts.job_name, job_id = %job_id, "submitted LSF job");
        Ok(SubmissionResult {
            return_code: 0,
            job_ids: vec![job_id],
            stdout: exec.stdout_lines,
            stderr: exec.stderr_lines,
        })
    }

    async fn kill(
        &self,
        job_ids: &[String],
        failing_gracefully: bool,
    ) -> Result<SubmissionResult, ClusterError> {
        let command = format!("{} bkill {}", self.ssh, job_ids.join(" "));
        let exec = self
            .executor
            .execute(
                &command,
                ExecOptions::with_timeout(Duration::from_secs(self.settings.kill_timeout_secs)),
            )
            .await?;

        let acked: Vec<String> = exec
            .stdout_lines
            .iter()
            .filter_map(|l| parse_kill_line(l))
            .collect();
        if acked.is_empty() && !job_ids.is_empty() && exec.return_code == 0 && !failing_gracefully {
            return Err(ClusterError::KillParse {
                stdout: exec.stdout_lines.join("\n"),
            });
        }
        Ok(SubmissionResult {
            return_code: exec.return_code,
            job_ids: acked,
            stdout: exec.stdout_lines,
            stderr: exec.stderr_lines,
        })
    }

    async fn list(&self, name_filter: Option<&str>) -> Result<Vec<SchedulerJob>, ClusterError> {
        let command = format!(
            "{} bjobs -noheader -w -P {}",
            self.ssh, self.settings.job_prefix
        );
        let exec = self
            .executor
            .execute(
                &command,
                ExecOptions::with_timeout(Duration::from_secs(self.settings.list_timeout_secs)),
            )
            .await?;
        if exec.return_code != 0 {
            tracing::warn!(return_code = exec.return_code, "bjobs failed; treating as empty");
            return Ok(vec![]);
        }
        Ok(exec
            .stdout_lines
            .iter()
            .filter_map(|l| parse_list_row(l))
            .filter(|job| name_filter.is_none_or(|f| job.name.starts_with(f)))
            .collect())
    }

    fn runtime_limit(&self, secs: u64) -> String {
        runtime_limit_hh_mm(secs)
    }

    fn job_name_env_var(&self) -> &'static str {
        "LSB_JOBNAME"
    }
}

#[cfg(test)]
#[path = "lsf_tests.rs"]
mod tests;
