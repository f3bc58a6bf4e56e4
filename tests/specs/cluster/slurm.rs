// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Slurm submission, listing, and retry behaviour over a scripted shell.

use crate::prelude::cluster_settings;
use dm_cluster::{SlurmManager, SubmitOptions, WorkloadManager};
use dm_core::JobState;
use dm_remote::{ExecResult, FakeExecutor};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn manager(executor: Arc<FakeExecutor>, tmp: &TempDir) -> SlurmManager {
    SlurmManager::new(executor, cluster_settings(tmp.path().to_path_buf()))
}

#[tokio::test]
async fn submission_acknowledgement_yields_the_job_id() {
    let tmp = TempDir::new().unwrap();
    let executor = Arc::new(FakeExecutor::new());
    executor.respond_stdout("sbatch", &["Submitted batch job 4242"]);
    let manager = manager(Arc::clone(&executor), &tmp);

    let result = manager
        .submit(
            "#!/bin/bash\nsleep 60\n",
            &SubmitOptions::new("dm-datamover_a1b2", "datamover"),
        )
        .await
        .unwrap();

    assert_eq!(result.return_code, 0);
    assert_eq!(result.job_ids, vec!["4242".to_string()]);
    let calls = executor.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].contains("ssh"));
    assert!(calls[0].contains("sbatch"));
}

#[tokio::test]
async fn listed_jobs_round_trip_id_state_name_and_submit_time() {
    let tmp = TempDir::new().unwrap();
    let executor = Arc::new(FakeExecutor::new());
    executor.respond_stdout(
        "squeue",
        &[
            "4242::datamover::RUNNING::dmops::2-00:00:00::4242::dm---dm-datamover_a1b2::2026-01-15T10:30:00",
            "4243::datamover::PENDING::dmops::2-00:00:00::4243::dm---dm-datamover_c3d4::2026-01-15T10:31:00",
        ],
    );
    let manager = manager(Arc::clone(&executor), &tmp);

    let jobs = manager.list(Some("dm-datamover")).await.unwrap();

    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].job_id, "4242");
    assert_eq!(jobs[0].state, JobState::Run);
    assert_eq!(jobs[0].name, "dm-datamover_a1b2");
    assert_eq!(jobs[1].name, "dm-datamover_c3d4");
    assert_eq!(jobs[0].queue, "datamover");
    assert_eq!(jobs[0].submit_epoch, 1_768_473_000);
    assert_eq!(jobs[1].state, JobState::Pend);
    assert_eq!(jobs[1].submit_epoch, 1_768_473_060);
}

#[tokio::test]
async fn an_unrelated_job_name_is_filtered_out() {
    let tmp = TempDir::new().unwrap();
    let executor = Arc::new(FakeExecutor::new());
    executor.respond_stdout(
        "squeue",
        &["9::short::RUNNING::other::1:00:00::9::dm---other-task_ff00::2026-01-15T10:00:00"],
    );
    let manager = manager(Arc::clone(&executor), &tmp);

    let jobs = manager.list(Some("dm-datamover")).await.unwrap();
    assert!(jobs.is_empty());
}

#[tokio::test]
#[serial_test::serial]
async fn a_delayed_acknowledgement_is_retried_exactly_once() {
    let tmp = TempDir::new().unwrap();
    let executor = Arc::new(FakeExecutor::new());
    executor.respond_stdout("sbatch", &["sbatch: acknowledgement pending"]);
    executor.respond_stdout("sbatch", &["Submitted batch job 77"]);
    let manager =
        manager(Arc::clone(&executor), &tmp).with_retry_delay(Duration::from_millis(5));

    let result = manager
        .submit(
            "#!/bin/bash\nsleep 60\n",
            &SubmitOptions::new("dm-datamover_a1b2", "datamover"),
        )
        .await
        .unwrap();

    assert_eq!(result.job_ids, vec!["77".to_string()]);
    let sbatch_calls = executor
        .calls()
        .iter()
        .filter(|call| call.contains("sbatch"))
        .count();
    assert_eq!(sbatch_calls, 2);
}

#[tokio::test]
async fn a_failed_sbatch_is_not_retried() {
    let tmp = TempDir::new().unwrap();
    let executor = Arc::new(FakeExecutor::new());
    executor.respond(
        "sbatch",
        ExecResult {
            return_code: 1,
            stderr_lines: vec!["sbatch: error: invalid partition specified".to_string()],
            ..Default::default()
        },
    );
    let manager = manager(Arc::clone(&executor), &tmp);

    let result = manager
        .submit(
            "#!/bin/bash\nsleep 60\n",
            &SubmitOptions::new("dm-datamover_a1b2", "datamover"),
        )
        .await
        .unwrap();

    assert_eq!(result.return_code, 1);
    assert!(result.job_ids.is_empty());
    assert_eq!(executor.calls().len(), 1);
}
