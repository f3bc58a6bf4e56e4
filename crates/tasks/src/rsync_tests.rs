// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::broker::{BrokerState, FakeBroker, MessageBroker};
use crate::protocol::{TaskRunner, TaskStatus};
use dm_cache::{DescriptorStore, MemoryStore};
use dm_core::FakeClock;
use std::sync::Arc;

fn lines(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| s.to_string()).collect()
}

fn success(stdout: &[&str]) -> ExecutionOutcome {
    ExecutionOutcome {
        return_code: 0,
        stdout_lines: lines(stdout),
        ..Default::default()
    }
}

#[test]
fn summary_with_one_mebibyte_parses() {
    let outcome = success(&[
        "sending incremental file list",
        "FILES/a.mzML",
        "FILES/b.mzML",
        "",
        "sent 1,100 bytes  received 35 bytes  756.67 bytes/sec",
        "total size is 1,048,576  speedup is 924.30",
    ]);
    let sync = interpret_outcome(true, None, &outcome);
    assert_eq!(sync.status, SyncStatus::SyncNeeded);
    assert_eq!(
        sync.result,
        RsyncResult {
            valid: true,
            return_code: 0,
            number_of_files: 2,
            total_bytes: 1_048_576,
            total_size_str: "1.00MiB".to_string(),
            message: "FILES/a.mzML, FILES/b.mzML".to_string(),
        }
    );
}

#[test]
fn created_directory_shifts_the_file_window() {
    let outcome = success(&[
        "created directory /storage/MTBLS1/FILES",
        "sending incremental file list",
        "a.raw",
        "total size is 2,048  speedup is 1.00",
    ]);
    let sync = interpret_outcome(false, None, &outcome);
    assert_eq!(sync.status, SyncStatus::CompletedSuccess);
    assert_eq!(sync.result.number_of_files, 1);
    assert_eq!(sync.result.total_bytes, 2048);
    assert_eq!(sync.result.total_size_str, "2.00KiB");
}

#[test]
fn identical_trees_report_sync_not_needed() {
    let outcome = success(&[
        "sending incremental file list",
        "",
        "sent 85 bytes  received 12 bytes  194.00 bytes/sec",
        "total size is 1,048,576  speedup is 10,810.06",
    ]);
    let sync = interpret_outcome(true, None, &outcome);
    assert_eq!(sync.status, SyncStatus::SyncNotNeeded);
    assert_eq!(sync.result.number_of_files, 0);
    assert!(sync.result.valid);
}

#[test]
fn missing_trailer_is_a_parse_failure_not_a_task_failure() {
    let outcome = success(&["sending incremental file list", "a.mzML"]);
    let sync = interpret_outcome(true, None, &outcome);
    assert!(!sync.result.valid);
    assert_eq!(sync.result.number_of_files, 0);
}

#[test]
fn nonzero_return_code_is_sync_failure_with_first_stderr_line() {
    let outcome = ExecutionOutcome {
        return_code: 23,
        stderr_lines: lines(&[
            "rsync: link_stat \"/ftp/MTBLS1\" failed: No such file or directory (2)",
            "rsync error: some files/attrs were not transferred (code 23)",
        ]),
        ..Default::default()
    };
    let sync = interpret_outcome(false, None, &outcome);
    assert_eq!(sync.status, SyncStatus::SyncFailure);
    assert_eq!(sync.result.return_code, 23);
    assert!(sync.result.message.starts_with("rsync: link_stat"));
}

#[test]
fn long_file_lists_are_trimmed_into_the_message() {
    let stdout: Vec<String> = std::iter::once("sending incremental file list".to_string())
        .chain((0..10).map(|i| format!("file{i}.mzML")))
        .chain(std::iter::once("total size is 512  speedup is 1.0".to_string()))
        .collect();
    let outcome = ExecutionOutcome {
        return_code: 0,
        stdout_lines: stdout,
        ..Default::default()
    };
    let sync = interpret_outcome(true, Some(3), &outcome);
    assert_eq!(sync.result.number_of_files, 10);
    assert!(sync.result.message.starts_with("10 files transferred, showing first 3: "));
    assert!(sync.result.message.ends_with("file0.mzML, file1.mzML, file2.mzML"));
}

fn task() -> (Arc<FakeBroker>, RsyncTask<FakeClock>) {
    let clock = FakeClock::new();
    let broker = Arc::new(FakeBroker::new());
    let store = Arc::new(MemoryStore::new(clock.clone()));
    let descriptors = DescriptorStore::new(store, Duration::from_secs(3600));
    let runner = TaskRunner::new(broker.clone(), descriptors, clock);
    (broker.clone(), RsyncTask::new(runner, "datamover"))
}

fn spec() -> SyncSpec {
    SyncSpec {
        task_name: "rsync_ftp".to_string(),
        study_id: "MTBLS1".to_string(),
        params: RsyncParams {
            source: "/ftp/mtbls1-x1y2/".to_string(),
            target: "/storage/MTBLS1/FILES".to_string(),
            ..Default::default()
        },
        min_rerun_interval: Duration::from_secs(300),
        expires: Duration::from_secs(3600),
        stdout_log: None,
        stderr_log: None,
        trimmed_files_count: None,
    }
}

#[tokio::test]
async fn start_dry_run_creates_directories_then_submits_aunv() {
    let (broker, task) = task();
    let status = task.start_dry_run(&spec()).await.unwrap();
    assert!(matches!(status, TaskStatus::Running { .. }));

    let enqueued = broker.enqueued();
    assert_eq!(enqueued.len(), 2);
    assert_eq!(enqueued[0].task_name, "create_folders");
    assert_eq!(
        enqueued[0].argv,
        vec!["mkdir", "-p", "/ftp/mtbls1-x1y2/", "/storage/MTBLS1/FILES"]
    );
    assert_eq!(enqueued[1].task_name, "rsync_ftp");
    let command = enqueued[1].argv.last().unwrap();
    assert!(command.starts_with("rsync -aunv"));
    assert!(command.contains("/storage/MTBLS1/FILES"));
}

#[tokio::test]
async fn committing_run_uses_auv() {
    let (broker, task) = task();
    task.start(&spec()).await.unwrap();
    let command = broker.enqueued()[1].argv.last().unwrap().clone();
    assert!(command.starts_with("rsync -auv"));
    assert!(!command.contains("-aunv"));
}

#[tokio::test]
async fn restart_while_running_does_not_recreate_directories() {
    let (broker, task) = task();
    task.start(&spec()).await.unwrap();
    broker.set_state("job-2", BrokerState::Started);

    let status = task.start(&spec()).await.unwrap();
    assert!(matches!(status, TaskStatus::Running { .. }));
    let enqueued = broker.enqueued();
    let names: Vec<&str> = enqueued.iter().map(|job| job.task_name.as_str()).collect();
    assert_eq!(names, vec!["create_folders", "rsync_ftp"]);
}

#[tokio::test]
async fn poll_never_enqueues() {
    let (broker, task) = task();
    task.start(&spec()).await.unwrap();
    broker.set_state("job-2", BrokerState::Started);

    let status = task.poll(&spec()).await.unwrap();
    assert!(matches!(status, TaskStatus::Running { .. }));
    assert_eq!(broker.enqueued().len(), 2);
}

#[tokio::test]
async fn second_committing_run_on_synced_trees_reports_not_needed() {
    let (broker, task) = task();
    task.start(&spec()).await.unwrap();
    broker.set_state("job-2", BrokerState::Success);
    broker.set_result(
        "job-2",
        success(&[
            "sending incremental file list",
            "total size is 4,096  speedup is 48.19",
        ]),
    );

    let status = task.poll(&spec()).await.unwrap();
    let TaskStatus::ResultReady(outcome) = status else {
        panic!("expected ResultReady, got {status:?}");
    };
    let sync = task.interpret(&spec(), false, &outcome);
    assert_eq!(sync.status, SyncStatus::SyncNotNeeded);
    assert_eq!(sync.result.number_of_files, 0);
}
