// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! An FTP sync from dry run to interpreted result, over the fake broker.

use dm_cache::{DescriptorStore, MemoryStore};
use dm_core::FakeClock;
use dm_remote::RsyncParams;
use dm_tasks::{
    BrokerState, ExecutionOutcome, FakeBroker, RsyncResult, RsyncTask, SyncSpec, SyncStatus,
    TaskRunner, TaskStatus,
};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    broker: Arc<FakeBroker>,
    task: RsyncTask<FakeClock>,
}

fn harness() -> Harness {
    let clock = FakeClock::new();
    let broker = Arc::new(FakeBroker::new());
    let descriptors = DescriptorStore::new(
        Arc::new(MemoryStore::new(clock.clone())),
        Duration::from_secs(3600),
    );
    let runner = TaskRunner::new(broker.clone(), descriptors, clock.clone());
    Harness {
        broker,
        task: RsyncTask::new(runner, "datamover"),
    }
}

fn spec() -> SyncSpec {
    SyncSpec {
        task_name: "sync_ftp".to_string(),
        study_id: "MTBLS1".to_string(),
        params: RsyncParams {
            source: "/ftp/private/mtbls1-x4f2".to_string(),
            target: "dmops@hpc.example.org:/studies/storage/MTBLS1".to_string(),
            includes: Vec::new(),
            excludes: Vec::new(),
            extra_args: String::new(),
            identity_file: None,
        },
        min_rerun_interval: Duration::from_secs(300),
        expires: Duration::from_secs(3600),
        stdout_log: None,
        stderr_log: None,
        trimmed_files_count: None,
    }
}

const DRY_RUN_STDOUT: &[&str] = &[
    "sending incremental file list",
    "FILES/sample1.mzML",
    "FILES/sample2.mzML",
    "",
    "sent 1234 bytes  received 56 bytes  2580.00 bytes/sec",
    "total size is 1,048,576  speedup is 813.62",
];

#[tokio::test]
async fn a_dry_run_is_enqueued_polled_and_interpreted() {
    let h = harness();

    let status = h.task.start_dry_run(&spec()).await.unwrap();
    assert!(matches!(status, TaskStatus::Running { .. }));

    let enqueued = h.broker.enqueued();
    assert_eq!(enqueued.len(), 2);
    assert_eq!(enqueued[0].task_name, "create_folders");
    assert_eq!(
        enqueued[0].argv,
        vec![
            "mkdir".to_string(),
            "-p".to_string(),
            "/ftp/private/mtbls1-x4f2".to_string(),
            "/studies/storage/MTBLS1".to_string(),
        ]
    );
    assert_eq!(enqueued[1].task_name, "sync_ftp");
    assert!(enqueued[1].argv[2].contains("-aunv"));

    h.broker.set_state("job-2", BrokerState::Success);
    h.broker.set_result(
        "job-2",
        ExecutionOutcome {
            return_code: 0,
            stdout_lines: DRY_RUN_STDOUT.iter().map(|s| s.to_string()).collect(),
            stderr_lines: Vec::new(),
            stdout_log: None,
            stderr_log: None,
        },
    );

    let status = h.task.poll(&spec()).await.unwrap();
    let TaskStatus::ResultReady(outcome) = status else {
        panic!("expected a terminal result, got {status:?}");
    };

    let sync = h.task.interpret(&spec(), true, &outcome);
    assert_eq!(sync.status, SyncStatus::SyncNeeded);
    assert_eq!(
        sync.result,
        RsyncResult {
            valid: true,
            return_code: 0,
            number_of_files: 2,
            total_bytes: 1_048_576,
            total_size_str: "1.00MiB".to_string(),
            message: "FILES/sample1.mzML, FILES/sample2.mzML".to_string(),
        }
    );
}

#[tokio::test]
async fn a_running_sync_is_not_resubmitted() {
    let h = harness();

    h.task.start_dry_run(&spec()).await.unwrap();
    h.broker.set_state("job-2", BrokerState::Started);

    let status = h.task.start_dry_run(&spec()).await.unwrap();
    assert!(matches!(status, TaskStatus::Running { .. }));
    // Neither the sync itself nor its mkdir preamble goes out again.
    let enqueued = h.broker.enqueued();
    assert_eq!(enqueued.len(), 2);
    let syncs = enqueued
        .iter()
        .filter(|task| task.task_name == "sync_ftp")
        .count();
    assert_eq!(syncs, 1);
}

#[tokio::test]
async fn identical_trees_interpret_as_no_sync_needed() {
    let h = harness();
    let outcome = ExecutionOutcome {
        return_code: 0,
        stdout_lines: vec![
            "sending incremental file list".to_string(),
            "".to_string(),
            "sent 95 bytes  received 12 bytes  214.00 bytes/sec".to_string(),
            "total size is 0  speedup is 0.00".to_string(),
        ],
        stderr_lines: Vec::new(),
        stdout_log: None,
        stderr_log: None,
    };

    let sync = h.task.interpret(&spec(), true, &outcome);
    assert_eq!(sync.status, SyncStatus::SyncNotNeeded);
    assert_eq!(sync.result.number_of_files, 0);
}
