// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker pool reconciliation across several ticks.

use crate::prelude::{cluster_settings, pool_settings};
use dm_cache::MemoryStore;
use dm_cluster::{FakeManager, SlurmManager};
use dm_core::{FakeClock, JobState, SchedulerJob, WorkerClass};
use dm_remote::FakeExecutor;
use dm_tasks::{FakeBroker, WorkerRegistration};
use dm_workers::{FakeSpawner, PoolController, TickOutcome, TickReport};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct Harness {
    clock: FakeClock,
    manager: Arc<FakeManager>,
    broker: Arc<FakeBroker>,
    spawner: Arc<FakeSpawner>,
    controller: PoolController<FakeClock>,
}

fn harness(settings: dm_core::WorkerPoolSettings) -> Harness {
    let clock = FakeClock::new();
    let manager = Arc::new(FakeManager::new());
    let broker = Arc::new(FakeBroker::new());
    let cache = Arc::new(MemoryStore::new(clock.clone()));
    let spawner = Arc::new(FakeSpawner::new());
    let controller = PoolController::new(
        manager.clone(),
        broker.clone(),
        cache,
        spawner.clone(),
        settings,
        "dm",
        clock.clone(),
    );
    Harness {
        clock,
        manager,
        broker,
        spawner,
        controller,
    }
}

fn job(id: &str, name: &str, state: JobState, submit_epoch: u64) -> SchedulerJob {
    SchedulerJob {
        job_id: id.to_string(),
        state,
        name: name.to_string(),
        submit_epoch,
        queue: "datamover".to_string(),
    }
}

fn registration(name: &str, uptime_secs: u64) -> WorkerRegistration {
    WorkerRegistration {
        name: name.to_string(),
        uptime_secs,
        queues: vec!["datamover".to_string()],
    }
}

fn report(outcome: TickOutcome) -> TickReport {
    match outcome {
        TickOutcome::Completed(report) => report,
        TickOutcome::Skipped => panic!("tick was skipped"),
    }
}

#[tokio::test]
async fn duplicates_are_culled_and_capacity_restored_over_two_ticks() {
    let h = harness(pool_settings(2, 86_400, 5));
    h.manager.set_jobs(vec![
        job("1", "dm-datamover_a1b2", JobState::Run, 100),
        job("2", "dm-datamover_a1b2", JobState::Run, 200),
    ]);

    // Tick 1: the younger duplicate dies, leaving one live worker, so a
    // replacement is spawned in the same tick.
    let first = report(h.controller.reconcile(WorkerClass::Datamover).await.unwrap());
    assert_eq!(first.killed_duplicates, vec!["2".to_string()]);
    assert_eq!(h.manager.kills(), vec![vec!["2".to_string()]]);
    let spawned = h.spawner.spawned();
    assert_eq!(spawned.len(), 1);

    // Tick 2: the scheduler now shows both workers; nothing left to do.
    h.clock.advance(Duration::from_secs(10));
    h.manager.set_jobs(vec![
        job("1", "dm-datamover_a1b2", JobState::Run, 100),
        job("3", &spawned[0].job_name(), JobState::Pend, 300),
    ]);
    let second = report(h.controller.reconcile(WorkerClass::Datamover).await.unwrap());
    assert_eq!(second, TickReport::default());
    assert_eq!(h.manager.kills().len(), 1);
    assert_eq!(h.spawner.spawned().len(), 1);
}

#[tokio::test]
async fn expired_workers_drain_one_per_tick_with_debounce() {
    let h = harness(pool_settings(1, 3600, 5));
    h.manager.set_jobs(vec![
        job("1", "dm-datamover_a1b2", JobState::Run, 100),
        job("2", "dm-datamover_c3d4", JobState::Run, 200),
    ]);
    h.broker
        .add_worker(registration("dm-datamover_a1b2@hostA", 5000));
    h.broker
        .add_worker(registration("dm-datamover_c3d4@hostB", 4500));

    // Tick 1: over minimum, so the newest running worker is asked to drain.
    let first = report(h.controller.reconcile(WorkerClass::Datamover).await.unwrap());
    assert_eq!(first.shutdown.as_deref(), Some("dm-datamover_c3d4@hostB"));

    // Tick 2: the newest is debounced; the other worker is over its
    // uptime limit and gets this tick's one shutdown signal.
    h.clock.advance(Duration::from_secs(10));
    let second = report(h.controller.reconcile(WorkerClass::Datamover).await.unwrap());
    assert_eq!(second.shutdown.as_deref(), Some("dm-datamover_a1b2@hostA"));

    // Tick 3: both are debounced; no further signals.
    h.clock.advance(Duration::from_secs(10));
    let third = report(h.controller.reconcile(WorkerClass::Datamover).await.unwrap());
    assert_eq!(third.shutdown, None);
    assert_eq!(
        h.broker.shutdowns(),
        vec![
            "dm-datamover_c3d4@hostB".to_string(),
            "dm-datamover_a1b2@hostA".to_string(),
        ]
    );

    // Past the debounce window the drain request goes out again.
    h.clock.advance(Duration::from_secs(31));
    let fourth = report(h.controller.reconcile(WorkerClass::Datamover).await.unwrap());
    assert_eq!(fourth.shutdown.as_deref(), Some("dm-datamover_c3d4@hostB"));
}

#[tokio::test]
async fn a_slurm_backed_tick_signals_the_registered_worker_name() {
    let tmp = TempDir::new().unwrap();
    let executor = Arc::new(FakeExecutor::new());
    executor.respond_stdout(
        "squeue",
        &[
            "4242::datamover::RUNNING::dmops::2-00:00:00::4242::dm---dm-datamover_a1b2::2026-01-15T10:30:00",
            "4243::datamover::RUNNING::dmops::2-00:00:00::4243::dm---dm-datamover_c3d4::2026-01-15T10:31:00",
        ],
    );
    let clock = FakeClock::new();
    let manager = Arc::new(SlurmManager::new(
        executor,
        cluster_settings(tmp.path().to_path_buf()),
    ));
    let broker = Arc::new(FakeBroker::new());
    broker.add_worker(registration("dm-datamover_a1b2@hostA", 60));
    broker.add_worker(registration("dm-datamover_c3d4@hostB", 30));
    let controller = PoolController::new(
        manager,
        broker.clone(),
        Arc::new(MemoryStore::new(clock.clone())),
        Arc::new(FakeSpawner::new()),
        pool_settings(1, 86_400, 5),
        "dm",
        clock,
    );

    // Over minimum with distinct names: no kills, no spawn, and the drain
    // signal goes to the newest worker under the name it registered with.
    let tick = report(controller.reconcile(WorkerClass::Datamover).await.unwrap());
    assert!(tick.killed_duplicates.is_empty());
    assert_eq!(tick.spawned, None);
    assert_eq!(tick.shutdown.as_deref(), Some("dm-datamover_c3d4@hostB"));
    assert_eq!(
        broker.shutdowns(),
        vec!["dm-datamover_c3d4@hostB".to_string()]
    );
}

#[tokio::test]
async fn concurrent_controllers_observe_the_class_lock() {
    let h = harness(pool_settings(1, 86_400, 55));
    h.manager
        .set_jobs(vec![job("1", "dm-datamover_a1b2", JobState::Run, 100)]);

    let first = h.controller.reconcile(WorkerClass::Datamover).await.unwrap();
    assert!(matches!(first, TickOutcome::Completed(_)));
    let second = h.controller.reconcile(WorkerClass::Datamover).await.unwrap();
    assert!(matches!(second, TickOutcome::Skipped));
}
