// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Behavioral specifications for the datamover services.
//!
//! These tests run end-to-end over the in-memory fakes — scripted shell
//! executor, fake scheduler, memory cache, fake broker — with no Redis,
//! SSH, or batch scheduler involved. Narrower cases live in the per-crate
//! unit tests.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

#[path = "specs/prelude.rs"]
mod prelude;

// cluster/
#[path = "specs/cluster/slurm.rs"]
mod cluster_slurm;

// workers/
#[path = "specs/workers/pool.rs"]
mod workers_pool;

// tasks/
#[path = "specs/tasks/rsync.rs"]
mod tasks_rsync;

// maintenance/
#[path = "specs/maintenance/study_folder.rs"]
mod maintenance_study_folder;
