// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dm-workers: worker deployment and pool reconciliation.
//!
//! The launcher packages a worker's configuration into a tarball, ships
//! it to the cluster, and submits a Singularity job that joins the
//! message broker. The pool controller is the periodic loop that keeps
//! the observed worker set matching the configured desired state.

pub mod launcher;
pub mod pool;
pub mod template;

pub use launcher::{LaunchError, LaunchRequest, SingularityLauncher, WorkerSpawner};
pub use pool::{PoolController, PoolError, TickOutcome, TickReport};
pub use template::render;

#[cfg(any(test, feature = "test-support"))]
pub use launcher::FakeSpawner;
