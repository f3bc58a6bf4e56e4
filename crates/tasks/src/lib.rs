// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dm-tasks: the long-running task contract.
//!
//! Every remote operation goes through the same three-part machinery: a
//! [`MessageBroker`] that carries work to the datamover workers, a
//! [`TaskRunner`] that makes submission idempotent through the shared
//! cache, and task specialisations such as [`RsyncTask`] that interpret
//! the raw execution outcome into a typed result.

pub mod broker;
pub mod protocol;
pub mod rsync;

pub use broker::{
    BrokerError, BrokerState, ExecutionOutcome, MessageBroker, RedisBroker, WorkerRegistration,
};
pub use protocol::{TaskError, TaskRequest, TaskRunner, TaskStatus};
pub use rsync::{RsyncResult, RsyncTask, SyncOutcome, SyncSpec, SyncStatus};

#[cfg(any(test, feature = "test-support"))]
pub use broker::FakeBroker;
