// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Datamover Daemon (dmd)
//!
//! Long-running process that keeps the worker pools reconciled against
//! their configured capacity. One tick per interval per pooled class;
//! everything else (task submission, folder maintenance) happens in the
//! workers this daemon keeps alive.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod args;
pub mod health;
pub mod reload;

pub use args::{Args, ArgsError};
pub use health::{BrokerCheck, CacheCheck, CheckReport, ClusterCheck, HealthCheck, HealthRegistry};
pub use reload::{ConfigWatcher, SharedSettings};
