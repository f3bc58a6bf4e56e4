// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dm-remote: SSH/SCP/rsync command construction and timed execution.
//!
//! Everything the rest of the workspace runs on the cluster goes through
//! this crate. Process failure is reported through the return code, never
//! as an error, so callers can tell "scheduler said no" from "SSH could
//! not connect".

pub mod command;
pub mod exec;

pub use command::{build_rsync, build_scp, build_ssh, quote, RsyncParams, SshParams};
pub use exec::{ExecOptions, ExecResult, RemoteError, ShellExecutor, TokioExecutor};

#[cfg(any(test, feature = "test-support"))]
pub use exec::FakeExecutor;
