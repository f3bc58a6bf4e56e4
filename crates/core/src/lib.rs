// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dm-core: data model and configuration for the datamover orchestration backbone

pub mod clock;
pub mod config;
pub mod job;
pub mod layout;
pub mod study;
pub mod task;
pub mod time_fmt;
pub mod worker;

pub use clock::{Clock, SystemClock};
pub use config::{
    CacheSettings, ClusterSettings, ConfigError, DaemonSettings, MaintenanceSettings, Settings,
    StudySettings, WorkerClassSettings, WorkerPoolSettings, WorkloadManagerKind,
};
pub use job::{JobState, SchedulerJob, SubmissionResult};
pub use layout::{StudyArea, StudyLayout};
pub use study::{ftp_folder_name, StudyId, StudyIdError, StudyStatus};
pub use task::{task_key, TaskDescriptor, TaskState};
pub use time_fmt::{format_size, format_utc};
pub use worker::{WorkerClass, WorkerIdentity, CLASS_DELIMITER, PROJECT_DELIMITER};

#[cfg(any(test, feature = "test-support"))]
pub use clock::FakeClock;
