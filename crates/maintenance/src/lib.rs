// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dm-maintenance: the per-study folder maintenance engine.
//!
//! A study's layout is normalised as a plan: a scan of the on-disk tree,
//! a sequence of idempotent passes over an in-memory `current → planned`
//! map, and an ordered action log. The engine never touches the real
//! filesystem; applying the plan is the job of downstream datamover
//! tasks, which is how dry-run and commit stay the same code path.

pub mod isatab;
pub mod plan;
pub mod report;
pub mod scan;
pub mod sha;

use dm_cache::{CacheError, KeyStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub use isatab::{cross_reference, ReferencedFiles};
pub use plan::{ActionKind, ActionLogEntry, MaintenancePlan};
pub use report::{render_action_log, render_content_summary, write_action_log, write_content_summary};
pub use scan::{scan, FileDescriptor};
pub use sha::{schedule_hashes, HashIndex};

#[derive(Debug, Error)]
pub enum MaintenanceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Per-study maintenance lock. A second run for the same study observes
/// the lock and aborts; the TTL bounds how long a crashed run can block
/// its study.
pub struct StudyLock {
    store: Arc<dyn KeyStore>,
    key: String,
}

impl StudyLock {
    pub fn key_for(study_id: &str) -> String {
        format!("dm:maintenance:{study_id}")
    }

    /// Try to take the lock; `None` when another run holds it.
    pub async fn acquire(
        store: Arc<dyn KeyStore>,
        study_id: &str,
        ttl: Duration,
    ) -> Result<Option<Self>, MaintenanceError> {
        let key = Self::key_for(study_id);
        if !store.set_nx(&key, "1", ttl).await? {
            tracing::info!(study_id, "maintenance already running; aborting");
            return Ok(None);
        }
        Ok(Some(Self { store, key }))
    }

    pub async fn release(self) -> Result<(), MaintenanceError> {
        self.store.delete(&self.key).await?;
        Ok(())
    }
}
