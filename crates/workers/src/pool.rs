// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker pool reconciliation.
//!
//! One tick per class: take the per-class lock in the shared cache, kill
//! duplicate scheduler jobs (keeping the oldest of each name), spawn one
//! worker when under the configured minimum, and signal at most one
//! graceful shutdown when over the minimum or past the uptime cap.
//! Shutdown signals are debounced through a per-worker cache key so a
//! draining worker is not re-signalled every tick.

use crate::launcher::{LaunchError, WorkerSpawner};
use dm_cache::{CacheError, KeyStore};
use dm_cluster::{ClusterError, WorkloadManager};
use dm_core::{
    Clock, JobState, SchedulerJob, WorkerClass, WorkerClassSettings, WorkerIdentity,
    WorkerPoolSettings,
};
use dm_tasks::{BrokerError, MessageBroker, WorkerRegistration};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Broker(#[from] BrokerError),
    #[error(transparent)]
    Cluster(#[from] ClusterError),
    #[error(transparent)]
    Launch(#[from] LaunchError),
}

/// What one reconciliation tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another controller holds the class lock
    Skipped,
    Completed(TickReport),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Job name of the worker spawned this tick, if any
    pub spawned: Option<String>,
    /// Job ids killed as duplicates
    pub killed_duplicates: Vec<String>,
    /// Worker signalled to shut down this tick, if any
    pub shutdown: Option<String>,
}

/// The per-class reconciliation loop body.
pub struct PoolController<C: Clock> {
    manager: Arc<dyn WorkloadManager>,
    broker: Arc<dyn MessageBroker>,
    cache: Arc<dyn KeyStore>,
    spawner: Arc<dyn WorkerSpawner>,
    settings: WorkerPoolSettings,
    job_prefix: String,
    clock: C,
}

impl<C: Clock> PoolController<C> {
    pub fn new(
        manager: Arc<dyn WorkloadManager>,
        broker: Arc<dyn MessageBroker>,
        cache: Arc<dyn KeyStore>,
        spawner: Arc<dyn WorkerSpawner>,
        settings: WorkerPoolSettings,
        job_prefix: impl Into<String>,
        clock: C,
    ) -> Self {
        Self {
            manager,
            broker,
            cache,
            spawner,
            settings,
            job_prefix: job_prefix.into(),
            clock,
        }
    }

    fn class_settings(&self, class: WorkerClass) -> Option<&WorkerClassSettings> {
        match class {
            WorkerClass::Datamover => Some(&self.settings.datamover),
            WorkerClass::Vm => Some(&self.settings.vm),
            WorkerClass::Compute => None,
        }
    }

    /// Run one reconciliation tick for `class`.
    pub async fn reconcile(&self, class: WorkerClass) -> Result<TickOutcome, PoolError> {
        let Some(class_settings) = self.class_settings(class) else {
            tracing::warn!(%class, "class is not pooled; nothing to reconcile");
            return Ok(TickOutcome::Skipped);
        };

        let lock_key = format!("{}:{}", self.settings.monitor_key_prefix, class);
        let locked = self
            .cache
            .set_nx(
                &lock_key,
                "1",
                Duration::from_secs(self.settings.monitor_timeout_secs),
            )
            .await?;
        if !locked {
            tracing::debug!(%class, "reconciliation already in progress");
            return Ok(TickOutcome::Skipped);
        }

        let class_prefix = WorkerIdentity::class_prefix(&self.job_prefix, class);
        let jobs = self.manager.list(Some(&class_prefix)).await?;
        let registrations: Vec<WorkerRegistration> = self
            .broker
            .workers()
            .await?
            .into_iter()
            .filter(|r| r.name.starts_with(&class_prefix))
            .collect();

        let mut report = TickReport::default();

        let duplicates = duplicate_job_ids(&jobs);
        if !duplicates.is_empty() {
            tracing::info!(%class, count = duplicates.len(), "killing duplicate workers");
            self.manager.kill(&duplicates, true).await?;
            report.killed_duplicates = duplicates;
        }

        let live: Vec<&SchedulerJob> = jobs
            .iter()
            .filter(|job| !report.killed_duplicates.contains(&job.job_id))
            .filter(|job| matches!(job.state, JobState::Pend | JobState::Run))
            .collect();
        let running = live
            .iter()
            .filter(|job| job.state == JobState::Run)
            .count();

        if (live.len() as u32) < class_settings.min {
            let identity = self.fresh_identity(class, &jobs);
            self.spawner.spawn(&identity, class_settings).await?;
            report.spawned = Some(identity.job_name());
        }

        report.shutdown = self
            .signal_shutdown(class_settings, running, &live, &registrations)
            .await?;

        Ok(TickOutcome::Completed(report))
    }

    /// An identifier not colliding with any observed worker of the class.
    fn fresh_identity(&self, class: WorkerClass, jobs: &[SchedulerJob]) -> WorkerIdentity {
        let taken: Vec<String> = jobs
            .iter()
            .filter_map(|job| WorkerIdentity::parse(&job.name, &self.job_prefix))
            .map(|identity| identity.identifier)
            .collect();
        loop {
            let seed: [u8; 16] = rand::random();
            let digest = Sha256::digest(seed);
            let identifier = format!("{:02x}{:02x}", digest[0], digest[1]);
            if !taken.contains(&identifier) {
                return WorkerIdentity::new(&self.job_prefix, class, identifier);
            }
        }
    }

    /// At most one graceful shutdown per tick. Candidates are the newest
    /// job when the pool is over its minimum, then any registration past
    /// the uptime cap; a live debounce key skips a candidate.
    async fn signal_shutdown(
        &self,
        class_settings: &WorkerClassSettings,
        running: usize,
        live: &[&SchedulerJob],
        registrations: &[WorkerRegistration],
    ) -> Result<Option<String>, PoolError> {
        let mut candidates: Vec<String> = Vec::new();
        if running as u32 > class_settings.min {
            if let Some(newest) = live
                .iter()
                .filter(|job| job.state == JobState::Run)
                .max_by_key(|job| job.submit_epoch)
            {
                candidates.push(self.registration_for(&newest.name, registrations));
            }
        }
        for registration in registrations {
            if registration.uptime_secs > class_settings.max_uptime_secs {
                candidates.push(registration.name.clone());
            }
        }

        for worker in candidates {
            let debounce_key = format!("{}:{}", self.settings.shutdown_signal_prefix, worker);
            if self.cache.get(&debounce_key).await?.is_some() {
                continue; // already draining
            }
            self.broker.broadcast_shutdown(&worker).await?;
            self.cache
                .set(
                    &debounce_key,
                    &self.clock.now_epoch().to_string(),
                    Duration::from_secs(self.settings.shutdown_debounce_secs),
                )
                .await?;
            return Ok(Some(worker));
        }
        Ok(None)
    }

    /// Broker registrations carry `@host`; fall back to the bare job name
    /// when the worker never registered.
    fn registration_for(&self, job_name: &str, registrations: &[WorkerRegistration]) -> String {
        registrations
            .iter()
            .find(|r| r.name.split('@').next() == Some(job_name))
            .map(|r| r.name.clone())
            .unwrap_or_else(|| job_name.to_string())
    }
}

/// Job ids to kill: every group sharing a name loses all but its
/// oldest-submitted member.
fn duplicate_job_ids(jobs: &[SchedulerJob]) -> Vec<String> {
    let mut by_name: HashMap<&str, Vec<&SchedulerJob>> = HashMap::new();
    for job in jobs {
        by_name.entry(job.name.as_str()).or_default().push(job);
    }
    let mut ids = Vec::new();
    for (_, mut group) in by_name {
        if group.len() < 2 {
            continue;
        }
        group.sort_by_key(|job| job.submit_epoch);
        ids.extend(group[1..].iter().map(|job| job.job_id.clone()));
    }
    ids.sort();
    ids
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
