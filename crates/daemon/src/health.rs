// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup and on-demand health checks.
//!
//! An explicit registry of named probes, one per backing service. A
//! failing probe is reported, never fatal: the daemon keeps running and
//! retries the backing service on its next tick.

use dm_cache::KeyStore;
use dm_cluster::WorkloadManager;
use dm_tasks::MessageBroker;
use std::sync::Arc;
use tracing::{info, warn};

const CACHE_PROBE_KEY: &str = "dm:health:probe";

#[async_trait::async_trait]
pub trait HealthCheck: Send + Sync {
    fn category(&self) -> &'static str;

    /// `Ok(detail)` when the service answered, `Err(reason)` otherwise.
    async fn check(&self) -> Result<String, String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub category: &'static str,
    pub healthy: bool,
    pub detail: String,
}

/// Explicit table of probes, run in registration order.
#[derive(Default)]
pub struct HealthRegistry {
    checks: Vec<Arc<dyn HealthCheck>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, check: Arc<dyn HealthCheck>) {
        self.checks.push(check);
    }

    pub async fn run_all(&self) -> Vec<CheckReport> {
        let mut reports = Vec::with_capacity(self.checks.len());
        for check in &self.checks {
            let category = check.category();
            let report = match check.check().await {
                Ok(detail) => {
                    info!(category, detail, "health check passed");
                    CheckReport {
                        category,
                        healthy: true,
                        detail,
                    }
                }
                Err(detail) => {
                    warn!(category, detail, "health check failed");
                    CheckReport {
                        category,
                        healthy: false,
                        detail,
                    }
                }
            };
            reports.push(report);
        }
        reports
    }
}

pub struct CacheCheck {
    store: Arc<dyn KeyStore>,
}

impl CacheCheck {
    pub fn new(store: Arc<dyn KeyStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl HealthCheck for CacheCheck {
    fn category(&self) -> &'static str {
        "cache"
    }

    async fn check(&self) -> Result<String, String> {
        self.store
            .get(CACHE_PROBE_KEY)
            .await
            .map(|_| "reachable".to_string())
            .map_err(|error| error.to_string())
    }
}

pub struct BrokerCheck {
    broker: Arc<dyn MessageBroker>,
}

impl BrokerCheck {
    pub fn new(broker: Arc<dyn MessageBroker>) -> Self {
        Self { broker }
    }
}

#[async_trait::async_trait]
impl HealthCheck for BrokerCheck {
    fn category(&self) -> &'static str {
        "broker"
    }

    async fn check(&self) -> Result<String, String> {
        self.broker
            .workers()
            .await
            .map(|workers| format!("{} workers registered", workers.len()))
            .map_err(|error| error.to_string())
    }
}

pub struct ClusterCheck {
    manager: Arc<dyn WorkloadManager>,
    job_prefix: String,
}

impl ClusterCheck {
    pub fn new(manager: Arc<dyn WorkloadManager>, job_prefix: impl Into<String>) -> Self {
        Self {
            manager,
            job_prefix: job_prefix.into(),
        }
    }
}

#[async_trait::async_trait]
impl HealthCheck for ClusterCheck {
    fn category(&self) -> &'static str {
        "cluster"
    }

    async fn check(&self) -> Result<String, String> {
        self.manager
            .list(Some(&self.job_prefix))
            .await
            .map(|jobs| format!("{} jobs listed", jobs.len()))
            .map_err(|error| error.to_string())
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
