// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed access to task descriptors in the shared cache.

use crate::{CacheError, KeyStore};
use dm_core::{task_key, TaskDescriptor};
use std::sync::Arc;
use std::time::Duration;

/// Reads and writes [`TaskDescriptor`]s at `<task_name>:<study_id>`.
#[derive(Clone)]
pub struct DescriptorStore {
    store: Arc<dyn KeyStore>,
    ttl: Duration,
}

impl DescriptorStore {
    pub fn new(store: Arc<dyn KeyStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Load a descriptor. Malformed cache values are treated as absent.
    pub async fn load(
        &self,
        task_name: &str,
        study_id: &str,
    ) -> Result<Option<TaskDescriptor>, CacheError> {
        let key = task_key(task_name, study_id);
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(None);
        };
        let parsed = TaskDescriptor::parse_wire(&raw);
        if parsed.is_none() {
            tracing::debug!(key, raw, "discarding malformed task descriptor");
        }
        Ok(parsed)
    }

    pub async fn save(
        &self,
        task_name: &str,
        study_id: &str,
        descriptor: &TaskDescriptor,
    ) -> Result<(), CacheError> {
        let key = task_key(task_name, study_id);
        self.store.set(&key, &descriptor.to_wire(), self.ttl).await
    }

    pub async fn clear(&self, task_name: &str, study_id: &str) -> Result<(), CacheError> {
        self.store.delete(&task_key(task_name, study_id)).await
    }
}

#[cfg(test)]
#[path = "descriptor_tests.rs"]
mod tests;
