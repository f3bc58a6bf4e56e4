// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration hot-reload.
//!
//! The config file is re-stat'd on a timer; a changed mtime triggers a
//! full re-parse and an atomic swap of the shared `Arc<Settings>`.
//! Consumers clone the `Arc` once per operation, so a swap never changes
//! settings mid-operation. A reload that fails to parse keeps the
//! previous tree.

use dm_core::{ConfigError, Settings};
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{info, warn};

pub type SharedSettings = Arc<RwLock<Arc<Settings>>>;

pub struct ConfigWatcher {
    config_path: PathBuf,
    secrets_dir: PathBuf,
    shared: SharedSettings,
    last_mtime: Option<SystemTime>,
}

impl ConfigWatcher {
    /// Load the initial tree and return the watcher plus the shared handle.
    pub fn load(
        config_path: PathBuf,
        secrets_dir: PathBuf,
    ) -> Result<(Self, SharedSettings), ConfigError> {
        let settings = Settings::load(&config_path, Some(&secrets_dir))?;
        let last_mtime = mtime_of(&config_path);
        let shared: SharedSettings = Arc::new(RwLock::new(Arc::new(settings)));
        let watcher = Self {
            config_path,
            secrets_dir,
            shared: Arc::clone(&shared),
            last_mtime,
        };
        Ok((watcher, shared))
    }

    /// The current tree; cheap to call, hold per operation.
    pub fn current(&self) -> Arc<Settings> {
        Arc::clone(&self.shared.read())
    }

    /// Re-stat the file and swap in a fresh tree when it changed.
    /// Returns whether a swap happened.
    pub fn poll_once(&mut self) -> bool {
        let Some(mtime) = mtime_of(&self.config_path) else {
            warn!(path = %self.config_path.display(), "config file went missing; keeping current settings");
            return false;
        };
        if self.last_mtime == Some(mtime) {
            return false;
        }
        self.last_mtime = Some(mtime);
        match Settings::load(&self.config_path, Some(&self.secrets_dir)) {
            Ok(settings) => {
                *self.shared.write() = Arc::new(settings);
                info!(path = %self.config_path.display(), "configuration reloaded");
                true
            }
            Err(error) => {
                warn!(%error, "config reload failed; keeping previous settings");
                false
            }
        }
    }
}

fn mtime_of(path: &std::path::Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
#[path = "reload_tests.rs"]
mod tests;
