// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction so controllers and caches are testable.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Time source used throughout the workspace.
pub trait Clock: Clone + Send + Sync + 'static {
    /// Monotonic instant for interval arithmetic.
    fn now(&self) -> Instant;

    /// Wall-clock epoch seconds for persisted timestamps.
    fn now_epoch(&self) -> u64;
}

/// Production clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn now_epoch(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

/// Manually-advanced clock for tests.
#[cfg(any(test, feature = "test-support"))]
#[derive(Debug, Clone)]
pub struct FakeClock {
    base: Instant,
    base_epoch: u64,
    offset: std::sync::Arc<parking_lot::Mutex<Duration>>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeClock {
    pub fn new() -> Self {
        Self::at_epoch(1_700_000_000)
    }

    pub fn at_epoch(epoch: u64) -> Self {
        Self {
            base: Instant::now(),
            base_epoch: epoch,
            offset: std::sync::Arc::new(parking_lot::Mutex::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock()
    }

    fn now_epoch(&self) -> u64 {
        self.base_epoch + self.offset.lock().as_secs()
    }
}
