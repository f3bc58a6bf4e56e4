// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dm-cache: the shared TTL key/value store.
//!
//! The cache is the only cross-process coordination point: task
//! descriptors, reconciliation locks, and shutdown debounce markers all
//! live here. Any worker or controller may read any key; by convention
//! only the owner of a task writes its key.

pub mod descriptor;
pub mod store;

pub use descriptor::DescriptorStore;
pub use store::{CacheError, KeyStore, RedisStore};

#[cfg(any(test, feature = "test-support"))]
pub use store::MemoryStore;

/// Operational banner message key (read by the web tier, not the core).
pub const BANNER_KEY: &str = "metabolights:banner:message";
