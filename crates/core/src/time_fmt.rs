// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared size and timestamp formatting for reports.

use chrono::{DateTime, Utc};

const KIB: f64 = 1024.0;
const MIB: f64 = 1024.0 * 1024.0;
const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Format a byte count as `N.NN{KiB|MiB|GiB}`, e.g. `1.00MiB`.
pub fn format_size(bytes: u64) -> String {
    let b = bytes as f64;
    if b < MIB {
        format!("{:.2}KiB", b / KIB)
    } else if b < GIB {
        format!("{:.2}MiB", b / MIB)
    } else {
        format!("{:.2}GiB", b / GIB)
    }
}

/// Format epoch seconds as `YYYY-MM-DDTHH:MM:SS` in UTC.
///
/// Out-of-range timestamps render as the epoch origin rather than failing
/// a report row.
pub fn format_utc(epoch: u64) -> String {
    let dt = DateTime::<Utc>::from_timestamp(epoch as i64, 0)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    dt.format("%Y-%m-%dT%H:%M:%S").to_string()
}

#[cfg(test)]
#[path = "time_fmt_tests.rs"]
mod tests;
