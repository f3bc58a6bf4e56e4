// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    small = { 512, "0.50KiB" },
    one_kib = { 1024, "1.00KiB" },
    one_mib = { 1_048_576, "1.00MiB" },
    mixed = { 1_572_864, "1.50MiB" },
    one_gib = { 1_073_741_824, "1.00GiB" },
)]
fn sizes(bytes: u64, expect: &str) {
    assert_eq!(format_size(bytes), expect);
}

#[test]
fn utc_format() {
    // 2024-01-01T10:00:00Z
    assert_eq!(format_utc(1_704_103_200), "2024-01-01T10:00:00");
}

#[test]
fn out_of_range_falls_back_to_origin() {
    assert_eq!(format_utc(u64::MAX), "1970-01-01T00:00:00");
}
