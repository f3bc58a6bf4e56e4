// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-study TSV reports.
//!
//! Two files are written next to the study's internal area: the action
//! log (one row per planned mutation, in plan order) and the content
//! summary (one row per live file in the final plan).

use crate::isatab::ReferencedFiles;
use crate::plan::MaintenancePlan;
use crate::sha::{is_metadata_file, HashIndex};
use crate::MaintenanceError;
use dm_core::{format_size, format_utc};
use std::fmt::Write as _;
use std::path::Path;

const ACTION_LOG_HEADER: &str = "STUDY_ID\tFILE_PATH\tORDER\tACTION\tINPUT\tOUTPUT\tDESCRIPTION";
const CONTENT_SUMMARY_HEADER: &str = "STUDY_ID\tCATEGORY\tREFERENCED\tFILE_PATH\tSIZE\t\
MODIFIED_UTC\tSHA256\tMODIFIED_TIMESTAMP\tSIZE_BYTES\tPREVIOUS_FILE_PATH";

/// Render the action log TSV.
pub fn render_action_log(plan: &MaintenancePlan) -> String {
    let mut out = String::from(ACTION_LOG_HEADER);
    out.push('\n');
    for (order, action) in plan.actions.iter().enumerate() {
        // Row building over a String cannot fail.
        let _ = writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            plan.study_id,
            action.path,
            order + 1,
            action.kind.as_str(),
            action.input,
            action.output,
            action.description,
        );
    }
    out
}

/// Render the content summary TSV over the final plan.
pub fn render_content_summary(
    plan: &MaintenancePlan,
    referenced: &ReferencedFiles,
    hashes: &HashIndex,
) -> String {
    let mut out = String::from(CONTENT_SUMMARY_HEADER);
    out.push('\n');
    for (scanned, planned) in &plan.entries {
        if planned.is_empty() {
            continue;
        }
        let Some(descriptor) = plan.files.get(scanned) else {
            continue;
        };
        let category = if descriptor.is_directory {
            "directory"
        } else if is_metadata_file(planned) {
            "metadata"
        } else {
            "data"
        };
        let previous = if scanned == planned { "" } else { scanned.as_str() };
        let _ = writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            plan.study_id,
            category,
            referenced.is_referenced(planned),
            planned,
            format_size(descriptor.size_bytes),
            format_utc(descriptor.modified_epoch),
            hashes.get(planned).unwrap_or(""),
            descriptor.modified_epoch,
            descriptor.size_bytes,
            previous,
        );
    }
    out
}

/// Write the action log TSV to `path`.
pub fn write_action_log(path: &Path, plan: &MaintenancePlan) -> Result<(), MaintenanceError> {
    std::fs::write(path, render_action_log(plan)).map_err(|source| MaintenanceError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Write the content summary TSV to `path`.
pub fn write_content_summary(
    path: &Path,
    plan: &MaintenancePlan,
    referenced: &ReferencedFiles,
    hashes: &HashIndex,
) -> Result<(), MaintenanceError> {
    std::fs::write(path, render_content_summary(plan, referenced, hashes)).map_err(|source| {
        MaintenanceError::Io {
            path: path.to_path_buf(),
            source,
        }
    })
}

#[cfg(test)]
#[path = "report_tests.rs"]
mod tests;
