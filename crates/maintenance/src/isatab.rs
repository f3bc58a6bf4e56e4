// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ISA-Tab cross-referencing.
//!
//! Reads the study's investigation file and each assay's file columns,
//! enforces study-id-prefixed metadata filenames, and flags referenced
//! files that are missing on disk. Metadata problems never abort a
//! maintenance run; they surface as `FIX` entries in the action log.

use crate::plan::{ActionKind, ActionLogEntry, MaintenancePlan};
use std::collections::HashSet;
use std::path::Path;

pub const INVESTIGATION_FILE: &str = "i_Investigation.txt";

const STUDY_FILE_KEY: &str = "Study File Name";
const ASSAY_FILE_KEY: &str = "Study Assay File Name";

/// Assay columns whose cells name files on disk.
const FILE_COLUMNS: [&str; 4] = [
    "Raw Spectral Data File",
    "Derived Spectral Data File",
    "Free Induction Decay Data File",
    "Acquisition Parameter Data File",
];
const MAF_COLUMN: &str = "Metabolite Assignment File";

/// What the study's metadata refers to, for the content summary.
#[derive(Debug, Clone, Default)]
pub struct ReferencedFiles {
    /// Metadata files, by their (possibly renamed) planned name
    pub metadata: Vec<String>,
    /// Data files as cited in assay file columns
    pub data: HashSet<String>,
}

impl ReferencedFiles {
    pub fn is_referenced(&self, planned_path: &str) -> bool {
        if self.metadata.iter().any(|m| m == planned_path) {
            return true;
        }
        self.data.contains(planned_path)
            || planned_path
                .strip_prefix("FILES/")
                .is_some_and(|rest| self.data.contains(rest))
    }
}

/// Pass 9: cross-reference the plan against the study's ISA-Tab metadata.
pub fn cross_reference(plan: &mut MaintenancePlan, metadata_root: &Path) -> ReferencedFiles {
    let mut referenced = ReferencedFiles::default();

    let investigation_path = metadata_root.join(INVESTIGATION_FILE);
    let investigation = match std::fs::read_to_string(&investigation_path) {
        Ok(content) => content,
        Err(error) => {
            plan.actions.push(
                fix(INVESTIGATION_FILE)
                    .describe(format!("investigation file unreadable: {error}")),
            );
            return referenced;
        }
    };
    referenced.metadata.push(INVESTIGATION_FILE.to_string());

    let (samples, assays) = parse_investigation(&investigation);
    for sample in samples {
        let kept = enforce_prefix(plan, &sample, "s_", INVESTIGATION_FILE);
        require_on_disk(plan, &kept);
        referenced.metadata.push(kept);
    }

    for assay in assays {
        let kept = enforce_prefix(plan, &assay, "a_", INVESTIGATION_FILE);
        require_on_disk(plan, &kept);
        referenced.metadata.push(kept.clone());

        // Columns are read from the file as it is on disk today.
        let assay_path = metadata_root.join(&assay);
        let content = match std::fs::read_to_string(&assay_path) {
            Ok(content) => content,
            Err(error) => {
                plan.actions.push(
                    fix(&assay)
                        .describe(format!("assay file unreadable: {error}")),
                );
                continue;
            }
        };
        let (data_files, maf_files) = parse_assay(&content);
        for maf in maf_files {
            let kept = enforce_prefix(plan, &maf, "m_", &assay);
            require_on_disk(plan, &kept);
            referenced.metadata.push(kept);
        }
        for data_file in data_files {
            require_data_on_disk(plan, &data_file);
            referenced.data.insert(data_file);
        }
    }
    referenced
}

fn fix(path: &str) -> ActionLogEntry {
    ActionLogEntry::new(ActionKind::Fix, path, "").at(path)
}

/// Metadata filenames carry the study id: `a_<study_id>_…`. Files named
/// otherwise are renamed, and the citing file gets an `UPDATE_CONTENT`.
fn enforce_prefix(
    plan: &mut MaintenancePlan,
    name: &str,
    prefix: &str,
    citing_file: &str,
) -> String {
    let Some(rest) = name.strip_prefix(prefix) else {
        return name.to_string();
    };
    let wanted = format!("{}{}_", prefix, plan.study_id);
    if name.starts_with(&wanted) {
        return name.to_string();
    }
    let renamed = format!("{wanted}{rest}");
    let scanned = plan
        .entries
        .iter()
        .find(|(_, planned)| planned.as_str() == name)
        .map(|(s, _)| s.clone());
    if let Some(scanned) = &scanned {
        plan.entries.insert(scanned.clone(), renamed.clone());
    }
    plan.actions.push(ActionLogEntry {
        kind: ActionKind::Rename,
        path: scanned.unwrap_or_else(|| name.to_string()),
        input: name.to_string(),
        output: renamed.clone(),
        description: "metadata filename must carry the study id".to_string(),
    });
    plan.actions.push(ActionLogEntry {
        kind: ActionKind::UpdateContent,
        path: citing_file.to_string(),
        input: citing_file.to_string(),
        output: citing_file.to_string(),
        description: format!("cites {name}; update to {renamed}"),
    });
    renamed
}

/// Referenced metadata file absent from the plan → diagnostic only.
fn require_on_disk(plan: &mut MaintenancePlan, name: &str) {
    let present = plan
        .entries
        .values()
        .any(|planned| planned.as_str() == name);
    if !present {
        plan.actions
            .push(fix(name).describe("referenced by metadata but missing on disk"));
    }
}

/// Data files are cited relative to the study folder or to `FILES/`.
fn require_data_on_disk(plan: &mut MaintenancePlan, name: &str) {
    let with_prefix = format!("FILES/{name}");
    let present = plan
        .entries
        .values()
        .any(|planned| planned.as_str() == name || planned.as_str() == with_prefix);
    if !present {
        plan.actions
            .push(fix(name).describe("referenced by assay but missing on disk"));
    }
}

fn unquote(token: &str) -> &str {
    token.trim().trim_matches('"')
}

/// Investigation format: `<key>\t"value"\t"value"…` line per key.
fn parse_investigation(content: &str) -> (Vec<String>, Vec<String>) {
    let mut samples = Vec::new();
    let mut assays = Vec::new();
    for line in content.lines() {
        let mut tokens = line.split('\t');
        let Some(key) = tokens.next() else { continue };
        let values = tokens.map(unquote).filter(|v| !v.is_empty());
        match key.trim() {
            STUDY_FILE_KEY => samples.extend(values.map(str::to_string)),
            ASSAY_FILE_KEY => assays.extend(values.map(str::to_string)),
            _ => {}
        }
    }
    (samples, assays)
}

/// Assay format: TSV with a header row naming each column.
fn parse_assay(content: &str) -> (Vec<String>, Vec<String>) {
    let mut lines = content.lines();
    let Some(header) = lines.next() else {
        return (Vec::new(), Vec::new());
    };
    let columns: Vec<&str> = header.split('\t').map(unquote).collect();
    let file_columns: Vec<usize> = columns
        .iter()
        .enumerate()
        .filter(|(_, name)| FILE_COLUMNS.contains(name))
        .map(|(i, _)| i)
        .collect();
    let maf_columns: Vec<usize> = columns
        .iter()
        .enumerate()
        .filter(|(_, name)| **name == MAF_COLUMN)
        .map(|(i, _)| i)
        .collect();

    let mut data_files = Vec::new();
    let mut maf_files = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for line in lines {
        let cells: Vec<&str> = line.split('\t').map(unquote).collect();
        for &i in &file_columns {
            if let Some(cell) = cells.get(i).filter(|c| !c.is_empty()) {
                if seen.insert(cell.to_string()) {
                    data_files.push(cell.to_string());
                }
            }
        }
        for &i in &maf_columns {
            if let Some(cell) = cells.get(i).filter(|c| !c.is_empty()) {
                if seen.insert(cell.to_string()) {
                    maf_files.push(cell.to_string());
                }
            }
        }
    }
    (data_files, maf_files)
}

#[cfg(test)]
#[path = "isatab_tests.rs"]
mod tests;
