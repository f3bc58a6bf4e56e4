// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The maintenance plan and its normalisation passes.
//!
//! The plan is a map `scanned path → planned path` (planned `""` means
//! removal) plus an ordered action log. Passes run in a fixed order and
//! each appends one action per entry it changes; every pass is idempotent
//! on its own output. Nothing here touches the filesystem.

use crate::scan::FileDescriptor;
use dm_core::MaintenanceSettings;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Longest path segment the planner will keep.
const MAX_SEGMENT_LEN: usize = 250;

/// Everything the engine can decide to do to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Rename,
    Compress,
    Recompress,
    Uncompress,
    RemoveEmptyFolder,
    RemoveHiddenFile,
    SanitiseFile,
    SanitisePath,
    MakeUniqueFilename,
    SplitFolder,
    RemoveCompressedFile,
    UpdateContent,
    Fix,
    CalculateSha256,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Rename => "RENAME",
            ActionKind::Compress => "COMPRESS",
            ActionKind::Recompress => "RECOMPRESS",
            ActionKind::Uncompress => "UNCOMPRESS",
            ActionKind::RemoveEmptyFolder => "REMOVE_EMPTY_FOLDER",
            ActionKind::RemoveHiddenFile => "REMOVE_HIDDEN_FILE",
            ActionKind::SanitiseFile => "SANITISE_FILE",
            ActionKind::SanitisePath => "SANITISE_PATH",
            ActionKind::MakeUniqueFilename => "MAKE_UNIQUE_FILENAME",
            ActionKind::SplitFolder => "SPLIT_FOLDER",
            ActionKind::RemoveCompressedFile => "REMOVE_COMPRESSED_FILE",
            ActionKind::UpdateContent => "UPDATE_CONTENT",
            ActionKind::Fix => "FIX",
            ActionKind::CalculateSha256 => "CALCULATE_SHA256",
        }
    }
}

/// One planned mutation, in plan order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionLogEntry {
    pub kind: ActionKind,
    /// Study-relative path of the affected entry, as it was scanned
    pub path: String,
    /// Planned path going into the pass that produced this action
    pub input: String,
    pub output: String,
    pub description: String,
}

impl ActionLogEntry {
    pub(crate) fn new(kind: ActionKind, input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            kind,
            path: String::new(),
            input: input.into(),
            output: output.into(),
            description: String::new(),
        }
    }

    pub(crate) fn at(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub(crate) fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Per-study plan state.
#[derive(Debug, Clone)]
pub struct MaintenancePlan {
    pub study_id: String,
    /// `scanned rel_path → planned rel_path`; `""` marks removal
    pub entries: IndexMap<String, String>,
    /// Scan flags, keyed by the scanned path
    pub files: HashMap<String, FileDescriptor>,
    pub actions: Vec<ActionLogEntry>,
}

impl MaintenancePlan {
    /// Identity plan over a scan.
    pub fn new(study_id: impl Into<String>, descriptors: Vec<FileDescriptor>) -> Self {
        let mut entries = IndexMap::with_capacity(descriptors.len());
        let mut files = HashMap::with_capacity(descriptors.len());
        for descriptor in descriptors {
            entries.insert(descriptor.rel_path.clone(), descriptor.rel_path.clone());
            files.insert(descriptor.rel_path.clone(), descriptor);
        }
        Self {
            study_id: study_id.into(),
            entries,
            files,
            actions: Vec::new(),
        }
    }

    /// Run passes 1-8 in order. Metadata cross-referencing and hash
    /// scheduling are separate, as they read study metadata.
    pub fn normalise(&mut self, settings: &MaintenanceSettings) {
        self.remove_hidden();
        self.remove_empty_folders();
        self.sanitise_filenames();
        self.compress_stop_folders();
        self.recompress_nonstandard(settings);
        self.remove_redundant_pairs();
        self.split_large_folders(settings);
        self.sanitise_directory_paths();
    }

    fn record(&mut self, scanned: &str, planned: String, mut action: ActionLogEntry) {
        action.path = scanned.to_string();
        self.entries.insert(scanned.to_string(), planned);
        self.actions.push(action);
    }

    /// Live `(scanned, planned)` pairs, skipping removals.
    fn live(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .filter(|(_, planned)| !planned.is_empty())
            .map(|(scanned, planned)| (scanned.clone(), planned.clone()))
            .collect()
    }

    fn is_directory(&self, scanned: &str) -> bool {
        self.files.get(scanned).is_some_and(|f| f.is_directory)
    }

    /// Pass 1: hidden files and anything beneath a hidden directory.
    fn remove_hidden(&mut self) {
        for (scanned, planned) in self.live() {
            if planned.split('/').any(|segment| segment.starts_with('.')) {
                self.record(
                    &scanned,
                    String::new(),
                    ActionLogEntry::new(ActionKind::RemoveHiddenFile, planned, ""),
                );
            }
        }
    }

    /// Pass 2: directories scanned as empty.
    fn remove_empty_folders(&mut self) {
        for (scanned, planned) in self.live() {
            let empty = self
                .files
                .get(&scanned)
                .is_some_and(|f| f.is_directory && f.is_empty);
            if empty {
                self.record(
                    &scanned,
                    String::new(),
                    ActionLogEntry::new(ActionKind::RemoveEmptyFolder, planned, ""),
                );
            }
        }
    }

    /// Pass 3: transliterate file basenames to the portable charset, and
    /// disambiguate collisions with a numeric prefix.
    fn sanitise_filenames(&mut self) {
        let mut taken: HashMap<String, HashSet<String>> = HashMap::new();
        for (scanned, planned) in self.live() {
            if self.is_directory(&scanned) {
                continue;
            }
            let (parent, name) = split_parent(&planned);
            let sanitised = sanitise_segment(name);
            let slot = taken.entry(parent.to_string()).or_default();
            let (unique, collided) = uniquify(&sanitised, slot);
            slot.insert(unique.clone());

            if unique == name {
                continue;
            }
            let new_planned = join_parent(parent, &unique);
            if collided {
                self.record(
                    &scanned,
                    new_planned.clone(),
                    ActionLogEntry::new(ActionKind::MakeUniqueFilename, &planned, &new_planned)
                        .describe("basename collides after sanitisation"),
                );
            } else {
                self.record(
                    &scanned,
                    new_planned.clone(),
                    ActionLogEntry::new(ActionKind::SanitiseFile, &planned, &new_planned),
                );
            }
        }
    }

    /// Pass 4: stop folders are archived as a unit.
    fn compress_stop_folders(&mut self) {
        for (scanned, planned) in self.live() {
            let stop = self.files.get(&scanned).is_some_and(|f| f.is_stop_folder);
            if stop && !planned.ends_with(".zip") {
                let zipped = format!("{planned}.zip");
                self.record(
                    &scanned,
                    zipped.clone(),
                    ActionLogEntry::new(ActionKind::Compress, &planned, &zipped),
                );
            }
        }
    }

    /// Pass 5: non-standard compressed extensions are slated for
    /// recompression to zip. The actual recompression is a downstream
    /// datamover job; the plan only renames.
    fn recompress_nonstandard(&mut self, settings: &MaintenanceSettings) {
        // Longest extension first so `.tar.gz` wins over `.gz`.
        let mut extensions = settings.non_standard_compressed_extensions.clone();
        extensions.sort_by_key(|ext| std::cmp::Reverse(ext.len()));
        for (scanned, planned) in self.live() {
            if self.is_directory(&scanned) {
                continue;
            }
            let lower = planned.to_lowercase();
            let Some(ext) = extensions.iter().find(|ext| lower.ends_with(ext.as_str())) else {
                continue;
            };
            let stem = &planned[..planned.len() - ext.len()];
            let zipped = format!("{stem}.zip");
            self.record(
                &scanned,
                zipped.clone(),
                ActionLogEntry::new(ActionKind::Recompress, &planned, &zipped),
            );
        }
    }

    /// Pass 6: `X` next to `X.zip` is redundant. A directory loses to its
    /// archive; an archive loses to its plain-file sibling.
    fn remove_redundant_pairs(&mut self) {
        let live = self.live();
        let by_planned: HashMap<String, String> = live
            .iter()
            .map(|(scanned, planned)| (planned.clone(), scanned.clone()))
            .collect();
        let mut seen_archives: HashSet<String> = HashSet::new();
        for (scanned, planned) in live {
            if let Some(sibling_scanned) = by_planned.get(&format!("{planned}.zip")) {
                if self.is_directory(&scanned) {
                    self.record(
                        &scanned,
                        String::new(),
                        ActionLogEntry::new(ActionKind::RemoveEmptyFolder, &planned, "")
                            .describe("directory already archived"),
                    );
                } else {
                    let zip_scanned = sibling_scanned.clone();
                    let zip_planned = format!("{planned}.zip");
                    self.record(
                        &zip_scanned,
                        String::new(),
                        ActionLogEntry::new(ActionKind::RemoveCompressedFile, &zip_planned, "")
                            .describe("plain sibling present"),
                    );
                }
                continue;
            }
            // Two entries planning to the same archive keep only the first.
            if planned.ends_with(".zip")
                && !self.entries.get(&scanned).is_some_and(String::is_empty)
                && !seen_archives.insert(planned.clone())
            {
                self.record(
                    &scanned,
                    String::new(),
                    ActionLogEntry::new(ActionKind::RemoveCompressedFile, &planned, "")
                        .describe("duplicate archive target"),
                );
            }
        }
    }

    /// Pass 7: bucket oversized folders by partition tag, then extension,
    /// then chunks. Double-extension pairs travel together.
    fn split_large_folders(&mut self, settings: &MaintenanceSettings) {
        let live = self.live();
        let mut by_parent: IndexMap<String, Vec<(String, String)>> = IndexMap::new();
        for (scanned, planned) in &live {
            if self.is_directory(scanned) {
                continue;
            }
            let (parent, _) = split_parent(planned);
            by_parent
                .entry(parent.to_string())
                .or_default()
                .push((scanned.clone(), planned.clone()));
        }

        for (parent, children) in by_parent {
            if children.len() <= settings.max_file_count_on_folder {
                continue;
            }
            // Pair groups: `a.mzML` and `a.mzML.tmp` form one unit.
            let mut groups: IndexMap<String, Vec<(String, String)>> = IndexMap::new();
            for (scanned, planned) in children {
                let (_, name) = split_parent(&planned);
                groups.entry(pair_key(name)).or_default().push((scanned, planned));
            }

            // Bucket by tag + extension of the pair key.
            let mut buckets: IndexMap<String, Vec<(String, Vec<(String, String)>)>> =
                IndexMap::new();
            for (key, members) in groups {
                let tag = partition_tag(&key);
                let ext = extension_of(&key);
                let bucket = match tag {
                    Some(tag) => format!("{tag}_{ext}"),
                    None => ext,
                };
                buckets.entry(bucket).or_default().push((key, members));
            }

            for (bucket, groups) in buckets {
                let member_count: usize = groups.iter().map(|(_, m)| m.len()).sum();
                if member_count < settings.min_file_count_on_splitted_folder {
                    continue;
                }
                let mut chunk = 1usize;
                let mut in_chunk = 0usize;
                for (_, members) in groups {
                    if in_chunk + members.len() > settings.max_file_count_on_splitted_folder
                        && in_chunk > 0
                    {
                        chunk += 1;
                        in_chunk = 0;
                    }
                    in_chunk += members.len();
                    for (scanned, planned) in members {
                        let (_, name) = split_parent(&planned);
                        let target = join_parent(
                            &join_parent(&parent, &format!("{bucket}_{chunk}")),
                            name,
                        );
                        self.record(
                            &scanned,
                            target.clone(),
                            ActionLogEntry::new(ActionKind::SplitFolder, &planned, &target),
                        );
                    }
                }
            }
        }
    }

    /// Pass 8: the directory part of every planned path gets the same
    /// transliteration as basenames did in pass 3.
    fn sanitise_directory_paths(&mut self) {
        for (scanned, planned) in self.live() {
            let is_dir = self.is_directory(&scanned);
            let segments: Vec<&str> = planned.split('/').collect();
            let mut sanitised: Vec<String> = Vec::with_capacity(segments.len());
            for (i, segment) in segments.iter().enumerate() {
                let last = i == segments.len() - 1;
                if last && !is_dir {
                    sanitised.push(segment.to_string()); // basenames done in pass 3
                } else {
                    sanitised.push(sanitise_segment(segment));
                }
            }
            let new_planned = sanitised.join("/");
            if new_planned != planned {
                self.record(
                    &scanned,
                    new_planned.clone(),
                    ActionLogEntry::new(ActionKind::SanitisePath, &planned, &new_planned),
                );
            }
        }
    }
}

/// Transliterate one path segment to `[A-Za-z0-9_.-]`.
///
/// NFKD decomposition first, so accented letters shed their marks rather
/// than becoming `_`; `+` expands to `_PLUS_`; everything else outside
/// the charset maps to `_`; segments are capped at 250 characters.
pub fn sanitise_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for ch in segment.nfkd() {
        if is_combining_mark(ch) {
            continue;
        }
        if ch == '+' {
            out.push_str("_PLUS_");
        } else if ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '-') {
            out.push(ch);
        } else {
            out.push('_');
        }
    }
    out.chars().take(MAX_SEGMENT_LEN).collect()
}

/// Returns the name to use and whether a numeric prefix was needed.
fn uniquify(name: &str, taken: &HashSet<String>) -> (String, bool) {
    if !taken.contains(name) {
        return (name.to_string(), false);
    }
    let mut n = 1;
    loop {
        let candidate = format!("{n}_{name}");
        if !taken.contains(&candidate) {
            return (candidate, true);
        }
        n += 1;
    }
}

fn split_parent(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some((parent, name)) => (parent, name),
        None => ("", path),
    }
}

fn join_parent(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

/// `a.mzML.tmp` shares the fate of `a.mzML`.
fn pair_key(name: &str) -> String {
    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() >= 3 {
        parts[..parts.len() - 1].join(".")
    } else {
        name.to_string()
    }
}

fn extension_of(name: &str) -> String {
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_string())
        .unwrap_or_else(|| "none".to_string())
}

/// Acquisition polarity tag found anywhere in the basename.
fn partition_tag(name: &str) -> Option<&'static str> {
    for tag in ["_NEG", "_POS", "_ALT"] {
        if name.contains(tag) {
            return Some(&tag[1..]);
        }
    }
    None
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;
