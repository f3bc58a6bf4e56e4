// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::HashMap;
use tempfile::TempDir;

fn stop_extensions() -> Vec<String> {
    [".d", ".raw", ".m", ".pro"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn by_path(descriptors: Vec<FileDescriptor>) -> HashMap<String, FileDescriptor> {
    descriptors
        .into_iter()
        .map(|d| (d.rel_path.clone(), d))
        .collect()
}

#[test]
fn scan_describes_files_and_directories() {
    let tmp = TempDir::new().unwrap();
    std::fs::create_dir(tmp.path().join("FILES")).unwrap();
    std::fs::write(tmp.path().join("FILES/a.mzML"), b"12345").unwrap();
    std::fs::create_dir(tmp.path().join("FILES/empty")).unwrap();

    let scanned = by_path(scan(tmp.path(), &stop_extensions()).unwrap());
    assert_eq!(scanned.len(), 3);

    let file = &scanned["FILES/a.mzML"];
    assert!(!file.is_directory);
    assert_eq!(file.size_bytes, 5);
    assert!(file.modified_epoch > 0);

    let dir = &scanned["FILES"];
    assert!(dir.is_directory && !dir.is_empty);
    assert!(scanned["FILES/empty"].is_empty);
}

#[test]
fn stop_folders_are_flagged_and_not_descended() {
    let tmp = TempDir::new().unwrap();
    std::fs::create_dir_all(tmp.path().join("FILES/acquisition.d")).unwrap();
    std::fs::write(tmp.path().join("FILES/acquisition.d/frame.bin"), b"xx").unwrap();

    let scanned = by_path(scan(tmp.path(), &stop_extensions()).unwrap());
    let stop = &scanned["FILES/acquisition.d"];
    assert!(stop.is_stop_folder);
    assert!(!stop.is_empty);
    assert!(
        !scanned.contains_key("FILES/acquisition.d/frame.bin"),
        "stop folder contents must be opaque"
    );
}

#[test]
fn stop_folder_extension_matching_is_case_insensitive() {
    let tmp = TempDir::new().unwrap();
    std::fs::create_dir_all(tmp.path().join("sample.RAW")).unwrap();

    let scanned = by_path(scan(tmp.path(), &stop_extensions()).unwrap());
    assert!(scanned["sample.RAW"].is_stop_folder);
}
