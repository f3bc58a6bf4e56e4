// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A full maintenance run over a real on-disk study folder.

use dm_cache::MemoryStore;
use dm_core::{FakeClock, MaintenanceSettings};
use dm_maintenance::{
    cross_reference, render_action_log, render_content_summary, scan, schedule_hashes,
    ActionKind, HashIndex, MaintenancePlan, StudyLock,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn seed_study(root: &TempDir) {
    let base = root.path();
    std::fs::write(
        base.join("i_Investigation.txt"),
        "Study File Name\t\"s_MTBLS1_samples.txt\"\n\
         Study Assay File Name\t\"a_MTBLS1_assay.txt\"\n",
    )
    .unwrap();
    std::fs::write(base.join("s_MTBLS1_samples.txt"), "Sample Name\nsample1\n").unwrap();
    std::fs::write(
        base.join("a_MTBLS1_assay.txt"),
        "Sample Name\tRaw Spectral Data File\tMetabolite Assignment File\n\
         sample1\tR\u{f6}ntgen data+v2.mzML\tm_MTBLS1_maf.txt\n",
    )
    .unwrap();
    std::fs::write(base.join("m_MTBLS1_maf.txt"), "database_identifier\n").unwrap();
    std::fs::create_dir(base.join("FILES")).unwrap();
    std::fs::write(base.join("FILES/R\u{f6}ntgen data+v2.mzML"), b"spectra").unwrap();
    std::fs::write(base.join("FILES/.DS_Store"), b"junk").unwrap();
    std::fs::create_dir(base.join("FILES/empty")).unwrap();
}

#[test]
fn a_study_folder_is_scanned_normalised_and_reported() {
    let root = TempDir::new().unwrap();
    seed_study(&root);
    let settings = MaintenanceSettings::default();

    let descriptors = scan(root.path(), &settings.stop_folder_extensions).unwrap();
    let mut plan = MaintenancePlan::new("MTBLS1", descriptors);
    plan.normalise(&settings);

    assert_eq!(
        plan.entries["FILES/R\u{f6}ntgen data+v2.mzML"],
        "FILES/Rontgen_data_PLUS_v2.mzML"
    );
    assert_eq!(plan.entries["FILES/.DS_Store"], "");
    assert_eq!(plan.entries["FILES/empty"], "");

    let referenced = cross_reference(&mut plan, root.path());
    assert!(referenced.metadata.contains(&"a_MTBLS1_assay.txt".to_string()));
    // The assay cites the original name; the plan already renamed it, so
    // the citation is reported as missing on disk.
    let fixes: Vec<_> = plan
        .actions
        .iter()
        .filter(|a| a.kind == ActionKind::Fix)
        .collect();
    assert_eq!(fixes.len(), 1);
    assert_eq!(fixes[0].input, "R\u{f6}ntgen data+v2.mzML");

    schedule_hashes(&mut plan, &HashIndex::default());
    let hashed = plan
        .actions
        .iter()
        .filter(|a| a.kind == ActionKind::CalculateSha256)
        .count();
    // Four metadata files plus the surviving data file.
    assert_eq!(hashed, 5);

    let log = render_action_log(&plan);
    assert!(log.starts_with("STUDY_ID\tFILE_PATH\tORDER\tACTION\tINPUT\tOUTPUT\tDESCRIPTION\n"));
    assert!(log.contains(
        "SANITISE_FILE\tFILES/R\u{f6}ntgen data+v2.mzML\tFILES/Rontgen_data_PLUS_v2.mzML"
    ));

    let summary = render_content_summary(&plan, &referenced, &HashIndex::default());
    assert!(summary.contains("\tdata\t"));
    assert!(summary.contains("FILES/Rontgen_data_PLUS_v2.mzML"));
    assert!(!summary.contains(".DS_Store"));
}

#[tokio::test]
async fn a_second_maintenance_run_observes_the_study_lock() {
    let store = Arc::new(MemoryStore::new(FakeClock::new()));
    let ttl = Duration::from_secs(600);

    let lock = StudyLock::acquire(store.clone(), "MTBLS1", ttl)
        .await
        .unwrap()
        .expect("first run takes the lock");
    assert!(StudyLock::acquire(store.clone(), "MTBLS1", ttl)
        .await
        .unwrap()
        .is_none());

    lock.release().await.unwrap();
    assert!(StudyLock::acquire(store, "MTBLS1", ttl)
        .await
        .unwrap()
        .is_some());
}
