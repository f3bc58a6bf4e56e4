// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::path::Path;
use yare::parameterized;

fn roots() -> StudySettings {
    StudySettings {
        metadata_root: PathBuf::from("/data/metadata"),
        internal_root: PathBuf::from("/data/internal"),
        audit_root: PathBuf::from("/data/audit"),
        ftp_public_root: PathBuf::from("/ftp/public"),
        ftp_private_root: PathBuf::from("/ftp/private"),
        storage_root: PathBuf::from("/storage"),
    }
}

fn layout() -> StudyLayout {
    let id = StudyId::parse("MTBLS42").unwrap();
    StudyLayout::new(id, "c0ffee", roots())
}

#[test]
fn plain_areas_use_the_study_id() {
    let l = layout();
    assert_eq!(l.path(StudyArea::Metadata), Path::new("/data/metadata/MTBLS42"));
    assert_eq!(l.path(StudyArea::Storage), Path::new("/storage/MTBLS42"));
}

#[test]
fn ftp_areas_use_the_obfuscated_folder() {
    let l = layout();
    assert_eq!(
        l.path(StudyArea::FtpPrivate),
        Path::new("/ftp/private/mtbls42-c0ffee")
    );
    assert_eq!(
        l.path(StudyArea::FtpPublic),
        Path::new("/ftp/public/mtbls42-c0ffee")
    );
}

#[parameterized(
    storage_submitted = { StudyArea::Storage, StudyStatus::Submitted, false },
    storage_public = { StudyArea::Storage, StudyStatus::Public, false },
    metadata_in_curation = { StudyArea::Metadata, StudyStatus::InCuration, true },
    metadata_public = { StudyArea::Metadata, StudyStatus::Public, false },
    metadata_dormant = { StudyArea::Metadata, StudyStatus::Dormant, false },
    private_ftp_in_review = { StudyArea::FtpPrivate, StudyStatus::InReview, true },
    private_ftp_public = { StudyArea::FtpPrivate, StudyStatus::Public, false },
    internal_always = { StudyArea::Internal, StudyStatus::Dormant, true },
)]
fn writability_matrix(area: StudyArea, status: StudyStatus, expect: bool) {
    assert_eq!(StudyLayout::is_writable(area, status), expect);
}
