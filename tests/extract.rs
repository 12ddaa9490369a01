mod common;

use std::fs;

use assert_matches::assert_matches;

use kira_genome_resolver::error::ResolverError;
use kira_genome_resolver::extract::{ArchiveExtractor, Extraction};
use kira_genome_resolver::store::COMPLETION_MARKER;

use common::zip_bytes;

#[test]
fn keeps_annotations_and_nested_knownclusterblast() {
    let temp = tempfile::tempdir().unwrap();
    let archive = temp.path().join("Y.zip");
    fs::write(
        &archive,
        zip_bytes(&[
            ("X.gbk", b"LOCUS".as_slice()),
            ("X.json", b"{}".as_slice()),
            ("notes.txt", b"skip me".as_slice()),
            ("Y/knownclusterblast/report.txt", b"hits".as_slice()),
        ]),
    )
    .unwrap();
    let output = temp.path().join("antismash").join("Y");

    let extractor = ArchiveExtractor::new("Y".parse().unwrap());
    let result = extractor.extract(&archive, &output).unwrap();
    assert_eq!(result, Extraction::Extracted { entries: 3 });

    assert!(output.join("X.gbk").is_file());
    assert!(output.join("X.json").is_file());
    assert!(output.join("Y/knownclusterblast/report.txt").is_file());
    assert!(!output.join("notes.txt").exists());
    assert!(output.join(COMPLETION_MARKER).is_file());
}

#[test]
fn completion_marker_skips_archive() {
    let temp = tempfile::tempdir().unwrap();
    let archive = temp.path().join("X.zip");
    fs::write(&archive, zip_bytes(&[("X.gbk", b"LOCUS".as_slice())])).unwrap();
    let output = temp.path().join("out");
    let extractor = ArchiveExtractor::new("X".parse().unwrap());

    extractor.extract(&archive, &output).unwrap();
    fs::remove_file(&archive).unwrap();

    let again = extractor.extract(&archive, &output).unwrap();
    assert_eq!(again, Extraction::AlreadyComplete);
}

#[test]
fn unreadable_archive_leaves_no_marker() {
    let temp = tempfile::tempdir().unwrap();
    let archive = temp.path().join("X.zip");
    fs::write(&archive, b"garbage").unwrap();
    let output = temp.path().join("out");

    let err = ArchiveExtractor::new("X".parse().unwrap())
        .extract(&archive, &output)
        .unwrap_err();
    assert_matches!(err, ResolverError::Extraction(_));
    assert!(!output.join(COMPLETION_MARKER).exists());
}

#[test]
fn traversal_entries_are_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let archive = temp.path().join("X.zip");
    fs::write(&archive, zip_bytes(&[("../escape.gbk", b"LOCUS".as_slice())])).unwrap();
    let output = temp.path().join("out");

    let err = ArchiveExtractor::new("X".parse().unwrap())
        .extract(&archive, &output)
        .unwrap_err();
    assert_matches!(err, ResolverError::Extraction(_));
    assert!(!temp.path().join("escape.gbk").exists());
    assert!(!output.join(COMPLETION_MARKER).exists());
}
