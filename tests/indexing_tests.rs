//! Integration tests: fixture archives indexed into scratch tantivy segments.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use assert_fs::prelude::*;
use predicates::prelude::*;

use listindex::index::store::{Segment, Storage};
use listindex::index::tantivy_store::{StoredDocument, TantivySegment};
use listindex::index::{
    discover_archives, IndexController, IndexLanguage, IndexOptions, RunSummary, TantivyStorage,
};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn options(force: bool, chunk_size: u64) -> IndexOptions {
    IndexOptions {
        force,
        flush_interval: 1000,
        chunk_size,
        url_base: "http://lists.debian.org/".to_string(),
        language: IndexLanguage::default(),
        languages: HashMap::new(),
        default_charset: "iso-8859-1".to_string(),
    }
}

fn storage(prefix: &Path) -> TantivyStorage {
    TantivyStorage::new(prefix, IndexLanguage::default(), 0)
}

fn index_with(prefix: &Path, files: &[PathBuf], options: IndexOptions) -> RunSummary {
    let mut controller = IndexController::new(storage(prefix), options).unwrap();
    controller.run(files, None).unwrap()
}

fn index(prefix: &Path, files: &[&str]) -> RunSummary {
    let files: Vec<PathBuf> = files.iter().map(|f| fixture(f)).collect();
    index_with(prefix, &files, options(false, 1_000_000))
}

fn open_segment(prefix: &Path, ordinal: u32) -> TantivySegment {
    let storage = storage(prefix);
    storage.open(&storage.overflow_path(ordinal)).unwrap()
}

fn stored(prefix: &Path, key: &str) -> StoredDocument {
    open_segment(prefix, 0)
        .stored(key)
        .unwrap()
        .unwrap_or_else(|| panic!("no document stored under {key}"))
}

// ─── End to end ─────────────────────────────────────────────────────

#[test]
fn test_two_message_archive() {
    let temp = assert_fs::TempDir::new().unwrap();
    let prefix = temp.child("listdb");

    let summary = index(prefix.path(), &["debian-project-200709"]);
    assert_eq!(summary.files, 1);
    assert_eq!(summary.documents, 2);
    assert_eq!(summary.duplicates, 0);
    temp.child("listdb-000").assert(predicate::path::is_dir());

    let first = stored(prefix.path(), "Qdebian-project20070900000");
    assert_eq!(first.datecode, "2007-09-10-14-05");
    let lines: Vec<&str> = first.payload.split('\n').collect();
    assert_eq!(
        lines,
        vec![
            "http://lists.debian.org/debian-project/2007/09/msg00000.html",
            "debian-project",
            "0",
            "2007",
            "9",
            "plans for the next release",
            "Joey Hess",
            "joey@kitenet.net",
            "Hello World",
        ]
    );
}

#[test]
fn test_encoded_subject_and_punctuation_runs() {
    let temp = assert_fs::TempDir::new().unwrap();
    let prefix = temp.child("listdb");
    index(prefix.path(), &["debian-project-200709"]);

    let second = stored(prefix.path(), "Qdebian-project20070900001");
    let lines: Vec<&str> = second.payload.split('\n').collect();
    assert_eq!(lines[5], "plans für the next release");
    assert_eq!(lines[6], "Martin F. Krafft");
    assert_eq!(lines[7], "madduck@debian.org");
    assert!(lines[8].ends_with("Sounds good!!! Let's do it."), "{}", lines[8]);
    assert!(!lines[8].contains("> Hello"));
}

#[test]
fn test_rerun_inserts_nothing() {
    let temp = assert_fs::TempDir::new().unwrap();
    let prefix = temp.child("listdb");
    index(prefix.path(), &["debian-project-200709"]);

    let again = index(prefix.path(), &["debian-project-200709"]);
    assert_eq!(again.documents, 0);
    assert_eq!(again.resumed_skips, 2);
    assert_eq!(open_segment(prefix.path(), 0).doc_count().unwrap(), 2);
}

#[test]
fn test_force_regenerates() {
    let temp = assert_fs::TempDir::new().unwrap();
    let prefix = temp.child("listdb");
    index(prefix.path(), &["debian-project-200709"]);

    let forced = index_with(
        prefix.path(),
        &[fixture("debian-project-200709")],
        options(true, 1_000_000),
    );
    assert_eq!(forced.documents, 2);
    assert_eq!(open_segment(prefix.path(), 0).doc_count().unwrap(), 2);
}

// ─── Dedup and spam ─────────────────────────────────────────────────

#[test]
fn test_duplicates_and_spam() {
    let temp = assert_fs::TempDir::new().unwrap();
    let prefix = temp.child("listdb");

    let summary = index(prefix.path(), &["debian-user-200709"]);
    assert_eq!(summary.spam, 1);
    assert_eq!(summary.duplicates, 1);
    assert_eq!(summary.messages, 3);
    assert_eq!(summary.documents, 2);

    let segment = open_segment(prefix.path(), 0);
    assert!(segment.stored("Qdebian-user20070900000").unwrap().is_none());
    let alice = segment.stored("Qdebian-user20070900001").unwrap().unwrap();
    assert!(alice.payload.contains("\nsound card not detected\n"));
    let bob = segment.stored("Qdebian-user20070900002").unwrap().unwrap();
    assert!(bob.payload.ends_with("\nTry loading the snd-hda-intel module."));
}

// ─── MIME selection ─────────────────────────────────────────────────

#[test]
fn test_alternative_uses_html() {
    let temp = assert_fs::TempDir::new().unwrap();
    let prefix = temp.child("listdb");
    index(prefix.path(), &["debian-devel-200710"]);

    let doc = stored(prefix.path(), "Qdebian-devel20071000000");
    assert!(doc.payload.ends_with("\nhtml version"), "{}", doc.payload);
    assert!(!doc.payload.contains("plain version"));
}

// ─── Yearly buckets and dates ───────────────────────────────────────

#[test]
fn test_yearly_bucket() {
    let temp = assert_fs::TempDir::new().unwrap();
    let prefix = temp.child("listdb");
    let summary = index(prefix.path(), &["debian-cd-1999"]);
    assert_eq!(summary.documents, 2);
    assert_eq!(summary.corrected_dates, 1);

    let first = stored(prefix.path(), "Qdebian-cd19990000000");
    assert_eq!(first.datecode, "1999-03-05-11-00");
    assert!(first.payload.starts_with(
        "http://lists.debian.org/debian-cd/1999/msg00000.html\ndebian-cd\n0\n1999\n0\nISO images\n"
    ));

    // Dated ten days into the next year.
    let late = stored(prefix.path(), "Qdebian-cd19990000001");
    assert_eq!(late.datecode, "1999-12-31-23-59");

    let terms = open_segment(prefix.path(), 0).terms_with_prefix("XM").unwrap();
    assert_eq!(terms, vec!["XMdebian-cd-1999"]);
}

// ─── Languages and discovery ───────────────────────────────────────

#[test]
fn test_language_per_list() {
    let temp = assert_fs::TempDir::new().unwrap();
    let prefix = temp.child("listdb");
    let mut opts = options(false, 1_000_000);
    opts.languages
        .insert("debian-cd".to_string(), IndexLanguage::resolve("German"));

    let files = vec![fixture("debian-project-200709"), fixture("debian-cd-1999")];
    let summary = index_with(prefix.path(), &files, opts);
    assert_eq!(summary.documents, 4);

    let segment = open_segment(prefix.path(), 0);
    assert_eq!(segment.terms_with_prefix("L").unwrap(), vec!["Lde", "Len"]);
    assert_eq!(
        segment.terms_with_prefix("XSL").unwrap(),
        vec!["XSLenglish", "XSLgerman"]
    );
}

#[test]
fn test_discovered_archive_tree() {
    let temp = assert_fs::TempDir::new().unwrap();
    let lists = temp.child("lists");
    lists
        .child("debian-project/2007/debian-project-200709")
        .write_file(&fixture("debian-project-200709"))
        .unwrap();
    lists
        .child("debian-cd/debian-cd-1999")
        .write_file(&fixture("debian-cd-1999"))
        .unwrap();
    lists
        .child("debian-cd/README")
        .write_str("not an archive")
        .unwrap();

    let files = discover_archives(lists.path(), &[]).unwrap();
    assert_eq!(files.len(), 2);
    assert!(files[0].ends_with("debian-cd/debian-cd-1999"));

    let prefix = temp.child("listdb");
    let summary = index_with(prefix.path(), &files, options(false, 1_000_000));
    assert_eq!(summary.files, 2);
    assert_eq!(summary.documents, 4);
}

// ─── Segments and failures ──────────────────────────────────────────

#[test]
fn test_full_overflow_segment_is_not_reused() {
    let temp = assert_fs::TempDir::new().unwrap();
    let prefix = temp.child("listdb");
    index(prefix.path(), &["debian-project-200709"]);

    let summary = index_with(prefix.path(), &[fixture("debian-cd-1999")], options(false, 1));
    assert_eq!(summary.documents, 2);
    temp.child("listdb-001").assert(predicate::path::is_dir());
    assert_eq!(open_segment(prefix.path(), 0).doc_count().unwrap(), 2);
    assert_eq!(open_segment(prefix.path(), 1).doc_count().unwrap(), 2);
}

#[test]
fn test_known_bucket_returns_to_its_segment() {
    let temp = assert_fs::TempDir::new().unwrap();
    let prefix = temp.child("listdb");
    index(prefix.path(), &["debian-cd-1999"]);
    index_with(prefix.path(), &[fixture("debian-project-200709")], options(false, 1));

    // debian-cd-1999 lives in listdb-000 even though that segment is full.
    let summary = index_with(prefix.path(), &[fixture("debian-cd-1999")], options(false, 1));
    assert_eq!(summary.resumed_skips, 2);
    temp.child("listdb-002").assert(predicate::path::missing());
}

#[test]
fn test_missing_file_does_not_stop_the_run() {
    let temp = assert_fs::TempDir::new().unwrap();
    let prefix = temp.child("listdb");
    let files = vec![
        temp.path().join("debian-devel-200701"),
        fixture("debian-devel-200710"),
    ];
    let summary = index_with(prefix.path(), &files, options(false, 1_000_000));
    assert_eq!(summary.failed_files, 1);
    assert_eq!(summary.files, 1);
    assert_eq!(summary.documents, 1);
}

#[test]
fn test_summary_serializes() {
    let temp = assert_fs::TempDir::new().unwrap();
    let prefix = temp.child("listdb");
    let summary = index(prefix.path(), &["debian-devel-200710"]);
    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["documents"], 1);
    assert_eq!(json["failed_files"], 0);
    assert!(json["bytes_read"].as_u64().unwrap() > 0);
}
