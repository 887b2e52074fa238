use std::collections::BTreeMap;
use std::fs;

use cliptale_engine::{JournalError, RenameJournal, JOURNAL_FILENAME};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn setup() -> (TempDir, RenameJournal) {
    let dir = TempDir::new().unwrap();
    let journal = RenameJournal::at(dir.path().join("state").join(JOURNAL_FILENAME));
    (dir, journal)
}

#[test]
fn record_then_lookup() {
    let (dir, journal) = setup();
    let root = fs::canonicalize(dir.path()).unwrap();
    let original = root.join("clip.mp4");
    let renamed = root.join("dog_bark.mp4");
    fs::write(&renamed, b"video").unwrap();

    assert!(!journal.is_tracked(&renamed));
    journal.record(&original, &renamed).unwrap();

    assert!(journal.is_tracked(&renamed));
    assert!(!journal.is_tracked(&original));
    assert_eq!(journal.lookup_original(&renamed).unwrap(), original);
}

#[test]
fn file_is_a_pretty_json_object() {
    let (dir, journal) = setup();
    let root = fs::canonicalize(dir.path()).unwrap();
    journal
        .record(&root.join("clip.mp4"), &root.join("dog_bark.mp4"))
        .unwrap();

    let text = fs::read_to_string(journal.path()).unwrap();
    let parsed: BTreeMap<String, String> = serde_json::from_str(&text).unwrap();
    let mut expected = BTreeMap::new();
    expected.insert(
        root.join("dog_bark.mp4").to_string_lossy().into_owned(),
        root.join("clip.mp4").to_string_lossy().into_owned(),
    );
    assert_eq!(parsed, expected);
    assert!(text.contains('\n'));
}

#[test]
fn existing_entry_is_not_overwritten() {
    let (dir, journal) = setup();
    let root = fs::canonicalize(dir.path()).unwrap();
    let renamed = root.join("dog_bark.mp4");
    journal.record(&root.join("clip.mp4"), &renamed).unwrap();

    let err = journal.record(&root.join("other.mp4"), &renamed).unwrap_err();
    assert!(matches!(err, JournalError::AlreadyTracked(_)));
    assert_eq!(journal.lookup_original(&renamed).unwrap(), root.join("clip.mp4"));
}

#[test]
fn remove_reports_whether_an_entry_existed() {
    let (dir, journal) = setup();
    let root = fs::canonicalize(dir.path()).unwrap();
    let renamed = root.join("dog_bark.mp4");
    journal.record(&root.join("clip.mp4"), &renamed).unwrap();

    assert!(journal.remove(&renamed).unwrap());
    assert!(!journal.remove(&renamed).unwrap());
    assert!(journal.entries().is_empty());
}

#[test]
fn lookup_of_untracked_path_is_not_found() {
    let (dir, journal) = setup();
    let err = journal
        .lookup_original(&dir.path().join("nothing.mp4"))
        .unwrap_err();
    assert!(matches!(err, JournalError::NotFound(_)));
}

#[test]
fn corrupt_file_reads_as_empty_and_is_rewritten_on_record() {
    let (dir, journal) = setup();
    fs::create_dir_all(journal.path().parent().unwrap()).unwrap();
    fs::write(journal.path(), "{ not json").unwrap();

    assert!(journal.entries().is_empty());

    let root = fs::canonicalize(dir.path()).unwrap();
    journal
        .record(&root.join("clip.mp4"), &root.join("dog_bark.mp4"))
        .unwrap();
    assert_eq!(journal.entries().len(), 1);
}

#[test]
fn every_query_rereads_the_file() {
    let (dir, journal) = setup();
    let root = fs::canonicalize(dir.path()).unwrap();
    let renamed = root.join("dog_bark.mp4");
    journal.record(&root.join("clip.mp4"), &renamed).unwrap();

    // A second handle on the same file sees the change without reloading.
    let other = RenameJournal::at(journal.path());
    assert!(other.is_tracked(&renamed));
    fs::write(journal.path(), "{}").unwrap();
    assert!(!journal.is_tracked(&renamed));
}

#[test]
fn relative_paths_are_stored_absolute() {
    let (_dir, journal) = setup();
    journal
        .record(
            std::path::Path::new("relative_original.mp4"),
            std::path::Path::new("relative_renamed.mp4"),
        )
        .unwrap();
    let entries = journal.entries();
    let (key, value) = entries.iter().next().unwrap();
    assert!(std::path::Path::new(key).is_absolute());
    assert!(std::path::Path::new(value).is_absolute());
}
