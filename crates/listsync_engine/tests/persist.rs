use std::fs;

use chrono::{TimeZone, Utc};
use listsync_core::{BackoffPolicy, ListHealthTracker, SourceRunResult};
use listsync_engine::{ensure_state_dir, AtomicFileWriter, HealthStore, PersistError};
use tempfile::TempDir;

#[test]
fn creates_missing_state_dir() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("state");
    assert!(!new_dir.exists());
    ensure_state_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
}

#[test]
fn atomic_write_replaces_existing() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    let first = writer.write("health.ron", "one").unwrap();
    let second = writer.write("health.ron", "two").unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read_to_string(&second).unwrap(), "two");
}

#[test]
fn writing_into_a_file_path_fails_cleanly() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let result = AtomicFileWriter::new(file_path.clone()).write("health.ron", "data");
    assert!(matches!(result, Err(PersistError::StateDir(_))));
}

#[test]
fn missing_health_file_loads_empty() {
    let temp = TempDir::new().unwrap();
    let store = HealthStore::new(temp.path().to_path_buf());
    assert!(store.load().unwrap().is_empty());
}

#[test]
fn health_records_survive_a_restart() {
    let temp = TempDir::new().unwrap();
    let store = HealthStore::new(temp.path().join("state"));
    let now = Utc.with_ymd_and_hms(2024, 2, 2, 2, 2, 2).unwrap();

    let mut tracker = ListHealthTracker::new(BackoffPolicy::default());
    tracker.record(&SourceRunResult::failure(1, "timeout"), now);
    tracker.record(&SourceRunResult::success(2, 5, 4), now);
    store.save(&tracker.records()).unwrap();

    let mut restored = ListHealthTracker::new(BackoffPolicy::default());
    restored.restore(store.load().unwrap());
    assert_eq!(restored.records(), tracker.records());
    assert!(!restored.is_ready(1, now));
}

#[test]
fn corrupt_health_file_is_a_parse_error() {
    let temp = TempDir::new().unwrap();
    let store = HealthStore::new(temp.path().to_path_buf());
    fs::write(store.path(), "not ron at all {").unwrap();
    assert!(matches!(store.load(), Err(PersistError::Parse { .. })));
}
