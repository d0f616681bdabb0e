//! Tests for full-table iteration
//!
//! These tests verify:
//! - Every stored entry is visited exactly once
//! - Visited records match point reads
//! - Visitor errors and corrupt payloads abort the scan

use std::collections::HashMap;
use std::fmt;

use lastlog_store::{for_each_entry, write_entry, Config, ErrorKind, LastLogin, LoginRecord, Store};
use rusqlite::{params, Connection};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_store() -> (TempDir, Store) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .path(temp_dir.path().join("lastlog2.db"))
        .build()
        .unwrap();
    (temp_dir, Store::new(config).unwrap())
}

#[derive(Debug)]
struct StopHere(String);

impl fmt::Display for StopHere {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stopped at {}", self.0)
    }
}

impl std::error::Error for StopHere {}

// =============================================================================
// Completeness Tests
// =============================================================================

#[test]
fn test_iterate_visits_every_entry_once() {
    let (_temp, store) = setup_temp_store();

    let n = 50;
    for i in 0..n {
        let rhost = if i % 3 == 0 { None } else { Some(format!("host{}", i)) };
        let login = LastLogin::new(1_000 + i as i64, &format!("pts/{}", i), rhost.as_deref());
        store.write(&format!("user{:03}", i), &login).unwrap();
    }

    let mut seen: HashMap<String, LoginRecord> = HashMap::new();
    store
        .for_each(|rec| {
            assert!(seen.insert(rec.username.clone(), rec).is_none(), "visited twice");
            Ok::<(), StopHere>(())
        })
        .unwrap();

    assert_eq!(seen.len(), n);
    for (username, rec) in &seen {
        assert_eq!(&store.read(username).unwrap(), &rec.login());
    }
}

#[test]
fn test_iterate_empty_store() {
    let (_temp, store) = setup_temp_store();
    store.write("alice", &LastLogin::new(1, "pts/0", None)).unwrap();
    store.remove("alice").unwrap();

    let mut visits = 0;
    store
        .for_each(|_| {
            visits += 1;
            Ok::<(), StopHere>(())
        })
        .unwrap();
    assert_eq!(visits, 0);
}

#[test]
fn test_iterate_never_created_database() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("never.db");

    let mut visits = 0;
    for_each_entry(&path, |_| {
        visits += 1;
        Ok::<(), StopHere>(())
    })
    .unwrap();
    assert_eq!(visits, 0);

    let store = Store::at(&path).unwrap();
    assert!(store.records().unwrap().is_empty());
    assert!(!path.exists());
}

#[test]
fn test_records_serialize_as_json() {
    let (_temp, store) = setup_temp_store();
    store.write("alice", &LastLogin::new(5, "pts/0", None)).unwrap();

    let json = serde_json::to_value(store.records().unwrap()).unwrap();
    assert_eq!(
        json,
        serde_json::json!([
            { "username": "alice", "timestamp": 5, "tty": "pts/0", "rhost": null }
        ])
    );
}

#[test]
fn test_iterate_reflects_rename_and_remove() {
    let (_temp, store) = setup_temp_store();
    store.write("a", &LastLogin::new(1, "pts/0", None)).unwrap();
    store.write("b", &LastLogin::new(2, "pts/1", None)).unwrap();
    store.write("c", &LastLogin::new(3, "pts/2", None)).unwrap();

    store.rename("a", "z").unwrap();
    store.remove("b").unwrap();

    let mut names: Vec<String> = store.records().unwrap().into_iter().map(|r| r.username).collect();
    names.sort();
    assert_eq!(names, vec!["c".to_string(), "z".to_string()]);
}

#[test]
fn test_y2038_timestamp_through_iteration() {
    let (temp, _store) = setup_temp_store();
    let path = temp.path().join("y2038-ll2_read_all.db");
    let big_time = 3 * i32::MAX as i64;

    write_entry(&path, "y2038", big_time, "pts/test", None).unwrap();

    let mut visits = 0;
    for_each_entry(&path, |rec| {
        visits += 1;
        assert_eq!(rec.username, "y2038");
        assert_eq!(rec.timestamp, big_time);
        assert_eq!(rec.tty, "pts/test");
        assert_eq!(rec.rhost, None);
        Ok::<(), StopHere>(())
    })
    .unwrap();
    assert_eq!(visits, 1);
}

// =============================================================================
// Abort Tests
// =============================================================================

#[test]
fn test_visitor_error_aborts_scan() {
    let (_temp, store) = setup_temp_store();
    for name in ["a", "b", "c", "d"] {
        store.write(name, &LastLogin::new(1, "pts/0", None)).unwrap();
    }

    let mut visits = 0;
    let err = store
        .for_each(|rec| {
            visits += 1;
            if visits == 2 {
                return Err(StopHere(rec.username));
            }
            Ok(())
        })
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Visitor);
    assert!(err.to_string().contains("stopped at"));
    assert_eq!(visits, 2);

    // The store is still usable afterwards.
    assert_eq!(store.records().unwrap().len(), 4);
}

#[test]
fn test_visitor_may_return_crate_errors() {
    let (_temp, store) = setup_temp_store();
    store.write("a", &LastLogin::new(1, "pts/0", None)).unwrap();

    let err = store
        .for_each(|rec| store_lookup_fails(&rec))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Visitor);
}

fn store_lookup_fails(rec: &LoginRecord) -> lastlog_store::Result<()> {
    Err(lastlog_store::LastlogError::NotFound(format!("{}-shadow", rec.username)))
}

#[test]
fn test_corrupt_payload_aborts_scan() {
    let (temp, store) = setup_temp_store();
    store.write("alice", &LastLogin::new(1, "pts/0", None)).unwrap();
    store.write("bob", &LastLogin::new(2, "pts/1", None)).unwrap();

    let conn = Connection::open(temp.path().join("lastlog2.db")).unwrap();
    conn.execute(
        "UPDATE records SET payload = ?1 WHERE username = 'bob'",
        params![&[0u8, 1, 2][..]],
    )
    .unwrap();
    drop(conn);

    let err = store.records().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CorruptRecord);
    assert!(err.to_string().contains("bob"));

    // Other entries are untouched.
    assert_eq!(store.read("alice").unwrap().timestamp, 1);
}

#[test]
fn test_non_blob_payload_is_corrupt() {
    let (temp, store) = setup_temp_store();
    store.write("alice", &LastLogin::new(1, "pts/0", None)).unwrap();

    let conn = Connection::open(temp.path().join("lastlog2.db")).unwrap();
    conn.execute("UPDATE records SET payload = 12345 WHERE username = 'alice'", [])
        .unwrap();
    drop(conn);

    assert_eq!(store.records().unwrap_err().kind(), ErrorKind::CorruptRecord);
    assert_eq!(store.read("alice").unwrap_err().kind(), ErrorKind::CorruptRecord);
}
