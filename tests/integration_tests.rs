//! Integration tests for lastlog-store
//!
//! End-to-end scenarios through the path-based functions, the way login
//! hooks and admin tools use the store.

use lastlog_store::{
    for_each_entry, read_entry, remove_entry, rename_entry, write_entry, ErrorKind, LastLogin,
};
use tempfile::TempDir;

fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn test_write_remove_then_read_fails() {
    let temp = TempDir::new().unwrap();
    let db = temp.path().join("tst-delete-user.db");

    write_entry(&db, "user", now(), "test-tty", Some("localhost")).unwrap();
    remove_entry(&db, "user").unwrap();

    let err = read_entry(&db, "user").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_write_rename_then_read_both() {
    let temp = TempDir::new().unwrap();
    let db = temp.path().join("tst-rename-user.db");
    let when = now();

    write_entry(&db, "user", when, "test-tty", Some("localhost")).unwrap();
    rename_entry(&db, "user", "new").unwrap();

    assert_eq!(read_entry(&db, "user").unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(
        read_entry(&db, "new").unwrap(),
        LastLogin::new(when, "test-tty", Some("localhost"))
    );
}

#[test]
fn test_y2038_write_and_scan() {
    let temp = TempDir::new().unwrap();
    let db = temp.path().join("y2038.db");
    let big_time = 3 * i32::MAX as i64;

    write_entry(&db, "y2038", big_time, "pts/test", None).unwrap();

    let mut seen = Vec::new();
    for_each_entry(&db, |rec| {
        seen.push(rec);
        Ok::<(), std::convert::Infallible>(())
    })
    .unwrap();

    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].timestamp, big_time);
    assert_eq!(read_entry(&db, "y2038").unwrap().timestamp, big_time);
}

#[test]
fn test_login_history_of_one_host() {
    let temp = TempDir::new().unwrap();
    let db = temp.path().join("lastlog2.db");

    write_entry(&db, "root", 100, "tty1", None).unwrap();
    write_entry(&db, "alice", 200, "pts/0", Some("laptop.lan")).unwrap();
    write_entry(&db, "alice", 300, "pts/1", Some("desktop.lan")).unwrap();
    write_entry(&db, "bob", 250, "pts/2", Some("")).unwrap();
    rename_entry(&db, "bob", "robert").unwrap();
    remove_entry(&db, "root").unwrap();

    let mut all = Vec::new();
    for_each_entry(&db, |rec| {
        all.push(rec);
        Ok::<(), std::convert::Infallible>(())
    })
    .unwrap();
    all.sort_by(|a, b| a.username.cmp(&b.username));

    let names: Vec<&str> = all.iter().map(|r| r.username.as_str()).collect();
    assert_eq!(names, vec!["alice", "robert"]);
    assert_eq!(all[0].login(), LastLogin::new(300, "pts/1", Some("desktop.lan")));
    assert_eq!(all[1].rhost.as_deref(), Some(""));
}
