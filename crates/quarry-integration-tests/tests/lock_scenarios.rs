//! Integration tests for advisory locks across content, tree and
//! property operations.

#![allow(clippy::arithmetic_side_effects)]

use std::time::Duration;

use quarry_test::{TestMount, tree_snapshot, visible_snapshot};
use quarry_vfs::ErrorKind;

#[test]
fn test_locked_file_lifecycle_in_project() {
    let t = TestMount::new();
    t.mkdir("/", "proj");
    let file = t.create("/proj", "a.txt", "hi");

    let token = t.mount.lock(&file, Duration::ZERO).unwrap();

    let err = t
        .mount
        .update_content(&file, &b"nope"[..], None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    assert_eq!(t.read("/proj/a.txt"), "hi");

    t.mount
        .update_content(&file, &b"new bytes"[..], Some(&token))
        .unwrap();
    assert_eq!(t.read("/proj/a.txt"), "new bytes");

    t.mount.unlock(&file, &token).unwrap();
    t.mount
        .set_property(&file, "owner", Some("team"), None)
        .unwrap();

    t.mount.delete(&t.get("/proj"), None).unwrap();
    assert!(!t.exists("/proj"));
    assert!(
        tree_snapshot(t.path())
            .iter()
            .all(|entry| !entry.contains("a.txt")),
        "no content or side-car left for a.txt"
    );
}

#[test]
fn test_lock_twice_wrong_token_and_relock() {
    let t = TestMount::new();
    let file = t.create("/", "f.txt", "x");

    let token = t.mount.lock(&file, Duration::ZERO).unwrap();
    assert_eq!(
        t.mount.lock(&file, Duration::ZERO).unwrap_err().kind(),
        ErrorKind::Conflict
    );
    assert_eq!(
        t.mount.unlock(&file, "not-the-token").unwrap_err().kind(),
        ErrorKind::Forbidden
    );
    t.mount.unlock(&file, &token).unwrap();
    let again = t.mount.lock(&file, Duration::ZERO).unwrap();
    assert_ne!(again, token);
}

#[test]
fn test_expired_lock_behaves_as_absent() {
    let t = TestMount::new();
    let file = t.create("/", "f.txt", "x");

    t.mount.lock(&file, Duration::from_millis(1)).unwrap();
    std::thread::sleep(Duration::from_millis(20));

    assert!(!t.mount.is_locked(&file).unwrap());
    t.mount
        .update_content(&file, &b"after expiry"[..], None)
        .unwrap();
    t.mount.lock(&file, Duration::ZERO).unwrap();
}

#[test]
fn test_delete_folder_with_locked_child_fails_entirely() {
    let t = TestMount::new();
    t.mkdir("/", "docs/inner");
    t.create("/docs", "free.txt", "1");
    t.create("/docs/inner", "other.txt", "2");
    let locked = t.create("/docs/inner", "locked.txt", "3");
    t.mount.lock(&locked, Duration::ZERO).unwrap();

    let before = visible_snapshot(t.path());
    let err = t.mount.delete(&t.get("/docs"), None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    assert_eq!(visible_snapshot(t.path()), before);
    assert!(t.mount.is_locked(&t.get("/docs/inner/locked.txt")).unwrap());
}

#[test]
fn test_move_and_rename_respect_locks() {
    let t = TestMount::new();
    t.mkdir("/", "dst");
    let file = t.create("/", "a.txt", "a");
    let token = t.mount.lock(&file, Duration::ZERO).unwrap();

    let dst = t.get("/dst");
    assert_eq!(
        t.mount
            .move_to(&file, &dst, None, false, None)
            .unwrap_err()
            .kind(),
        ErrorKind::Forbidden
    );
    assert_eq!(
        t.mount
            .rename(&file, Some("b.txt"), None, None)
            .unwrap_err()
            .kind(),
        ErrorKind::Forbidden
    );

    let moved = t
        .mount
        .move_to(&file, &dst, None, false, Some(&token))
        .unwrap();
    assert_eq!(moved.path().to_string(), "/dst/a.txt");
    assert!(!t.exists("/a.txt"));
    assert_eq!(t.read("/dst/a.txt"), "a");
}

#[test]
fn test_concurrent_lock_has_single_winner() {
    let t = TestMount::new();
    let file = t.create("/", "race.txt", "x");

    let winners = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| s.spawn(|| t.mount.lock(&file, Duration::ZERO).is_ok()))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count()
    });
    assert_eq!(winners, 1);
}
