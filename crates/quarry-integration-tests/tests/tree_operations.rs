//! Integration tests for tree operations through the shared fixture:
//! hierarchical folders, permission-filtered copies, identifiers,
//! properties and archives.

#![allow(clippy::arithmetic_side_effects)]

use std::collections::BTreeSet;
use std::time::Duration;

use quarry_events::EventBus;
use quarry_test::{TestMount, visible_snapshot};
use quarry_vfs::{ErrorKind, Metadata, MountOptions, Permission, Principal, VfsPath};

#[test]
fn test_hierarchical_folder_creation() {
    let t = TestMount::new();
    let root = t.get("/");

    let first = t.mount.create_folder(&root, "a/b/c").unwrap();
    assert_eq!(first.path().to_string(), "/a");
    assert_eq!(
        t.mount.create_folder(&root, "a/b/c").unwrap_err().kind(),
        ErrorKind::Conflict
    );

    t.mount.delete(&t.get("/a/b"), None).unwrap();
    let first = t.mount.create_folder(&root, "a/b/c").unwrap();
    assert_eq!(first.path().to_string(), "/a/b");
    assert!(t.path().join("a/b/c").is_dir());
}

#[test]
fn test_copy_skips_child_denied_by_policy() {
    let t = TestMount::new();
    t.mkdir("/", "src/nested");
    t.create("/src", "open.txt", "o");
    t.create("/src/nested", "deep.txt", "d");
    let secret = t.create("/src", "secret.txt", "s");
    t.mount
        .set_property(&secret, "label", Some("classified"), None)
        .unwrap();
    t.mount
        .set_property(&t.get("/src/open.txt"), "label", Some("public"), None)
        .unwrap();
    t.policy.deny(secret.path(), Permission::Read);

    let copy = t
        .mount
        .copy(&t.get("/src"), &t.get("/"), Some("dup"), false)
        .unwrap();
    assert_eq!(copy.path().to_string(), "/dup");

    let dup: Vec<String> = visible_snapshot(t.path())
        .into_iter()
        .filter(|e| e.starts_with("dup/"))
        .collect();
    assert_eq!(dup, vec!["dup/", "dup/nested/", "dup/nested/deep.txt", "dup/open.txt"]);
    assert!(t.path().join("dup/.vfs/props/open.txt_props").is_file());
    assert!(!t.path().join("dup/.vfs/props/secret.txt_props").exists());
    assert_eq!(
        t.mount
            .property_value(&t.get("/dup/open.txt"), "label")
            .unwrap()
            .as_deref(),
        Some("public")
    );
}

#[test]
fn test_copy_does_not_carry_locks() {
    let t = TestMount::new();
    t.mkdir("/", "src");
    let f = t.create("/src", "a.txt", "a");
    t.mount.lock(&f, Duration::ZERO).unwrap();

    t.mount
        .copy(&t.get("/src"), &t.get("/"), Some("dup"), false)
        .unwrap();
    assert!(!t.mount.is_locked(&t.get("/dup/a.txt")).unwrap());
    assert!(t.mount.is_locked(&t.get("/src/a.txt")).unwrap());
}

#[test]
fn test_ids_round_trip_for_nested_paths() {
    let t = TestMount::new();
    t.mkdir("/", "a b/ünï");
    let file = t.create("/a b/ünï", "x.txt", "x");

    let resolved = t.mount.get_by_id(file.id()).unwrap();
    assert_eq!(resolved.path(), file.path());
    assert_eq!(t.mount.get_by_id(t.get("/").id()).unwrap().path(), &VfsPath::root());
    assert_eq!(
        t.mount.get_by_id("not an id").unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn test_properties_round_trip_and_removal() {
    let t = TestMount::new();
    let file = t.create("/", "f.txt", "x");

    let mut changes = Metadata::new();
    for n in 0..5 {
        changes.insert(
            format!("name{n}"),
            (0..3).map(|m| format!("value{n}-{m}")).collect(),
        );
    }
    t.mount.update_properties(&file, &changes, None).unwrap();
    t.mount.reset();
    assert_eq!(*t.mount.properties(&file).unwrap(), changes);

    t.mount.set_property(&file, "name0", None, None).unwrap();
    t.mount.reset();
    let props = t.mount.properties(&file).unwrap();
    assert!(!props.contains_key("name0"));
    assert_eq!(props.len(), 4);
}

#[test]
fn test_move_folder_carries_acl_and_drops_source() {
    let t = TestMount::new();
    t.mkdir("/", "proj/sub");
    t.mkdir("/", "archive");
    t.create("/proj/sub", "a.txt", "a");
    t.mount
        .update_acl(
            &t.get("/proj"),
            [(Principal::user("ana"), BTreeSet::from([Permission::Read]))],
            false,
            None,
        )
        .unwrap();

    let moved = t
        .mount
        .move_to(&t.get("/proj"), &t.get("/archive"), None, false, None)
        .unwrap();
    assert_eq!(moved.path().to_string(), "/archive/proj");
    assert!(!t.exists("/proj"));
    assert_eq!(t.read("/archive/proj/sub/a.txt"), "a");
    let acl = t.mount.acl(&moved).unwrap();
    assert!(acl.grants(&Principal::user("ana"), Permission::Read));
}

#[test]
fn test_zip_round_trip_between_mounts() {
    let src = TestMount::new();
    src.mkdir("/", "proj/docs");
    src.create("/proj/docs", "a.txt", "alpha");
    src.create("/proj", "b.txt", "beta");

    let archive = src
        .mount
        .zip(&src.get("/proj"), |_| true)
        .unwrap();
    assert_eq!(archive.name(), "proj.zip");
    let bytes = archive.into_bytes().unwrap();

    let options = MountOptions {
        max_zip_entries: 100,
        ..MountOptions::default()
    };
    let dst = TestMount::with_options("other", options, EventBus::new());
    dst.mount
        .unzip(&dst.get("/"), bytes.as_slice(), false, 0)
        .unwrap();
    assert_eq!(dst.read("/proj/docs/a.txt"), "alpha");
    assert_eq!(dst.read("/proj/b.txt"), "beta");

    assert_eq!(
        dst.mount
            .unzip(&dst.get("/"), bytes.as_slice(), false, 0)
            .unwrap_err()
            .kind(),
        ErrorKind::Conflict
    );
    dst.mount
        .unzip(&dst.get("/"), bytes.as_slice(), true, 1)
        .unwrap();
    assert_eq!(dst.read("/docs/a.txt"), "alpha");
}

#[test]
fn test_md5_sums_cover_readable_files() {
    let t = TestMount::new();
    t.mkdir("/", "d/e");
    t.create("/d", "h.txt", "hello");
    t.create("/d/e", "empty.txt", "");
    let hidden = t.create("/d", "hidden.txt", "zzz");
    t.policy.deny(hidden.path(), Permission::Read);

    let mut sums = t.mount.count_md5_sums(&t.get("/d")).unwrap();
    sums.sort_by(|a, b| a.1.cmp(&b.1));
    assert_eq!(
        sums,
        vec![
            ("d41d8cd98f00b204e9800998ecf8427e".to_owned(), "e/empty.txt".to_owned()),
            ("5d41402abc4b2a76b9719d911017c592".to_owned(), "h.txt".to_owned()),
        ]
    );
}

#[test]
fn test_overwrite_of_containing_folder_keeps_source() {
    let t = TestMount::new();
    t.mkdir("/", "a/b");
    let file = t.create("/a", "x.txt", "precious");
    let nested = t.get("/a/b");
    let root = t.get("/");

    let err = t.mount.copy(&file, &root, Some("a"), true).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    let err = t
        .mount
        .move_to(&file, &root, Some("a"), true, None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    let err = t
        .mount
        .move_to(&nested, &root, Some("a"), true, None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    assert_eq!(t.read("/a/x.txt"), "precious");
    assert!(t.exists("/a/b"));
}

#[test]
fn test_concurrent_create_has_single_winner() {
    let t = TestMount::new();
    let root = t.get("/");

    let results: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|n| {
                let root = &root;
                let mount = &t.mount;
                s.spawn(move || {
                    let body = format!("writer {n}");
                    mount.create_file(root, "same.txt", body.as_bytes())
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| e.kind() == ErrorKind::Conflict)
    );
    assert!(t.read("/same.txt").starts_with("writer "));
    assert_eq!(t.mount.held_path_locks(), 0);
}
