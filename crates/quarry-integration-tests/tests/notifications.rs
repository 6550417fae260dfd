//! Integration tests for change notifications: the event bus, the
//! search index seam, project modification tracking and the mount
//! registry.

#![allow(clippy::arithmetic_side_effects)]

use std::sync::Arc;
use std::time::Duration;

use quarry_events::{EventBus, VfsEvent};
use quarry_test::{IndexCallKind, RecordingIndex, TestMount};
use quarry_vfs::{ErrorKind, MountOptions, MountPoint, MountRegistry, ProjectModificationTracker};

#[test]
fn test_mutations_publish_events_in_order() {
    let bus = EventBus::new();
    let mut rx = bus.subscribe();
    let t = TestMount::with_options("ws", MountOptions::default(), bus);

    t.mkdir("/", "proj");
    let f = t.create("/proj", "a.txt", "1");
    t.mount.update_content(&f, &b"2"[..], None).unwrap();
    t.mount.set_property(&f, "k", Some("v"), None).unwrap();
    let renamed = t.mount.rename(&f, Some("b.txt"), None, None).unwrap();
    t.mount.delete(&renamed, None).unwrap();

    let types: Vec<&str> = rx.drain().iter().map(|e| e.event_type()).collect();
    assert_eq!(
        types,
        vec![
            "created",
            "created",
            "content_updated",
            "properties_updated",
            "renamed",
            "deleted"
        ]
    );
}

#[test]
fn test_events_carry_workspace_and_paths() {
    let bus = EventBus::new();
    let mut rx = bus.subscribe_prefix("/proj");
    let t = TestMount::with_options("ws-7", MountOptions::default(), bus);

    t.mkdir("/", "other");
    t.mkdir("/", "proj");
    t.mkdir("/", "dst");
    t.mount
        .move_to(&t.get("/proj"), &t.get("/dst"), None, false, None)
        .unwrap();

    let events = rx.drain();
    assert_eq!(events.len(), 2, "only events touching /proj");
    assert_eq!(events[0].metadata().workspace_id, "ws-7");
    match events[1].as_ref() {
        VfsEvent::Moved {
            path,
            old_path,
            is_folder,
            ..
        } => {
            assert_eq!(path, "/dst/proj");
            assert_eq!(old_path, "/proj");
            assert!(*is_folder);
        },
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn test_async_receiver_gets_content_update() {
    let bus = EventBus::new();
    let mut rx = bus.subscribe();
    let t = TestMount::with_options("ws", MountOptions::default(), bus);
    let f = t.create("/", "a.txt", "1");
    t.mount.update_content(&f, &b"2"[..], None).unwrap();

    let first = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.event_type(), "created");
    let second = rx.recv().await.unwrap();
    assert_eq!(second.path(), "/a.txt");
    assert_eq!(second.event_type(), "content_updated");
}

#[test]
fn test_search_index_receives_notifications() {
    let t = TestMount::new();
    t.mkdir("/", "d");
    let f = t.create("/d", "a.txt", "1");
    t.mount.update_content(&f, &b"2"[..], None).unwrap();
    t.mount.delete(&f, None).unwrap();

    let adds = t.index.calls_of(IndexCallKind::Add);
    assert_eq!(adds.len(), 1, "empty folders are not indexed");
    assert_eq!(adds[0].path, "/d/a.txt");
    assert!(adds[0].is_file);
    let updates = t.index.calls_of(IndexCallKind::Update);
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].path, "/d/a.txt");
    let deletes = t.index.calls_of(IndexCallKind::Delete);
    assert_eq!(deletes.len(), 1);
    assert_eq!(deletes[0].path, "/d/a.txt");
}

#[test]
fn test_failing_index_never_fails_operations() {
    let dir = tempfile::tempdir().unwrap();
    let index = Arc::new(RecordingIndex::failing());
    let mount = MountPoint::builder("ws", dir.path())
        .with_search_index(Arc::clone(&index) as Arc<dyn quarry_vfs::SearchIndex>)
        .build()
        .unwrap();

    let root = mount.root().unwrap();
    let f = mount.create_file(&root, "a.txt", &b"x"[..]).unwrap();
    mount.update_content(&f, &b"y"[..], None).unwrap();
    mount.delete(&f, None).unwrap();
    assert_eq!(index.calls().len(), 3);
}

#[test]
fn test_tracker_follows_project_changes() {
    let bus = EventBus::new();
    let tracker = Arc::new(ProjectModificationTracker::new());
    bus.registry()
        .register(Arc::clone(&tracker) as Arc<dyn quarry_events::EventSubscriber>);
    let t = TestMount::with_options("ws", MountOptions::default(), bus);

    t.mkdir("/", "alpha");
    let f = t.create("/alpha", "a.txt", "1");
    let first = tracker.last_modified("ws", "alpha").unwrap();
    std::thread::sleep(Duration::from_millis(5));
    t.mount.update_content(&f, &b"2"[..], None).unwrap();
    let second = tracker.last_modified("ws", "alpha").unwrap();
    assert!(second >= first);

    t.mount
        .rename(&t.get("/alpha"), Some("beta"), None, None)
        .unwrap();
    assert!(tracker.last_modified("ws", "alpha").is_none());
    assert!(tracker.last_modified("ws", "beta").is_some());

    t.mount.delete(&t.get("/beta"), None).unwrap();
    assert!(tracker.is_empty());
}

#[test]
fn test_registry_mount_lookup_and_unmount() {
    let registry = MountRegistry::new();
    let a = tempfile::tempdir().unwrap();
    let b = tempfile::tempdir().unwrap();

    registry
        .mount(MountPoint::builder("a", a.path()).build().unwrap())
        .unwrap();
    registry
        .mount(MountPoint::builder("b", b.path()).build().unwrap())
        .unwrap();
    let dup = registry.mount(MountPoint::builder("a", b.path()).build().unwrap());
    assert_eq!(dup.unwrap_err().kind(), ErrorKind::Conflict);

    let mount = registry.get("a").unwrap();
    let root = mount.root().unwrap();
    mount.create_file(&root, "x.txt", &b"x"[..]).unwrap();
    assert!(a.path().join("x.txt").is_file());

    let mut ids = registry.workspace_ids();
    ids.sort();
    assert_eq!(ids, vec!["a".to_owned(), "b".to_owned()]);

    assert!(registry.unmount("a").is_some());
    assert_eq!(registry.get("a").unwrap_err().kind(), ErrorKind::NotFound);
    assert!(registry.unmount("a").is_none());
}

#[test]
fn test_config_drives_mount_options() {
    let dir = tempfile::tempdir().unwrap();
    let cfg_dir = dir.path().join(".quarry");
    std::fs::create_dir_all(&cfg_dir).unwrap();
    std::fs::write(
        cfg_dir.join("config.toml"),
        "[mount]\nworkspace_id = \"from-config\"\n[io]\nmax_zip_entries = 1\n",
    )
    .unwrap();

    let resolved = quarry_config::Config::load_file(&cfg_dir.join("config.toml")).unwrap();
    let cfg = resolved.config;
    let options = MountOptions {
        max_zip_entries: cfg.io.max_zip_entries,
        ..MountOptions::default()
    };
    let t = TestMount::with_options(&cfg.mount.workspace_id, options, EventBus::new());
    assert_eq!(t.mount.workspace_id(), "from-config");
    assert_eq!(t.mount.options().max_zip_entries, 1);
    assert_eq!(
        serde_json::to_value(&resolved.field_sources).unwrap()["io.max_zip_entries"]["file"],
        cfg_dir.join("config.toml").display().to_string()
    );
}
