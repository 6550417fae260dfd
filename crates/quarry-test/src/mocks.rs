//! Collaborator doubles for mounts.

use std::collections::BTreeSet;

use parking_lot::Mutex;
use quarry_vfs::{AccessPolicy, AclStore, Permission, SearchError, SearchIndex, VfsPath, VfsResult};

/// Which index notification was received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexCallKind {
    /// [`SearchIndex::add`].
    Add,
    /// [`SearchIndex::update`].
    Update,
    /// [`SearchIndex::delete`].
    Delete,
}

/// One recorded index notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexCall {
    /// Notification type.
    pub kind: IndexCallKind,
    /// Logical path, as displayed.
    pub path: String,
    /// Whether the item was a file.
    pub is_file: bool,
}

/// Search index that records every notification.
///
/// When built with [`RecordingIndex::failing`] each call is still recorded
/// but reports an error, so callers can check failures are swallowed.
#[derive(Debug, Default)]
pub struct RecordingIndex {
    calls: Mutex<Vec<IndexCall>>,
    fail: bool,
}

impl RecordingIndex {
    /// Create a recording index that always succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a recording index whose every call fails.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Snapshot of the calls so far.
    #[must_use]
    pub fn calls(&self) -> Vec<IndexCall> {
        self.calls.lock().clone()
    }

    /// Calls of one kind.
    #[must_use]
    pub fn calls_of(&self, kind: IndexCallKind) -> Vec<IndexCall> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.kind == kind)
            .cloned()
            .collect()
    }

    /// Forget recorded calls.
    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, kind: IndexCallKind, path: &VfsPath, is_file: bool) -> Result<(), SearchError> {
        self.calls.lock().push(IndexCall {
            kind,
            path: path.to_string(),
            is_file,
        });
        if self.fail {
            Err(SearchError(format!("index unavailable for {path}")))
        } else {
            Ok(())
        }
    }
}

impl SearchIndex for RecordingIndex {
    fn add(&self, path: &VfsPath, is_file: bool) -> Result<(), SearchError> {
        self.record(IndexCallKind::Add, path, is_file)
    }

    fn update(&self, path: &VfsPath, is_file: bool) -> Result<(), SearchError> {
        self.record(IndexCallKind::Update, path, is_file)
    }

    fn delete(&self, path: &VfsPath, is_file: bool) -> Result<(), SearchError> {
        self.record(IndexCallKind::Delete, path, is_file)
    }
}

/// Policy that permits everything except explicitly denied pairs.
///
/// Denials match the exact path only. Denying [`Permission::All`]
/// blocks every permission on that path.
#[derive(Debug, Default)]
pub struct DenyListPolicy {
    denied: Mutex<BTreeSet<(VfsPath, Permission)>>,
}

impl DenyListPolicy {
    /// Create a policy with no denials.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deny `permission` on `path`.
    pub fn deny(&self, path: &VfsPath, permission: Permission) {
        self.denied.lock().insert((path.clone(), permission));
    }

    /// Deny every permission on `path`.
    pub fn deny_all(&self, path: &VfsPath) {
        self.deny(path, Permission::All);
    }

    /// Lift a previous denial.
    pub fn allow(&self, path: &VfsPath, permission: Permission) {
        self.denied.lock().remove(&(path.clone(), permission));
    }

    /// Lift every denial.
    pub fn clear(&self) {
        self.denied.lock().clear();
    }
}

impl AccessPolicy for DenyListPolicy {
    fn is_permitted(&self, path: &VfsPath, permission: Permission, _: &AclStore) -> VfsResult<bool> {
        let denied = self.denied.lock();
        let blocked = denied.contains(&(path.clone(), permission))
            || denied.contains(&(path.clone(), Permission::All));
        Ok(!blocked)
    }
}
