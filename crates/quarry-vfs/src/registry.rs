//! Workspace id → mount lookup.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::info;

use crate::mount::MountPoint;
use crate::{VfsError, VfsResult};

/// Live mounts keyed by workspace id.
#[derive(Debug, Default)]
pub struct MountRegistry {
    mounts: DashMap<String, Arc<MountPoint>>,
}

impl MountRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `mount` under its workspace id.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::Conflict` if the workspace is already mounted.
    pub fn mount(&self, mount: MountPoint) -> VfsResult<Arc<MountPoint>> {
        match self.mounts.entry(mount.workspace_id().to_owned()) {
            Entry::Occupied(e) => Err(VfsError::Conflict(format!(
                "Workspace '{}' is already mounted. ",
                e.key()
            ))),
            Entry::Vacant(e) => {
                let mount = Arc::new(mount);
                e.insert(Arc::clone(&mount));
                Ok(mount)
            },
        }
    }

    /// Mount of `workspace_id`.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::NotFound` if nothing is mounted under that id.
    pub fn get(&self, workspace_id: &str) -> VfsResult<Arc<MountPoint>> {
        self.mounts
            .get(workspace_id)
            .map(|m| Arc::clone(m.value()))
            .ok_or_else(|| {
                VfsError::NotFound(format!("Workspace '{workspace_id}' is not mounted. "))
            })
    }

    /// Removes the mount of `workspace_id` and drops its caches.
    ///
    /// Returns the removed mount, if any.
    pub fn unmount(&self, workspace_id: &str) -> Option<Arc<MountPoint>> {
        let (_, mount) = self.mounts.remove(workspace_id)?;
        mount.reset();
        info!(workspace = workspace_id, "Unmounted workspace");
        Some(mount)
    }

    /// Ids of all mounted workspaces, sorted.
    #[must_use]
    pub fn workspace_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.mounts.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }
}
