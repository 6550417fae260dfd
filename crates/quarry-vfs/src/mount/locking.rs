//! Advisory file locks.

use std::time::Duration;

use tracing::info;

use super::MountPoint;
use crate::acl::Permission;
use crate::handle::VirtualFile;
use crate::{VfsError, VfsResult};

impl MountPoint {
    /// Locks `file` and returns the token needed to modify it.
    ///
    /// A zero `timeout` produces a lock that never expires; otherwise the
    /// lock lapses lazily once the timeout has passed.
    ///
    /// # Errors
    ///
    /// - `VfsError::Forbidden` for folders or if writing is not permitted
    /// - `VfsError::Conflict` if a live lock already exists
    pub fn lock(&self, file: &VirtualFile, timeout: Duration) -> VfsResult<String> {
        if !file.is_file() {
            return Err(VfsError::Forbidden(format!(
                "Unable lock '{}'. Locking allowed for files only. ",
                file.path()
            )));
        }
        self.ensure_permitted(file, Permission::Write, "lock file")?;
        let token = self.locks.lock(file.path(), timeout)?;
        info!(path = %file.path(), timeout = ?timeout, "File locked");
        Ok(token)
    }

    /// Releases the lock on `file`.
    ///
    /// # Errors
    ///
    /// - `VfsError::Conflict` for folders and unlocked files
    /// - `VfsError::Forbidden` if `token` does not match
    pub fn unlock(&self, file: &VirtualFile, token: &str) -> VfsResult<()> {
        if !file.is_file() {
            return Err(VfsError::Conflict(format!(
                "Item '{}' is not a file and is not locked. ",
                file.path()
            )));
        }
        self.locks.unlock(file.path(), token)?;
        info!(path = %file.path(), "File unlocked");
        Ok(())
    }

    /// True if `item` is a file holding a live lock.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::Server` if the lock record cannot be read.
    pub fn is_locked(&self, item: &VirtualFile) -> VfsResult<bool> {
        if !item.is_file() {
            return Ok(false);
        }
        self.locks.is_locked(item.path())
    }
}
