//! Structural operations: create, copy, move, rename and delete.

use std::collections::{HashSet, VecDeque};
use std::fs::{self, OpenOptions};
use std::io::{self, Read};
use std::path::Path;
use std::time::Duration;

use quarry_events::VfsEvent;
use tracing::{debug, error};

use super::{IndexOp, MountPoint, validate_name};
use crate::acl::Permission;
use crate::handle::VirtualFile;
use crate::metadata::MEDIA_TYPE_PROPERTY;
use crate::sidecar::{SERVICE_DIR, SidecarKind, VCS_DIR};
use crate::{VfsError, VfsPath, VfsResult};

/// Which side-car records travel with a copied tree.
#[derive(Debug, Clone, Copy)]
struct CopyScope {
    acl: bool,
}

impl MountPoint {
    /// Creates a file named `name` in `parent` with `content`.
    ///
    /// Creation is atomic: of two concurrent creators of the same name
    /// exactly one succeeds.
    ///
    /// # Errors
    ///
    /// - `VfsError::Forbidden` if `parent` is not a folder, the name is
    ///   invalid or writing to `parent` is not permitted
    /// - `VfsError::Conflict` if an item with that name exists
    /// - `VfsError::Server` on I/O failure
    pub fn create_file(
        &self,
        parent: &VirtualFile,
        name: &str,
        mut content: impl Read,
    ) -> VfsResult<VirtualFile> {
        if !parent.is_folder() {
            return Err(VfsError::Forbidden(format!(
                "Unable create new file in '{}'. Item specified as parent is not a folder. ",
                parent.path()
            )));
        }
        validate_name(name)?;
        self.ensure_permitted(parent, Permission::Write, "create file in")?;

        let path = parent.path().join(name)?;
        let io = self.layout.io_path(&path);
        match OpenOptions::new().write(true).create_new(true).open(&io) {
            Ok(_) => {},
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(VfsError::Conflict(format!("Item '{path}' already exists. ")));
            },
            Err(e) => {
                error!(path = %path, error = %e, "Unable to create file");
                return Err(VfsError::server_with(format!("Unable create file '{path}'. "), e));
            },
        }
        if let Err(e) = self.write_content(&path, &io, &mut content) {
            if let Err(cleanup) = fs::remove_file(&io) {
                error!(path = %path, error = %cleanup, "Unable to remove partially written file");
            }
            return Err(e);
        }

        let file = self.require(&path)?;
        self.index(IndexOp::Add, &path, true);
        self.publish(|metadata| VfsEvent::Created {
            metadata,
            path: path.to_string(),
            is_folder: false,
        });
        Ok(file)
    }

    /// Creates folder `name` in `parent`.
    ///
    /// `name` may span several segments (`a/b/c`); missing intermediate
    /// folders are created and the first folder actually created is
    /// returned.
    ///
    /// # Errors
    ///
    /// - `VfsError::Forbidden` if `parent` is not a folder, the name is
    ///   blank or reserved, or writing is not permitted
    /// - `VfsError::Conflict` if every segment already exists
    /// - `VfsError::Server` on I/O failure
    pub fn create_folder(&self, parent: &VirtualFile, name: &str) -> VfsResult<VirtualFile> {
        if !parent.is_folder() {
            return Err(VfsError::Forbidden(format!(
                "Unable create folder in '{}'. Item specified as parent is not a folder. ",
                parent.path()
            )));
        }
        if name.trim().is_empty() {
            return Err(VfsError::Forbidden("Item's name is not set. ".into()));
        }
        self.ensure_permitted(parent, Permission::Write, "create folder in")?;

        let target = parent.path().join(name)?;
        let Some(relative) = target
            .is_descendant_of(parent.path())
            .then(|| target.sub_path(parent.path().len()))
        else {
            return Err(VfsError::Forbidden(format!("Invalid folder name '{name}'. ")));
        };
        for element in relative.elements() {
            validate_name(element)?;
        }

        let mut current = parent.path().clone();
        let mut first_created = None;
        for element in relative.elements() {
            current = current.join(element)?;
            let io = self.layout.io_path(&current);
            match fs::create_dir(&io) {
                Ok(()) => {
                    if first_created.is_none() {
                        first_created = Some(current.clone());
                    }
                },
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists && io.is_dir() => {},
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    return Err(VfsError::Conflict(format!(
                        "Item '{current}' already exists and is not a folder. "
                    )));
                },
                Err(e) => {
                    error!(path = %current, error = %e, "Unable to create folder");
                    return Err(VfsError::server_with(
                        format!("Unable create folder '{current}'. "),
                        e,
                    ));
                },
            }
        }

        let Some(created) = first_created else {
            return Err(VfsError::Conflict(format!("Item '{target}' already exists. ")));
        };
        let folder = self.require(&created)?;
        self.publish(|metadata| VfsEvent::Created {
            metadata,
            path: created.to_string(),
            is_folder: true,
        });
        Ok(folder)
    }

    /// Copies `source` into folder `parent`, optionally under `new_name`.
    ///
    /// Descendants the caller may not read are skipped together with
    /// their properties. Lock and ACL records are never copied.
    ///
    /// # Errors
    ///
    /// - `VfsError::Forbidden` when copying onto itself, into its own
    ///   subtree or over a folder that contains it, when `parent` is not
    ///   a folder, or when not permitted
    /// - `VfsError::Conflict` if the destination exists and `overwrite`
    ///   is false
    /// - `VfsError::Server` on I/O failure
    pub fn copy(
        &self,
        source: &VirtualFile,
        parent: &VirtualFile,
        new_name: Option<&str>,
        overwrite: bool,
    ) -> VfsResult<VirtualFile> {
        if source.path() == parent.path() {
            return Err(VfsError::Forbidden("Item cannot be copied to itself. ".into()));
        }
        if !parent.is_folder() {
            return Err(VfsError::Forbidden(
                "Unable copy item. Item specified as parent is not a folder. ".into(),
            ));
        }
        if source.is_folder() && parent.path().is_descendant_of(source.path()) {
            return Err(VfsError::Forbidden(format!(
                "Unable copy item '{}' to '{}'. Item may not have itself as parent. ",
                source.path(),
                parent.path()
            )));
        }
        self.ensure_permitted(parent, Permission::Write, "copy item to")?;

        let destination = self.destination(source, parent, new_name)?;
        if &destination == source.path() {
            return Err(VfsError::Forbidden("Item cannot be copied to itself. ".into()));
        }
        if source.path().is_descendant_of(&destination) {
            return Err(VfsError::Forbidden(format!(
                "Unable copy item '{}' to '{destination}'. Destination contains the item. ",
                source.path()
            )));
        }
        if self.handle(&destination).is_some() {
            self.overwrite(&destination, overwrite)?;
        }

        self.copy_tree(source, &destination, CopyScope { acl: false })?;
        let copy = self.require(&destination)?;
        self.publish(|metadata| VfsEvent::Created {
            metadata,
            path: destination.to_string(),
            is_folder: source.is_folder(),
        });
        Ok(copy)
    }

    /// Moves `source` into folder `parent`, optionally under `new_name`.
    ///
    /// Implemented as copy then delete. The item's ACL records move with
    /// it. Folders are checked for deletability before anything is
    /// copied.
    ///
    /// # Errors
    ///
    /// As [`Self::copy`], plus `VfsError::Forbidden` for the root, for
    /// locked files without the matching token and for folders holding
    /// locked or undeletable descendants.
    pub fn move_to(
        &self,
        source: &VirtualFile,
        parent: &VirtualFile,
        new_name: Option<&str>,
        overwrite: bool,
        lock_token: Option<&str>,
    ) -> VfsResult<VirtualFile> {
        if source.is_root() {
            return Err(VfsError::Forbidden("Unable move root folder. ".into()));
        }
        if source.path() == parent.path() {
            return Err(VfsError::Forbidden("Item cannot be moved to itself. ".into()));
        }
        if !parent.is_folder() {
            return Err(VfsError::Forbidden(
                "Unable move. Item specified as parent is not a folder. ".into(),
            ));
        }
        if source.is_folder() && parent.path().is_descendant_of(source.path()) {
            return Err(VfsError::Forbidden(format!(
                "Unable move item '{}' to '{}'. Item may not have itself as parent. ",
                source.path(),
                parent.path()
            )));
        }
        self.ensure_permitted(source, Permission::Write, "move item")?;
        self.ensure_permitted(parent, Permission::Write, "move item to")?;
        self.ensure_unlocked(source, lock_token, "move file")?;

        let destination = self.destination(source, parent, new_name)?;
        if &destination == source.path() {
            return Err(VfsError::Forbidden("Item cannot be moved to itself. ".into()));
        }
        if source.path().is_descendant_of(&destination) {
            return Err(VfsError::Forbidden(format!(
                "Unable move item '{}' to '{destination}'. Destination contains the item. ",
                source.path()
            )));
        }
        if source.is_folder() {
            self.check_subtree_deletable(source)?;
        }
        if self.handle(&destination).is_some() {
            self.overwrite(&destination, overwrite)?;
        }

        self.copy_tree(source, &destination, CopyScope { acl: true })?;
        self.acls.copy(source.path(), &destination)?;
        self.delete_item(source)?;

        let moved = self.require(&destination)?;
        self.publish(|metadata| VfsEvent::Moved {
            metadata,
            path: destination.to_string(),
            old_path: source.path().to_string(),
            is_folder: moved.is_folder(),
        });
        Ok(moved)
    }

    /// Renames `item` in place and/or updates its media type.
    ///
    /// Passing the current name (or `None`) keeps the item where it is,
    /// which still allows a media type change. The item's ACL records
    /// travel with it.
    ///
    /// # Errors
    ///
    /// - `VfsError::Forbidden` for the root, invalid names, missing
    ///   permission or a locked file without the matching token
    /// - `VfsError::Conflict` if a sibling with the new name exists
    /// - `VfsError::Server` on I/O failure
    pub fn rename(
        &self,
        item: &VirtualFile,
        new_name: Option<&str>,
        new_media_type: Option<&str>,
        lock_token: Option<&str>,
    ) -> VfsResult<VirtualFile> {
        if item.is_root() {
            return Err(VfsError::Forbidden("Unable rename root folder. ".into()));
        }
        self.ensure_permitted(item, Permission::Write, "rename item")?;
        self.ensure_unlocked(item, lock_token, "rename file")?;

        let renamed = match new_name {
            Some(name) if name != item.name() => {
                validate_name(name)?;
                let target = item.path().parent().unwrap_or_default().join(name)?;
                if self.handle(&target).is_some() {
                    return Err(VfsError::Conflict(format!("Item '{target}' already exists. ")));
                }
                if item.is_folder() {
                    self.check_subtree_deletable(item)?;
                }
                self.copy_tree(item, &target, CopyScope { acl: true })?;
                self.acls.copy(item.path(), &target)?;
                self.delete_item(item)?;
                self.require(&target)?
            },
            _ => item.clone(),
        };

        if let Some(media_type) = new_media_type {
            self.metadata
                .set(renamed.path(), MEDIA_TYPE_PROPERTY, Some(media_type))?;
            self.touch(&renamed);
        }

        self.publish(|metadata| VfsEvent::Renamed {
            metadata,
            path: renamed.path().to_string(),
            old_path: item.path().to_string(),
            is_folder: renamed.is_folder(),
        });
        Ok(renamed)
    }

    /// Deletes `item` and everything below it.
    ///
    /// A folder is deleted only if every descendant may be written and
    /// no descendant file holds a live lock; otherwise nothing is
    /// removed.
    ///
    /// # Errors
    ///
    /// - `VfsError::Forbidden` for the root, missing permission, a locked
    ///   file without the matching token, or a locked descendant
    /// - `VfsError::Server` on I/O failure
    pub fn delete(&self, item: &VirtualFile, lock_token: Option<&str>) -> VfsResult<()> {
        if item.is_root() {
            return Err(VfsError::Forbidden("Unable delete root folder. ".into()));
        }
        self.ensure_permitted(item, Permission::Write, "delete item")?;
        self.ensure_unlocked(item, lock_token, "delete item")?;

        self.delete_item(item)?;
        self.publish(|metadata| VfsEvent::Deleted {
            metadata,
            path: item.path().to_string(),
            is_folder: item.is_folder(),
        });
        Ok(())
    }

    fn destination(
        &self,
        source: &VirtualFile,
        parent: &VirtualFile,
        new_name: Option<&str>,
    ) -> VfsResult<VfsPath> {
        let name = match new_name {
            Some(n) if !n.trim().is_empty() => n,
            _ => source.name(),
        };
        validate_name(name)?;
        parent.path().join(name)
    }

    /// Clears an existing destination, or refuses to.
    fn overwrite(&self, destination: &VfsPath, allowed: bool) -> VfsResult<()> {
        if !allowed {
            return Err(VfsError::Conflict(format!(
                "Item '{destination}' already exists. "
            )));
        }
        let existing = self.require(destination)?;
        let token = if existing.is_file() {
            Some(self.lock(&existing, Duration::ZERO)?)
        } else {
            None
        };
        self.delete(&existing, token.as_deref())
    }

    /// Fails unless every descendant of `folder` may be written and none
    /// holds a live lock.
    pub(super) fn check_subtree_deletable(&self, folder: &VirtualFile) -> VfsResult<()> {
        self.walk(folder, |child| {
            if !self.is_permitted(child.path(), Permission::Write)? {
                return Err(VfsError::Forbidden(format!(
                    "Unable delete item '{}'. Operation not permitted. ",
                    child.path()
                )));
            }
            if child.is_file() && self.locks.is_locked(child.path())? {
                return Err(VfsError::Forbidden(format!(
                    "Unable delete item '{}'. Child item '{}' is locked. ",
                    folder.path(),
                    child.path()
                )));
            }
            Ok(true)
        })
    }

    /// Removes `item`, its subtree and its side-car records.
    ///
    /// The caller has already validated `item`'s own lock token.
    fn delete_item(&self, item: &VirtualFile) -> VfsResult<()> {
        if item.is_folder() {
            self.check_subtree_deletable(item)?;
        } else {
            self.locks.remove(item.path())?;
        }

        let removed = if item.is_folder() {
            fs::remove_dir_all(item.io_path())
        } else {
            fs::remove_file(item.io_path())
        };
        if let Err(e) = removed {
            if item.io_path().exists() {
                error!(path = %item.path(), error = %e, "Unable to delete item");
                return Err(VfsError::server_with(
                    format!("Unable delete item '{}'. ", item.path()),
                    e,
                ));
            }
        }
        self.acls.remove(item.path())?;
        self.metadata.remove(item.path())?;

        // Cached entries below a removed subtree would outlive it.
        self.locks.clear_cache();
        self.metadata.clear_cache();

        self.index(IndexOp::Delete, item.path(), item.is_file());
        debug!(path = %item.path(), "Item deleted");
        Ok(())
    }

    /// Copies `source` to `destination` with its properties.
    fn copy_tree(&self, source: &VirtualFile, destination: &VfsPath, scope: CopyScope) -> VfsResult<()> {
        let fail = |e: VfsError| {
            error!(from = %source.path(), to = %destination, error = %e, "Copy failed");
            match e {
                VfsError::Server { source: cause, .. } => VfsError::Server {
                    message: format!("Unable copy '{}' to '{destination}'. ", source.path()),
                    source: cause,
                },
                other => other,
            }
        };

        let mut skip = HashSet::new();
        if source.is_folder() {
            self.walk(source, |child| {
                if self.is_permitted(child.path(), Permission::Read)? {
                    Ok(true)
                } else {
                    skip.insert(child.path().clone());
                    Ok(false)
                }
            })?;
        }

        self.metadata.copy(source.path(), destination).map_err(fail)?;
        if source.is_file() {
            self.copy_file(source.path(), destination).map_err(fail)?;
        } else {
            self.copy_folder(source.path(), destination, &skip, scope)
                .map_err(fail)?;
        }

        self.index(IndexOp::Add, destination, source.is_file());
        Ok(())
    }

    fn copy_file(&self, from: &VfsPath, to: &VfsPath) -> VfsResult<()> {
        let src = self.layout.io_path(from);
        let dst = self.layout.io_path(to);
        let _guards = self.path_locks.read_write(&src, &dst)?;
        fs::copy(&src, &dst).map(|_| ()).map_err(io_failure)
    }

    fn copy_folder(
        &self,
        from: &VfsPath,
        to: &VfsPath,
        skip: &HashSet<VfsPath>,
        scope: CopyScope,
    ) -> VfsResult<()> {
        let mut queue = VecDeque::from([(from.clone(), to.clone())]);
        while let Some((src, dst)) = queue.pop_front() {
            fs::create_dir(self.layout.io_path(&dst)).map_err(io_failure)?;
            let entries = fs::read_dir(self.layout.io_path(&src)).map_err(io_failure)?;
            for entry in entries {
                let entry = entry.map_err(io_failure)?;
                let Ok(name) = entry.file_name().into_string() else {
                    continue;
                };
                match name.as_str() {
                    VCS_DIR => {},
                    SERVICE_DIR => self.copy_records(&src, &dst, skip, scope)?,
                    _ => {
                        let child = src.join(&name)?;
                        if skip.contains(&child) {
                            continue;
                        }
                        let target = dst.join(&name)?;
                        if entry.file_type().map_err(io_failure)?.is_dir() {
                            queue.push_back((child, target));
                        } else {
                            self.copy_file(&child, &target)?;
                        }
                    },
                }
            }
        }
        Ok(())
    }

    /// Copies the side-car records of `src`'s children into `dst`'s
    /// service directory, leaving out skipped children.
    fn copy_records(
        &self,
        src: &VfsPath,
        dst: &VfsPath,
        skip: &HashSet<VfsPath>,
        scope: CopyScope,
    ) -> VfsResult<()> {
        let mut kinds = vec![SidecarKind::Props];
        if scope.acl {
            kinds.push(SidecarKind::Acl);
        }
        let service = self.layout.io_path(src).join(SERVICE_DIR);
        for kind in kinds {
            let dir = service.join(kind.dir_name());
            if !dir.is_dir() {
                continue;
            }
            for entry in fs::read_dir(&dir).map_err(io_failure)? {
                let entry = entry.map_err(io_failure)?;
                let Ok(file_name) = entry.file_name().into_string() else {
                    continue;
                };
                let Some(child_name) = file_name.strip_suffix(kind.suffix()) else {
                    continue;
                };
                if child_name.is_empty() || skip.contains(&src.join(child_name)?) {
                    continue;
                }
                let target = dst.join(child_name)?;
                let record = self.layout.record_path(kind, &target);
                let _guards = self.path_locks.read_write(&entry.path(), &record)?;
                copy_into(&entry.path(), &record)?;
            }
        }
        Ok(())
    }
}

fn copy_into(from: &Path, to: &Path) -> VfsResult<()> {
    if let Some(dir) = to.parent() {
        fs::create_dir_all(dir).map_err(io_failure)?;
    }
    fs::copy(from, to).map(|_| ()).map_err(io_failure)
}

fn io_failure(e: io::Error) -> VfsError {
    VfsError::server_with("I/O failure", e)
}
