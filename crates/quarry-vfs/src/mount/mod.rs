//! The mount point: binds a workspace id to a directory and mediates every
//! operation on the tree below it.
//!
//! Operations are grouped by concern:
//!
//! - `tree`: create, copy, move, rename and delete
//! - `content`: reading and replacing file content
//! - `archive`: zip export and import
//! - `locking`: advisory locks
//! - `props`: properties and access control lists
//! - `versions`: the single-version model and content hashes
//!
//! Every mutation validates permissions and advisory locks first, then
//! touches the disk, then notifies the search index and publishes an
//! event. Index and event failures never fail the operation.

mod archive;
mod content;
mod locking;
mod props;
mod tree;
mod versions;

pub use versions::CURRENT_VERSION_ID;

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use quarry_events::{EventBus, EventMetadata, VfsEvent};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::acl::{AccessPolicy, AclStore, AllowAll, Permission};
use crate::cache::CacheOptions;
use crate::codec::PathCodec;
use crate::handle::VirtualFile;
use crate::lock::LockStore;
use crate::metadata::MetadataStore;
use crate::path_lock::PathLockFactory;
use crate::search::{NoopIndex, SearchIndex};
use crate::sidecar::{SidecarLayout, is_hidden_name};
use crate::{VfsError, VfsPath, VfsResult};

/// Files up to this size are read into memory.
pub const DEFAULT_MAX_BUFFER_SIZE: u64 = 200 * 1024;
/// Chunk size of content copies.
pub const DEFAULT_COPY_BUFFER_SIZE: usize = 8 * 1024;
/// How long to wait for a per-path lock.
pub const DEFAULT_PATH_LOCK_TIMEOUT: Duration = Duration::from_secs(60);
/// Maximum number of entries accepted from one archive.
pub const DEFAULT_MAX_ZIP_ENTRIES: usize = 10_000;

/// Tunables of a [`MountPoint`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountOptions {
    /// Sizing of the lock and metadata caches.
    pub cache: CacheOptions,
    /// Files up to this many bytes are buffered in memory on read;
    /// larger ones are spooled to a temporary file.
    pub max_buffer_size: u64,
    /// Chunk size of content copies.
    pub copy_buffer_size: usize,
    /// How long to wait for a per-path lock before failing.
    pub path_lock_timeout: Duration,
    /// Maximum number of entries accepted from one archive.
    pub max_zip_entries: usize,
}

impl Default for MountOptions {
    fn default() -> Self {
        Self {
            cache: CacheOptions::default(),
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            copy_buffer_size: DEFAULT_COPY_BUFFER_SIZE,
            path_lock_timeout: DEFAULT_PATH_LOCK_TIMEOUT,
            max_zip_entries: DEFAULT_MAX_ZIP_ENTRIES,
        }
    }
}

/// Builder for [`MountPoint`].
#[derive(Debug)]
pub struct MountPointBuilder {
    workspace_id: String,
    root: PathBuf,
    options: MountOptions,
    policy: Arc<dyn AccessPolicy>,
    search: Arc<dyn SearchIndex>,
    events: EventBus,
}

impl MountPointBuilder {
    /// Overrides the default tunables.
    #[must_use]
    pub fn with_options(mut self, options: MountOptions) -> Self {
        self.options = options;
        self
    }

    /// Installs an access policy. Defaults to [`AllowAll`].
    #[must_use]
    pub fn with_access_policy(mut self, policy: Arc<dyn AccessPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Installs a search index. Defaults to [`NoopIndex`].
    #[must_use]
    pub fn with_search_index(mut self, search: Arc<dyn SearchIndex>) -> Self {
        self.search = search;
        self
    }

    /// Publishes change events on `events` instead of a private bus.
    #[must_use]
    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// Builds the mount.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::NotFound` if the root is not an existing
    /// directory and `VfsError::Server` if it cannot be resolved.
    pub fn build(self) -> VfsResult<MountPoint> {
        if !self.root.is_dir() {
            return Err(VfsError::NotFound(format!(
                "Mount root '{}' is not a directory",
                self.root.display()
            )));
        }
        let root = fs::canonicalize(&self.root)
            .map_err(|e| VfsError::server_with("Unable to resolve mount root", e))?;

        let path_locks = Arc::new(PathLockFactory::new(self.options.path_lock_timeout));
        let layout = SidecarLayout::new(&root);
        let locks = LockStore::new(layout.clone(), Arc::clone(&path_locks), self.options.cache);
        let metadata =
            MetadataStore::new(layout.clone(), Arc::clone(&path_locks), self.options.cache);
        let acls = AclStore::new(layout.clone(), Arc::clone(&path_locks));

        info!(workspace = %self.workspace_id, root = %root.display(), "Mounted workspace");

        Ok(MountPoint {
            codec: PathCodec::new(self.workspace_id),
            layout,
            path_locks,
            locks,
            metadata,
            acls,
            policy: self.policy,
            search: self.search,
            events: self.events,
            options: self.options,
        })
    }
}

/// A workspace tree backed by one local directory.
///
/// All caches and the per-path lock factory are owned by the mount and
/// live exactly as long as it does.
#[derive(Debug)]
pub struct MountPoint {
    codec: PathCodec,
    layout: SidecarLayout,
    path_locks: Arc<PathLockFactory>,
    locks: LockStore,
    metadata: MetadataStore,
    acls: AclStore,
    policy: Arc<dyn AccessPolicy>,
    search: Arc<dyn SearchIndex>,
    events: EventBus,
    options: MountOptions,
}

enum IndexOp {
    Add,
    Update,
    Delete,
}

impl MountPoint {
    /// Starts building a mount of `root` for `workspace_id`.
    pub fn builder(workspace_id: impl Into<String>, root: impl Into<PathBuf>) -> MountPointBuilder {
        MountPointBuilder {
            workspace_id: workspace_id.into(),
            root: root.into(),
            options: MountOptions::default(),
            policy: Arc::new(AllowAll),
            search: Arc::new(NoopIndex),
            events: EventBus::new(),
        }
    }

    /// Workspace identifier.
    #[must_use]
    pub fn workspace_id(&self) -> &str {
        self.codec.workspace_id()
    }

    /// Physical mount root.
    #[must_use]
    pub fn root_dir(&self) -> &Path {
        self.layout.root()
    }

    /// Path/identifier codec of this mount.
    #[must_use]
    pub fn codec(&self) -> &PathCodec {
        &self.codec
    }

    /// Bus on which change events are published.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Tunables in effect.
    #[must_use]
    pub fn options(&self) -> &MountOptions {
        &self.options
    }

    /// Number of per-path locks currently held.
    #[must_use]
    pub fn held_path_locks(&self) -> usize {
        self.path_locks.held()
    }

    /// Handle of the mount root.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::NotFound` if the root directory vanished.
    pub fn root(&self) -> VfsResult<VirtualFile> {
        self.require(&VfsPath::root())
    }

    /// Looks up an item by logical path.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::NotFound` for missing or hidden items and
    /// `VfsError::Forbidden` if the item may not be read.
    pub fn get_by_path(&self, path: &VfsPath) -> VfsResult<VirtualFile> {
        if path.elements().iter().any(|e| is_hidden_name(e)) {
            return Err(VfsError::NotFound(format!("Object '{path}' does not exist. ")));
        }
        let item = self.require(path)?;
        if !item.is_root() && !self.is_permitted(path, Permission::Read)? {
            return Err(VfsError::Forbidden(format!(
                "Unable get item '{path}'. Operation not permitted. "
            )));
        }
        Ok(item)
    }

    /// Looks up an item by identifier.
    ///
    /// # Errors
    ///
    /// As [`Self::get_by_path`], plus `VfsError::NotFound` for malformed
    /// or foreign identifiers.
    pub fn get_by_id(&self, id: &str) -> VfsResult<VirtualFile> {
        let path = self.codec.id_to_path(id)?;
        self.get_by_path(&path)
    }

    /// Parent folder, `None` for the root.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::NotFound` if the parent vanished.
    pub fn parent(&self, item: &VirtualFile) -> VfsResult<Option<VirtualFile>> {
        item.path().parent().map(|p| self.require(&p)).transpose()
    }

    /// Child of `parent` named `name`, which may span several segments.
    ///
    /// Returns `None` for files, missing children and hidden names.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::Forbidden` if the child exists but may not be
    /// read, or if `name` climbs out of `parent`.
    pub fn child(&self, parent: &VirtualFile, name: &str) -> VfsResult<Option<VirtualFile>> {
        if !parent.is_folder() {
            return Ok(None);
        }
        let path = parent.path().join(name)?;
        if !path.is_descendant_of(parent.path()) {
            return Err(VfsError::Forbidden(format!(
                "Name '{name}' does not denote a child of '{}'. ",
                parent.path()
            )));
        }
        if path.elements().iter().any(|e| is_hidden_name(e)) {
            return Ok(None);
        }
        let Some(child) = self.handle(&path) else {
            return Ok(None);
        };
        if !self.is_permitted(&path, Permission::Read)? {
            return Err(VfsError::Forbidden(format!(
                "Unable get item '{path}'. Operation not permitted. "
            )));
        }
        Ok(Some(child))
    }

    /// Readable children of `folder`, sorted by name.
    ///
    /// Files have no children. Hidden service and VCS directories are
    /// never listed.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::Server` if the directory cannot be listed.
    pub fn children(&self, folder: &VirtualFile) -> VfsResult<Vec<VirtualFile>> {
        self.children_filtered(folder, |_| true)
    }

    /// Readable children of `folder` accepted by `filter`, sorted by name.
    ///
    /// # Errors
    ///
    /// See [`Self::children`].
    pub fn children_filtered(
        &self,
        folder: &VirtualFile,
        filter: impl Fn(&VirtualFile) -> bool,
    ) -> VfsResult<Vec<VirtualFile>> {
        if !folder.is_folder() {
            return Ok(Vec::new());
        }
        if folder.is_root() && !self.is_permitted(folder.path(), Permission::Read)? {
            return Ok(Vec::new());
        }
        let mut visible = Vec::new();
        for child in self.list_children(folder)? {
            if filter(&child) && self.is_permitted(child.path(), Permission::Read)? {
                visible.push(child);
            }
        }
        Ok(visible)
    }

    /// Drops every cached lock state and property map.
    pub fn reset(&self) {
        self.locks.clear_cache();
        self.metadata.clear_cache();
        info!(workspace = %self.workspace_id(), "Mount caches reset");
    }

    // ---- helpers shared by the operation modules ----

    fn handle(&self, path: &VfsPath) -> Option<VirtualFile> {
        VirtualFile::probe(
            path.clone(),
            self.codec.path_to_id(path),
            self.layout.io_path(path),
        )
    }

    fn require(&self, path: &VfsPath) -> VfsResult<VirtualFile> {
        self.handle(path)
            .ok_or_else(|| VfsError::NotFound(format!("Object '{path}' does not exist. ")))
    }

    fn is_permitted(&self, path: &VfsPath, permission: Permission) -> VfsResult<bool> {
        self.policy.is_permitted(path, permission, &self.acls)
    }

    fn ensure_permitted(&self, item: &VirtualFile, permission: Permission, action: &str) -> VfsResult<()> {
        if self.is_permitted(item.path(), permission)? {
            Ok(())
        } else {
            Err(VfsError::Forbidden(format!(
                "Unable {action} '{}'. Operation not permitted. ",
                item.path()
            )))
        }
    }

    /// Passes for folders, unlocked files and files whose lock matches
    /// `token`.
    fn ensure_unlocked(&self, item: &VirtualFile, token: Option<&str>, action: &str) -> VfsResult<()> {
        if !item.is_file() {
            return Ok(());
        }
        match self.locks.validate_token_if_locked(item.path(), token) {
            Err(VfsError::Forbidden(_)) => Err(VfsError::Forbidden(format!(
                "Unable {action} '{}'. File is locked. ",
                item.path()
            ))),
            other => other,
        }
    }

    /// Every child except hidden ones, sorted by name, without permission
    /// filtering.
    fn list_children(&self, folder: &VirtualFile) -> VfsResult<Vec<VirtualFile>> {
        let entries = fs::read_dir(folder.io_path()).map_err(|e| {
            error!(path = %folder.path(), error = %e, "Unable to list folder");
            VfsError::server_with(format!("Unable get children of '{}'. ", folder.path()), e)
        })?;
        let mut children = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                VfsError::server_with(format!("Unable get children of '{}'. ", folder.path()), e)
            })?;
            let Ok(name) = entry.file_name().into_string() else {
                warn!(path = %folder.path(), "Skipping entry with a non UTF-8 name");
                continue;
            };
            if is_hidden_name(&name) {
                continue;
            }
            let path = folder.path().join(&name)?;
            if let Some(child) = self.handle(&path) {
                children.push(child);
            }
        }
        children.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(children)
    }

    /// Breadth-first walk below `folder`, calling `visit` for every
    /// non-hidden descendant. Returning `false` from `visit` prunes that
    /// descendant's subtree.
    fn walk(
        &self,
        folder: &VirtualFile,
        mut visit: impl FnMut(&VirtualFile) -> VfsResult<bool>,
    ) -> VfsResult<()> {
        let mut queue = VecDeque::from([folder.clone()]);
        while let Some(current) = queue.pop_front() {
            for child in self.list_children(&current)? {
                if visit(&child)? && child.is_folder() {
                    queue.push_back(child);
                }
            }
        }
        Ok(())
    }

    fn publish(&self, build: impl FnOnce(EventMetadata) -> VfsEvent) {
        self.events
            .publish(build(EventMetadata::new(self.workspace_id())));
    }

    fn index(&self, op: IndexOp, path: &VfsPath, is_file: bool) {
        let result = match op {
            IndexOp::Add => self.search.add(path, is_file),
            IndexOp::Update => self.search.update(path, is_file),
            IndexOp::Delete => self.search.delete(path, is_file),
        };
        if let Err(e) = result {
            error!(path = %path, error = %e, "Search index update failed");
        }
    }

    fn touch(&self, item: &VirtualFile) {
        let result = fs::File::open(item.io_path())
            .and_then(|f| f.set_modified(std::time::SystemTime::now()));
        if let Err(e) = result {
            warn!(path = %item.path(), error = %e, "Unable to set timestamp");
        }
    }
}

/// Rejects blank, multi-segment and reserved item names.
fn validate_name(name: &str) -> VfsResult<()> {
    if name.trim().is_empty() {
        return Err(VfsError::Forbidden("Item's name is not set. ".into()));
    }
    if name.contains('/') || name == "." || name == ".." {
        return Err(VfsError::Forbidden(format!("Invalid item name '{name}'. ")));
    }
    if is_hidden_name(name) {
        return Err(VfsError::Forbidden(format!("Name '{name}' is reserved. ")));
    }
    Ok(())
}
