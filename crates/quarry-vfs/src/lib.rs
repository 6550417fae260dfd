//! Quarry VFS - a local-disk-backed virtual file system.
//!
//! A [`MountPoint`] presents one directory as a tree of addressable items
//! with advisory file locks, multi-valued properties, access control
//! lists and change notifications. Auxiliary state lives in side-car
//! record files next to the items, under hidden `.vfs` directories.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use quarry_vfs::MountPoint;
//!
//! # fn example() -> quarry_vfs::VfsResult<()> {
//! let mount = MountPoint::builder("ws-1", "/srv/workspaces/ws-1").build()?;
//! let root = mount.root()?;
//! let proj = mount.create_folder(&root, "proj")?;
//! let file = mount.create_file(&proj, "a.txt", "hi".as_bytes())?;
//!
//! let token = mount.lock(&file, Duration::ZERO)?;
//! mount.update_content(&file, "new".as_bytes(), Some(&token))?;
//! mount.unlock(&file, &token)?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

/// Access control lists, their store and access policies.
pub mod acl;
/// Segmented, partitioned read-through caches.
pub mod cache;
/// Item identifier encoding.
pub mod codec;
/// Detached file content streams.
pub mod content;
/// VFS error types.
pub mod error;
/// Immutable item handles.
pub mod handle;
/// Advisory file locks.
pub mod lock;
/// Item properties.
pub mod metadata;
/// The mount point orchestrator.
pub mod mount;
/// Logical paths.
pub mod path;
/// Per-path mutual exclusion.
pub mod path_lock;
/// Last-modification tracking of top-level projects.
pub mod project;
/// Workspace → mount lookup.
pub mod registry;
/// Search index seam.
pub mod search;
/// Side-car record layout.
pub mod sidecar;

mod serial;

pub use acl::{
    AccessControlList, AccessPolicy, AclStore, AllowAll, Permission, Principal, PrincipalKind,
    PrincipalPolicy,
};
pub use cache::{CacheLoader, CacheOptions, SegmentedCache};
pub use codec::PathCodec;
pub use content::ContentStream;
pub use error::{ErrorKind, VfsError, VfsResult};
pub use handle::{ItemKind, VirtualFile};
pub use lock::{FileLock, LockState, LockStore};
pub use metadata::{MEDIA_TYPE_PROPERTY, Metadata, MetadataStore};
pub use mount::{MountOptions, MountPoint, MountPointBuilder};
pub use path::VfsPath;
pub use path_lock::PathLockFactory;
pub use project::ProjectModificationTracker;
pub use registry::MountRegistry;
pub use search::{NoopIndex, SearchError, SearchIndex};
