//! Prelude module - commonly used types for convenient import.
//!
//! Use `use quarry_vfs::prelude::*;` to import all essential types.

// Errors
pub use crate::{ErrorKind, VfsError, VfsResult};

// Mounts
pub use crate::{MountOptions, MountPoint, MountPointBuilder, MountRegistry};

// Items and content
pub use crate::{ContentStream, ItemKind, Metadata, VfsPath, VirtualFile};

// Access control
pub use crate::{AccessControlList, AccessPolicy, AllowAll, Permission, Principal, PrincipalPolicy};

// Collaborators
pub use crate::{NoopIndex, ProjectModificationTracker, SearchError, SearchIndex};
