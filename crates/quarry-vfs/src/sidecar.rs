//! On-disk layout of the per-item side-car records.
//!
//! Every directory that has items with locks, properties or ACLs gets a
//! hidden `.vfs` service directory holding one record per item:
//!
//! ```text
//! <parent>/.vfs/locks/<name>_lock
//! <parent>/.vfs/props/<name>_props
//! <parent>/.vfs/acl/<name>_acl
//! ```
//!
//! Records of the mount root live in the root's own `.vfs` directory
//! under an empty item name.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::error;

use crate::{VfsError, VfsPath, VfsResult};

/// Hidden service directory name.
pub const SERVICE_DIR: &str = ".vfs";
/// Version-control directory name, hidden like the service directory.
pub const VCS_DIR: &str = ".git";

/// Returns true for names excluded from listings, walks, copies and archives.
#[must_use]
pub fn is_hidden_name(name: &str) -> bool {
    name == SERVICE_DIR || name == VCS_DIR
}

/// Kind of side-car record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SidecarKind {
    /// Advisory lock record.
    Lock,
    /// Properties record.
    Props,
    /// Access control list record.
    Acl,
}

impl SidecarKind {
    /// Subdirectory of the service directory holding this kind.
    #[must_use]
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Lock => "locks",
            Self::Props => "props",
            Self::Acl => "acl",
        }
    }

    /// Suffix appended to the item name.
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Lock => "_lock",
            Self::Props => "_props",
            Self::Acl => "_acl",
        }
    }
}

/// Maps logical paths to content and side-car locations under one root.
#[derive(Debug, Clone)]
pub struct SidecarLayout {
    root: PathBuf,
}

impl SidecarLayout {
    /// Layout rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Physical mount root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Physical location of the item itself.
    #[must_use]
    pub fn io_path(&self, path: &VfsPath) -> PathBuf {
        path.to_io_path(&self.root)
    }

    /// Physical location of the `kind` record of `path`.
    #[must_use]
    pub fn record_path(&self, kind: SidecarKind, path: &VfsPath) -> PathBuf {
        let dir = path.parent().unwrap_or_default();
        let mut io = dir.to_io_path(&self.root);
        io.push(SERVICE_DIR);
        io.push(kind.dir_name());
        io.push(format!("{}{}", path.name(), kind.suffix()));
        io
    }
}

/// Reads a whole record, `None` if it does not exist.
pub(crate) fn read_record(file: &Path) -> VfsResult<Option<Vec<u8>>> {
    match fs::read(file) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => {
            error!(record = %file.display(), error = %e, "Unable to read side-car record");
            Err(VfsError::server_with("Unable to read item metadata", e))
        },
    }
}

/// Writes a whole record, creating the service directories on demand.
pub(crate) fn write_record(file: &Path, bytes: &[u8]) -> VfsResult<()> {
    let result = match file.parent() {
        Some(dir) => fs::create_dir_all(dir).and_then(|()| fs::write(file, bytes)),
        None => fs::write(file, bytes),
    };
    result.map_err(|e| {
        error!(record = %file.display(), error = %e, "Unable to write side-car record");
        VfsError::server_with("Unable to save item metadata", e)
    })
}

/// Removes a record; a missing record is not an error.
pub(crate) fn remove_record(file: &Path) -> VfsResult<()> {
    match fs::remove_file(file) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        // Another caller may have removed it between our attempt and now.
        Err(_) if !file.exists() => Ok(()),
        Err(e) => {
            error!(record = %file.display(), error = %e, "Unable to remove side-car record");
            Err(VfsError::server_with("Unable to remove item metadata", e))
        },
    }
}

/// Copies a record if the source exists. Returns whether anything was copied.
pub(crate) fn copy_record(from: &Path, to: &Path) -> VfsResult<bool> {
    if !from.is_file() {
        return Ok(false);
    }
    let result = match to.parent() {
        Some(dir) => fs::create_dir_all(dir).and_then(|()| fs::copy(from, to)),
        None => fs::copy(from, to),
    };
    result.map(|_| true).map_err(|e| {
        error!(from = %from.display(), to = %to.display(), error = %e, "Unable to copy side-car record");
        VfsError::server_with("Unable to copy item metadata", e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_paths() {
        let layout = SidecarLayout::new("/srv/ws");
        let file = VfsPath::parse("/proj/a.txt").unwrap();
        assert_eq!(
            layout.record_path(SidecarKind::Lock, &file),
            PathBuf::from("/srv/ws/proj/.vfs/locks/a.txt_lock")
        );
        assert_eq!(
            layout.record_path(SidecarKind::Props, &file),
            PathBuf::from("/srv/ws/proj/.vfs/props/a.txt_props")
        );
        assert_eq!(
            layout.record_path(SidecarKind::Acl, &VfsPath::parse("/top").unwrap()),
            PathBuf::from("/srv/ws/.vfs/acl/top_acl")
        );
        assert_eq!(
            layout.record_path(SidecarKind::Props, &VfsPath::root()),
            PathBuf::from("/srv/ws/.vfs/props/_props")
        );
    }

    #[test]
    fn test_hidden_names() {
        assert!(is_hidden_name(".vfs"));
        assert!(is_hidden_name(".git"));
        assert!(!is_hidden_name(".gitignore"));
    }

    #[test]
    fn test_record_io() {
        let dir = tempfile::tempdir().unwrap();
        let rec = dir.path().join(".vfs/props/x_props");
        assert!(read_record(&rec).unwrap().is_none());
        write_record(&rec, b"abc").unwrap();
        assert_eq!(read_record(&rec).unwrap().unwrap(), b"abc");

        let copy = dir.path().join("sub/.vfs/props/y_props");
        assert!(copy_record(&rec, &copy).unwrap());
        assert!(copy.is_file());

        remove_record(&rec).unwrap();
        remove_record(&rec).unwrap();
        assert!(!rec.exists());
        assert!(!copy_record(&rec, &copy).unwrap());
    }
}
