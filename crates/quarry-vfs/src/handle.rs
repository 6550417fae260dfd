use std::path::{Path, PathBuf};

use crate::VfsPath;

/// File or folder, decided once when a handle is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    /// Regular file.
    File,
    /// Directory.
    Folder,
}

/// Immutable view of one existing item of a mount.
///
/// Handles carry no cached state beyond the kind probed at construction;
/// rename and move return new handles.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VirtualFile {
    path: VfsPath,
    id: String,
    io_path: PathBuf,
    kind: ItemKind,
}

impl VirtualFile {
    /// Probes `io_path` and builds a handle if something exists there.
    pub(crate) fn probe(path: VfsPath, id: String, io_path: PathBuf) -> Option<Self> {
        let meta = std::fs::metadata(&io_path).ok()?;
        let kind = if meta.is_dir() {
            ItemKind::Folder
        } else {
            ItemKind::File
        };
        Some(Self {
            path,
            id,
            io_path,
            kind,
        })
    }

    /// Logical path.
    #[must_use]
    pub fn path(&self) -> &VfsPath {
        &self.path
    }

    /// Opaque identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Physical location.
    #[must_use]
    pub fn io_path(&self) -> &Path {
        &self.io_path
    }

    /// Item kind.
    #[must_use]
    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    /// Last path segment; empty for the root.
    #[must_use]
    pub fn name(&self) -> &str {
        self.path.name()
    }

    /// True for regular files.
    #[must_use]
    pub fn is_file(&self) -> bool {
        self.kind == ItemKind::File
    }

    /// True for folders.
    #[must_use]
    pub fn is_folder(&self) -> bool {
        self.kind == ItemKind::Folder
    }

    /// True for the mount root.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.path.is_root()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_kinds() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f"), b"x").unwrap();

        let file = VirtualFile::probe(
            VfsPath::parse("/f").unwrap(),
            "id".into(),
            dir.path().join("f"),
        )
        .unwrap();
        assert!(file.is_file());
        assert_eq!(file.name(), "f");

        let root = VirtualFile::probe(VfsPath::root(), "r".into(), dir.path().to_path_buf()).unwrap();
        assert!(root.is_folder());
        assert!(root.is_root());

        assert!(VirtualFile::probe(VfsPath::root(), "m".into(), dir.path().join("missing")).is_none());
    }
}
