//! Single-version model and content hashes.

use std::fs::File;
use std::io::{self, Read};

use tracing::error;

use super::MountPoint;
use crate::acl::Permission;
use crate::handle::VirtualFile;
use crate::{VfsError, VfsResult};

/// Identifier of the only version a file has.
pub const CURRENT_VERSION_ID: &str = "0";

impl MountPoint {
    /// Version identifier of `item`: `"0"` for files, `None` for folders.
    #[must_use]
    pub fn version_id(&self, item: &VirtualFile) -> Option<&'static str> {
        item.is_file().then_some(CURRENT_VERSION_ID)
    }

    /// Versions of `file` accepted by `filter`. A file has exactly one.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::Forbidden` for folders.
    pub fn versions(
        &self,
        file: &VirtualFile,
        filter: impl Fn(&VirtualFile) -> bool,
    ) -> VfsResult<Vec<VirtualFile>> {
        if !file.is_file() {
            return Err(VfsError::Forbidden(format!(
                "Versioning allowed for files only. Item '{}' is a folder. ",
                file.path()
            )));
        }
        Ok(if filter(file) { vec![file.clone()] } else { Vec::new() })
    }

    /// Version `version_id` of `file`.
    ///
    /// # Errors
    ///
    /// - `VfsError::Forbidden` for folders
    /// - `VfsError::NotFound` for any identifier but `"0"`
    pub fn version(&self, file: &VirtualFile, version_id: &str) -> VfsResult<VirtualFile> {
        if !file.is_file() {
            return Err(VfsError::Forbidden(format!(
                "Versioning allowed for files only. Item '{}' is a folder. ",
                file.path()
            )));
        }
        if version_id != CURRENT_VERSION_ID {
            return Err(VfsError::NotFound(format!(
                "Version '{version_id}' of '{}' does not exist. ",
                file.path()
            )));
        }
        Ok(file.clone())
    }

    /// MD5 digest (lower-case hex) and relative path of every readable
    /// file below `folder`, in breadth-first order. Files yield nothing.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::Server` if a file cannot be read.
    pub fn count_md5_sums(&self, folder: &VirtualFile) -> VfsResult<Vec<(String, String)>> {
        if !folder.is_folder() {
            return Ok(Vec::new());
        }
        let mut sums = Vec::new();
        self.walk(folder, |child| {
            if !self.is_permitted(child.path(), Permission::Read)? {
                return Ok(false);
            }
            if child.is_file() {
                let digest = self.md5_hex(child)?;
                let relative = child.path().relative_to(folder.path()).unwrap_or_default();
                sums.push((digest, relative));
            }
            Ok(true)
        })?;
        Ok(sums)
    }

    fn md5_hex(&self, file: &VirtualFile) -> VfsResult<String> {
        let _guard = self.path_locks.read(file.io_path())?;
        let digest = File::open(file.io_path()).and_then(|mut source| {
            let mut context = md5::Context::new();
            let mut buf = vec![0u8; self.options.copy_buffer_size.max(1)];
            loop {
                match source.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => context.consume(buf.get(..n).unwrap_or_default()),
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => {},
                    Err(e) => return Err(e),
                }
            }
            Ok(context.compute())
        });
        match digest {
            Ok(digest) => Ok(format!("{digest:x}")),
            Err(e) => {
                error!(path = %file.path(), error = %e, "Unable to hash content");
                Err(VfsError::server_with(
                    format!("Unable count md5 sum of '{}'. ", file.path()),
                    e,
                ))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mount::tests::{mount, p};
    use std::fs;

    #[test]
    fn test_single_version_model() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "x").unwrap();
        let m = mount(&dir);
        let a = m.get_by_path(&p("/a.txt")).unwrap();
        let root = m.root().unwrap();

        assert_eq!(m.version_id(&a), Some("0"));
        assert_eq!(m.version_id(&root), None);
        assert_eq!(m.versions(&a, |_| true).unwrap(), [a.clone()]);
        assert!(m.versions(&a, |_| false).unwrap().is_empty());
        assert_eq!(m.version(&a, "0").unwrap(), a);
        assert!(matches!(m.version(&a, "1"), Err(VfsError::NotFound(_))));
        assert!(matches!(m.version(&root, "0"), Err(VfsError::Forbidden(_))));
        assert!(matches!(m.versions(&root, |_| true), Err(VfsError::Forbidden(_))));
    }

    #[test]
    fn test_count_md5_sums() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("d/b")).unwrap();
        fs::write(dir.path().join("d/a.txt"), "hello").unwrap();
        fs::write(dir.path().join("d/b/c.txt"), "").unwrap();
        let m = mount(&dir);
        m.set_property(&m.get_by_path(&p("/d/a.txt")).unwrap(), "k", Some("v"), None)
            .unwrap();

        let sums = m.count_md5_sums(&m.get_by_path(&p("/d")).unwrap()).unwrap();
        assert_eq!(
            sums,
            [
                ("5d41402abc4b2a76b9719d911017c592".to_owned(), "a.txt".to_owned()),
                ("d41d8cd98f00b204e9800998ecf8427e".to_owned(), "b/c.txt".to_owned()),
            ]
        );
        let file = m.get_by_path(&p("/d/a.txt")).unwrap();
        assert!(m.count_md5_sums(&file).unwrap().is_empty());
        assert_eq!(m.held_path_locks(), 0);
    }
}
