//! Reading and replacing file content.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Cursor, Read, Seek, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use quarry_events::VfsEvent;
use tracing::{debug, error};

use super::{IndexOp, MountPoint};
use crate::acl::Permission;
use crate::content::{ContentStream, DEFAULT_MEDIA_TYPE, FOLDER_MEDIA_TYPE};
use crate::handle::VirtualFile;
use crate::metadata::MEDIA_TYPE_PROPERTY;
use crate::{VfsError, VfsPath, VfsResult};

impl MountPoint {
    /// Detached content of `file`.
    ///
    /// The per-path lock is held only while the bytes are buffered; the
    /// returned stream never borrows the mount.
    ///
    /// # Errors
    ///
    /// - `VfsError::Forbidden` for folders or if reading is not permitted
    /// - `VfsError::Server` on I/O failure
    pub fn content(&self, file: &VirtualFile) -> VfsResult<ContentStream> {
        if !file.is_file() {
            return Err(VfsError::Forbidden(format!(
                "Unable get content. Item '{}' is not a file. ",
                file.path()
            )));
        }
        self.ensure_permitted(file, Permission::Read, "get content of")?;

        let media_type = self.media_type(file)?;
        let last_modified = self.last_modified(file)?;
        let failed = |e: io::Error| {
            error!(path = %file.path(), error = %e, "Unable to read content");
            VfsError::server_with(format!("Unable get content of '{}'. ", file.path()), e)
        };

        let _guard = self.path_locks.read(file.io_path())?;
        let length = fs::metadata(file.io_path()).map_err(failed)?.len();
        let mut source = File::open(file.io_path()).map_err(failed)?;
        let reader: Box<dyn Read + Send> = if length <= self.options.max_buffer_size {
            let mut buf = Vec::with_capacity(usize::try_from(length).unwrap_or_default());
            source.read_to_end(&mut buf).map_err(failed)?;
            Box::new(Cursor::new(buf))
        } else {
            let mut spool = tempfile::tempfile().map_err(failed)?;
            self.copy_chunked(&mut source, &mut spool).map_err(failed)?;
            spool.rewind().map_err(failed)?;
            Box::new(spool)
        };
        Ok(ContentStream::new(
            file.name(),
            media_type,
            length,
            last_modified,
            reader,
        ))
    }

    /// Replaces the content of `file`.
    ///
    /// # Errors
    ///
    /// - `VfsError::Forbidden` for folders, missing permission or a
    ///   locked file without the matching token
    /// - `VfsError::Server` on I/O failure
    pub fn update_content(
        &self,
        file: &VirtualFile,
        mut content: impl Read,
        lock_token: Option<&str>,
    ) -> VfsResult<()> {
        if !file.is_file() {
            return Err(VfsError::Forbidden(format!(
                "Unable update content. Item '{}' is not a file. ",
                file.path()
            )));
        }
        self.ensure_permitted(file, Permission::Write, "update content of")?;
        self.ensure_unlocked(file, lock_token, "update content of file")?;

        self.write_content(file.path(), file.io_path(), &mut content)?;
        self.index(IndexOp::Update, file.path(), true);
        self.publish(|metadata| VfsEvent::ContentUpdated {
            metadata,
            path: file.path().to_string(),
        });
        Ok(())
    }

    /// Media type from the `vfs:mimeType` property, or the default for
    /// the item's kind.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::Server` if the properties cannot be read.
    pub fn media_type(&self, item: &VirtualFile) -> VfsResult<String> {
        if let Some(media_type) = self.metadata.value(item.path(), MEDIA_TYPE_PROPERTY)? {
            return Ok(media_type);
        }
        Ok(if item.is_folder() {
            FOLDER_MEDIA_TYPE
        } else {
            DEFAULT_MEDIA_TYPE
        }
        .to_owned())
    }

    /// Modification time of the backing file or directory.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::Server` if the item cannot be inspected.
    pub fn last_modified(&self, item: &VirtualFile) -> VfsResult<DateTime<Utc>> {
        fs::metadata(item.io_path())
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .map_err(|e| {
                VfsError::server_with(format!("Unable get timestamp of '{}'. ", item.path()), e)
            })
    }

    /// Content length in bytes; zero for folders.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::Server` if the item cannot be inspected.
    pub fn length(&self, item: &VirtualFile) -> VfsResult<u64> {
        if item.is_folder() {
            return Ok(0);
        }
        fs::metadata(item.io_path()).map(|m| m.len()).map_err(|e| {
            VfsError::server_with(format!("Unable get length of '{}'. ", item.path()), e)
        })
    }

    /// Truncates `io` and writes `content` into it under the path's write
    /// lock.
    pub(super) fn write_content(&self, path: &VfsPath, io: &Path, content: &mut dyn Read) -> VfsResult<()> {
        let _guard = self.path_locks.write(io)?;
        let result = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(io)
            .and_then(|mut file| {
                let written = self.copy_chunked(content, &mut file)?;
                file.flush()?;
                Ok(written)
            });
        match result {
            Ok(written) => {
                debug!(path = %path, bytes = written, "Content written");
                Ok(())
            },
            Err(e) => {
                error!(path = %path, error = %e, "Unable to write content");
                Err(VfsError::server_with(format!("Unable write content of '{path}'. "), e))
            },
        }
    }

    /// Copies `from` into `to` in chunks of the configured size.
    pub(super) fn copy_chunked(&self, from: &mut dyn Read, to: &mut dyn Write) -> io::Result<u64> {
        let mut buf = vec![0u8; self.options.copy_buffer_size.max(1)];
        let mut total = 0u64;
        loop {
            let n = match from.read(&mut buf) {
                Ok(0) => return Ok(total),
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            to.write_all(buf.get(..n).unwrap_or_default())?;
            total = total.saturating_add(u64::try_from(n).unwrap_or(u64::MAX));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mount::MountOptions;
    use crate::mount::tests::{mount, p};
    use std::time::Duration;

    #[test]
    fn test_small_and_large_content() {
        let dir = tempfile::tempdir().unwrap();
        let big = vec![7u8; 4096];
        fs::write(dir.path().join("small.txt"), "hi").unwrap();
        fs::write(dir.path().join("big.bin"), &big).unwrap();
        let m = MountPoint::builder("ws", dir.path())
            .with_options(MountOptions {
                max_buffer_size: 1024,
                copy_buffer_size: 100,
                ..MountOptions::default()
            })
            .build()
            .unwrap();

        let small = m.content(&m.get_by_path(&p("/small.txt")).unwrap()).unwrap();
        assert_eq!(small.length(), 2);
        assert_eq!(small.media_type(), DEFAULT_MEDIA_TYPE);
        assert_eq!(small.into_bytes().unwrap(), b"hi");

        let large = m.content(&m.get_by_path(&p("/big.bin")).unwrap()).unwrap();
        assert_eq!(large.length(), 4096);
        assert_eq!(m.held_path_locks(), 0);
        assert_eq!(large.into_bytes().unwrap(), big);
    }

    #[test]
    fn test_content_of_folder_forbidden() {
        let dir = tempfile::tempdir().unwrap();
        let m = mount(&dir);
        assert!(matches!(m.content(&m.root().unwrap()), Err(VfsError::Forbidden(_))));
        assert_eq!(m.length(&m.root().unwrap()).unwrap(), 0);
        assert_eq!(m.media_type(&m.root().unwrap()).unwrap(), FOLDER_MEDIA_TYPE);
    }

    #[test]
    fn test_update_content_requires_token_when_locked() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "hi").unwrap();
        let m = mount(&dir);
        let a = m.get_by_path(&p("/a.txt")).unwrap();
        let token = m.lock(&a, Duration::ZERO).unwrap();

        assert!(matches!(
            m.update_content(&a, "nope".as_bytes(), None),
            Err(VfsError::Forbidden(_))
        ));
        assert!(matches!(
            m.update_content(&a, "nope".as_bytes(), Some("wrong")),
            Err(VfsError::Forbidden(_))
        ));
        m.update_content(&a, "new bytes".as_bytes(), Some(&token)).unwrap();
        assert_eq!(fs::read_to_string(a.io_path()).unwrap(), "new bytes");
        assert_eq!(m.length(&a).unwrap(), 9);
    }

    #[test]
    fn test_update_content_truncates() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "a much longer body").unwrap();
        let m = mount(&dir);
        let a = m.get_by_path(&p("/a.txt")).unwrap();
        m.update_content(&a, "short".as_bytes(), None).unwrap();
        assert_eq!(m.content(&a).unwrap().into_bytes().unwrap(), b"short");
    }
}
