//! Zip export and import.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom};

use chrono::Utc;
use quarry_events::VfsEvent;
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::{IndexOp, MountPoint};
use crate::acl::Permission;
use crate::content::{ContentStream, ZIP_MEDIA_TYPE};
use crate::handle::VirtualFile;
use crate::sidecar::is_hidden_name;
use crate::{VfsError, VfsPath, VfsResult};

impl MountPoint {
    /// Exports the subtree of `folder` as a zip archive.
    ///
    /// Items rejected by `filter` or not readable are left out together
    /// with their subtrees. Entry names are relative to `folder`; folder
    /// entries end with `/`.
    ///
    /// # Errors
    ///
    /// - `VfsError::Forbidden` if `folder` is a file
    /// - `VfsError::Server` on I/O failure
    pub fn zip(
        &self,
        folder: &VirtualFile,
        filter: impl Fn(&VirtualFile) -> bool,
    ) -> VfsResult<ContentStream> {
        if !folder.is_folder() {
            return Err(VfsError::Forbidden(format!(
                "Unable export to zip. Item '{}' is not a folder. ",
                folder.path()
            )));
        }
        let failed = |e: &dyn std::fmt::Display| {
            VfsError::server(format!("Unable export '{}' to zip: {e}. ", folder.path()))
        };

        let spool = tempfile::tempfile().map_err(|e| failed(&e))?;
        let mut writer = ZipWriter::new(spool);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut entries = 0usize;
        self.walk(folder, |child| {
            if !filter(child) || !self.is_permitted(child.path(), Permission::Read)? {
                return Ok(false);
            }
            let name = child.path().relative_to(folder.path()).unwrap_or_default();
            if child.is_folder() {
                writer
                    .add_directory(format!("{name}/"), options)
                    .map_err(|e| failed(&e))?;
            } else {
                writer.start_file(name, options).map_err(|e| failed(&e))?;
                let _guard = self.path_locks.read(child.io_path())?;
                let mut source = File::open(child.io_path()).map_err(|e| failed(&e))?;
                self.copy_chunked(&mut source, &mut writer)
                    .map_err(|e| failed(&e))?;
            }
            entries = entries.saturating_add(1);
            Ok(true)
        })?;

        let mut spool = writer.finish().map_err(|e| failed(&e))?;
        let length = spool.seek(SeekFrom::End(0)).map_err(|e| failed(&e))?;
        spool.rewind().map_err(|e| failed(&e))?;

        let base = if folder.is_root() {
            self.workspace_id()
        } else {
            folder.name()
        };
        info!(path = %folder.path(), entries, bytes = length, "Exported zip");
        Ok(ContentStream::new(
            format!("{base}.zip"),
            ZIP_MEDIA_TYPE,
            length,
            Utc::now(),
            Box::new(spool),
        ))
    }

    /// Imports a zip archive into `parent`.
    ///
    /// The first `strip` segments of every entry name are dropped;
    /// entries with no segments left are skipped. Missing folders are
    /// created.
    ///
    /// # Errors
    ///
    /// - `VfsError::Forbidden` if `parent` is not a folder, writing is
    ///   not permitted, an existing target file is locked, or the archive
    ///   holds too many entries
    /// - `VfsError::Conflict` if a target file exists and `overwrite` is
    ///   false, or a target folder is a file
    /// - `VfsError::Server` for malformed archives and I/O failure
    pub fn unzip(
        &self,
        parent: &VirtualFile,
        mut input: impl Read,
        overwrite: bool,
        strip: usize,
    ) -> VfsResult<()> {
        if !parent.is_folder() {
            return Err(VfsError::Forbidden(format!(
                "Unable import zip. Item '{}' is not a folder. ",
                parent.path()
            )));
        }
        self.ensure_permitted(parent, Permission::Write, "import zip to")?;

        let server = |e: &dyn std::fmt::Display| {
            VfsError::server(format!("Unable import zip to '{}': {e}. ", parent.path()))
        };
        let mut spool = tempfile::tempfile().map_err(|e| server(&e))?;
        io::copy(&mut input, &mut spool).map_err(|e| server(&e))?;
        spool.rewind().map_err(|e| server(&e))?;
        let mut archive = ZipArchive::new(spool).map_err(|e| server(&e))?;
        if archive.len() > self.options.max_zip_entries {
            return Err(VfsError::Forbidden(format!(
                "Archive holds {} entries, more than the allowed {}. ",
                archive.len(),
                self.options.max_zip_entries
            )));
        }

        for index in 0..archive.len() {
            let mut entry = archive.by_index(index).map_err(|e| server(&e))?;
            let Some(target) = entry_target(parent.path(), entry.name(), strip) else {
                continue;
            };
            if entry.is_dir() {
                self.import_folder(&target)?;
            } else {
                self.import_file(&target, &mut entry, overwrite)?;
            }
        }

        self.index(IndexOp::Add, parent.path(), false);
        info!(path = %parent.path(), entries = archive.len(), "Imported zip");
        Ok(())
    }

    fn import_folder(&self, path: &VfsPath) -> VfsResult<()> {
        let io = self.layout.io_path(path);
        if io.is_dir() {
            return Ok(());
        }
        if io.exists() {
            return Err(VfsError::Conflict(format!(
                "Item '{path}' already exists and is not a folder. "
            )));
        }
        fs::create_dir_all(&io)
            .map_err(|e| VfsError::server_with(format!("Unable create folder '{path}'. "), e))?;
        self.publish(|metadata| VfsEvent::Created {
            metadata,
            path: path.to_string(),
            is_folder: true,
        });
        Ok(())
    }

    fn import_file(&self, path: &VfsPath, content: &mut dyn Read, overwrite: bool) -> VfsResult<()> {
        if let Some(dir) = path.parent() {
            self.import_folder(&dir)?;
        }
        let io = self.layout.io_path(path);

        if let Some(existing) = self.handle(path) {
            if existing.is_folder() {
                return Err(VfsError::Conflict(format!(
                    "Item '{path}' already exists and is a folder. "
                )));
            }
            if self.locks.is_locked(path)? {
                return Err(VfsError::Forbidden(format!(
                    "File '{path}' already exists and is locked. "
                )));
            }
            self.ensure_permitted(&existing, Permission::Write, "update file")?;
            if !overwrite {
                return Err(VfsError::Conflict(format!("File '{path}' already exists. ")));
            }
            self.write_content(path, &io, content)?;
            debug!(path = %path, "Overwrote file from archive");
            self.publish(|metadata| VfsEvent::ContentUpdated {
                metadata,
                path: path.to_string(),
            });
            return Ok(());
        }

        match OpenOptions::new().write(true).create_new(true).open(&io) {
            Ok(_) => {},
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(VfsError::Conflict(format!("File '{path}' already exists. ")));
            },
            Err(e) => {
                return Err(VfsError::server_with(format!("Unable create file '{path}'. "), e));
            },
        }
        self.write_content(path, &io, content)?;
        self.publish(|metadata| VfsEvent::Created {
            metadata,
            path: path.to_string(),
            is_folder: false,
        });
        Ok(())
    }
}

/// Logical target of archive entry `name` below `parent`, or `None` when
/// the entry is stripped away, climbs out, or touches a reserved name.
fn entry_target(parent: &VfsPath, name: &str, strip: usize) -> Option<VfsPath> {
    let segments: Vec<&str> = name.split('/').filter(|s| !s.is_empty()).collect();
    let rest = segments.get(strip..).filter(|rest| !rest.is_empty())?;
    if rest
        .iter()
        .any(|s| *s == "." || *s == ".." || s.contains('\\') || is_hidden_name(s))
    {
        warn!(entry = name, "Skipping archive entry with a reserved or relative name");
        return None;
    }
    let mut target = parent.clone();
    for segment in rest {
        target = target.join(segment).ok()?;
    }
    Some(target)
}
