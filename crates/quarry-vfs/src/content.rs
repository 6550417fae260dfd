use std::fmt;
use std::io::{self, Read};

use chrono::{DateTime, Utc};

/// Media type reported for folders.
pub const FOLDER_MEDIA_TYPE: &str = "text/directory";
/// Media type reported for files without an explicit one.
pub const DEFAULT_MEDIA_TYPE: &str = "application/octet-stream";
/// Media type of zip exports.
pub const ZIP_MEDIA_TYPE: &str = "application/zip";

/// Detached content of a file or an export.
///
/// The reader never borrows the mount: small payloads are held in memory
/// and large ones in an anonymous temporary file that disappears when the
/// stream is dropped.
pub struct ContentStream {
    name: String,
    media_type: String,
    length: u64,
    last_modified: DateTime<Utc>,
    reader: Box<dyn Read + Send>,
}

impl ContentStream {
    pub(crate) fn new(
        name: impl Into<String>,
        media_type: impl Into<String>,
        length: u64,
        last_modified: DateTime<Utc>,
        reader: Box<dyn Read + Send>,
    ) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            length,
            last_modified,
            reader,
        }
    }

    /// File name suggested to consumers.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Media type of the payload.
    #[must_use]
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Payload length in bytes.
    #[must_use]
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Modification time of the source.
    #[must_use]
    pub fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }

    /// Reads the whole payload.
    ///
    /// # Errors
    ///
    /// Propagates read failures of the underlying buffer or spool file.
    pub fn into_bytes(mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.reader.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

impl Read for ContentStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl fmt::Debug for ContentStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentStream")
            .field("name", &self.name)
            .field("media_type", &self.media_type)
            .field("length", &self.length)
            .field("last_modified", &self.last_modified)
            .finish_non_exhaustive()
    }
}
