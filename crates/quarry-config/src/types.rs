//! Configuration struct definitions.
//!
//! Every section defaults to the values in `defaults.toml`, so partial
//! files deserialize cleanly.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Which directory is mounted and under which workspace id.
    pub mount: MountSection,
    /// Lock and property cache sizing.
    pub cache: CacheSection,
    /// Content buffering, timeouts and archive limits.
    pub io: IoSection,
    /// Logging.
    pub logging: LoggingSection,
}

/// `[mount]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountSection {
    /// Identifier encoded into every item id.
    pub workspace_id: String,
    /// Directory to mount; empty means the current directory.
    pub root: PathBuf,
}

impl Default for MountSection {
    fn default() -> Self {
        Self {
            workspace_id: "default".to_owned(),
            root: PathBuf::new(),
        }
    }
}

/// `[cache]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    /// Number of independently locked partitions, rounded up to a power
    /// of two.
    pub partitions: usize,
    /// Total capacity of the protected segments.
    pub protected_size: usize,
    /// Total capacity of the probationary segments.
    pub probationary_size: usize,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            partitions: 8,
            protected_size: 100,
            probationary_size: 200,
        }
    }
}

/// `[io]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoSection {
    /// Files up to this many bytes are buffered in memory on read.
    pub max_buffer_size: u64,
    /// Chunk size of content copies.
    pub copy_buffer_size: usize,
    /// Milliseconds to wait for a per-path lock.
    pub path_lock_timeout_ms: u64,
    /// Maximum number of entries accepted from one archive.
    pub max_zip_entries: usize,
}

impl Default for IoSection {
    fn default() -> Self {
        Self {
            max_buffer_size: 200 * 1024,
            copy_buffer_size: 8 * 1024,
            path_lock_timeout_ms: 60_000,
            max_zip_entries: 10_000,
        }
    }
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Level filter.
    pub level: String,
    /// `pretty`, `compact`, `json` or `full`.
    pub format: String,
    /// Extra filter directives.
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
        }
    }
}
