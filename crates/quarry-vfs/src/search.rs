//! Seam to an external full-text/name search index.
//!
//! The mount notifies the index after successful mutations. Index
//! failures are logged by the mount and never fail the operation.

use std::fmt;

use thiserror::Error;

use crate::VfsPath;

/// Failure reported by a search index.
#[derive(Debug, Error)]
#[error("Search index error: {0}")]
pub struct SearchError(pub String);

/// Receives tree change notifications.
pub trait SearchIndex: Send + Sync + fmt::Debug {
    /// An item (and, for folders, its subtree) appeared.
    ///
    /// # Errors
    ///
    /// Implementation specific.
    fn add(&self, path: &VfsPath, is_file: bool) -> Result<(), SearchError>;

    /// The content of an existing file changed.
    ///
    /// # Errors
    ///
    /// Implementation specific.
    fn update(&self, path: &VfsPath, is_file: bool) -> Result<(), SearchError>;

    /// An item (and its subtree) disappeared.
    ///
    /// # Errors
    ///
    /// Implementation specific.
    fn delete(&self, path: &VfsPath, is_file: bool) -> Result<(), SearchError>;
}

/// Index that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopIndex;

impl SearchIndex for NoopIndex {
    fn add(&self, _: &VfsPath, _: bool) -> Result<(), SearchError> {
        Ok(())
    }

    fn update(&self, _: &VfsPath, _: bool) -> Result<(), SearchError> {
        Ok(())
    }

    fn delete(&self, _: &VfsPath, _: bool) -> Result<(), SearchError> {
        Ok(())
    }
}
