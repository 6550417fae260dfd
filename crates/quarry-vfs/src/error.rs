use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

/// Boxed cause attached to server errors for diagnostics.
pub type BoxedCause = Box<dyn StdError + Send + Sync + 'static>;

/// Virtual filesystem errors.
///
/// The four variants map one-to-one onto the outcome classes callers care
/// about. `Server` keeps its underlying cause reachable through
/// [`std::error::Error::source`] but never prints it in `Display`.
#[derive(Debug, Error)]
pub enum VfsError {
    /// Referenced item, lock record or workspace mapping does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Permission denied, wrong item kind or locked-item violation.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Name collision, double lock or refused overwrite.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Unexpected I/O failure or corrupt side-car record.
    #[error("Server error: {message}")]
    Server {
        /// Caller-safe description.
        message: String,
        /// Underlying cause, if any.
        #[source]
        source: Option<BoxedCause>,
    },
}

/// Coarse classification of a [`VfsError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`VfsError::NotFound`].
    NotFound,
    /// See [`VfsError::Forbidden`].
    Forbidden,
    /// See [`VfsError::Conflict`].
    Conflict,
    /// See [`VfsError::Server`].
    Server,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotFound => "not_found",
            Self::Forbidden => "forbidden",
            Self::Conflict => "conflict",
            Self::Server => "server",
        };
        f.write_str(s)
    }
}

impl VfsError {
    /// Server error without an attached cause.
    pub fn server(message: impl Into<String>) -> Self {
        Self::Server {
            message: message.into(),
            source: None,
        }
    }

    /// Server error wrapping an underlying cause.
    pub fn server_with(
        message: impl Into<String>,
        cause: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Server {
            message: message.into(),
            source: Some(Box::new(cause)),
        }
    }

    /// Classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Server { .. } => ErrorKind::Server,
        }
    }
}

/// Convenience result type for VFS operations.
pub type VfsResult<T> = Result<T, VfsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_display_hides_cause() {
        let err = VfsError::server_with(
            "Unable lock file '/a'. ",
            std::io::Error::other("disk on fire at /srv/secret"),
        );
        let shown = err.to_string();
        assert!(shown.contains("Unable lock file"));
        assert!(!shown.contains("/srv/secret"));
        assert!(err.source().is_some());
        assert_eq!(err.kind(), ErrorKind::Server);
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(VfsError::NotFound("x".into()).kind(), ErrorKind::NotFound);
        assert_eq!(VfsError::Forbidden("x".into()).kind(), ErrorKind::Forbidden);
        assert_eq!(VfsError::Conflict("x".into()).kind(), ErrorKind::Conflict);
        assert_eq!(ErrorKind::Conflict.to_string(), "conflict");
    }
}
