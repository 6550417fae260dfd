use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use crate::{VfsError, VfsPath, VfsResult};

const ROOT_MARKER: &str = "root";

/// Reversible mapping between logical paths and opaque item identifiers.
///
/// An identifier is the URL-safe base64 encoding of
/// `"{workspace_id}:{path}"`, where the root is spelled `root`.
#[derive(Debug, Clone)]
pub struct PathCodec {
    workspace_id: String,
}

impl PathCodec {
    /// Creates a codec for one workspace.
    #[must_use]
    pub fn new(workspace_id: impl Into<String>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
        }
    }

    /// Workspace this codec is bound to.
    #[must_use]
    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    /// Encodes `path` into an identifier.
    #[must_use]
    pub fn path_to_id(&self, path: &VfsPath) -> String {
        let raw = if path.is_root() {
            format!("{}:{ROOT_MARKER}", self.workspace_id)
        } else {
            format!("{}:{path}", self.workspace_id)
        };
        URL_SAFE_NO_PAD.encode(raw)
    }

    /// Decodes an identifier produced by [`Self::path_to_id`].
    ///
    /// # Errors
    ///
    /// Returns `VfsError::NotFound` if the identifier is not valid base64,
    /// is not UTF-8, lacks the `workspace:` prefix or names another
    /// workspace.
    pub fn id_to_path(&self, id: &str) -> VfsResult<VfsPath> {
        let not_found = || VfsError::NotFound(format!("Object '{id}' does not exist"));

        let bytes = URL_SAFE_NO_PAD.decode(id).map_err(|_| not_found())?;
        let raw = String::from_utf8(bytes).map_err(|_| not_found())?;
        let path = raw
            .strip_prefix(self.workspace_id.as_str())
            .and_then(|rest| rest.strip_prefix(':'))
            .ok_or_else(not_found)?;
        if path == ROOT_MARKER {
            return Ok(VfsPath::root());
        }
        if !path.starts_with('/') {
            return Err(not_found());
        }
        VfsPath::parse(path).map_err(|_| not_found())
    }
}
