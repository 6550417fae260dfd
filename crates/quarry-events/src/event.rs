//! Event types published by a mount point.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata attached to every event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// When the event was created.
    pub timestamp: DateTime<Utc>,
    /// Workspace whose tree changed.
    pub workspace_id: String,
}

impl EventMetadata {
    /// Create new event metadata for `workspace_id`.
    #[must_use]
    pub fn new(workspace_id: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            workspace_id: workspace_id.into(),
        }
    }
}

/// A change to a mounted tree.
///
/// Paths are logical, slash-separated and absolute (`/a/b`, root is `/`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VfsEvent {
    /// A file or folder was created.
    Created {
        /// Event metadata.
        metadata: EventMetadata,
        /// Path of the new item.
        path: String,
        /// True for folders.
        is_folder: bool,
    },

    /// File content was replaced.
    ContentUpdated {
        /// Event metadata.
        metadata: EventMetadata,
        /// Path of the file.
        path: String,
    },

    /// A file or folder was deleted.
    Deleted {
        /// Event metadata.
        metadata: EventMetadata,
        /// Path of the removed item.
        path: String,
        /// True for folders.
        is_folder: bool,
    },

    /// An item was moved to another parent.
    Moved {
        /// Event metadata.
        metadata: EventMetadata,
        /// New path.
        path: String,
        /// Path before the move.
        old_path: String,
        /// True for folders.
        is_folder: bool,
    },

    /// An item was renamed in place, or its media type changed.
    Renamed {
        /// Event metadata.
        metadata: EventMetadata,
        /// New path.
        path: String,
        /// Path before the rename.
        old_path: String,
        /// True for folders.
        is_folder: bool,
    },

    /// The access control list of an item changed.
    AclUpdated {
        /// Event metadata.
        metadata: EventMetadata,
        /// Path of the item.
        path: String,
        /// True for folders.
        is_folder: bool,
    },

    /// The properties of an item changed.
    PropertiesUpdated {
        /// Event metadata.
        metadata: EventMetadata,
        /// Path of the item.
        path: String,
        /// True for folders.
        is_folder: bool,
    },
}

impl VfsEvent {
    /// Get the event metadata.
    #[must_use]
    pub fn metadata(&self) -> &EventMetadata {
        match self {
            Self::Created { metadata, .. }
            | Self::ContentUpdated { metadata, .. }
            | Self::Deleted { metadata, .. }
            | Self::Moved { metadata, .. }
            | Self::Renamed { metadata, .. }
            | Self::AclUpdated { metadata, .. }
            | Self::PropertiesUpdated { metadata, .. } => metadata,
        }
    }

    /// Path the event is about (the new path for moves and renames).
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Created { path, .. }
            | Self::ContentUpdated { path, .. }
            | Self::Deleted { path, .. }
            | Self::Moved { path, .. }
            | Self::Renamed { path, .. }
            | Self::AclUpdated { path, .. }
            | Self::PropertiesUpdated { path, .. } => path,
        }
    }

    /// Previous path for moves and renames.
    #[must_use]
    pub fn old_path(&self) -> Option<&str> {
        match self {
            Self::Moved { old_path, .. } | Self::Renamed { old_path, .. } => Some(old_path),
            _ => None,
        }
    }

    /// Get the event type as a string.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::ContentUpdated { .. } => "content_updated",
            Self::Deleted { .. } => "deleted",
            Self::Moved { .. } => "moved",
            Self::Renamed { .. } => "renamed",
            Self::AclUpdated { .. } => "acl_updated",
            Self::PropertiesUpdated { .. } => "properties_updated",
        }
    }

    /// True for events that change the shape of the tree.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::Created { .. } | Self::Deleted { .. } | Self::Moved { .. } | Self::Renamed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_tagging() {
        let event = VfsEvent::Moved {
            metadata: EventMetadata::new("ws"),
            path: "/b".into(),
            old_path: "/a".into(),
            is_folder: false,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "moved");
        assert_eq!(json["old_path"], "/a");
        assert_eq!(json["metadata"]["workspace_id"], "ws");

        let back: VfsEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back.event_type(), "moved");
        assert_eq!(back.old_path(), Some("/a"));
    }

    #[test]
    fn test_accessors() {
        let event = VfsEvent::ContentUpdated {
            metadata: EventMetadata::new("ws"),
            path: "/f".into(),
        };
        assert_eq!(event.path(), "/f");
        assert!(event.old_path().is_none());
        assert!(!event.is_structural());
        assert_eq!(event.metadata().workspace_id, "ws");
    }
}
