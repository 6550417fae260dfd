//! Last-modification tracking per top-level project folder.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use quarry_events::{EventSubscriber, VfsEvent};

/// Records, per workspace and top-level folder, when something below it
/// last changed.
///
/// Register it on a mount's event bus registry. Events on the root
/// itself are ignored; a project deleted or moved away is forgotten.
#[derive(Debug, Default)]
pub struct ProjectModificationTracker {
    modified: DashMap<(String, String), DateTime<Utc>>,
}

impl ProjectModificationTracker {
    /// Empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// When `project` of `workspace_id` last changed, if observed.
    #[must_use]
    pub fn last_modified(&self, workspace_id: &str, project: &str) -> Option<DateTime<Utc>> {
        self.modified
            .get(&(workspace_id.to_owned(), project.to_owned()))
            .map(|t| *t)
    }

    /// Number of tracked projects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modified.len()
    }

    /// True if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modified.is_empty()
    }

    fn record(&self, workspace_id: &str, path: &str, at: DateTime<Utc>) {
        if let Some(project) = project_of(path) {
            self.modified
                .insert((workspace_id.to_owned(), project.to_owned()), at);
        }
    }

    /// Forgets a project that disappeared, or records a change below it.
    fn removed(&self, workspace_id: &str, path: &str, at: DateTime<Utc>) {
        match project_of(path) {
            Some(project) if is_top_level(path, project) => {
                self.modified
                    .remove(&(workspace_id.to_owned(), project.to_owned()));
            },
            _ => self.record(workspace_id, path, at),
        }
    }
}

impl EventSubscriber for ProjectModificationTracker {
    fn on_event(&self, event: &VfsEvent) {
        let metadata = event.metadata();
        let ws = metadata.workspace_id.as_str();
        match event {
            VfsEvent::Deleted { path, .. } => self.removed(ws, path, metadata.timestamp),
            VfsEvent::Moved { path, old_path, .. } | VfsEvent::Renamed { path, old_path, .. } => {
                self.removed(ws, old_path, metadata.timestamp);
                self.record(ws, path, metadata.timestamp);
            },
            _ => self.record(ws, event.path(), metadata.timestamp),
        }
    }

    fn name(&self) -> &str {
        "project-modification-tracker"
    }
}

/// First segment of an absolute logical path.
fn project_of(path: &str) -> Option<&str> {
    path.trim_start_matches('/').split('/').next().filter(|s| !s.is_empty())
}

fn is_top_level(path: &str, project: &str) -> bool {
    path.trim_start_matches('/') == project
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_events::EventMetadata;

    fn meta() -> EventMetadata {
        EventMetadata::new("ws")
    }

    #[test]
    fn test_records_top_level_folder() {
        let tracker = ProjectModificationTracker::new();
        tracker.on_event(&VfsEvent::ContentUpdated {
            metadata: meta(),
            path: "/proj/src/a.txt".into(),
        });
        assert!(tracker.last_modified("ws", "proj").is_some());
        assert!(tracker.last_modified("other", "proj").is_none());

        tracker.on_event(&VfsEvent::Created {
            metadata: meta(),
            path: "/".into(),
            is_folder: true,
        });
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_delete_and_move_of_projects() {
        let tracker = ProjectModificationTracker::new();
        tracker.on_event(&VfsEvent::Created {
            metadata: meta(),
            path: "/a".into(),
            is_folder: true,
        });
        tracker.on_event(&VfsEvent::Deleted {
            metadata: meta(),
            path: "/a/x.txt".into(),
            is_folder: false,
        });
        assert!(tracker.last_modified("ws", "a").is_some());

        tracker.on_event(&VfsEvent::Renamed {
            metadata: meta(),
            path: "/b".into(),
            old_path: "/a".into(),
            is_folder: true,
        });
        assert!(tracker.last_modified("ws", "a").is_none());
        assert!(tracker.last_modified("ws", "b").is_some());

        tracker.on_event(&VfsEvent::Deleted {
            metadata: meta(),
            path: "/b".into(),
            is_folder: true,
        });
        assert!(tracker.is_empty());
    }
}
