//! Test harness helpers.

use std::path::Path;
use std::sync::Arc;

use quarry_events::EventBus;
use quarry_vfs::{MountOptions, MountPoint, VfsPath, VirtualFile};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

use crate::mocks::{DenyListPolicy, RecordingIndex};

/// Create a temporary directory for testing.
///
/// # Panics
///
/// Panics if the temporary directory cannot be created.
#[must_use]
pub fn test_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

/// Set up test logging with the given filter.
///
/// Safe to call from every test; only the first call installs a
/// subscriber.
pub fn setup_test_logging(filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_test_writer()
        .try_init();
}

/// A mount over a fresh temporary directory, wired to a recording index
/// and a deny-list policy.
///
/// The directory is removed when the fixture is dropped.
#[derive(Debug)]
pub struct TestMount {
    /// Backing directory.
    pub dir: TempDir,
    /// The mount under test.
    pub mount: MountPoint,
    /// Receives the mount's search notifications.
    pub index: Arc<RecordingIndex>,
    /// Access policy of the mount. Permits everything until told otherwise.
    pub policy: Arc<DenyListPolicy>,
}

impl TestMount {
    /// Mount a fresh directory as workspace `test`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options("test", MountOptions::default(), EventBus::new())
    }

    /// Mount a fresh directory with explicit options and event bus.
    ///
    /// # Panics
    ///
    /// Panics if the mount cannot be built.
    #[must_use]
    pub fn with_options(workspace_id: &str, options: MountOptions, events: EventBus) -> Self {
        let dir = test_dir();
        let index = Arc::new(RecordingIndex::new());
        let policy = Arc::new(DenyListPolicy::new());
        let mount = MountPoint::builder(workspace_id, dir.path())
            .with_options(options)
            .with_search_index(Arc::clone(&index) as Arc<dyn quarry_vfs::SearchIndex>)
            .with_access_policy(Arc::clone(&policy) as Arc<dyn quarry_vfs::AccessPolicy>)
            .with_event_bus(events)
            .build()
            .expect("Failed to build test mount");
        Self {
            dir,
            mount,
            index,
            policy,
        }
    }

    /// Backing directory on disk.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Parse a logical path.
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid logical path.
    #[must_use]
    pub fn vpath(&self, path: &str) -> VfsPath {
        VfsPath::parse(path).expect("Invalid test path")
    }

    /// Resolve an existing item.
    ///
    /// # Panics
    ///
    /// Panics if the item does not exist.
    #[must_use]
    pub fn get(&self, path: &str) -> VirtualFile {
        self.mount
            .get_by_path(&self.vpath(path))
            .expect("Test item not found")
    }

    /// Create a file through the mount.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be created.
    pub fn create(&self, parent: &str, name: &str, content: &str) -> VirtualFile {
        let parent = self.get(parent);
        self.mount
            .create_file(&parent, name, content.as_bytes())
            .expect("Failed to create test file")
    }

    /// Create a folder (possibly several levels) through the mount.
    ///
    /// # Panics
    ///
    /// Panics if the folder cannot be created.
    pub fn mkdir(&self, parent: &str, name: &str) -> VirtualFile {
        let parent = self.get(parent);
        self.mount
            .create_folder(&parent, name)
            .expect("Failed to create test folder")
    }

    /// Read a file through the mount as UTF-8.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be read or is not UTF-8.
    #[must_use]
    pub fn read(&self, path: &str) -> String {
        let bytes = self
            .mount
            .content(&self.get(path))
            .expect("Failed to open test file")
            .into_bytes()
            .expect("Failed to read test file");
        String::from_utf8(bytes).expect("Test file is not UTF-8")
    }

    /// Whether `path` exists in the mount.
    #[must_use]
    pub fn exists(&self, path: &str) -> bool {
        self.mount.get_by_path(&self.vpath(path)).is_ok()
    }
}

impl Default for TestMount {
    fn default() -> Self {
        Self::new()
    }
}
