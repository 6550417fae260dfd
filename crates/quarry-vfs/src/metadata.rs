//! Multi-valued string properties persisted per item.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::{CacheLoader, CacheOptions, SegmentedCache};
use crate::path_lock::PathLockFactory;
use crate::serial::{RecordReader, RecordWriter};
use crate::sidecar::{self, SidecarKind, SidecarLayout};
use crate::{VfsPath, VfsResult};

/// Property name → ordered values.
pub type Metadata = BTreeMap<String, Vec<String>>;

/// Property holding an item's media type.
pub const MEDIA_TYPE_PROPERTY: &str = "vfs:mimeType";

pub(crate) fn encode(metadata: &Metadata) -> VfsResult<Vec<u8>> {
    let mut w = RecordWriter::new();
    w.put_count(metadata.len())?;
    for (name, values) in metadata {
        w.put_str(name)?;
        w.put_count(values.len())?;
        for value in values {
            w.put_str(value)?;
        }
    }
    Ok(w.finish())
}

pub(crate) fn decode(bytes: &[u8]) -> VfsResult<Metadata> {
    let mut r = RecordReader::new(bytes);
    let mut metadata = Metadata::new();
    for _ in 0..r.count()? {
        let name = r.str()?;
        let count = r.count()?;
        let values = (0..count).map(|_| r.str()).collect::<VfsResult<Vec<_>>>()?;
        metadata.insert(name, values);
    }
    Ok(metadata)
}

struct MetadataLoader {
    layout: SidecarLayout,
}

impl CacheLoader<Arc<Metadata>> for MetadataLoader {
    fn lock_key(&self, path: &VfsPath) -> PathBuf {
        self.layout.record_path(SidecarKind::Props, path)
    }

    fn load(&self, path: &VfsPath) -> VfsResult<Arc<Metadata>> {
        read_metadata(&self.lock_key(path)).map(Arc::new)
    }
}

fn read_metadata(record: &std::path::Path) -> VfsResult<Metadata> {
    match sidecar::read_record(record)? {
        Some(bytes) => decode(&bytes),
        None => Ok(Metadata::new()),
    }
}

/// Persists and caches item properties.
///
/// Cached maps are shared snapshots; updates always build a new map and
/// swap it in, so readers never see a half-applied change.
pub struct MetadataStore {
    cache: SegmentedCache<Arc<Metadata>, MetadataLoader>,
    layout: SidecarLayout,
    locks: Arc<PathLockFactory>,
}

impl MetadataStore {
    /// Creates a store over `layout`.
    #[must_use]
    pub fn new(layout: SidecarLayout, locks: Arc<PathLockFactory>, options: CacheOptions) -> Self {
        let loader = MetadataLoader {
            layout: layout.clone(),
        };
        Self {
            cache: SegmentedCache::new(options, loader, Arc::clone(&locks)),
            layout,
            locks,
        }
    }

    /// All properties of `path`.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::Server` for unreadable records.
    pub fn get(&self, path: &VfsPath) -> VfsResult<Arc<Metadata>> {
        self.cache.get(path)
    }

    /// First value of property `name`.
    ///
    /// # Errors
    ///
    /// See [`Self::get`].
    pub fn value(&self, path: &VfsPath, name: &str) -> VfsResult<Option<String>> {
        Ok(self
            .get(path)?
            .get(name)
            .and_then(|values| values.first().cloned()))
    }

    /// All values of property `name`, empty if unset.
    ///
    /// # Errors
    ///
    /// See [`Self::get`].
    pub fn values(&self, path: &VfsPath, name: &str) -> VfsResult<Vec<String>> {
        Ok(self.get(path)?.get(name).cloned().unwrap_or_default())
    }

    /// Applies `changes` and persists the result.
    ///
    /// A change with no values removes that property. If the resulting
    /// map is empty the record is deleted instead of written.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::Server` on I/O failure or lock timeout.
    pub fn update(&self, path: &VfsPath, changes: &Metadata) -> VfsResult<Arc<Metadata>> {
        let record = self.record(path);
        let _guard = self.locks.write(&record)?;
        let mut metadata = read_metadata(&record)?;
        for (name, values) in changes {
            if values.is_empty() {
                metadata.remove(name);
            } else {
                metadata.insert(name.clone(), values.clone());
            }
        }
        if metadata.is_empty() {
            sidecar::remove_record(&record)?;
        } else {
            sidecar::write_record(&record, &encode(&metadata)?)?;
        }
        let metadata = Arc::new(metadata);
        self.cache.put(path, Arc::clone(&metadata));
        Ok(metadata)
    }

    /// Sets or clears a single-valued property.
    ///
    /// # Errors
    ///
    /// See [`Self::update`].
    pub fn set(&self, path: &VfsPath, name: &str, value: Option<&str>) -> VfsResult<Arc<Metadata>> {
        let mut changes = Metadata::new();
        changes.insert(name.to_owned(), value.map(|v| vec![v.to_owned()]).unwrap_or_default());
        self.update(path, &changes)
    }

    /// Deletes the record of `path`.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::Server` if the record cannot be removed.
    pub fn remove(&self, path: &VfsPath) -> VfsResult<()> {
        let record = self.record(path);
        let _guard = self.locks.write(&record)?;
        sidecar::remove_record(&record)?;
        self.cache.put(path, Arc::new(Metadata::new()));
        Ok(())
    }

    /// Copies the record of `from` to `to`, if any.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::Server` on I/O failure.
    pub fn copy(&self, from: &VfsPath, to: &VfsPath) -> VfsResult<()> {
        let source = self.record(from);
        let target = self.record(to);
        let _guards = self.locks.read_write(&source, &target)?;
        sidecar::copy_record(&source, &target)?;
        self.cache.invalidate(to);
        Ok(())
    }

    /// Drops every cached map.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Number of cached maps.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Physical location of the record of `path`.
    #[must_use]
    pub fn record(&self, path: &VfsPath) -> PathBuf {
        self.layout.record_path(SidecarKind::Props, path)
    }
}

impl std::fmt::Debug for MetadataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataStore")
            .field("root", &self.layout.root())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn store(dir: &tempfile::TempDir) -> MetadataStore {
        MetadataStore::new(
            SidecarLayout::new(dir.path()),
            Arc::new(PathLockFactory::new(Duration::from_secs(5))),
            CacheOptions::default(),
        )
    }

    fn p(s: &str) -> VfsPath {
        VfsPath::parse(s).unwrap()
    }

    #[test]
    fn test_many_names_many_values_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut changes = Metadata::new();
        for n in 0..5 {
            changes.insert(
                format!("prop{n}"),
                (0..4).map(|m| format!("v{n}-{m}")).collect(),
            );
        }
        store(&dir).update(&p("/f"), &changes).unwrap();

        let fresh = store(&dir);
        assert_eq!(*fresh.get(&p("/f")).unwrap(), changes);
        assert_eq!(fresh.value(&p("/f"), "prop3").unwrap().unwrap(), "v3-0");
        assert_eq!(fresh.values(&p("/f"), "prop1").unwrap().len(), 4);
    }

    #[test]
    fn test_clearing_last_property_removes_record() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(&dir);
        s.set(&p("/f"), "a", Some("1")).unwrap();
        s.set(&p("/f"), "b", Some("2")).unwrap();
        let record = dir.path().join(".vfs/props/f_props");
        assert!(record.is_file());

        s.set(&p("/f"), "a", None).unwrap();
        assert!(s.value(&p("/f"), "a").unwrap().is_none());
        assert!(record.is_file());

        s.set(&p("/f"), "b", None).unwrap();
        assert!(!record.exists());
        assert!(s.get(&p("/f")).unwrap().is_empty());
    }

    #[test]
    fn test_snapshots_are_not_mutated() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(&dir);
        s.set(&p("/f"), "a", Some("1")).unwrap();
        let before = s.get(&p("/f")).unwrap();
        s.set(&p("/f"), "a", Some("2")).unwrap();
        assert_eq!(before.get("a").unwrap(), &vec!["1".to_owned()]);
        assert_eq!(s.value(&p("/f"), "a").unwrap().unwrap(), "2");
    }

    #[test]
    fn test_copy_record() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(&dir);
        s.set(&p("/a"), "k", Some("v")).unwrap();
        s.copy(&p("/a"), &p("/sub/b")).unwrap();
        assert_eq!(s.value(&p("/sub/b"), "k").unwrap().unwrap(), "v");
        // No record, nothing copied.
        s.copy(&p("/none"), &p("/c")).unwrap();
        assert!(s.get(&p("/c")).unwrap().is_empty());
    }
}
