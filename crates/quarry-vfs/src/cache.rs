//! Partitioned, capacity-bounded read-through caches.
//!
//! Each partition is a segmented LRU guarded by its own mutex. New entries
//! land in the probationary segment; a second hit promotes them to the
//! protected segment, whose overflow is demoted back to probationary.
//! Probationary overflow is evicted.

use std::hash::{BuildHasher, RandomState};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::path_lock::PathLockFactory;
use crate::{VfsPath, VfsResult};

/// Loads values on cache misses.
pub trait CacheLoader<V>: Send + Sync {
    /// Key of the per-path lock guarding the backing record of `path`.
    fn lock_key(&self, path: &VfsPath) -> PathBuf;

    /// Reads the value for `path` from its backing record.
    ///
    /// A missing record must yield the empty or sentinel value, not an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns an error if the record exists but cannot be read or decoded.
    fn load(&self, path: &VfsPath) -> VfsResult<V>;
}

/// Sizing of a [`SegmentedCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheOptions {
    /// Number of partitions, rounded up to a power of two.
    pub partitions: usize,
    /// Protected entries across all partitions.
    pub protected_capacity: usize,
    /// Probationary entries across all partitions.
    pub probationary_capacity: usize,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            partitions: 8,
            protected_capacity: 100,
            probationary_capacity: 200,
        }
    }
}

#[derive(Debug)]
struct Segments<V> {
    protected: IndexMap<VfsPath, V>,
    probationary: IndexMap<VfsPath, V>,
    protected_capacity: usize,
    probationary_capacity: usize,
}

impl<V: Clone> Segments<V> {
    fn new(protected_capacity: usize, probationary_capacity: usize) -> Self {
        Self {
            protected: IndexMap::new(),
            probationary: IndexMap::new(),
            protected_capacity,
            probationary_capacity,
        }
    }

    fn get(&mut self, key: &VfsPath) -> Option<V> {
        if let Some((k, v)) = self.protected.shift_remove_entry(key) {
            let value = v.clone();
            self.protected.insert(k, v);
            return Some(value);
        }
        let (k, v) = self.probationary.shift_remove_entry(key)?;
        let value = v.clone();
        self.promote(k, v);
        Some(value)
    }

    fn insert(&mut self, key: VfsPath, value: V) {
        if self.protected.shift_remove(&key).is_some() {
            self.promote(key, value);
            return;
        }
        self.probationary.shift_remove(&key);
        self.admit(key, value);
    }

    fn remove(&mut self, key: &VfsPath) {
        self.protected.shift_remove(key);
        self.probationary.shift_remove(key);
    }

    fn clear(&mut self) {
        self.protected.clear();
        self.probationary.clear();
    }

    fn len(&self) -> usize {
        self.protected.len().saturating_add(self.probationary.len())
    }

    fn promote(&mut self, key: VfsPath, value: V) {
        self.protected.insert(key, value);
        while self.protected.len() > self.protected_capacity {
            let Some((k, v)) = self.protected.shift_remove_index(0) else {
                break;
            };
            self.admit(k, v);
        }
    }

    fn admit(&mut self, key: VfsPath, value: V) {
        self.probationary.insert(key, value);
        while self.probationary.len() > self.probationary_capacity {
            if self.probationary.shift_remove_index(0).is_none() {
                break;
            }
        }
    }
}

/// Read-through cache keyed by logical path.
///
/// Misses are loaded under the exclusive per-path lock on the backing
/// record, so concurrent misses on one key load it once. The loaded value
/// is stored before that lock is released. Writers of a record must hold
/// the exclusive lock for the same key while they update the file and
/// call [`SegmentedCache::put`].
///
/// A load that overlaps [`SegmentedCache::clear`] is returned to its
/// caller but not stored.
pub struct SegmentedCache<V, L> {
    partitions: Box<[Mutex<Segments<V>>]>,
    mask: u64,
    hasher: RandomState,
    loader: L,
    locks: Arc<PathLockFactory>,
    epoch: AtomicU64,
}

impl<V, L> SegmentedCache<V, L>
where
    V: Clone,
    L: CacheLoader<V>,
{
    /// Creates an empty cache.
    pub fn new(options: CacheOptions, loader: L, locks: Arc<PathLockFactory>) -> Self {
        let count = options.partitions.max(1).next_power_of_two();
        let protected = options.protected_capacity.checked_div(count).unwrap_or(0).max(1);
        let probationary = options.probationary_capacity.checked_div(count).unwrap_or(0).max(1);
        let partitions = (0..count)
            .map(|_| Mutex::new(Segments::new(protected, probationary)))
            .collect();
        Self {
            partitions,
            mask: u64::try_from(count).unwrap_or(1).saturating_sub(1),
            hasher: RandomState::new(),
            loader,
            locks,
            epoch: AtomicU64::new(0),
        }
    }

    /// Number of partitions.
    #[must_use]
    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Returns the cached value for `path`, loading it on a miss.
    ///
    /// # Errors
    ///
    /// Propagates path-lock timeouts and loader failures.
    pub fn get(&self, path: &VfsPath) -> VfsResult<V> {
        if let Some(value) = self.partition(path).lock().get(path) {
            return Ok(value);
        }
        let _guard = self.locks.write(&self.loader.lock_key(path))?;
        // Another caller may have loaded it while we waited for the lock.
        if let Some(value) = self.partition(path).lock().get(path) {
            return Ok(value);
        }
        let epoch = self.epoch.load(Ordering::Acquire);
        let value = self.loader.load(path)?;
        let mut partition = self.partition(path).lock();
        if self.epoch.load(Ordering::Acquire) == epoch {
            partition.insert(path.clone(), value.clone());
        }
        Ok(value)
    }

    /// Stores `value` for `path`.
    pub fn put(&self, path: &VfsPath, value: V) {
        self.partition(path).lock().insert(path.clone(), value);
    }

    /// Drops the entry for `path`.
    pub fn invalidate(&self, path: &VfsPath) {
        self.partition(path).lock().remove(path);
    }

    /// Drops every entry of partition `index`.
    pub fn clear_partition(&self, index: usize) {
        if let Some(partition) = self.partitions.get(index) {
            self.epoch.fetch_add(1, Ordering::AcqRel);
            partition.lock().clear();
        }
    }

    /// Drops every entry, including loads still in flight.
    pub fn clear(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        for partition in &self.partitions {
            partition.lock().clear();
        }
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.partitions
            .iter()
            .fold(0, |acc, p| acc.saturating_add(p.lock().len()))
    }

    /// True when nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Partition index of `path`.
    #[must_use]
    pub fn partition_index(&self, path: &VfsPath) -> usize {
        usize::try_from(self.hasher.hash_one(path) & self.mask).unwrap_or(0)
    }

    fn partition(&self, path: &VfsPath) -> &Mutex<Segments<V>> {
        let index = self.partition_index(path);
        // `index` is masked to the partition count.
        &self.partitions[index]
    }
}

impl<V, L> std::fmt::Debug for SegmentedCache<V, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentedCache")
            .field("partitions", &self.partitions.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingLoader {
        loads: AtomicUsize,
    }

    impl CacheLoader<String> for CountingLoader {
        fn lock_key(&self, path: &VfsPath) -> PathBuf {
            PathBuf::from(format!("test:{path}"))
        }

        fn load(&self, path: &VfsPath) -> VfsResult<String> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(format!("loaded {path}"))
        }
    }

    fn cache(options: CacheOptions) -> SegmentedCache<String, CountingLoader> {
        SegmentedCache::new(
            options,
            CountingLoader {
                loads: AtomicUsize::new(0),
            },
            Arc::new(PathLockFactory::new(Duration::from_secs(1))),
        )
    }

    fn p(s: &str) -> VfsPath {
        VfsPath::parse(s).unwrap()
    }

    #[test]
    fn test_read_through_loads_once() {
        let c = cache(CacheOptions::default());
        assert_eq!(c.get(&p("/a")).unwrap(), "loaded /a");
        assert_eq!(c.get(&p("/a")).unwrap(), "loaded /a");
        assert_eq!(c.loader.loads.load(Ordering::SeqCst), 1);
        assert_eq!(c.locks.held(), 0);
    }

    #[test]
    fn test_concurrent_misses_load_once() {
        let c = cache(CacheOptions::default());
        let start = std::sync::Barrier::new(8);
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    start.wait();
                    assert_eq!(c.get(&p("/cold")).unwrap(), "loaded /cold");
                });
            }
        });
        assert_eq!(c.loader.loads.load(Ordering::SeqCst), 1);
        assert_eq!(c.locks.held(), 0);
    }

    struct GatedLoader {
        loading: std::sync::Barrier,
        resume: std::sync::Barrier,
    }

    impl CacheLoader<String> for GatedLoader {
        fn lock_key(&self, path: &VfsPath) -> PathBuf {
            PathBuf::from(format!("gated:{path}"))
        }

        fn load(&self, path: &VfsPath) -> VfsResult<String> {
            self.loading.wait();
            self.resume.wait();
            Ok(format!("stale {path}"))
        }
    }

    #[test]
    fn test_clear_during_load_drops_result() {
        let c = SegmentedCache::new(
            CacheOptions::default(),
            GatedLoader {
                loading: std::sync::Barrier::new(2),
                resume: std::sync::Barrier::new(2),
            },
            Arc::new(PathLockFactory::new(Duration::from_secs(5))),
        );
        std::thread::scope(|s| {
            let reader = s.spawn(|| c.get(&p("/gone")).unwrap());
            c.loader.loading.wait();
            c.clear();
            c.loader.resume.wait();
            assert_eq!(reader.join().unwrap(), "stale /gone");
        });
        assert!(c.is_empty());
    }

    #[test]
    fn test_put_and_invalidate() {
        let c = cache(CacheOptions::default());
        c.put(&p("/a"), "mine".into());
        assert_eq!(c.get(&p("/a")).unwrap(), "mine");
        c.invalidate(&p("/a"));
        assert_eq!(c.get(&p("/a")).unwrap(), "loaded /a");
        c.clear();
        assert!(c.is_empty());
    }

    #[test]
    fn test_partition_count_power_of_two() {
        let c = cache(CacheOptions {
            partitions: 6,
            ..CacheOptions::default()
        });
        assert_eq!(c.partition_count(), 8);
        let idx = c.partition_index(&p("/anything"));
        assert!(idx < 8);
        assert_eq!(idx, c.partition_index(&p("/anything")));
    }

    #[test]
    fn test_slru_keeps_hot_entries() {
        let mut seg: Segments<u32> = Segments::new(2, 2);
        seg.insert(p("/hot"), 1);
        assert_eq!(seg.get(&p("/hot")), Some(1)); // promoted
        for i in 0..10 {
            seg.insert(p(&format!("/cold{i}")), i);
        }
        assert_eq!(seg.get(&p("/hot")), Some(1));
        assert_eq!(seg.len(), 3);
        assert_eq!(seg.get(&p("/cold0")), None);
        assert_eq!(seg.get(&p("/cold9")), Some(9));
    }

    #[test]
    fn test_slru_protected_overflow_demotes() {
        let mut seg: Segments<u32> = Segments::new(1, 4);
        seg.insert(p("/a"), 1);
        seg.get(&p("/a"));
        seg.insert(p("/b"), 2);
        seg.get(&p("/b")); // pushes /a back to probationary
        assert_eq!(seg.protected.len(), 1);
        assert!(seg.probationary.contains_key(&p("/a")));
        assert_eq!(seg.len(), 2);
    }
}
