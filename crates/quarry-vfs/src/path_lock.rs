//! Short-lived mutual exclusion keyed by physical path.
//!
//! Guards one disk read or write of a content file or a side-car record.
//! Independent of the caller-visible advisory locks in [`crate::lock`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::{ArcRwLockReadGuard, ArcRwLockWriteGuard, RawRwLock, RwLock};
use tracing::warn;

use crate::{VfsError, VfsResult};

type Slot = Arc<RwLock<()>>;

/// Factory of per-path reader/writer locks acquired with a bounded wait.
///
/// Entries are created on demand and dropped once the last guard for a
/// path is released, so the map only holds paths currently in use.
#[derive(Debug)]
pub struct PathLockFactory {
    slots: DashMap<PathBuf, Slot>,
    timeout: Duration,
}

/// Shared guard returned by [`PathLockFactory::read`].
#[must_use = "the path is unlocked as soon as the guard is dropped"]
pub struct PathReadGuard<'a> {
    factory: &'a PathLockFactory,
    key: PathBuf,
    guard: Option<ArcRwLockReadGuard<RawRwLock, ()>>,
}

/// Exclusive guard returned by [`PathLockFactory::write`].
#[must_use = "the path is unlocked as soon as the guard is dropped"]
pub struct PathWriteGuard<'a> {
    factory: &'a PathLockFactory,
    key: PathBuf,
    guard: Option<ArcRwLockWriteGuard<RawRwLock, ()>>,
}

impl PathLockFactory {
    /// Creates a factory whose acquisitions give up after `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            slots: DashMap::new(),
            timeout,
        }
    }

    /// Acquisition timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Number of paths that currently have a lock slot.
    #[must_use]
    pub fn held(&self) -> usize {
        self.slots.len()
    }

    /// Acquires a shared lock on `key`.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::Server` if the lock is not granted within the
    /// factory timeout.
    pub fn read(&self, key: &Path) -> VfsResult<PathReadGuard<'_>> {
        let slot = self.slot(key);
        let Some(guard) = slot.try_read_arc_for(self.timeout) else {
            drop(slot);
            self.release(key);
            return Err(self.timed_out(key));
        };
        Ok(PathReadGuard {
            factory: self,
            key: key.to_path_buf(),
            guard: Some(guard),
        })
    }

    /// Acquires an exclusive lock on `key`.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::Server` if the lock is not granted within the
    /// factory timeout.
    pub fn write(&self, key: &Path) -> VfsResult<PathWriteGuard<'_>> {
        let slot = self.slot(key);
        let Some(guard) = slot.try_write_arc_for(self.timeout) else {
            drop(slot);
            self.release(key);
            return Err(self.timed_out(key));
        };
        Ok(PathWriteGuard {
            factory: self,
            key: key.to_path_buf(),
            guard: Some(guard),
        })
    }

    /// Acquires a shared lock on `source` and an exclusive lock on
    /// `target`, always in path order.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::Server` if either lock is not granted within
    /// the factory timeout, or if both keys are the same path.
    pub fn read_write(
        &self,
        source: &Path,
        target: &Path,
    ) -> VfsResult<(PathReadGuard<'_>, PathWriteGuard<'_>)> {
        if source == target {
            return Err(VfsError::server(format!(
                "Unable to lock '{}' for reading and writing at once",
                source.display()
            )));
        }
        if source < target {
            let read = self.read(source)?;
            let write = self.write(target)?;
            Ok((read, write))
        } else {
            let write = self.write(target)?;
            let read = self.read(source)?;
            Ok((read, write))
        }
    }

    fn slot(&self, key: &Path) -> Slot {
        Arc::clone(self.slots.entry(key.to_path_buf()).or_default().value())
    }

    fn release(&self, key: &Path) {
        self.slots.remove_if(key, |_, slot| Arc::strong_count(slot) == 1);
    }

    fn timed_out(&self, key: &Path) -> VfsError {
        warn!(path = %key.display(), timeout = ?self.timeout, "Path lock acquisition timed out");
        VfsError::server(format!(
            "Unable to acquire lock for '{}' within {:?}",
            key.display(),
            self.timeout
        ))
    }
}

impl Drop for PathReadGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.factory.release(&self.key);
    }
}

impl Drop for PathWriteGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.factory.release(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_slots_released_after_guards_drop() {
        let factory = PathLockFactory::new(Duration::from_millis(100));
        {
            let _a = factory.read(Path::new("/x")).unwrap();
            let _b = factory.read(Path::new("/x")).unwrap();
            let _c = factory.write(Path::new("/y")).unwrap();
            assert_eq!(factory.held(), 2);
        }
        assert_eq!(factory.held(), 0);
    }

    #[test]
    fn test_write_times_out_while_read_held() {
        let factory = PathLockFactory::new(Duration::from_millis(20));
        let _r = factory.read(Path::new("/f")).unwrap();
        let err = factory.write(Path::new("/f")).err().unwrap();
        assert!(matches!(err, VfsError::Server { .. }));
        // The reader still holds its slot.
        assert_eq!(factory.held(), 1);
    }

    #[test]
    fn test_opposite_copies_do_not_block_each_other() {
        let factory = PathLockFactory::new(Duration::from_secs(2));
        let a = Path::new("/dir/a");
        let b = Path::new("/dir/b");
        thread::scope(|s| {
            let forward = s.spawn(|| {
                for _ in 0..200 {
                    let _g = factory.read_write(a, b).unwrap();
                    thread::yield_now();
                }
            });
            let backward = s.spawn(|| {
                for _ in 0..200 {
                    let _g = factory.read_write(b, a).unwrap();
                    thread::yield_now();
                }
            });
            forward.join().unwrap();
            backward.join().unwrap();
        });
        assert_eq!(factory.held(), 0);
    }

    #[test]
    fn test_read_write_same_path_rejected() {
        let factory = PathLockFactory::new(Duration::from_millis(20));
        let err = factory.read_write(Path::new("/f"), Path::new("/f")).err().unwrap();
        assert!(matches!(err, VfsError::Server { .. }));
        assert_eq!(factory.held(), 0);
    }

    #[test]
    fn test_writers_serialize() {
        let factory = Arc::new(PathLockFactory::new(Duration::from_secs(5)));
        let counter = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let factory = Arc::clone(&factory);
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    let _g = factory.write(Path::new("/shared")).unwrap();
                    counter.lock().push(i);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(counter.lock().len(), 8);
        assert_eq!(factory.held(), 0);
    }
}
