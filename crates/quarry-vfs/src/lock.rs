//! Advisory, token-based file locks persisted as side-car records.
//!
//! Locks expire lazily: an expired record is only removed the next time
//! something looks it up. There is no background sweep.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use tracing::{debug, warn};

use crate::cache::{CacheLoader, CacheOptions, SegmentedCache};
use crate::path_lock::PathLockFactory;
use crate::serial::{RecordReader, RecordWriter};
use crate::sidecar::{self, SidecarKind, SidecarLayout};
use crate::{VfsError, VfsPath, VfsResult};

/// Length of generated lock tokens.
pub const TOKEN_LEN: usize = 16;

/// Expiry value of locks that never expire.
const NEVER: i64 = i64::MAX;

/// An active advisory lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLock {
    token: String,
    expires_at_ms: i64,
}

impl FileLock {
    /// Lock token callers must present to modify the file.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Expiry instant, `None` for locks that never expire.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        if self.expires_at_ms == NEVER {
            return None;
        }
        DateTime::from_timestamp_millis(self.expires_at_ms)
    }

    fn is_expired(&self, now_ms: i64) -> bool {
        self.expires_at_ms < now_ms
    }

    fn encode(&self) -> VfsResult<Vec<u8>> {
        let mut w = RecordWriter::new();
        w.put_str(&self.token)?;
        w.put_i64(self.expires_at_ms);
        Ok(w.finish())
    }

    fn decode(bytes: &[u8]) -> VfsResult<Self> {
        let mut r = RecordReader::new(bytes);
        let token = r.str()?;
        let expires_at_ms = r.i64()?;
        Ok(Self {
            token,
            expires_at_ms,
        })
    }
}

/// Cached lock state of one file.
///
/// `Unlocked` memoizes "definitely no lock" so repeated checks of
/// unlocked files never touch the disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockState {
    /// No lock record exists.
    Unlocked,
    /// A lock record exists (possibly expired, see [`LockStore::check_valid_and_get`]).
    Locked(FileLock),
}

struct LockLoader {
    layout: SidecarLayout,
}

impl CacheLoader<LockState> for LockLoader {
    fn lock_key(&self, path: &VfsPath) -> PathBuf {
        self.layout.record_path(SidecarKind::Lock, path)
    }

    fn load(&self, path: &VfsPath) -> VfsResult<LockState> {
        read_state(&self.lock_key(path))
    }
}

fn read_state(record: &std::path::Path) -> VfsResult<LockState> {
    match sidecar::read_record(record)? {
        Some(bytes) => Ok(LockState::Locked(FileLock::decode(&bytes)?)),
        None => Ok(LockState::Unlocked),
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Persists and caches advisory locks.
pub struct LockStore {
    cache: SegmentedCache<LockState, LockLoader>,
    layout: SidecarLayout,
    locks: Arc<PathLockFactory>,
}

impl LockStore {
    /// Creates a store over `layout`.
    #[must_use]
    pub fn new(layout: SidecarLayout, locks: Arc<PathLockFactory>, options: CacheOptions) -> Self {
        let loader = LockLoader {
            layout: layout.clone(),
        };
        Self {
            cache: SegmentedCache::new(options, loader, Arc::clone(&locks)),
            layout,
            locks,
        }
    }

    /// Locks `path` and returns the new token.
    ///
    /// A zero `timeout` produces a lock that never expires.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::Conflict` if a live lock exists and
    /// `VfsError::Server` if the record cannot be written.
    pub fn lock(&self, path: &VfsPath, timeout: Duration) -> VfsResult<String> {
        let record = self.record(path);
        let _guard = self.locks.write(&record)?;
        if let LockState::Locked(_) = self.read_live(path, &record)? {
            return Err(VfsError::Conflict(format!(
                "Unable lock file '{path}'. File already locked. "
            )));
        }

        let expires_at_ms = if timeout.is_zero() {
            NEVER
        } else {
            let millis = i64::try_from(timeout.as_millis()).unwrap_or(NEVER);
            now_ms().saturating_add(millis)
        };
        let lock = FileLock {
            token: generate_token(),
            expires_at_ms,
        };
        sidecar::write_record(&record, &lock.encode()?)?;
        let token = lock.token.clone();
        self.cache.put(path, LockState::Locked(lock));
        debug!(path = %path, "File locked");
        Ok(token)
    }

    /// Releases the lock on `path`.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::Conflict` if the file is not locked and
    /// `VfsError::Forbidden` if `token` does not match.
    pub fn unlock(&self, path: &VfsPath, token: &str) -> VfsResult<()> {
        let record = self.record(path);
        let _guard = self.locks.write(&record)?;
        match self.read_live(path, &record)? {
            LockState::Unlocked => Err(VfsError::Conflict(format!(
                "File '{path}' is not locked. "
            ))),
            LockState::Locked(lock) if lock.token != token => Err(VfsError::Forbidden(format!(
                "Unable unlock file '{path}'. Lock token does not match. "
            ))),
            LockState::Locked(_) => {
                sidecar::remove_record(&record)?;
                self.cache.put(path, LockState::Unlocked);
                debug!(path = %path, "File unlocked");
                Ok(())
            },
        }
    }

    /// Removes any lock on `path` regardless of token.
    ///
    /// Used when the file itself is being deleted or overwritten.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::Server` if the record cannot be removed.
    pub fn remove(&self, path: &VfsPath) -> VfsResult<()> {
        let record = self.record(path);
        let _guard = self.locks.write(&record)?;
        sidecar::remove_record(&record)?;
        self.cache.put(path, LockState::Unlocked);
        Ok(())
    }

    /// Current live lock state, treating expired locks as absent.
    ///
    /// An expired record found here is deleted and the cache updated.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::Server` on unreadable records or lock timeouts.
    pub fn check_valid_and_get(&self, path: &VfsPath) -> VfsResult<LockState> {
        match self.cache.get(path)? {
            LockState::Locked(lock) if lock.is_expired(now_ms()) => {
                let record = self.record(path);
                let _guard = self.locks.write(&record)?;
                self.read_live(path, &record)
            },
            state => Ok(state),
        }
    }

    /// True if `path` holds a live lock.
    ///
    /// # Errors
    ///
    /// See [`Self::check_valid_and_get`].
    pub fn is_locked(&self, path: &VfsPath) -> VfsResult<bool> {
        Ok(matches!(self.check_valid_and_get(path)?, LockState::Locked(_)))
    }

    /// Passes when `path` is unlocked or `token` matches its lock.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::Forbidden` when a live lock exists and the
    /// token is missing or different.
    pub fn validate_token_if_locked(&self, path: &VfsPath, token: Option<&str>) -> VfsResult<()> {
        match self.check_valid_and_get(path)? {
            LockState::Locked(lock) if Some(lock.token.as_str()) != token => Err(
                VfsError::Forbidden(format!("Item '{path}' is locked. ")),
            ),
            _ => Ok(()),
        }
    }

    /// Drops every cached lock state.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Number of cached lock states.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    fn record(&self, path: &VfsPath) -> PathBuf {
        self.layout.record_path(SidecarKind::Lock, path)
    }

    // Caller holds the exclusive path lock on `record`.
    fn read_live(&self, path: &VfsPath, record: &std::path::Path) -> VfsResult<LockState> {
        let state = match read_state(record)? {
            LockState::Locked(lock) if lock.is_expired(now_ms()) => {
                if let Err(e) = sidecar::remove_record(record) {
                    warn!(path = %path, error = %e, "Unable to delete expired lock record");
                }
                LockState::Unlocked
            },
            state => state,
        };
        self.cache.put(path, state.clone());
        Ok(state)
    }
}

impl std::fmt::Debug for LockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockStore")
            .field("root", &self.layout.root())
            .finish_non_exhaustive()
    }
}
