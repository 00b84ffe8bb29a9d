//! Filesystem cache for finished clips.
//!
//! Finished clips are stored as `<key>_vapor.wav` where the key is a
//! sanitized title. Production for a key is guarded by a per-key async
//! lock so concurrent requests resolving to the same title never write the
//! final file twice; the second request waits and then observes the entry.
//!
//! Entries are never evicted automatically. The store only reports when
//! the directory grows past an advisory threshold.

use crate::config::CacheSettings;
use crate::error::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::info;

/// Derive a cache key from a video title: keep ASCII alphanumerics only
/// and truncate.
///
/// Distinct titles sharing a prefix can collide on the same key; that
/// ambiguity is accepted.
pub fn sanitize_title(title: &str, max_len: usize) -> String {
    title
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(max_len)
        .collect()
}

/// Cache of finished clips on disk, with per-key production locks.
pub struct CacheStore {
    dir: PathBuf,
    key_length: usize,
    warn_threshold_bytes: u64,
    // Guards grow with the number of distinct keys and are never pruned;
    // each is a handful of bytes.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl CacheStore {
    pub fn new(dir: &Path, settings: &CacheSettings) -> Result<Self> {
        std::fs::create_dir_all(dir)?;

        Ok(Self {
            dir: dir.to_path_buf(),
            key_length: settings.key_length,
            warn_threshold_bytes: settings.warn_threshold_mb * 1_000_000,
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// The cache working directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Derive the cache key for a title.
    pub fn key_for(&self, title: &str) -> String {
        sanitize_title(title, self.key_length)
    }

    /// Path a finished clip for `key` lives at (whether or not it exists).
    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}_vapor.wav", key))
    }

    /// Look up a finished clip for `key`.
    pub fn lookup(&self, key: &str) -> Option<PathBuf> {
        let path = self.entry_path(key);
        path.is_file().then_some(path)
    }

    /// Acquire the production lock for `key`. At most one holder per key;
    /// other requests for the same key wait here.
    pub async fn lock_key(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Total size in bytes of all files in the cache directory.
    pub fn total_size_bytes(&self) -> u64 {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return 0;
        };

        entries
            .flatten()
            .filter_map(|e| e.metadata().ok())
            .filter(|m| m.is_file())
            .map(|m| m.len())
            .sum()
    }

    /// Returns the current size in megabytes when the advisory threshold is
    /// exceeded.
    pub fn over_threshold(&self) -> Option<u64> {
        let size = self.total_size_bytes();
        (size > self.warn_threshold_bytes).then(|| size / 1_000_000)
    }

    /// Remove all audio files from the cache directory. Administrative
    /// operation, used by /restart. Returns how many files were removed.
    pub fn clear(&self) -> Result<usize> {
        let mut removed = 0;

        for entry in std::fs::read_dir(&self.dir)?.flatten() {
            let path = entry.path();
            let is_audio = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e == "mp3" || e == "wav");

            if is_audio && std::fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }

        info!("Cleared {} cached audio files from {:?}", removed, self.dir);
        Ok(removed)
    }
}
