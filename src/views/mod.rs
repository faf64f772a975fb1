//! View counter storage
//!
//! Counts are keyed by post slug. The store is handed to the server
//! explicitly; there is no process-wide counter.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

/// View store errors.
#[derive(Debug, Error)]
pub enum ViewStoreError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored counts could not be read or written.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A writer panicked while holding the lock.
    #[error("view store lock poisoned")]
    Poisoned,
}

/// Result type for view store operations.
pub type Result<T> = std::result::Result<T, ViewStoreError>;

/// Storage for per-post view counts
pub trait ViewStore: Send + Sync {
    /// Current count for `slug`, zero if never viewed
    fn get(&self, slug: &str) -> Result<u64>;

    /// Add one view to `slug` and return the new count
    fn increment(&self, slug: &str) -> Result<u64>;
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex.lock().map_err(|_| ViewStoreError::Poisoned)
}

/// Counts held in memory for the lifetime of the process
#[derive(Debug, Default)]
pub struct MemoryViewStore {
    counts: Mutex<HashMap<String, u64>>,
}

impl MemoryViewStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ViewStore for MemoryViewStore {
    fn get(&self, slug: &str) -> Result<u64> {
        Ok(lock(&self.counts)?.get(slug).copied().unwrap_or(0))
    }

    fn increment(&self, slug: &str) -> Result<u64> {
        let mut counts = lock(&self.counts)?;
        let count = counts.entry(slug.to_string()).or_insert(0);
        *count += 1;
        Ok(*count)
    }
}

/// On-disk layout of the file store
#[derive(Debug, Default, Serialize, Deserialize)]
struct ViewsFile {
    version: u32,
    counts: HashMap<String, u64>,
}

impl ViewsFile {
    const VERSION: u32 = 1;
}

/// Counts persisted to a JSON file after every increment
#[derive(Debug)]
pub struct FileViewStore {
    path: PathBuf,
    counts: Mutex<HashMap<String, u64>>,
}

impl FileViewStore {
    /// Open the store at `path`; a missing file starts empty
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        let counts = if path.exists() {
            let content = fs::read_to_string(&path)?;
            let file: ViewsFile = serde_json::from_str(&content)?;
            if file.version != ViewsFile::VERSION {
                tracing::warn!(
                    "View store {:?} has version {}, expected {}",
                    path,
                    file.version,
                    ViewsFile::VERSION
                );
            }
            file.counts
        } else {
            HashMap::new()
        };

        tracing::debug!("Opened view store {:?} with {} entries", path, counts.len());
        Ok(Self {
            path,
            counts: Mutex::new(counts),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self, counts: &HashMap<String, u64>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = ViewsFile {
            version: ViewsFile::VERSION,
            counts: counts.clone(),
        };
        let content = serde_json::to_string_pretty(&file)?;

        // Write then rename so a crash never leaves a half-written file
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl ViewStore for FileViewStore {
    fn get(&self, slug: &str) -> Result<u64> {
        Ok(lock(&self.counts)?.get(slug).copied().unwrap_or(0))
    }

    fn increment(&self, slug: &str) -> Result<u64> {
        let mut counts = lock(&self.counts)?;

        // Only a persisted count becomes visible
        let mut next = counts.clone();
        let count = next.get(slug).copied().unwrap_or(0) + 1;
        next.insert(slug.to_string(), count);
        self.save(&next)?;

        *counts = next;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn test_memory_store_counts() {
        let store = MemoryViewStore::new();
        assert_eq!(store.get("a").unwrap(), 0);
        assert_eq!(store.increment("a").unwrap(), 1);
        assert_eq!(store.increment("a").unwrap(), 2);
        assert_eq!(store.increment("b").unwrap(), 1);
        assert_eq!(store.get("a").unwrap(), 2);
    }

    #[test]
    fn test_memory_store_concurrent_increments() {
        let store = Arc::new(MemoryViewStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..100 {
                        store.increment("hot").unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.get("hot").unwrap(), 800);
    }

    #[test]
    fn test_file_store_persists() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data").join("views.json");

        let store = FileViewStore::open(&path).unwrap();
        assert_eq!(store.get("post").unwrap(), 0);
        store.increment("post").unwrap();
        store.increment("post").unwrap();
        assert!(path.exists());
        drop(store);

        let reopened = FileViewStore::open(&path).unwrap();
        assert_eq!(reopened.get("post").unwrap(), 2);
        assert_eq!(reopened.increment("post").unwrap(), 3);
    }

    #[test]
    fn test_file_store_failed_save_does_not_count() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("views.json");
        let store = FileViewStore::open(&path).unwrap();
        assert_eq!(store.increment("a").unwrap(), 1);

        // A directory in the way of the temp file makes the write fail
        let blocker = path.with_extension("json.tmp");
        fs::create_dir(&blocker).unwrap();
        assert!(matches!(
            store.increment("a").unwrap_err(),
            ViewStoreError::Io(_)
        ));
        assert_eq!(store.get("a").unwrap(), 1);

        fs::remove_dir(&blocker).unwrap();
        assert_eq!(store.increment("a").unwrap(), 2);
        drop(store);

        assert_eq!(FileViewStore::open(&path).unwrap().get("a").unwrap(), 2);
    }

    #[test]
    fn test_file_store_rejects_corrupt_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("views.json");
        fs::write(&path, "not json").unwrap();

        assert!(matches!(
            FileViewStore::open(&path).unwrap_err(),
            ViewStoreError::Json(_)
        ));
    }
}
