// # File Cache Store
//
// JSON file holding the latest address snapshot.
//
// ## File Format
//
// ```json
// {
//   "timestamp": 1736424000.123456,
//   "services": {
//     "https://checkip.amazonaws.com": "203.0.113.7",
//     "https://ipinfo.io/ip": "203.0.113.7"
//   }
// }
// ```
//
// ## Freshness
//
// The effective timestamp is the stored `timestamp` when present and non-zero,
// otherwise the file's last-modified time. The cache is fresh while
// `now - effective_timestamp < ttl`.
//
// ## Writes
//
// New content is written to `<path>.tmp` and renamed over the cache file, so
// a crash never leaves a half-written cache behind.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::Error;
use crate::snapshot::{AddressSnapshot, format_local, now_epoch_secs};

/// Default cache file name inside the cache directory
pub const DEFAULT_CACHE_FILE_NAME: &str = "public_ip_cache.json";

/// On-disk form of an [`AddressSnapshot`]
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct CacheRecord {
    #[serde(default)]
    timestamp: Option<f64>,
    #[serde(default)]
    services: BTreeMap<String, Ipv4Addr>,
}

impl CacheRecord {
    /// The stored timestamp, if it is usable
    fn stored_timestamp(&self) -> Option<f64> {
        self.timestamp.filter(|t| *t != 0.0)
    }
}

/// File-based cache of the latest address snapshot
///
/// # Example
///
/// ```rust,no_run
/// use ippost_core::FileCacheStore;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileCacheStore::new(".public_ip_poster_cache/public_ip_cache.json");
///
///     match store.load_if_fresh(Duration::from_secs(3600)).await? {
///         Some(snapshot) => println!("cached: {:?}", snapshot.services),
///         None => println!("cache missing or stale"),
///     }
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FileCacheStore {
    path: PathBuf,
}

impl FileCacheStore {
    /// Create a store backed by `path`; nothing is read or written yet
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the cache file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ensure `dir` exists, creating it (and its parents) if absent
    ///
    /// Returns `true` when the directory was created.
    pub async fn ensure_directory(dir: &Path) -> Result<bool, Error> {
        if fs::try_exists(dir).await? {
            info!("Using existing cache directory at {}", dir.display());
            return Ok(false);
        }

        fs::create_dir_all(dir).await.map_err(|e| {
            Error::cache(format!(
                "Failed to create cache directory {}: {}",
                dir.display(),
                e
            ))
        })?;
        info!("Created cache directory at {}", dir.display());
        Ok(true)
    }

    /// Load the cached snapshot if it is younger than `ttl`
    ///
    /// # Returns
    ///
    /// - `Ok(Some(snapshot))`: Fresh cache; `snapshot.timestamp` is the effective timestamp
    /// - `Ok(None)`: No cache file, unparsable content, or stale cache
    /// - `Err(Error)`: The file exists but could not be read
    pub async fn load_if_fresh(&self, ttl: Duration) -> Result<Option<AddressSnapshot>, Error> {
        if !fs::try_exists(&self.path).await? {
            info!("No cache file found at {}", self.path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path).await.map_err(|e| {
            Error::cache(format!(
                "Failed to read cache file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let record: CacheRecord = match serde_json::from_str(&content) {
            Ok(record) => record,
            Err(e) => {
                warn!(
                    "Cache file {} is corrupted ({}), ignoring it",
                    self.path.display(),
                    e
                );
                return Ok(None);
            }
        };

        let timestamp = match record.stored_timestamp() {
            Some(timestamp) => {
                info!("Cache has timestamp {}", timestamp);
                timestamp
            }
            None => {
                info!("Did not find timestamp field in cache, using file modification time");
                self.modified_epoch_secs().await?
            }
        };

        let now = now_epoch_secs();
        debug!("current_time: {:.2} - {}", now, format_local(now));
        debug!("cache_timestamp: {:.2} - {}", timestamp, format_local(timestamp));

        let age = now - timestamp;
        if age < ttl.as_secs_f64() {
            info!("Cache file is valid, age {:.2}", age);
            Ok(Some(AddressSnapshot {
                timestamp,
                services: record.services,
            }))
        } else {
            info!("Cache file is stale, older than {} seconds", ttl.as_secs());
            Ok(None)
        }
    }

    /// Write `snapshot` to the cache file, stamped with the current time
    ///
    /// Existing content is replaced. Returns the snapshot as written.
    pub async fn persist(&self, snapshot: &AddressSnapshot) -> Result<AddressSnapshot, Error> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !fs::try_exists(parent).await?
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::cache(format!(
                    "Failed to create cache directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let written = AddressSnapshot {
            timestamp: now_epoch_secs(),
            services: snapshot.services.clone(),
        };
        let record = CacheRecord {
            timestamp: Some(written.timestamp),
            services: written.services.clone(),
        };

        let json = serde_json::to_string_pretty(&record)
            .map_err(|e| Error::cache(format!("Failed to serialize cache: {}", e)))?;

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::cache(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::cache(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.flush().await.map_err(|e| {
                Error::cache(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::cache(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        info!("Saved public IP list to cache file at {}", self.path.display());
        Ok(written)
    }

    async fn modified_epoch_secs(&self) -> Result<f64, Error> {
        let metadata = fs::metadata(&self.path).await?;
        let modified = metadata.modified()?;
        let since_epoch = modified.duration_since(UNIX_EPOCH).map_err(|e| {
            Error::cache(format!(
                "Cache file {} modified before the epoch: {}",
                self.path.display(),
                e
            ))
        })?;
        Ok(since_epoch.as_secs_f64())
    }

    /// Get path to temporary file for atomic writes
    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone().into_os_string();
        temp.push(".tmp");
        PathBuf::from(temp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;
    use tempfile::tempdir;

    const TTL: Duration = Duration::from_secs(3600);

    fn write_record(path: &Path, timestamp: serde_json::Value) {
        let record = serde_json::json!({
            "timestamp": timestamp,
            "services": { "https://ipinfo.io/ip": "203.0.113.7" }
        });
        std::fs::write(path, serde_json::to_vec_pretty(&record).unwrap()).unwrap();
    }

    fn set_mtime(path: &Path, age: Duration) {
        let file = std::fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    #[tokio::test]
    async fn test_missing_file_is_absent() {
        let dir = tempdir().unwrap();
        let store = FileCacheStore::new(dir.path().join(DEFAULT_CACHE_FILE_NAME));

        assert!(store.load_if_fresh(TTL).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_recent_timestamp_is_fresh() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CACHE_FILE_NAME);
        let timestamp = now_epoch_secs() - 100.0;
        write_record(&path, timestamp.into());

        let store = FileCacheStore::new(&path);
        let snapshot = store.load_if_fresh(TTL).await.unwrap().expect("fresh cache");

        assert!((snapshot.timestamp - timestamp).abs() < 1e-3);
        assert_eq!(
            snapshot.get("https://ipinfo.io/ip"),
            Some(Ipv4Addr::new(203, 0, 113, 7))
        );
    }

    #[tokio::test]
    async fn test_old_timestamp_is_stale() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CACHE_FILE_NAME);
        write_record(&path, (now_epoch_secs() - 4000.0).into());

        let store = FileCacheStore::new(&path);
        assert!(store.load_if_fresh(TTL).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_zero_ttl_is_always_stale() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CACHE_FILE_NAME);
        write_record(&path, now_epoch_secs().into());

        let store = FileCacheStore::new(&path);
        assert!(store.load_if_fresh(Duration::ZERO).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_timestamp_uses_mtime() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CACHE_FILE_NAME);
        std::fs::write(
            &path,
            r#"{"services": {"https://ipinfo.io/ip": "203.0.113.7"}}"#,
        )
        .unwrap();

        let store = FileCacheStore::new(&path);

        // Just written: fresh by mtime
        let snapshot = store.load_if_fresh(TTL).await.unwrap().expect("fresh by mtime");
        assert!((now_epoch_secs() - snapshot.timestamp).abs() < 5.0);

        // Backdated: stale by mtime
        set_mtime(&path, Duration::from_secs(4000));
        assert!(store.load_if_fresh(TTL).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_falsy_timestamp_uses_mtime() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CACHE_FILE_NAME);

        for falsy in [serde_json::json!(0), serde_json::Value::Null] {
            write_record(&path, falsy);
            set_mtime(&path, Duration::from_secs(100));

            let store = FileCacheStore::new(&path);
            assert!(store.load_if_fresh(TTL).await.unwrap().is_some());

            set_mtime(&path, Duration::from_secs(4000));
            assert!(store.load_if_fresh(TTL).await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_corrupted_file_is_absent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CACHE_FILE_NAME);
        std::fs::write(&path, b"corrupted json data").unwrap();

        let store = FileCacheStore::new(&path);
        assert!(store.load_if_fresh(TTL).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_persist_then_load_round_trip() {
        let dir = tempdir().unwrap();
        let store = FileCacheStore::new(dir.path().join("nested").join(DEFAULT_CACHE_FILE_NAME));

        let snapshot = AddressSnapshot {
            timestamp: 0.0,
            services: BTreeMap::from([
                ("https://ipinfo.io/ip".to_string(), Ipv4Addr::new(203, 0, 113, 7)),
                (
                    "https://checkip.amazonaws.com".to_string(),
                    Ipv4Addr::new(203, 0, 113, 8),
                ),
            ]),
        };

        let written = store.persist(&snapshot).await.unwrap();
        assert!((now_epoch_secs() - written.timestamp).abs() < 1.0);

        let loaded = store
            .load_if_fresh(Duration::from_secs(u32::MAX as u64))
            .await
            .unwrap()
            .expect("just written");
        assert!((loaded.timestamp - written.timestamp).abs() < 1e-3);
        assert_eq!(loaded.services, written.services);
        assert_eq!(loaded.services, snapshot.services);
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn test_persist_overwrites_existing_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CACHE_FILE_NAME);
        std::fs::write(&path, b"corrupted json data").unwrap();

        let store = FileCacheStore::new(&path);
        let snapshot = AddressSnapshot {
            timestamp: 0.0,
            services: BTreeMap::from([("svc".to_string(), Ipv4Addr::new(10, 0, 0, 1))]),
        };
        store.persist(&snapshot).await.unwrap();

        let on_disk: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk["services"]["svc"], "10.0.0.1");
        assert!(on_disk["timestamp"].as_f64().unwrap() > 0.0);
    }

    #[tokio::test]
    async fn test_persist_failure_is_reported() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let store = FileCacheStore::new(blocker.join(DEFAULT_CACHE_FILE_NAME));
        let snapshot = AddressSnapshot {
            timestamp: 0.0,
            services: BTreeMap::new(),
        };

        assert!(store.persist(&snapshot).await.is_err());
    }

    #[tokio::test]
    async fn test_ensure_directory() {
        let dir = tempdir().unwrap();
        let cache_dir = dir.path().join("a").join("b");

        assert!(FileCacheStore::ensure_directory(&cache_dir).await.unwrap());
        assert!(cache_dir.is_dir());
        assert!(!FileCacheStore::ensure_directory(&cache_dir).await.unwrap());
    }
}
