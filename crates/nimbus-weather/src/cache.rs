//! Persistent per-location forecast cache with stale fallback.
//!
//! The cache keeps at most one entry per location key and mirrors the map to
//! a single JSON document after every successful refresh. A failed refresh
//! never removes what is already cached: stale data is served instead and the
//! error is handed back alongside it.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::location::LocationKey;
use crate::provider::ForecastSource;
use crate::types::{FetchError, ForecastRecord};

pub const CACHE_FILE_NAME: &str = "forecast_cache.json";

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache file is corrupt: {0}")]
    Corrupt(String),
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cache serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One cached forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub record: ForecastRecord,
    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Age at `now`; entries stamped in the future count as brand new.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.fetched_at)
            .to_std()
            .unwrap_or_default()
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.age(now) < ttl
    }
}

/// How a forecast was obtained
#[derive(Debug, Clone, PartialEq)]
pub enum ForecastOrigin {
    /// Served from a fresh cache entry; no network call was made
    Cache,
    /// Fetched from upstream just now
    Network,
    /// Refresh failed; this is the last good forecast
    Stale { error: FetchError, age: Duration },
}

/// A forecast plus where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct CachedForecast {
    pub record: ForecastRecord,
    pub origin: ForecastOrigin,
}

impl CachedForecast {
    pub fn is_stale(&self) -> bool {
        matches!(self.origin, ForecastOrigin::Stale { .. })
    }

    /// Degraded-mode warning, if any
    pub fn warning(&self) -> Option<&FetchError> {
        match &self.origin {
            ForecastOrigin::Stale { error, .. } => Some(error),
            _ => None,
        }
    }
}

enum Lookup {
    Fresh(ForecastRecord),
    Stale(CacheEntry),
    Missing,
}

/// Forecast cache backed by a JSON file.
#[derive(Debug)]
pub struct ForecastCache {
    cache_path: PathBuf,
    entries: BTreeMap<String, CacheEntry>,
}

impl ForecastCache {
    /// Empty cache that persists to `<data_dir>/forecast_cache.json`.
    pub fn new(data_dir: &Path) -> Self {
        Self {
            cache_path: data_dir.join(CACHE_FILE_NAME),
            entries: BTreeMap::new(),
        }
    }

    /// Load from `path`. A missing or corrupt file yields an empty cache.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let cache_path = path.into();
        let entries = match read_entries(&cache_path) {
            Ok(Some(entries)) => {
                tracing::info!(
                    "Loaded {} cached forecasts from {}",
                    entries.len(),
                    cache_path.display()
                );
                entries
            }
            Ok(None) => {
                tracing::debug!("No forecast cache at {}", cache_path.display());
                BTreeMap::new()
            }
            Err(e) => {
                tracing::warn!("{}; starting with an empty forecast cache", e);
                BTreeMap::new()
            }
        };
        Self {
            cache_path,
            entries,
        }
    }

    /// Load `<data_dir>/forecast_cache.json`.
    pub fn load_from_dir(data_dir: &Path) -> Self {
        Self::load(data_dir.join(CACHE_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.cache_path
    }

    pub fn get(&self, key: &LocationKey) -> Option<&CacheEntry> {
        self.entries.get(&key.to_string())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &CacheEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Replace the entry for `key` and persist.
    pub fn insert(
        &mut self,
        key: &LocationKey,
        record: ForecastRecord,
        fetched_at: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        self.entries
            .insert(key.to_string(), CacheEntry { record, fetched_at });
        self.save()
    }

    /// Forget one location. Returns whether anything was removed.
    pub fn remove(&mut self, key: &LocationKey) -> Result<bool, CacheError> {
        let removed = self.entries.remove(&key.to_string()).is_some();
        if removed {
            self.save()?;
        }
        Ok(removed)
    }

    pub fn clear(&mut self) -> Result<(), CacheError> {
        self.entries.clear();
        self.save()
    }

    /// Write the whole map atomically (temp file, then rename).
    pub fn save(&self) -> Result<(), CacheError> {
        if let Some(parent) = self.cache_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_vec_pretty(&self.entries)?;
        let tmp_path = self.cache_path.with_extension("json.tmp");
        std::fs::write(&tmp_path, contents)?;
        std::fs::rename(&tmp_path, &self.cache_path)?;
        Ok(())
    }

    /// Return a fresh forecast for `key`, refreshing through `source` when
    /// the cached one is missing or older than `ttl`.
    pub async fn get_or_refresh<S: ForecastSource>(
        &mut self,
        source: &S,
        key: &LocationKey,
        ttl: Duration,
    ) -> Result<CachedForecast, FetchError> {
        self.get_or_refresh_at(source, key, ttl, Utc::now()).await
    }

    /// [`Self::get_or_refresh`] with an explicit clock reading.
    pub async fn get_or_refresh_at<S: ForecastSource>(
        &mut self,
        source: &S,
        key: &LocationKey,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<CachedForecast, FetchError> {
        let stale = match self.lookup(key, ttl, now) {
            Lookup::Fresh(record) => {
                return Ok(CachedForecast {
                    record,
                    origin: ForecastOrigin::Cache,
                })
            }
            Lookup::Stale(entry) => Some(entry),
            Lookup::Missing => None,
        };

        let result = source.fetch(key).await;
        self.settle(key, result, stale, now)
    }

    fn lookup(&self, key: &LocationKey, ttl: Duration, now: DateTime<Utc>) -> Lookup {
        match self.get(key) {
            Some(entry) if entry.is_fresh(now, ttl) => {
                tracing::debug!("Forecast cache hit for {}", key);
                Lookup::Fresh(entry.record.clone())
            }
            Some(entry) => Lookup::Stale(entry.clone()),
            None => Lookup::Missing,
        }
    }

    fn settle(
        &mut self,
        key: &LocationKey,
        result: Result<ForecastRecord, FetchError>,
        stale: Option<CacheEntry>,
        now: DateTime<Utc>,
    ) -> Result<CachedForecast, FetchError> {
        match (result, stale) {
            (Ok(record), _) => {
                if let Err(e) = self.insert(key, record.clone(), now) {
                    tracing::warn!("Failed to persist forecast cache: {}", e);
                }
                Ok(CachedForecast {
                    record,
                    origin: ForecastOrigin::Network,
                })
            }
            (Err(error), Some(entry)) => {
                let age = entry.age(now);
                tracing::warn!(
                    "Refresh for {} failed ({}); serving forecast from {}s ago",
                    key,
                    error,
                    age.as_secs()
                );
                Ok(CachedForecast {
                    record: entry.record,
                    origin: ForecastOrigin::Stale { error, age },
                })
            }
            (Err(error), None) => {
                tracing::warn!("Forecast for {} unavailable: {}", key, error);
                Err(error)
            }
        }
    }
}

/// `Ok(None)` when there is no file yet.
fn read_entries(path: &Path) -> Result<Option<BTreeMap<String, CacheEntry>>, CacheError> {
    let contents = match std::fs::read(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(CacheError::Corrupt(format!("{}: {}", path.display(), e))),
    };
    serde_json::from_slice(&contents)
        .map(Some)
        .map_err(|e| CacheError::Corrupt(format!("{}: {}", path.display(), e)))
}

/// Cache handle for concurrent callers.
///
/// Refreshes of the same key are serialized by a per-key async lock; map
/// mutation and the file write happen under one mutex so the persisted
/// document is never written by two tasks at once.
#[derive(Debug, Clone)]
pub struct SharedForecastCache {
    inner: Arc<Mutex<ForecastCache>>,
    key_locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl SharedForecastCache {
    pub fn new(cache: ForecastCache) -> Self {
        Self {
            inner: Arc::new(Mutex::new(cache)),
            key_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn get(&self, key: &LocationKey) -> Option<CacheEntry> {
        self.inner.lock().get(key).cloned()
    }

    pub fn remove(&self, key: &LocationKey) -> Result<bool, CacheError> {
        self.inner.lock().remove(key)
    }

    pub fn clear(&self) -> Result<(), CacheError> {
        self.inner.lock().clear()
    }

    pub async fn get_or_refresh<S: ForecastSource>(
        &self,
        source: &S,
        key: &LocationKey,
        ttl: Duration,
    ) -> Result<CachedForecast, FetchError> {
        self.get_or_refresh_at(source, key, ttl, Utc::now()).await
    }

    pub async fn get_or_refresh_at<S: ForecastSource>(
        &self,
        source: &S,
        key: &LocationKey,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<CachedForecast, FetchError> {
        let key_lock = self.key_lock(key);
        let _guard = key_lock.lock().await;

        // A concurrent caller may have refreshed while we waited
        let lookup = self.inner.lock().lookup(key, ttl, now);
        let stale = match lookup {
            Lookup::Fresh(record) => {
                return Ok(CachedForecast {
                    record,
                    origin: ForecastOrigin::Cache,
                })
            }
            Lookup::Stale(entry) => Some(entry),
            Lookup::Missing => None,
        };

        let result = source.fetch(key).await;
        self.inner.lock().settle(key, result, stale, now)
    }

    fn key_lock(&self, key: &LocationKey) -> Arc<tokio::sync::Mutex<()>> {
        self.key_locks
            .lock()
            .entry(key.to_string())
            .or_default()
            .clone()
    }
}
