//! On-disk cache of successful match responses.
//!
//! Keyed by (platform code, primary hash) — or filename + size when the
//! hash was skipped — with a TTL measured in days. Write-through: each
//! store is flushed to `<catalog>/<platform>/.cache/response_cache.json`.
//! A cache hit costs no network call and no quota.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::GameRecord;

pub const DEFAULT_TTL_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    record: GameRecord,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct State {
    entries: HashMap<String, CacheEntry>,
    hits: u64,
    misses: u64,
}

/// Per-platform response cache.
#[derive(Debug)]
pub struct ResponseCache {
    path: PathBuf,
    ttl: Duration,
    /// When false (dry runs), stores stay in memory only.
    persist: bool,
    state: Mutex<State>,
}

impl ResponseCache {
    /// Open the cache for a platform's catalog directory, loading any
    /// existing entries. A corrupt cache file starts empty.
    pub fn open(catalog_dir: &Path, ttl_days: i64, persist: bool) -> Self {
        let path = catalog_dir.join(".cache").join("response_cache.json");
        let entries = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<HashMap<String, CacheEntry>>(&content) {
                Ok(entries) => {
                    log::debug!("Loaded {} cached responses from {}", entries.len(), path.display());
                    entries
                }
                Err(e) => {
                    log::warn!("Corrupt response cache {}, starting empty: {e}", path.display());
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        Self {
            path,
            ttl: Duration::days(ttl_days),
            persist,
            state: Mutex::new(State {
                entries,
                ..Default::default()
            }),
        }
    }

    /// Cache key for a lookup: hash-based when available, otherwise
    /// filename + size.
    pub fn lookup_key(system_id: u32, hash: Option<&str>, filename: &str, size: u64) -> String {
        match hash {
            Some(h) => format!("{system_id}:hash:{h}"),
            None => format!("{system_id}:name:{filename}:{size}"),
        }
    }

    /// Fetch a non-expired record.
    pub fn get(&self, key: &str) -> Option<GameRecord> {
        let mut state = self.state.lock().expect("cache lock poisoned");
        let now = Utc::now();
        let fresh = match state.entries.get(key) {
            Some(entry) if now - entry.timestamp < self.ttl => Some(entry.record.clone()),
            Some(_) => {
                state.entries.remove(key);
                None
            }
            None => None,
        };
        if fresh.is_some() {
            state.hits += 1;
        } else {
            state.misses += 1;
        }
        fresh
    }

    /// Store a fresh response and flush to disk (write-through).
    pub fn put(&self, key: &str, record: &GameRecord) {
        let snapshot = {
            let mut state = self.state.lock().expect("cache lock poisoned");
            state.entries.insert(
                key.to_string(),
                CacheEntry {
                    record: record.clone(),
                    timestamp: Utc::now(),
                },
            );
            if self.persist {
                Some(state.entries.clone())
            } else {
                None
            }
        };
        if let Some(snapshot) = snapshot {
            if let Err(e) = self.save(&snapshot) {
                log::warn!("Failed to persist response cache: {e}");
            }
        }
    }

    /// Wholesale invalidation (operator command).
    pub fn invalidate(&self) -> std::io::Result<()> {
        {
            let mut state = self.state.lock().expect("cache lock poisoned");
            state.entries.clear();
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// (hits, misses) for the platform summary.
    pub fn stats(&self) -> (u64, u64) {
        let state = self.state.lock().expect("cache lock poisoned");
        (state.hits, state.misses)
    }

    fn save(&self, entries: &HashMap<String, CacheEntry>) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, &self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> GameRecord {
        GameRecord {
            id: id.into(),
            ..Default::default()
        }
    }

    #[test]
    fn keys_prefer_hash_over_name() {
        assert_eq!(
            ResponseCache::lookup_key(3, Some("CBF43926"), "x.zip", 9),
            "3:hash:CBF43926"
        );
        assert_eq!(
            ResponseCache::lookup_key(3, None, "x.zip", 9),
            "3:name:x.zip:9"
        );
    }

    #[test]
    fn put_then_get_round_trips_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::open(dir.path(), DEFAULT_TTL_DAYS, true);
        assert!(cache.get("k").is_none());
        cache.put("k", &record("1"));
        assert_eq!(cache.get("k").unwrap().id, "1");
        assert_eq!(cache.stats(), (1, 1));

        // A fresh handle sees the persisted entry.
        let reopened = ResponseCache::open(dir.path(), DEFAULT_TTL_DAYS, true);
        assert_eq!(reopened.get("k").unwrap().id, "1");
    }

    #[test]
    fn expired_entries_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::open(dir.path(), 0, false);
        cache.put("k", &record("1"));
        // TTL of zero days: immediately stale.
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn invalidate_clears_memory_and_disk() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::open(dir.path(), DEFAULT_TTL_DAYS, true);
        cache.put("k", &record("1"));
        cache.invalidate().unwrap();
        assert!(cache.get("k").is_none());
        let reopened = ResponseCache::open(dir.path(), DEFAULT_TTL_DAYS, true);
        assert!(reopened.get("k").is_none());
    }

    #[test]
    fn memory_only_mode_writes_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::open(dir.path(), DEFAULT_TTL_DAYS, false);
        cache.put("k", &record("1"));
        assert!(!dir.path().join(".cache").join("response_cache.json").exists());
    }
}
