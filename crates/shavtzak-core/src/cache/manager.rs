use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::Soldier;

/// Cached roster expires after 12 hours.
const CACHE_EXPIRY_MS: i64 = 12 * 60 * 60 * 1000;

/// Fixed key of the roster snapshot.
pub const SOLDIERS_CACHE_KEY: &str = "soldiers_cache";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self::at(data, Utc::now())
    }

    pub fn at(data: T, now: DateTime<Utc>) -> Self {
        Self {
            data,
            timestamp: now.timestamp_millis(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now().timestamp_millis() - self.timestamp) / 60_000
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            format!("{}h ago", minutes / 60)
        } else {
            format!("{}d ago", minutes / 1440)
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp_millis() - self.timestamp > CACHE_EXPIRY_MS
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// File-backed key/value cache. Each key is a JSON file in the cache directory.
pub struct CacheManager {
    cache_dir: PathBuf,
}

impl CacheManager {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir)
            .with_context(|| format!("Failed to create cache directory {}", cache_dir.display()))?;
        Ok(Self { cache_dir })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn cache_path(&self, name: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", name))
    }

    fn remove(&self, name: &str) {
        let path = self.cache_path(name);
        if let Err(e) = std::fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(cache = name, error = %e, "Failed to remove cache file");
            }
        }
    }

    /// Load an entry. Corrupt or expired entries are removed and read as absent.
    fn load_at<T: DeserializeOwned>(&self, name: &str, now: DateTime<Utc>) -> Option<CachedData<T>> {
        let path = self.cache_path(name);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(cache = name, error = %e, "Failed to read cache file");
                }
                return None;
            }
        };

        let cached: CachedData<T> = match serde_json::from_str(&contents) {
            Ok(cached) => cached,
            Err(e) => {
                warn!(cache = name, error = %e, "Discarding unparsable cache entry");
                self.remove(name);
                return None;
            }
        };

        if cached.is_expired_at(now) {
            debug!(cache = name, "Cache entry expired");
            self.remove(name);
            return None;
        }

        Some(cached)
    }

    fn save<T: Serialize>(&self, name: &str, cached: &CachedData<T>) -> Result<()> {
        let contents = serde_json::to_string(cached)?;
        std::fs::write(self.cache_path(name), contents)
            .with_context(|| format!("Failed to write cache file: {}", name))?;
        Ok(())
    }

    // ===== Soldiers =====

    pub fn get_soldiers(&self) -> Option<CachedData<Vec<Soldier>>> {
        self.load_at(SOLDIERS_CACHE_KEY, Utc::now())
    }

    /// Overwrite the roster snapshot.
    pub fn set_soldiers(&self, soldiers: &[Soldier]) -> Result<()> {
        self.save(SOLDIERS_CACHE_KEY, &CachedData::new(soldiers))
    }

    pub fn clear(&self) {
        self.remove(SOLDIERS_CACHE_KEY);
    }

    /// Age of the roster snapshot for the status bar
    pub fn soldiers_age(&self) -> String {
        self.get_soldiers()
            .map(|cached| cached.age_display())
            .unwrap_or_else(|| "never".to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::map_raw_status_to_structured;
    use chrono::Duration;

    fn manager() -> (tempfile::TempDir, CacheManager) {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheManager::new(dir.path().join("cache")).unwrap();
        (dir, cache)
    }

    fn soldiers() -> Vec<Soldier> {
        vec![Soldier::new("1234567", "Dana", "Levi", "1", map_raw_status_to_structured("משמר"))]
    }

    fn write_raw(cache: &CacheManager, contents: &str) {
        std::fs::write(cache.cache_path(SOLDIERS_CACHE_KEY), contents).unwrap();
    }

    #[test]
    fn test_get_returns_none_when_absent() {
        let (_dir, cache) = manager();
        assert!(cache.get_soldiers().is_none());
        assert_eq!(cache.soldiers_age(), "never");
    }

    #[test]
    fn test_set_then_get() {
        let (_dir, cache) = manager();
        cache.set_soldiers(&soldiers()).unwrap();

        let cached = cache.get_soldiers().unwrap();
        assert_eq!(cached.data, soldiers());
        assert_eq!(cached.age_display(), "just now");
    }

    #[test]
    fn test_set_overwrites() {
        let (_dir, cache) = manager();
        cache.set_soldiers(&soldiers()).unwrap();
        cache.set_soldiers(&[]).unwrap();
        assert!(cache.get_soldiers().unwrap().data.is_empty());
    }

    #[test]
    fn test_corrupt_entry_is_evicted() {
        let (_dir, cache) = manager();
        write_raw(&cache, "{not json");

        assert!(cache.get_soldiers().is_none());
        assert!(!cache.cache_path(SOLDIERS_CACHE_KEY).exists());
    }

    #[test]
    fn test_expired_entry_is_evicted() {
        let (_dir, cache) = manager();
        let old = CachedData::at(soldiers(), Utc::now() - Duration::hours(13));
        cache.save(SOLDIERS_CACHE_KEY, &old).unwrap();

        assert!(cache.get_soldiers().is_none());
        assert!(!cache.cache_path(SOLDIERS_CACHE_KEY).exists());
    }

    #[test]
    fn test_expiry_boundary() {
        let (_dir, cache) = manager();
        let written = Utc::now();
        cache
            .save(SOLDIERS_CACHE_KEY, &CachedData::at(soldiers(), written))
            .unwrap();

        let exactly = written + Duration::hours(12);
        assert!(cache.load_at::<Vec<Soldier>>(SOLDIERS_CACHE_KEY, exactly).is_some());

        let just_after = exactly + Duration::milliseconds(1);
        assert!(cache.load_at::<Vec<Soldier>>(SOLDIERS_CACHE_KEY, just_after).is_none());
    }

    #[test]
    fn test_envelope_format() {
        let (_dir, cache) = manager();
        cache.set_soldiers(&soldiers()).unwrap();
        let raw = std::fs::read_to_string(cache.cache_path(SOLDIERS_CACHE_KEY)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(value["timestamp"].is_i64());
        assert_eq!(value["data"][0]["status"], "משמר");
    }

    #[test]
    fn test_clear() {
        let (_dir, cache) = manager();
        cache.set_soldiers(&soldiers()).unwrap();
        cache.clear();
        assert!(cache.get_soldiers().is_none());
    }

    #[test]
    fn test_age_display() {
        let mut cached = CachedData::new(());
        cached.timestamp -= 5 * 60_000;
        assert_eq!(cached.age_display(), "5m ago");
        cached.timestamp -= 3 * 60 * 60_000;
        assert_eq!(cached.age_display(), "3h ago");
        cached.timestamp -= 2 * 24 * 60 * 60_000;
        assert_eq!(cached.age_display(), "2d ago");
    }
}
