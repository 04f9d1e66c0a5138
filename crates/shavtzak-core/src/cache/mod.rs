//! Local caching module for offline roster access.
//!
//! The roster snapshot is stored as a JSON envelope `{data, timestamp}` under
//! a fixed key and expires 12 hours after it was written. Expired or corrupt
//! entries are removed on read.

pub mod manager;

pub use manager::{CacheManager, CachedData, SOLDIERS_CACHE_KEY};
