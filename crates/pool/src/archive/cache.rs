//! Bounded TTL cache of decompressed archive entries
//!
//! Decompressing the same entry for every request is wasteful, so content
//! read through an [`ArchiveResource`](super::ArchiveResource) is kept here,
//! weighted by byte length.

use std::time::Duration;

use bytes::Bytes;
use moka::sync::Cache;

use super::entry_index::normalize_path;
use crate::config::EntryCacheConfig;

#[derive(Clone)]
pub(crate) struct EntryCache {
    content: Cache<String, Bytes>,
    config: EntryCacheConfig,
}

impl EntryCache {
    pub(crate) fn new(config: EntryCacheConfig) -> Self {
        let ttl = Duration::from_secs(config.ttl_secs as u64);
        let max_capacity = (config.max_size_mb as u64) * 1024 * 1024;

        Self {
            content: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(max_capacity)
                .weigher(|_key: &String, value: &Bytes| -> u32 {
                    value.len().try_into().unwrap_or(u32::MAX)
                })
                .build(),
            config,
        }
    }

    pub(crate) fn get(&self, path: &str) -> Option<Bytes> {
        self.content.get(&normalize_path(path))
    }

    pub(crate) fn put(&self, path: &str, data: Bytes) {
        self.content.insert(normalize_path(path), data);
    }

    pub(crate) fn invalidate_all(&self) {
        self.content.invalidate_all();
    }
}

impl std::fmt::Debug for EntryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryCache")
            .field("config", &self.config)
            .field("entry_count", &self.content.entry_count())
            .finish()
    }
}
