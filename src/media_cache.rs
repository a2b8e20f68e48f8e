//! Raw Media Cache (C2).
//!
//! Caches downloaded segment bytes keyed by the URL handle from
//! [`crate::url_pool`]. Fixed 16-entry array, single mutex, eviction by
//! smallest timestamp with a preference for still-pristine (`key == 0`)
//! slots — the same policy as the teacher's `SegmentCache`, adapted from a
//! `DashMap` of unbounded string keys down to the fixed-capacity array the
//! data model specifies.

use bytes::Bytes;
use parking_lot::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::limits::MEDIA_CACHE_SIZE;

#[derive(Clone)]
struct Entry {
    key: u32,
    data: Bytes,
    timestamp: u32,
}

impl Entry {
    fn empty() -> Self {
        Self {
            key: 0,
            data: Bytes::new(),
            timestamp: 0,
        }
    }
}

pub struct RawMediaCache {
    entries: Mutex<Vec<Entry>>,
}

impl Default for RawMediaCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RawMediaCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(vec![Entry::empty(); MEDIA_CACHE_SIZE]),
        }
    }

    /// Look up `key`. Returns an owned copy of the cached bytes; the caller
    /// does not share the cache's internal buffer.
    pub fn query(&self, key: u32) -> Option<Bytes> {
        if key == 0 {
            return None;
        }
        let mut entries = self.entries.lock();
        let now = now_secs();
        let entry = entries.iter_mut().find(|e| e.key == key)?;
        entry.timestamp = now;
        Some(entry.data.clone())
    }

    /// Insert `data` under `key`. A matching existing entry is overwritten
    /// in place; otherwise a victim is chosen by smallest timestamp
    /// (preferring a still-pristine slot if one exists).
    pub fn insert(&self, key: u32, data: Bytes) {
        let mut entries = self.entries.lock();
        let now = now_secs();

        if let Some(e) = entries.iter_mut().find(|e| e.key == key) {
            e.data = data;
            e.timestamp = now;
            return;
        }

        let mut victim = 0usize;
        let mut victim_timestamp = u32::MAX;
        for (i, e) in entries.iter().enumerate() {
            if e.timestamp < victim_timestamp {
                victim_timestamp = e.timestamp;
                victim = i;
            }
            if e.key == 0 {
                victim = i;
                break;
            }
        }

        entries[victim] = Entry {
            key,
            data,
            timestamp: now,
        };
    }

    /// Number of populated (non-pristine) entries.
    pub fn len(&self) -> usize {
        self.entries.lock().iter().filter(|e| e.key != 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        *entries = vec![Entry::empty(); MEDIA_CACHE_SIZE];
    }
}

fn now_secs() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}
