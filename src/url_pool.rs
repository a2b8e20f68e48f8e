//! URL Intern Pool (C1).
//!
//! Deduplicates URLs behind a stable 32-bit handle so downstream tasks can
//! carry a `u32` instead of cloning strings across channel boundaries. Ported
//! from the original fixed-array pool: linear scan under a single mutex,
//! LRU eviction by a monotonic access counter once the pool is full.

use parking_lot::Mutex;

use crate::limits::{URL_MAX_LENGTH, URL_POOL_CAPACITY};

struct Entry {
    url: String,
    hash: u32,
    last_access: u64,
}

struct Inner {
    entries: Vec<Entry>,
    access_counter: u64,
}

/// Deduplicating URL pool keyed by FNV-1a-32 hash.
pub struct UrlInternPool {
    inner: Mutex<Inner>,
}

impl Default for UrlInternPool {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlInternPool {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: Vec::with_capacity(URL_POOL_CAPACITY),
                access_counter: 0,
            }),
        }
    }

    /// Intern `url`, returning its stable hash handle.
    ///
    /// Fails only when `url` is at least [`URL_MAX_LENGTH`] bytes long.
    /// Re-interning an already-present URL just refreshes its LRU timestamp.
    pub fn insert(&self, url: &str) -> Option<u32> {
        let hash = fnv1a_32(url.as_bytes());
        let mut inner = self.inner.lock();

        if let Some(idx) = inner.entries.iter().position(|e| e.hash == hash) {
            inner.access_counter += 1;
            let access = inner.access_counter;
            inner.entries[idx].last_access = access;
            return Some(hash);
        }

        if url.len() >= URL_MAX_LENGTH {
            return None;
        }

        inner.access_counter += 1;
        let access = inner.access_counter;

        if inner.entries.len() < URL_POOL_CAPACITY {
            inner.entries.push(Entry {
                url: url.to_string(),
                hash,
                last_access: access,
            });
        } else {
            let lru_idx = inner
                .entries
                .iter()
                .enumerate()
                .min_by_key(|(_, e)| e.last_access)
                .map(|(i, _)| i)
                .expect("pool at capacity is never empty");
            inner.entries[lru_idx] = Entry {
                url: url.to_string(),
                hash,
                last_access: access,
            };
        }

        Some(hash)
    }

    /// Look up an interned URL by its hash handle. Bumps its LRU timestamp.
    pub fn get(&self, hash: u32) -> Option<String> {
        let mut inner = self.inner.lock();
        inner.access_counter += 1;
        let access = inner.access_counter;
        let entry = inner.entries.iter_mut().find(|e| e.hash == hash)?;
        entry.last_access = access;
        Some(entry.url.clone())
    }

    /// Number of interned URLs.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every interned URL.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.access_counter = 0;
    }
}

/// FNV-1a-32, per the data model's hash requirement. Hash collisions between
/// distinct URLs are tolerated (see `[[design-open-questions]]`): they alias
/// to the same handle, degrading to "last writer wins" on the loser's slot.
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;

    let mut hash = OFFSET_BASIS;
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}
