//! In-memory response cache for AI completions.
//!
//! # Invariants
//! - At most `capacity` entries; the oldest insertion is evicted first.
//! - Entries older than `ttl` are never returned and are pruned lazily.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

pub const DEFAULT_CAPACITY: usize = 50;
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// 32-bit string hash: `h = h * 31 + unit` over UTF-16 code units,
/// wrapping on overflow. Collisions are possible and accepted.
pub fn weak_hash(text: &str) -> i32 {
    text.encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(unit as i32))
}

/// Insertion-ordered TTL cache. Reads use `peek`, so a hit never moves an
/// entry and eviction always drops the oldest insertion.
#[derive(Debug)]
pub struct ResponseCache {
    entries: Mutex<LruCache<i32, (String, Instant)>>,
    ttl: Duration,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

impl ResponseCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    pub fn get(&self, key: i32) -> Option<String> {
        self.get_at(key, Instant::now())
    }

    pub fn get_at(&self, key: i32, now: Instant) -> Option<String> {
        let mut entries = self.lock();
        let (value, stored_at) = entries.peek(&key)?;
        if now.saturating_duration_since(*stored_at) < self.ttl {
            return Some(value.clone());
        }
        entries.pop(&key);
        None
    }

    pub fn insert(&self, key: i32, value: impl Into<String>) {
        self.insert_at(key, value, Instant::now());
    }

    /// Stores `value`; an existing key counts as a fresh insertion.
    pub fn insert_at(&self, key: i32, value: impl Into<String>, now: Instant) {
        let mut entries = self.lock();
        entries.pop(&key);
        entries.push(key, (value.into(), now));
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<i32, (String, Instant)>> {
        // A panic while holding the lock leaves plain data behind; keep using it.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::{weak_hash, ResponseCache};
    use std::time::{Duration, Instant};

    #[test]
    fn weak_hash_matches_java_string_hash() {
        assert_eq!(weak_hash(""), 0);
        assert_eq!(weak_hash("a"), 97);
        assert_eq!(weak_hash("hello"), 99_162_322);
        assert_eq!(weak_hash("polygenelubricants"), i32::MIN);
    }

    #[test]
    fn entries_expire_after_ttl() {
        let cache = ResponseCache::new(4, Duration::from_secs(10));
        let start = Instant::now();
        cache.insert_at(1, "cached", start);
        assert_eq!(
            cache.get_at(1, start + Duration::from_secs(9)).as_deref(),
            Some("cached")
        );
        assert_eq!(cache.get_at(1, start + Duration::from_secs(10)), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn oldest_entry_is_evicted_at_capacity() {
        let cache = ResponseCache::new(2, Duration::from_secs(60));
        let now = Instant::now();
        cache.insert_at(1, "one", now);
        cache.insert_at(2, "two", now);
        cache.insert_at(3, "three", now);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get_at(1, now), None);
        assert_eq!(cache.get_at(3, now).as_deref(), Some("three"));
    }

    #[test]
    fn reads_do_not_protect_an_entry_from_eviction() {
        let cache = ResponseCache::new(2, Duration::from_secs(60));
        let now = Instant::now();
        cache.insert_at(1, "one", now);
        cache.insert_at(2, "two", now);
        assert_eq!(cache.get_at(1, now).as_deref(), Some("one"));

        cache.insert_at(3, "three", now);

        assert_eq!(cache.get_at(1, now), None);
        assert_eq!(cache.get_at(2, now).as_deref(), Some("two"));
    }

    #[test]
    fn zero_capacity_still_holds_one_entry() {
        let cache = ResponseCache::new(0, Duration::from_secs(60));
        cache.insert(7, "seven");
        assert_eq!(cache.get(7).as_deref(), Some("seven"));
    }
}
