use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

/// String-keyed in-memory cache with a fixed time-to-live and a bounded
/// capacity. Expiry is checked lazily on lookup; there is no sweep. When the
/// cache is full, inserting a new key evicts the oldest entry first.
#[derive(Debug)]
pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, Entry<V>>>,
    ttl: Duration,
    capacity: usize,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self { entries: Mutex::new(HashMap::new()), ttl, capacity }
    }

    /// Look up a live entry. A stale entry counts as a miss and is removed.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock().ok()?;
        match entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: String, value: V) {
        if let Ok(mut entries) = self.entries.lock() {
            if !entries.contains_key(&key)
                && entries.len() >= self.capacity
                && let Some(oldest) = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.inserted_at)
                    .map(|(k, _)| k.clone())
            {
                entries.remove(&oldest);
            }
            entries.insert(key, Entry { value, inserted_at: Instant::now() });
        }
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_entries_are_returned() {
        let cache = TtlCache::new(Duration::from_secs(60), 8);
        cache.insert("austin".to_owned(), 1);
        assert_eq!(cache.get("austin"), Some(1));
    }

    #[test]
    fn stale_entries_are_misses_and_removed() {
        let cache = TtlCache::new(Duration::ZERO, 8);
        cache.insert("austin".to_owned(), 1);
        assert_eq!(cache.get("austin"), None);
        assert!(cache.is_empty(), "stale entry should be dropped on lookup");
    }

    #[test]
    fn full_cache_evicts_the_oldest_entry() {
        let cache = TtlCache::new(Duration::from_secs(60), 2);
        cache.insert("a".to_owned(), 1);
        std::thread::sleep(Duration::from_millis(5));
        cache.insert("b".to_owned(), 2);
        std::thread::sleep(Duration::from_millis(5));
        cache.insert("c".to_owned(), 3);

        assert_eq!(cache.get("a"), None, "oldest entry should be evicted");
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.get("c"), Some(3));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn reinserting_an_existing_key_does_not_evict() {
        let cache = TtlCache::new(Duration::from_secs(60), 2);
        cache.insert("a".to_owned(), 1);
        cache.insert("b".to_owned(), 2);
        cache.insert("a".to_owned(), 3);

        assert_eq!(cache.get("a"), Some(3));
        assert_eq!(cache.get("b"), Some(2));
    }

    #[test]
    fn clear_empties_the_cache() {
        let cache = TtlCache::new(Duration::from_secs(60), 8);
        cache.insert("a".to_owned(), 1);
        cache.insert("b".to_owned(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }
}
