//! rigrelay-cache: A concurrency-safe TTL cache for rig daemon responses.
//!
//! Maps a [`CommandKey`] to the last recorded [`Response`] plus its
//! insertion time. A single lifetime configured at construction governs
//! expiry; a zero lifetime disables it, so entries live until explicitly
//! invalidated.
//!
//! The map is guarded by a readers-writer lock (parking_lot, which never
//! poisons on panic): lookups proceed in parallel, mutations exclude
//! readers, and every operation takes the lock exactly once. The cache
//! never performs I/O.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use rigrelay_protocol::{CommandKey, Response};

/// TTL cache shared by all proxy sessions of one upstream connection.
pub struct Cache {
    entries: RwLock<HashMap<CommandKey, Entry>>,
    lifetime: Duration,
}

struct Entry {
    response: Response,
    timestamp: Instant,
}

impl Cache {
    /// A cache whose entries never expire.
    pub fn new() -> Self {
        Self::with_lifetime(Duration::ZERO)
    }

    /// A cache whose entries expire `lifetime` after insertion.
    /// `Duration::ZERO` disables expiry.
    pub fn with_lifetime(lifetime: Duration) -> Self {
        Cache {
            entries: RwLock::new(HashMap::new()),
            lifetime,
        }
    }

    /// Record `response` under `key`, replacing any previous entry.
    pub fn put(&self, key: CommandKey, response: Response) {
        let mut entries = self.entries.write();
        entries.insert(
            key,
            Entry {
                response,
                timestamp: Instant::now(),
            },
        );
    }

    /// Look up the response recorded under `key`.
    ///
    /// Returns `None` when there is no entry or the entry has outlived the
    /// cache lifetime. Expired entries are retained lazily; they are
    /// overwritten by the next `put` or removed by `invalidate`.
    pub fn get(&self, key: &CommandKey) -> Option<Response> {
        let entries = self.entries.read();
        let entry = entries.get(key)?;
        if !self.lifetime.is_zero() && entry.timestamp.elapsed() > self.lifetime {
            return None;
        }
        Some(entry.response.clone())
    }

    /// Drop the entry recorded under `key`, if any.
    pub fn invalidate(&self, key: &CommandKey) {
        let mut entries = self.entries.write();
        entries.remove(key);
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> CommandKey {
        CommandKey::from("the_command")
    }

    fn response(data: &str) -> Response {
        Response {
            data: vec![data.to_string()],
            result: "0".to_string(),
            ..Response::default()
        }
    }

    #[test]
    fn empty_cache_misses() {
        let cache = Cache::new();
        assert_eq!(cache.get(&key()), None);
    }

    #[test]
    fn put_get_roundtrip() {
        let cache = Cache::new();
        let resp = response("response_data");

        cache.put(key(), resp.clone());
        assert_eq!(cache.get(&key()), Some(resp));
    }

    #[test]
    fn put_overwrites_previous_entry() {
        let cache = Cache::new();
        cache.put(key(), response("old"));
        cache.put(key(), response("new"));
        assert_eq!(cache.get(&key()), Some(response("new")));
    }

    #[test]
    fn invalidate_removes_entry() {
        let cache = Cache::new();
        cache.put(key(), response("response_data"));
        cache.invalidate(&key());
        assert_eq!(cache.get(&key()), None);
    }

    #[test]
    fn invalidate_unknown_key_is_harmless() {
        let cache = Cache::new();
        cache.invalidate(&key());
        assert_eq!(cache.get(&key()), None);
    }

    #[test]
    fn entries_expire_after_lifetime() {
        let cache = Cache::with_lifetime(Duration::from_millis(10));
        cache.put(key(), response("response_data"));
        assert!(cache.get(&key()).is_some());

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get(&key()), None);
    }

    #[test]
    fn zero_lifetime_never_expires() {
        let cache = Cache::new();
        cache.put(key(), response("response_data"));
        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.get(&key()).is_some());
    }

    #[test]
    fn concurrent_readers_and_writer() {
        let cache = std::sync::Arc::new(Cache::new());

        let writer = {
            let cache = cache.clone();
            std::thread::spawn(move || {
                for i in 0..1000 {
                    cache.put(key(), response(&i.to_string()));
                }
            })
        };

        let reader = {
            let cache = cache.clone();
            std::thread::spawn(move || loop {
                if let Some(resp) = cache.get(&key()) {
                    if resp.data[0] == "999" {
                        return;
                    }
                }
            })
        };

        writer.join().unwrap();
        reader.join().unwrap();
    }
}
