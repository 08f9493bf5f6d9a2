//! Shared bearer-token cache
//!
//! OAuth tokens are cached per carrier name so concurrent processes reuse
//! one token instead of racing the carrier's token endpoint. Entries are
//! stored with the server TTL shortened by a 60 second safety margin; an
//! entry past its shortened expiry reads as a miss. Two processes that
//! both miss and re-authenticate concurrently are tolerated - both tokens
//! are valid - so no cross-process lock is taken.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// Safety margin subtracted from the server-provided TTL
pub const TTL_SAFETY_MARGIN_SECS: i64 = 60;

/// One cached token with its (already shortened) expiry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Get / put-with-TTL / evict semantics over a per-carrier key.
/// Reads and writes are atomic per key.
pub trait TokenCache: Send + Sync {
    fn get(&self, key: &str) -> Option<CachedToken>;
    fn put(&self, key: &str, token: String, ttl_secs: i64);
    fn evict(&self, key: &str);
}

/// In-process cache implementation
#[derive(Default)]
pub struct InMemoryTokenCache {
    entries: Mutex<HashMap<String, CachedToken>>,
}

impl InMemoryTokenCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenCache for InMemoryTokenCache {
    fn get(&self, key: &str) -> Option<CachedToken> {
        let entries = self.entries.lock().expect("token cache poisoned");
        entries
            .get(key)
            .filter(|entry| entry.expires_at > Utc::now())
            .cloned()
    }

    fn put(&self, key: &str, token: String, ttl_secs: i64) {
        let effective_ttl = (ttl_secs - TTL_SAFETY_MARGIN_SECS).max(0);
        let entry = CachedToken {
            token,
            expires_at: Utc::now() + Duration::seconds(effective_ttl),
        };
        let mut entries = self.entries.lock().expect("token cache poisoned");
        entries.insert(key.to_string(), entry);
    }

    fn evict(&self, key: &str) {
        let mut entries = self.entries.lock().expect("token cache poisoned");
        entries.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_then_get() {
        let cache = InMemoryTokenCache::new();
        cache.put("fedex", "tok-1".to_string(), 3600);
        let entry = cache.get("fedex").expect("entry present");
        assert_eq!(entry.token, "tok-1");
    }

    #[test]
    fn test_ttl_margin_applied() {
        let cache = InMemoryTokenCache::new();
        let before = Utc::now();
        cache.put("ups", "tok-2".to_string(), 3600);
        let entry = cache.get("ups").unwrap();
        // Expiry lands near now + 3540s, well short of the full hour
        let ttl = (entry.expires_at - before).num_seconds();
        assert!(ttl <= 3600 - TTL_SAFETY_MARGIN_SECS, "ttl was {}", ttl);
        assert!(ttl > 3600 - TTL_SAFETY_MARGIN_SECS - 5, "ttl was {}", ttl);
    }

    #[test]
    fn test_short_ttl_reads_as_miss() {
        let cache = InMemoryTokenCache::new();
        // TTL inside the safety margin expires immediately
        cache.put("dhl", "tok-3".to_string(), 30);
        assert!(cache.get("dhl").is_none());
    }

    #[test]
    fn test_evict_removes_entry() {
        let cache = InMemoryTokenCache::new();
        cache.put("fedex", "tok-4".to_string(), 3600);
        cache.evict("fedex");
        assert!(cache.get("fedex").is_none());
    }

    #[test]
    fn test_keys_are_independent() {
        let cache = InMemoryTokenCache::new();
        cache.put("fedex", "tok-f".to_string(), 3600);
        cache.put("ups", "tok-u".to_string(), 3600);
        cache.evict("fedex");
        assert!(cache.get("fedex").is_none());
        assert_eq!(cache.get("ups").unwrap().token, "tok-u");
    }
}
