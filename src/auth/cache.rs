// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! LRU cache for access token validation results.
//!
//! Keyed by `(token, client config ID)` so the same token validated for two
//! clients never shares an entry. The cache is split into shards, each an
//! independent `Mutex<LruCache>`; a lock is held only for the single map
//! operation.
//!
//! A hit is only served while `now < exp + clockSkew` (using the `exp` from
//! the cached `tokenInfo`) and while the entry is younger than the client's
//! cache timeout. A result without `exp` is never served from the cache.
//! Expired entries are left in place until they are replaced or evicted.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use lru::LruCache;
use uuid::Uuid;

use super::claims::now_epoch_secs;
use super::token::token_fingerprint;
use super::{AuthenticationResult, ClientConfig};

/// Default total number of cached results.
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

const SHARD_COUNT: usize = 16;

/// Cache key: raw token plus client config ID.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    token: String,
    config_id: String,
}

impl CacheKey {
    pub fn new(token: &str, config: &ClientConfig) -> Self {
        Self {
            token: token.to_string(),
            config_id: config.id.clone(),
        }
    }
}

impl std::fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheKey")
            .field("token", &token_fingerprint(&self.token))
            .field("config_id", &self.config_id)
            .finish()
    }
}

/// Cached entry: result + correlation ID + insertion timestamp.
struct CacheEntry {
    correlation_id: String,
    result: AuthenticationResult,
    inserted_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, config: &ClientConfig, now: i64) -> bool {
        if self.inserted_at.elapsed() >= Duration::from_secs(config.cache_timeout_secs) {
            return false;
        }
        match self.result.token_exp() {
            Some(exp) => now < exp.saturating_add(config.clock_skew()),
            None => false,
        }
    }
}

/// In-process cache of validation results.
pub struct ResultCache {
    shards: Vec<Mutex<LruCache<CacheKey, Arc<CacheEntry>>>>,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl ResultCache {
    /// Create a cache holding roughly `capacity` results in total.
    pub fn new(capacity: usize) -> Self {
        let per_shard = NonZeroUsize::new(capacity.div_ceil(SHARD_COUNT)).unwrap_or(NonZeroUsize::MIN);
        Self {
            shards: (0..SHARD_COUNT)
                .map(|_| Mutex::new(LruCache::new(per_shard)))
                .collect(),
        }
    }

    fn shard(&self, key: &CacheKey) -> &Mutex<LruCache<CacheKey, Arc<CacheEntry>>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % SHARD_COUNT]
    }

    /// Get a still-valid cached result.
    ///
    /// Returns `None` when caching is disabled for the client, on a miss,
    /// or when the cached token or entry has expired.
    pub fn get(&self, token: &str, config: &ClientConfig) -> Option<AuthenticationResult> {
        if !config.cache_enabled {
            return None;
        }
        let key = CacheKey::new(token, config);
        let entry = {
            let mut shard = self.shard(&key).lock().ok()?;
            shard.get(&key)?.clone()
        };

        if !entry.is_fresh(config, now_epoch_secs()) {
            tracing::debug!(
                client_id = %config.id,
                token = %token_fingerprint(token),
                "Cached validation result expired"
            );
            return None;
        }

        let mut result = entry.result.clone();
        result.correlation_id = Some(entry.correlation_id.clone());
        Some(result)
    }

    /// Store a result, keeping its correlation ID or minting a new one.
    ///
    /// Returns the correlation ID the entry was stored under, or `None` when
    /// caching is disabled for the client.
    pub fn put(&self, token: &str, config: &ClientConfig, result: &AuthenticationResult) -> Option<String> {
        if !config.cache_enabled {
            return None;
        }
        let correlation_id = result
            .correlation_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let key = CacheKey::new(token, config);
        let entry = Arc::new(CacheEntry {
            correlation_id: correlation_id.clone(),
            result: result.clone(),
            inserted_at: Instant::now(),
        });
        let mut shard = self.shard(&key).lock().ok()?;
        shard.put(key, entry);
        Some(correlation_id)
    }

    /// Store a result again, preserving the correlation ID of any prior entry.
    ///
    /// The lookup and the replacement happen under one shard lock.
    pub fn recache(&self, token: &str, config: &ClientConfig, result: &AuthenticationResult) -> Option<String> {
        if !config.cache_enabled {
            return None;
        }
        let key = CacheKey::new(token, config);
        let mut shard = self.shard(&key).lock().ok()?;
        let correlation_id = shard
            .peek(&key)
            .map(|prior| prior.correlation_id.clone())
            .or_else(|| result.correlation_id.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        shard.put(
            key,
            Arc::new(CacheEntry {
                correlation_id: correlation_id.clone(),
                result: result.clone(),
                inserted_at: Instant::now(),
            }),
        );
        Some(correlation_id)
    }

    /// Whether an entry (fresh or not) is stored for the token and client.
    pub fn contains(&self, token: &str, config: &ClientConfig) -> bool {
        let key = CacheKey::new(token, config);
        self.shard(&key)
            .lock()
            .map(|shard| shard.contains(&key))
            .unwrap_or(false)
    }

    /// Number of stored entries across all shards.
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .filter_map(|s| s.lock().ok().map(|s| s.len()))
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
