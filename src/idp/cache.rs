// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! LRU cache for successful identity-provider GET responses.
//!
//! Entries are keyed per bearer credential, so one user's answer is never
//! served to another. Only `200` responses are stored; entries expire after
//! the configured TTL and the least recently used entry is evicted once the
//! cache is full.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    credential: String,
    method: &'static str,
    url: String,
}

/// Cached entry: response value + insertion timestamp.
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

/// In-process LRU cache for per-credential IDP lookups.
pub struct ResponseCache<V> {
    cache: Mutex<LruCache<CacheKey, CacheEntry<V>>>,
    ttl: Duration,
}

impl<V: Clone> ResponseCache<V> {
    /// Create a new cache with the given capacity and TTL.
    ///
    /// - `capacity`: Max number of responses to keep (at least one).
    /// - `ttl`: Time-to-live for each cache entry.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            ttl,
        }
    }

    fn key(credential: &str, method: &'static str, url: &str) -> CacheKey {
        CacheKey {
            credential: credential.to_string(),
            method,
            url: url.to_string(),
        }
    }

    /// Returns `None` if not cached or expired.
    pub fn get(&self, credential: &str, method: &'static str, url: &str) -> Option<V> {
        let key = Self::key(credential, method, url);
        let mut cache = self.cache.lock().ok()?;
        if let Some(entry) = cache.get(&key) {
            if entry.inserted_at.elapsed() < self.ttl {
                return Some(entry.value.clone());
            }
            // Expired
            cache.pop(&key);
        }
        None
    }

    pub fn put(&self, credential: &str, method: &'static str, url: &str, value: V) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(
                Self::key(credential, method, url),
                CacheEntry {
                    value,
                    inserted_at: Instant::now(),
                },
            );
        }
    }

    pub fn len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
