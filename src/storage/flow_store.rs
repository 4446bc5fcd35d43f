// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory store of pending authentication flows.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::sweeper::FlowSweeper;
use super::{StorageError, StorageResult};
use crate::models::PendingFlow;

/// Pending flows keyed by `state`.
///
/// Construct with [`FlowStore::open`] in the server so a sweeper runs; tests
/// and tools that drive pruning by hand can use [`FlowStore::new`].
pub struct FlowStore {
    flows: Mutex<HashMap<String, PendingFlow>>,
    shutdown: CancellationToken,
}

impl FlowStore {
    /// Create a store without a background sweeper.
    pub fn new() -> Self {
        Self {
            flows: Mutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Create a store and spawn a sweeper pruning it every `sweep_interval`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn open(sweep_interval: Duration) -> Arc<Self> {
        let store = Arc::new(Self::new());
        let sweeper = FlowSweeper::new(&store, sweep_interval);
        tokio::spawn(sweeper.run(store.shutdown.child_token()));
        store
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, HashMap<String, PendingFlow>>> {
        self.flows.lock().map_err(|_| StorageError::LockPoisoned)
    }

    /// Store a copy of `flow`. Fails if its state is already pending.
    pub fn add(&self, flow: &PendingFlow) -> StorageResult<()> {
        let mut flows = self.lock()?;
        if flows.contains_key(&flow.state) {
            return Err(StorageError::AlreadyExists(flow.state.clone()));
        }
        flows.insert(flow.state.clone(), flow.clone());
        debug!(application = %flow.application, "Pending flow stored");
        Ok(())
    }

    /// Remove and return the flow for `state`.
    ///
    /// An expired flow is removed as well, but reported as [`StorageError::Expired`].
    pub fn consume(&self, state: &str) -> StorageResult<PendingFlow> {
        let flow = self
            .lock()?
            .remove(state)
            .ok_or_else(|| StorageError::NotFound(state.to_string()))?;

        if flow.is_expired_at(Utc::now()) {
            return Err(StorageError::Expired(state.to_string()));
        }
        Ok(flow)
    }

    /// Remove every expired flow, returning how many were dropped.
    pub fn prune(&self) -> StorageResult<usize> {
        let now = Utc::now();
        let mut flows = self.lock()?;
        let before = flows.len();
        flows.retain(|_, flow| !flow.is_expired_at(now));
        Ok(before - flows.len())
    }

    pub fn len(&self) -> usize {
        self.lock().map(|flows| flows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop the sweeper and drop all pending flows.
    pub fn close(&self) {
        self.shutdown.cancel();
        if let Ok(mut flows) = self.lock() {
            let abandoned = flows.len();
            flows.clear();
            info!(abandoned, "Flow store closed");
        }
    }
}

impl Default for FlowStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FlowStore {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn flow(state: &str, ttl_seconds: i64) -> PendingFlow {
        PendingFlow {
            state: state.to_string(),
            application: "example-service".to_string(),
            pkce_verifier: "verifier".to_string(),
            return_url: "https://example.com/app/".to_string(),
            expires_at: Utc::now() + ChronoDuration::seconds(ttl_seconds),
        }
    }

    #[test]
    fn add_then_consume_returns_same_flow_once() {
        let store = FlowStore::new();
        let original = flow("abc", 60);
        store.add(&original).unwrap();

        assert_eq!(store.consume("abc").unwrap(), original);
        assert_eq!(
            store.consume("abc"),
            Err(StorageError::NotFound("abc".to_string()))
        );
        assert!(store.is_empty());
    }

    #[test]
    fn duplicate_state_is_rejected() {
        let store = FlowStore::new();
        store.add(&flow("abc", 60)).unwrap();
        assert_eq!(
            store.add(&flow("abc", 60)),
            Err(StorageError::AlreadyExists("abc".to_string()))
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn stored_copy_is_independent_of_caller() {
        let store = FlowStore::new();
        let mut original = flow("abc", 60);
        store.add(&original).unwrap();
        original.return_url = "https://evil.com/".to_string();

        assert_eq!(store.consume("abc").unwrap().return_url, "https://example.com/app/");
    }

    #[test]
    fn expired_flow_fails_and_is_removed_without_prune() {
        let store = FlowStore::new();
        store.add(&flow("old", -1)).unwrap();

        assert_eq!(store.consume("old"), Err(StorageError::Expired("old".to_string())));
        assert_eq!(store.consume("old"), Err(StorageError::NotFound("old".to_string())));
    }

    #[test]
    fn prune_removes_exactly_expired_entries() {
        let store = FlowStore::new();
        assert_eq!(store.prune().unwrap(), 0);

        store.add(&flow("old-1", -5)).unwrap();
        store.add(&flow("old-2", -1)).unwrap();
        store.add(&flow("fresh", 60)).unwrap();

        assert_eq!(store.prune().unwrap(), 2);
        assert_eq!(store.len(), 1);
        assert!(store.consume("fresh").is_ok());
    }

    #[test]
    fn concurrent_consume_succeeds_exactly_once() {
        let store = Arc::new(FlowStore::new());
        store.add(&flow("race", 60)).unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.consume("race").is_ok())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn close_releases_entries() {
        let store = FlowStore::open(Duration::from_secs(60));
        store.add(&flow("abc", 60)).unwrap();
        store.close();
        assert!(store.is_empty());
    }
}
