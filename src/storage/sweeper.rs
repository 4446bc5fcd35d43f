// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Flow Sweeper
//!
//! Background task that periodically prunes expired pending flows so that
//! abandoned logins do not accumulate in memory.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown. The
//! sweeper only holds a weak reference to its store and also stops once the
//! store has been dropped.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::FlowStore;

const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Sweep often enough that an expired flow lingers at most a quarter of its lifetime.
pub fn sweep_interval_for(flow_ttl: Duration) -> Duration {
    (flow_ttl / 4).clamp(MIN_SWEEP_INTERVAL, MAX_SWEEP_INTERVAL)
}

pub struct FlowSweeper {
    store: Weak<FlowStore>,
    interval: Duration,
}

impl FlowSweeper {
    pub fn new(store: &Arc<FlowStore>, interval: Duration) -> Self {
        Self {
            store: Arc::downgrade(store),
            interval,
        }
    }

    /// Run the sweep loop until the cancellation token is triggered.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(sweeper.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_ms = self.interval.as_millis() as u64,
            "Flow sweeper starting"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Flow sweeper shutting down");
                    return;
                }
            }

            if !self.sweep_step() {
                info!("Flow store dropped, sweeper exiting");
                return;
            }
        }
    }

    /// Prune once. Returns `false` when the store no longer exists.
    fn sweep_step(&self) -> bool {
        let Some(store) = self.store.upgrade() else {
            return false;
        };
        match store.prune() {
            Ok(0) => {}
            Ok(removed) => debug!(removed, "Flow sweeper pruned expired flows"),
            Err(e) => warn!(error = %e, "Flow sweeper failed to prune"),
        }
        true
    }
}
