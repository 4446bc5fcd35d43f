// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Circuit breaker for identity-provider calls.
//!
//! One breaker guards each logical command (token exchange, userinfo,
//! introspection), so a failing userinfo endpoint does not block logins.
//!
//! # States
//!
//! - **Closed**: calls pass through. Consecutive failures are counted.
//! - **Open**: entered after `failure_threshold` consecutive failures. Calls
//!   fail immediately without touching the network until `cool_down` passes.
//! - **Half-Open**: up to `half_open_max_probes` calls are let through.
//!   `success_threshold` successful probes close the circuit; one failed
//!   probe opens it again.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use super::IdpError;
use crate::config::CircuitBreakerSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub cool_down: Duration,
    pub half_open_max_probes: u32,
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self::from(&CircuitBreakerSettings::default())
    }
}

impl From<&CircuitBreakerSettings> for CircuitBreakerConfig {
    fn from(settings: &CircuitBreakerSettings) -> Self {
        Self {
            failure_threshold: settings.failure_threshold.max(1),
            cool_down: Duration::from_secs(settings.cool_down_seconds),
            half_open_max_probes: settings.half_open_max_probes.max(1),
            success_threshold: settings.success_threshold.max(1),
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    probe_successes: u32,
    probes_in_flight: u32,
    opened_at: Option<Instant>,
    /// Bumped on every transition into half-open; stale probes are ignored.
    generation: u64,
}

pub struct CircuitBreaker {
    command: &'static str,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

/// Admission for one call. Dropping it unfinished frees the probe slot.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    probe: Option<u64>,
    finished: bool,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.breaker.abandon(self.probe);
        }
    }
}

impl CircuitBreaker {
    pub fn new(command: &'static str, config: CircuitBreakerConfig) -> Self {
        Self {
            command,
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                probe_successes: 0,
                probes_in_flight: 0,
                opened_at: None,
                generation: 0,
            }),
        }
    }

    pub fn command(&self) -> &'static str {
        self.command
    }

    pub fn state(&self) -> CircuitState {
        let mut inner = self.lock();
        self.refresh(&mut inner);
        inner.state
    }

    /// Run `operation` under breaker protection.
    ///
    /// Returns [`IdpError::Unavailable`] without polling `operation` while the
    /// circuit is open or all half-open probe slots are taken.
    pub async fn call<T, F>(&self, operation: F) -> Result<T, IdpError>
    where
        F: Future<Output = Result<T, IdpError>>,
    {
        let mut permit = self.acquire()?;
        let result = operation.await;
        permit.finished = true;

        let success = match &result {
            Ok(_) => true,
            Err(e) => !e.counts_as_failure(),
        };
        self.record(permit.probe, success);
        result
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn refresh(&self, inner: &mut BreakerState) {
        if inner.state != CircuitState::Open {
            return;
        }
        let cooled = inner
            .opened_at
            .is_none_or(|opened| opened.elapsed() >= self.config.cool_down);
        if cooled {
            inner.state = CircuitState::HalfOpen;
            inner.generation += 1;
            inner.probes_in_flight = 0;
            inner.probe_successes = 0;
            info!(
                command = self.command,
                max_probes = self.config.half_open_max_probes,
                "Circuit breaker half-open, probing identity provider"
            );
        }
    }

    fn acquire(&self) -> Result<Permit<'_>, IdpError> {
        let mut inner = self.lock();
        self.refresh(&mut inner);
        let probe = match inner.state {
            CircuitState::Closed => None,
            CircuitState::HalfOpen if inner.probes_in_flight < self.config.half_open_max_probes => {
                inner.probes_in_flight += 1;
                Some(inner.generation)
            }
            CircuitState::Open | CircuitState::HalfOpen => {
                return Err(IdpError::Unavailable(format!(
                    "circuit breaker for {} is open",
                    self.command
                )));
            }
        };
        Ok(Permit {
            breaker: self,
            probe,
            finished: false,
        })
    }

    fn record(&self, probe: Option<u64>, success: bool) {
        let mut inner = self.lock();
        let current_probe = probe.is_some_and(|generation| {
            generation == inner.generation && inner.state == CircuitState::HalfOpen
        });
        if current_probe {
            inner.probes_in_flight = inner.probes_in_flight.saturating_sub(1);
        }

        match (inner.state, success) {
            (CircuitState::Closed, true) => inner.consecutive_failures = 0,
            (CircuitState::Closed, false) => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    let failures = inner.consecutive_failures;
                    self.trip(&mut inner);
                    warn!(
                        command = self.command,
                        failures,
                        cool_down_secs = self.config.cool_down.as_secs(),
                        "Circuit breaker opened - identity provider failing"
                    );
                }
            }
            (CircuitState::HalfOpen, true) if current_probe => {
                inner.probe_successes += 1;
                if inner.probe_successes >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.consecutive_failures = 0;
                    inner.opened_at = None;
                    info!(command = self.command, "Circuit breaker closed - identity provider recovered");
                }
            }
            (CircuitState::HalfOpen, false) if current_probe => {
                self.trip(&mut inner);
                warn!(command = self.command, "Circuit breaker re-opened - probe failed");
            }
            _ => {}
        }
    }

    fn abandon(&self, probe: Option<u64>) {
        let mut inner = self.lock();
        if probe == Some(inner.generation) && inner.state == CircuitState::HalfOpen {
            inner.probes_in_flight = inner.probes_in_flight.saturating_sub(1);
        }
    }

    fn trip(&self, inner: &mut BreakerState) {
        inner.state = CircuitState::Open;
        inner.opened_at = Some(Instant::now());
        inner.consecutive_failures = 0;
        inner.probe_successes = 0;
        inner.probes_in_flight = 0;
    }
}
