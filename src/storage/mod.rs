// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Flow Storage Module
//!
//! Keeps the authentication flows that have been started by `/v1/auth` but
//! not yet completed by `/v1/dropoff`. The store is process-local and lives
//! only in memory: a restart abandons every pending login, which the user
//! recovers from by starting over.
//!
//! ## Guarantees
//!
//! - A flow is keyed by its random `state` and can be consumed at most once.
//! - Reading and removing a flow happen under one lock acquisition.
//! - Expired flows are never handed out, even before the sweeper removed them.
//! - A background [`FlowSweeper`] prunes expired entries on a fixed interval.

pub mod flow_store;
pub mod sweeper;

pub use flow_store::FlowStore;
pub use sweeper::{sweep_interval_for, FlowSweeper};

/// Flow storage error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// No flow with this state
    NotFound(String),
    /// A flow with this state is already pending
    AlreadyExists(String),
    /// The flow existed but its deadline has passed; it has been removed
    Expired(String),
    /// A thread panicked while holding the store lock
    LockPoisoned,
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::NotFound(state) => write!(f, "Flow not found: {state}"),
            StorageError::AlreadyExists(state) => write!(f, "Flow already exists: {state}"),
            StorageError::Expired(state) => write!(f, "Flow expired: {state}"),
            StorageError::LockPoisoned => write!(f, "Flow store lock poisoned"),
        }
    }
}

impl std::error::Error for StorageError {}

pub type StorageResult<T> = Result<T, StorageError>;
