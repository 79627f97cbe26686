// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomies shared across transport, store, and scheduling loops.

use std::fmt;

/// Errors a [`crate::pane::PaneTransport`] call may fail with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The named pane no longer exists.
    NotFound,
    /// A recoverable transport hiccup; retry with backoff.
    Transient(String),
    /// The transport is misconfigured or unusable; not retryable.
    Fatal(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "pane not found"),
            Self::Transient(msg) => write!(f, "transient transport error: {msg}"),
            Self::Fatal(msg) => write!(f, "fatal transport error: {msg}"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Errors surfaced by the Store's claim and mutation transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Another worker's claim won the race; caller retries its scan.
    Contention,
    /// An invariant check inside a transaction failed. Fatal: the calling
    /// loop must stop rather than risk further corruption.
    Integrity(String),
    /// The requested row does not exist.
    NotFound,
    /// The underlying database call failed.
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Contention => write!(f, "claim contention"),
            Self::Integrity(msg) => write!(f, "integrity violation: {msg}"),
            Self::NotFound => write!(f, "row not found"),
            Self::Backend(msg) => write!(f, "store backend error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::QueryReturnedNoRows => Self::NotFound,
            other => Self::Backend(other.to_string()),
        }
    }
}

/// Outcome of a single Assigner per-session attempt. Mirrors the taxonomy in
/// the error-handling design: claim contention and policy denial are not
/// failures, only no-ops or terminal prompt states respectively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignError {
    /// The target session no longer exists; a reconcile was triggered.
    PaneVanished,
    /// Transport hiccup; caller should retry with backoff.
    Transient(String),
    /// Transport is unusable; the prompt fails immediately.
    Fatal(String),
    /// `target_session` pinned a session that does not exist.
    PolicyDenied(String),
}

impl fmt::Display for AssignError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PaneVanished => write!(f, "pane disappeared between claim and send"),
            Self::Transient(msg) => write!(f, "transient: {msg}"),
            Self::Fatal(msg) => write!(f, "fatal: {msg}"),
            Self::PolicyDenied(msg) => write!(f, "policy denied: {msg}"),
        }
    }
}

impl std::error::Error for AssignError {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
