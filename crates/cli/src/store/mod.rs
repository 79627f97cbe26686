// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The embedded relational Store (component B): persists sessions, prompts,
//! confirmation audit rows, and policy, and exposes the transactional claim
//! primitives shared by the Assigner and ConfirmScanner.

pub mod confirmations;
pub mod policy;
pub mod prompts;
pub mod sessions;

use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use rusqlite_migration::{Migrations, M};

use crate::error::StoreError;

fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(
        "
        CREATE TABLE sessions (
            name                TEXT PRIMARY KEY,
            provider            TEXT NOT NULL,
            capabilities        TEXT NOT NULL DEFAULT '',
            status              TEXT NOT NULL,
            current_prompt_id   INTEGER,
            last_seen_at        INTEGER NOT NULL,
            last_assigned_at    INTEGER
        );

        CREATE TABLE prompts (
            id                      INTEGER PRIMARY KEY AUTOINCREMENT,
            content                 TEXT NOT NULL,
            priority                INTEGER NOT NULL DEFAULT 0,
            required_capabilities   TEXT NOT NULL DEFAULT '',
            target_session          TEXT,
            status                  TEXT NOT NULL,
            assigned_session        TEXT,
            retry_count             INTEGER NOT NULL DEFAULT 0,
            max_retries             INTEGER NOT NULL DEFAULT 3,
            last_error              TEXT,
            created_at              INTEGER NOT NULL,
            updated_at              INTEGER NOT NULL
        );

        CREATE TABLE confirmations (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            session_name        TEXT NOT NULL,
            operation           TEXT NOT NULL,
            operation_detail    TEXT NOT NULL DEFAULT '',
            fingerprint         TEXT NOT NULL DEFAULT '',
            decision            TEXT NOT NULL,
            observed_at         INTEGER NOT NULL,
            keystroke_sent      TEXT
        );

        CREATE TABLE policy (
            id                  INTEGER PRIMARY KEY CHECK (id = 0),
            excluded_sessions   TEXT NOT NULL DEFAULT '',
            safe_operations     TEXT NOT NULL DEFAULT '',
            requires_approval   TEXT NOT NULL DEFAULT '',
            idle_threshold_ms   INTEGER NOT NULL,
            dry_run             INTEGER NOT NULL DEFAULT 0,
            kill_switch         INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX idx_prompts_status_priority_created
            ON prompts (status, priority DESC, created_at);
        CREATE INDEX idx_sessions_status_last_seen
            ON sessions (status, last_seen_at);
        CREATE INDEX idx_confirmations_session_observed
            ON confirmations (session_name, observed_at);
        ",
    )])
}

/// Shared, `spawn_blocking`-bridged handle to the embedded database.
///
/// `rusqlite::Connection` is `!Sync`; every call is dispatched through
/// [`Store::run_blocking`], which moves the closure onto a blocking thread
/// while holding the connection mutex, matching the bridge pattern used for
/// SQLite-backed stores elsewhere in the ecosystem.
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (or create) the database file at `path` and apply migrations.
    pub async fn connect(path: &str) -> Result<Arc<Store>, StoreError> {
        let path = path.to_string();
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection, StoreError> {
            let mut conn = Connection::open(path).map_err(|e| StoreError::Backend(e.to_string()))?;
            conn.pragma_update(None, "foreign_keys", true).map_err(|e| StoreError::Backend(e.to_string()))?;
            migrations()
                .to_latest(&mut conn)
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            Ok(conn)
        })
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))??;

        Ok(Arc::new(Store { conn: Arc::new(Mutex::new(conn)) }))
    }

    /// Open an in-memory database. Used by tests and by scenario fixtures.
    pub async fn connect_in_memory() -> Result<Arc<Store>, StoreError> {
        Self::connect(":memory:").await
    }

    /// Run a blocking closure with exclusive access to the connection.
    pub(crate) async fn run_blocking<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<R, StoreError> + Send + 'static,
        R: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().expect("store connection mutex poisoned");
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?
    }
}

pub(crate) fn join_set(set: &std::collections::BTreeSet<String>) -> String {
    set.iter().cloned().collect::<Vec<_>>().join(",")
}

pub(crate) fn split_set(s: &str) -> std::collections::BTreeSet<String> {
    s.split(',').filter(|p| !p.is_empty()).map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_in_memory_applies_migrations() {
        let store = Store::connect_in_memory().await.unwrap();
        store
            .run_blocking(|conn| {
                conn.execute("INSERT INTO policy (id, idle_threshold_ms) VALUES (0, 30000)", [])
                    .map_err(StoreError::from)
            })
            .await
            .unwrap();
    }

    #[test]
    fn join_and_split_set_round_trip() {
        let set: std::collections::BTreeSet<String> =
            ["a".to_string(), "b".to_string()].into_iter().collect();
        assert_eq!(split_set(&join_set(&set)), set);
    }

    #[test]
    fn split_set_of_empty_string_is_empty() {
        assert!(split_set("").is_empty());
    }
}
