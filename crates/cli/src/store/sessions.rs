// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session row CRUD, used exclusively by the SessionRegistry (component C).
//! Per the data model's lifecycle note, E never mutates a session row except
//! through the claim transaction in `prompts.rs`.

use rusqlite::{params, OptionalExtension};

use crate::error::StoreError;
use crate::model::{EpochMs, Session, SessionStatus, Provider};

use super::{join_set, split_set, Store};

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    let provider_str: String = row.get(1)?;
    let capabilities_str: String = row.get(2)?;
    let status_str: String = row.get(3)?;
    Ok(Session {
        name: row.get(0)?,
        provider: Provider::parse(&provider_str),
        capabilities: split_set(&capabilities_str),
        status: SessionStatus::parse(&status_str),
        current_prompt_id: row.get(4)?,
        last_seen_at: row.get(5)?,
        last_assigned_at: row.get(6)?,
    })
}

const SELECT_COLUMNS: &str =
    "name, provider, capabilities, status, current_prompt_id, last_seen_at, last_assigned_at";

impl Store {
    pub async fn get_session(&self, name: &str) -> Result<Option<Session>, StoreError> {
        let name = name.to_string();
        self.run_blocking(move |conn| {
            conn.query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM sessions WHERE name = ?1"),
                params![name],
                |row| row_to_session(row),
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    pub async fn list_sessions(&self) -> Result<Vec<Session>, StoreError> {
        self.run_blocking(move |conn| {
            let mut stmt = conn.prepare(&format!("SELECT {SELECT_COLUMNS} FROM sessions"))?;
            let rows = stmt.query_map([], |row| row_to_session(row))?;
            rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
        })
        .await
    }

    /// Sessions currently `idle` with `last_seen_at >= since`, used by the
    /// Assigner's per-tick snapshot (staleness window check).
    pub async fn list_idle_sessions_seen_since(&self, since: EpochMs) -> Result<Vec<Session>, StoreError> {
        self.run_blocking(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM sessions WHERE status = 'idle' AND last_seen_at >= ?1"
            ))?;
            let rows = stmt.query_map(params![since], |row| row_to_session(row))?;
            rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
        })
        .await
    }

    /// Insert a freshly discovered pane as a new idle session (registry step
    /// 4). A pane name reappearing after a reap is always a fresh row.
    pub async fn insert_session(
        &self,
        name: &str,
        provider: Provider,
        capabilities: std::collections::BTreeSet<String>,
        now: EpochMs,
    ) -> Result<(), StoreError> {
        let name = name.to_string();
        let provider = provider.as_str();
        let capabilities = join_set(&capabilities);
        self.run_blocking(move |conn| {
            conn.execute(
                "INSERT INTO sessions (name, provider, capabilities, status, current_prompt_id, last_seen_at, last_assigned_at)
                 VALUES (?1, ?2, ?3, 'idle', NULL, ?4, NULL)",
                params![name, provider, capabilities, now],
            )
            .map(|_| ())
            .map_err(StoreError::from)
        })
        .await
    }

    /// Registry step 5: refresh `last_seen_at`, re-classify provider if
    /// changed, and recompute status from whether the session still has a
    /// `current_prompt_id`.
    pub async fn touch_session(
        &self,
        name: &str,
        provider: Provider,
        capabilities: std::collections::BTreeSet<String>,
        now: EpochMs,
    ) -> Result<(), StoreError> {
        let name = name.to_string();
        let provider = provider.as_str();
        let capabilities = join_set(&capabilities);
        self.run_blocking(move |conn| {
            conn.execute(
                "UPDATE sessions SET provider = ?2, capabilities = ?3, last_seen_at = ?4,
                    status = CASE WHEN current_prompt_id IS NOT NULL THEN 'busy' ELSE 'idle' END
                 WHERE name = ?1",
                params![name, provider, capabilities, now],
            )
            .map(|_| ())
            .map_err(StoreError::from)
        })
        .await
    }

    /// Registry step 3: delete a session row whose pane vanished. Callers
    /// must have already released any attached prompt via `increment_retry`.
    pub async fn delete_session(&self, name: &str) -> Result<(), StoreError> {
        let name = name.to_string();
        self.run_blocking(move |conn| {
            conn.execute("DELETE FROM sessions WHERE name = ?1", params![name])
                .map(|_| ())
                .map_err(StoreError::from)
        })
        .await
    }

    /// Free a session back to `idle` with no `current_prompt_id`, without
    /// touching any prompt row. Used after a retryable send failure, where
    /// the prompt's own status transition is already handled separately
    /// (e.g. by `increment_retry`) and only the session side is left dangling.
    pub async fn free_session(&self, name: &str) -> Result<(), StoreError> {
        let name = name.to_string();
        self.run_blocking(move |conn| {
            conn.execute(
                "UPDATE sessions SET status = 'idle', current_prompt_id = NULL WHERE name = ?1",
                params![name],
            )
            .map(|_| ())
            .map_err(StoreError::from)
        })
        .await
    }

    pub async fn mark_unreachable(&self, name: &str) -> Result<(), StoreError> {
        let name = name.to_string();
        self.run_blocking(move |conn| {
            conn.execute("UPDATE sessions SET status = 'unreachable' WHERE name = ?1", params![name])
                .map(|_| ())
                .map_err(StoreError::from)
        })
        .await
    }
}
