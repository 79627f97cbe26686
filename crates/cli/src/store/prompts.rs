// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prompt CRUD plus the claim transaction shared by the Assigner (E) and the
//! session-vanished reap path in the SessionRegistry (C).

use std::collections::BTreeSet;

use rusqlite::{params, OptionalExtension, TransactionBehavior};

use crate::error::StoreError;
use crate::model::{now_ms, EpochMs, Outcome, Prompt, PromptStatus};

use super::{join_set, split_set, Store};

fn row_to_prompt(row: &rusqlite::Row<'_>) -> rusqlite::Result<Prompt> {
    let required_capabilities: String = row.get(3)?;
    let status: String = row.get(5)?;
    Ok(Prompt {
        id: row.get(0)?,
        content: row.get(1)?,
        priority: row.get(2)?,
        required_capabilities: split_set(&required_capabilities),
        target_session: row.get(4)?,
        status: PromptStatus::parse(&status).unwrap_or(PromptStatus::Pending),
        assigned_session: row.get(6)?,
        retry_count: row.get::<_, i64>(7)? as u32,
        max_retries: row.get::<_, i64>(8)? as u32,
        last_error: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

const SELECT_COLUMNS: &str = "id, content, priority, required_capabilities, target_session, status, \
    assigned_session, retry_count, max_retries, last_error, created_at, updated_at";

/// Optional filter for `list_prompts`; `None` fields are unconstrained.
#[derive(Debug, Clone, Default)]
pub struct PromptFilter {
    pub status: Option<PromptStatus>,
}

impl Store {
    pub async fn enqueue(
        &self,
        content: &str,
        priority: i64,
        required_capabilities: BTreeSet<String>,
        target_session: Option<String>,
        max_retries: u32,
    ) -> Result<i64, StoreError> {
        let content = content.to_string();
        self.run_blocking(move |conn| {
            let now = now_ms();
            conn.execute(
                "INSERT INTO prompts (content, priority, required_capabilities, target_session, status,
                    assigned_session, retry_count, max_retries, last_error, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 'pending', NULL, 0, ?5, NULL, ?6, ?6)",
                params![content, priority, join_set(&required_capabilities), target_session, max_retries, now],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    pub async fn get_prompt(&self, id: i64) -> Result<Option<Prompt>, StoreError> {
        self.run_blocking(move |conn| {
            conn.query_row(&format!("SELECT {SELECT_COLUMNS} FROM prompts WHERE id = ?1"), params![id], |row| {
                row_to_prompt(row)
            })
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    pub async fn list_prompts(&self, filter: PromptFilter) -> Result<Vec<Prompt>, StoreError> {
        self.run_blocking(move |conn| {
            let (sql, status_param) = match filter.status {
                Some(status) => (
                    format!("SELECT {SELECT_COLUMNS} FROM prompts WHERE status = ?1 ORDER BY priority DESC, created_at ASC"),
                    Some(status.as_str().to_string()),
                ),
                None => (format!("SELECT {SELECT_COLUMNS} FROM prompts ORDER BY priority DESC, created_at ASC"), None),
            };
            let mut stmt = conn.prepare(&sql)?;
            let rows = match status_param {
                Some(s) => stmt.query_map(params![s], row_to_prompt)?.collect::<Result<Vec<_>, _>>(),
                None => stmt.query_map([], row_to_prompt)?.collect::<Result<Vec<_>, _>>(),
            };
            rows.map_err(StoreError::from)
        })
        .await
    }

    /// Allowed while `status ∈ {pending, assigned, in_progress}`; a no-op
    /// otherwise (already-terminal prompts keep their terminal status).
    pub async fn cancel(&self, prompt_id: i64) -> Result<(), StoreError> {
        self.run_blocking(move |conn| {
            let now = now_ms();
            let affected = conn.execute(
                "UPDATE prompts SET status = 'cancelled', updated_at = ?1
                 WHERE id = ?2 AND status IN ('pending', 'assigned', 'in_progress')",
                params![now, prompt_id],
            )?;
            if affected == 0 {
                let exists: Option<i64> =
                    conn.query_row("SELECT id FROM prompts WHERE id = ?1", params![prompt_id], |r| r.get(0)).optional()?;
                if exists.is_none() {
                    return Err(StoreError::NotFound);
                }
            }
            Ok(())
        })
        .await
    }

    /// Policy-knob transition: `assigned -> in_progress`. Called either
    /// immediately after a successful `claim_prompt` + `send_text` (default,
    /// per the open-question resolution) or once the registry observes the
    /// pane go non-idle, depending on configuration.
    pub async fn mark_in_progress(&self, prompt_id: i64) -> Result<(), StoreError> {
        self.run_blocking(move |conn| {
            let now = now_ms();
            conn.execute(
                "UPDATE prompts SET status = 'in_progress', updated_at = ?1 WHERE id = ?2 AND status = 'assigned'",
                params![now, prompt_id],
            )
            .map(|_| ())
            .map_err(StoreError::from)
        })
        .await
    }

    /// The atomic claim transaction (component B, §4.B). Must run inside a
    /// serializable transaction so two concurrent callers never both bind
    /// the same prompt to a session, and never bind two prompts to one
    /// session (invariant S1).
    pub async fn claim_prompt(
        &self,
        session_name: &str,
        capabilities: BTreeSet<String>,
        now: EpochMs,
    ) -> Result<Option<Prompt>, StoreError> {
        let session_name = session_name.to_string();
        self.run_blocking(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let status: Option<String> = tx
                .query_row("SELECT status FROM sessions WHERE name = ?1", params![session_name], |r| r.get(0))
                .optional()?;
            match status.as_deref() {
                Some("idle") => {}
                Some(_) => return Err(StoreError::Contention),
                None => return Err(StoreError::NotFound),
            }

            let mut stmt = tx.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM prompts
                 WHERE status = 'pending' AND (target_session IS NULL OR target_session = ?1)
                 ORDER BY priority DESC, created_at ASC"
            ))?;
            let candidates = stmt
                .query_map(params![session_name], row_to_prompt)?
                .collect::<Result<Vec<_>, _>>()?;
            drop(stmt);

            let chosen = candidates.into_iter().find(|p| p.is_eligible_for(&capabilities));
            let Some(mut prompt) = chosen else {
                tx.commit()?;
                return Ok(None);
            };

            tx.execute(
                "UPDATE prompts SET status = 'assigned', assigned_session = ?1, updated_at = ?2 WHERE id = ?3",
                params![session_name, now, prompt.id],
            )?;
            tx.execute(
                "UPDATE sessions SET status = 'busy', current_prompt_id = ?1, last_assigned_at = ?2 WHERE name = ?3",
                params![prompt.id, now, session_name],
            )?;
            tx.commit()?;

            prompt.status = PromptStatus::Assigned;
            prompt.assigned_session = Some(session_name.clone());
            Ok(Some(prompt))
        })
        .await
    }

    /// Transitions the session back to idle and its attached prompt (if
    /// any) to its terminal status. `StoreError::NotFound` if the session
    /// does not exist.
    pub async fn release_session(&self, session_name: &str, outcome: Outcome) -> Result<(), StoreError> {
        let session_name = session_name.to_string();
        self.run_blocking(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let prompt_id: Option<i64> = tx.query_row(
                "SELECT current_prompt_id FROM sessions WHERE name = ?1",
                params![session_name],
                |r| r.get(0),
            )?;

            let now = now_ms();
            let terminal_status = match outcome {
                Outcome::Success => PromptStatus::Completed.as_str(),
                Outcome::Failure => PromptStatus::Failed.as_str(),
            };
            if let Some(prompt_id) = prompt_id {
                tx.execute(
                    "UPDATE prompts SET status = ?1, updated_at = ?2 WHERE id = ?3",
                    params![terminal_status, now, prompt_id],
                )?;
            }
            tx.execute(
                "UPDATE sessions SET status = 'idle', current_prompt_id = NULL WHERE name = ?1",
                params![session_name],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    /// Unconditional terminal failure, used for transport `Fatal` errors
    /// which are not retryable regardless of `retry_count`. Also releases
    /// whatever session held this prompt, if any.
    pub async fn fail_prompt(&self, prompt_id: i64, error_text: &str) -> Result<(), StoreError> {
        let error_text = error_text.to_string();
        self.run_blocking(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let now = now_ms();
            tx.execute(
                "UPDATE prompts SET status = 'failed', last_error = ?1, updated_at = ?2 WHERE id = ?3",
                params![error_text, now, prompt_id],
            )?;
            tx.execute(
                "UPDATE sessions SET status = 'idle', current_prompt_id = NULL
                 WHERE current_prompt_id = ?1",
                params![prompt_id],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    /// Shutdown-drain transition: returns a busy session's in-flight prompt
    /// to `pending` without touching `retry_count`, and frees the session.
    /// Used by the Supervisor's orderly-shutdown path (spec §7), not by the
    /// normal retry path.
    pub async fn abort_and_requeue(&self, session_name: &str) -> Result<(), StoreError> {
        let session_name = session_name.to_string();
        self.run_blocking(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let prompt_id: Option<i64> = tx.query_row(
                "SELECT current_prompt_id FROM sessions WHERE name = ?1",
                params![session_name],
                |r| r.get(0),
            )?;
            let now = now_ms();
            if let Some(prompt_id) = prompt_id {
                tx.execute(
                    "UPDATE prompts SET status = 'pending', assigned_session = NULL, updated_at = ?1 WHERE id = ?2",
                    params![now, prompt_id],
                )?;
            }
            tx.execute(
                "UPDATE sessions SET status = 'idle', current_prompt_id = NULL WHERE name = ?1",
                params![session_name],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    /// Fails every `pending` prompt whose `target_session` names a session
    /// that does not currently exist, so a dangling pin never sits `pending`
    /// forever waiting for a session that will never appear. Returns the
    /// ids of the prompts it failed, for the caller to log.
    pub async fn fail_prompts_with_missing_target(&self) -> Result<Vec<i64>, StoreError> {
        self.run_blocking(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let now = now_ms();
            let ids: Vec<i64> = {
                let mut stmt = tx.prepare(
                    "SELECT id FROM prompts
                     WHERE status = 'pending' AND target_session IS NOT NULL
                       AND target_session NOT IN (SELECT name FROM sessions)",
                )?;
                stmt.query_map([], |r| r.get(0))?.collect::<Result<Vec<_>, _>>()?
            };
            for id in &ids {
                tx.execute(
                    "UPDATE prompts SET status = 'failed', last_error = ?1, updated_at = ?2 WHERE id = ?3",
                    params!["policy denied: target_session pinned a session that does not exist", now, id],
                )?;
            }
            tx.commit()?;
            Ok(ids)
        })
        .await
    }

    /// Bounded-retry transition (invariant P2). If `retry_count < max_retries`
    /// the prompt returns to `pending` with `retry_count` incremented;
    /// otherwise it becomes `failed` and `retry_count` is left at the bound
    /// (never exceeding `max_retries`).
    pub async fn increment_retry(&self, prompt_id: i64, error_text: &str) -> Result<(), StoreError> {
        let error_text = error_text.to_string();
        self.run_blocking(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let (retry_count, max_retries): (i64, i64) = tx.query_row(
                "SELECT retry_count, max_retries FROM prompts WHERE id = ?1",
                params![prompt_id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )?;

            let now = now_ms();
            if retry_count < max_retries {
                tx.execute(
                    "UPDATE prompts SET status = 'pending', retry_count = ?1, last_error = ?2,
                        updated_at = ?3, assigned_session = NULL WHERE id = ?4",
                    params![retry_count + 1, error_text, now, prompt_id],
                )?;
            } else {
                tx.execute(
                    "UPDATE prompts SET status = 'failed', last_error = ?1, updated_at = ?2 WHERE id = ?3",
                    params![error_text, now, prompt_id],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
#[path = "prompts_tests.rs"]
mod tests;
