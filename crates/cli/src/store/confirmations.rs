// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only confirmation audit log, plus the dedup-window query used by
//! the ConfirmScanner to enforce "at most one auto_confirm per (session,
//! dialog fingerprint) per 2 seconds" (testable property 3).

use rusqlite::params;

use crate::error::StoreError;
use crate::model::{ConfirmDecision, ConfirmationRecord, EpochMs};

use super::Store;

impl Store {
    #[allow(clippy::too_many_arguments)]
    pub async fn insert_confirmation(
        &self,
        session_name: &str,
        operation: &str,
        operation_detail: &str,
        fingerprint: &str,
        decision: ConfirmDecision,
        observed_at: EpochMs,
        keystroke_sent: Option<String>,
    ) -> Result<i64, StoreError> {
        let session_name = session_name.to_string();
        let operation = operation.to_string();
        let operation_detail = operation_detail.to_string();
        let fingerprint = fingerprint.to_string();
        let decision = decision.as_str();
        self.run_blocking(move |conn| {
            conn.execute(
                "INSERT INTO confirmations (session_name, operation, operation_detail, fingerprint, decision, observed_at, keystroke_sent)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![session_name, operation, operation_detail, fingerprint, decision, observed_at, keystroke_sent],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// `true` if an `auto_confirm` was already recorded for this exact
    /// (session, fingerprint) pair within `window_ms` of `now`.
    pub async fn has_recent_auto_confirm(
        &self,
        session_name: &str,
        fingerprint: &str,
        now: EpochMs,
        window_ms: i64,
    ) -> Result<bool, StoreError> {
        let session_name = session_name.to_string();
        let fingerprint = fingerprint.to_string();
        self.run_blocking(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM confirmations
                 WHERE session_name = ?1 AND fingerprint = ?2 AND decision = 'auto_confirm'
                   AND observed_at >= ?3",
                params![session_name, fingerprint, now - window_ms],
                |r| r.get(0),
            )?;
            Ok(count > 0)
        })
        .await
    }

    pub async fn list_confirmations_for_session(&self, session_name: &str) -> Result<Vec<ConfirmationRecord>, StoreError> {
        let session_name = session_name.to_string();
        self.run_blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_name, operation, operation_detail, fingerprint, decision, observed_at, keystroke_sent
                 FROM confirmations WHERE session_name = ?1 ORDER BY observed_at ASC",
            )?;
            let rows = stmt.query_map(params![session_name], |row| {
                let decision_str: String = row.get(5)?;
                Ok(ConfirmationRecord {
                    id: row.get(0)?,
                    session_name: row.get(1)?,
                    operation: row.get(2)?,
                    operation_detail: row.get(3)?,
                    fingerprint: row.get(4)?,
                    decision: match decision_str.as_str() {
                        "auto_confirm" => ConfirmDecision::AutoConfirm,
                        "skipped_unsafe" => ConfirmDecision::SkippedUnsafe,
                        "skipped_active" => ConfirmDecision::SkippedActive,
                        "skipped_killswitch" => ConfirmDecision::SkippedKillswitch,
                        _ => ConfirmDecision::DryRun,
                    },
                    observed_at: row.get(6)?,
                    keystroke_sent: row.get(7)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
        })
        .await
    }
}
