// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence for the Policy singleton (component G). The in-memory,
//! hot-reloadable side lives in `crate::killswitch`; this module is only the
//! Store-backed mirror queried at startup and on demand.

use rusqlite::{params, OptionalExtension};

use crate::error::StoreError;
use crate::model::Policy;

use super::{join_set, split_set, Store};

impl Store {
    pub async fn load_policy(&self) -> Result<Policy, StoreError> {
        self.run_blocking(move |conn| {
            let row = conn
                .query_row(
                    "SELECT excluded_sessions, safe_operations, requires_approval, idle_threshold_ms, dry_run, kill_switch
                     FROM policy WHERE id = 0",
                    [],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, i64>(3)?,
                            row.get::<_, bool>(4)?,
                            row.get::<_, bool>(5)?,
                        ))
                    },
                )
                .optional()?;

            Ok(match row {
                Some((excluded, safe, requires_approval, idle_threshold_ms, dry_run, kill_switch)) => Policy {
                    excluded_sessions: split_set(&excluded),
                    safe_operations: split_set(&safe),
                    requires_approval: split_set(&requires_approval),
                    idle_threshold_ms,
                    dry_run,
                    kill_switch,
                },
                None => Policy::default(),
            })
        })
        .await
    }

    pub async fn save_policy(&self, policy: &Policy) -> Result<(), StoreError> {
        let policy = policy.clone();
        self.run_blocking(move |conn| {
            conn.execute(
                "INSERT INTO policy (id, excluded_sessions, safe_operations, requires_approval, idle_threshold_ms, dry_run, kill_switch)
                 VALUES (0, ?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                    excluded_sessions = excluded.excluded_sessions,
                    safe_operations = excluded.safe_operations,
                    requires_approval = excluded.requires_approval,
                    idle_threshold_ms = excluded.idle_threshold_ms,
                    dry_run = excluded.dry_run,
                    kill_switch = excluded.kill_switch",
                params![
                    join_set(&policy.excluded_sessions),
                    join_set(&policy.safe_operations),
                    join_set(&policy.requires_approval),
                    policy.idle_threshold_ms,
                    policy.dry_run,
                    policy.kill_switch,
                ],
            )
            .map(|_| ())
            .map_err(StoreError::from)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn load_policy_without_row_returns_default() {
        let store = Store::connect_in_memory().await.unwrap();
        let policy = store.load_policy().await.unwrap();
        assert!(policy.is_safe("read"));
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let store = Store::connect_in_memory().await.unwrap();
        let mut policy = Policy::default();
        policy.kill_switch = true;
        policy.excluded_sessions.insert("s1".to_string());
        store.save_policy(&policy).await.unwrap();

        let loaded = store.load_policy().await.unwrap();
        assert!(loaded.kill_switch);
        assert!(loaded.excluded_sessions.contains("s1"));
    }

    #[tokio::test]
    async fn save_twice_upserts_instead_of_erroring() {
        let store = Store::connect_in_memory().await.unwrap();
        store.save_policy(&Policy::default()).await.unwrap();
        let mut policy = Policy::default();
        policy.dry_run = true;
        store.save_policy(&policy).await.unwrap();
        assert!(store.load_policy().await.unwrap().dry_run);
    }
}
