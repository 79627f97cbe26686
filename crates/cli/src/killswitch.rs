// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! KillSwitch & Policy (component G): a single in-memory record, readable
//! by the Assigner and ConfirmScanner without blocking on Store, mutable
//! through a small control surface (a JSON file) watched for changes so the
//! scanner loop never needs to restart to pick up a new policy.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};

use crate::model::Policy;

/// On-disk shape of the control record. Mirrors [`Policy`] field-for-field;
/// kept separate so the wire format doesn't have to track internal types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyFile {
    #[serde(default)]
    pub excluded_sessions: Vec<String>,
    #[serde(default)]
    pub safe_operations: Option<Vec<String>>,
    #[serde(default)]
    pub requires_approval: Option<Vec<String>>,
    #[serde(default)]
    pub idle_threshold_ms: Option<i64>,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub kill_switch: bool,
}

impl PolicyFile {
    fn into_policy(self, base: &Policy) -> Policy {
        Policy {
            excluded_sessions: self.excluded_sessions.into_iter().collect(),
            safe_operations: self
                .safe_operations
                .map(|v| v.into_iter().collect())
                .unwrap_or_else(|| base.safe_operations.clone()),
            requires_approval: self
                .requires_approval
                .map(|v| v.into_iter().collect())
                .unwrap_or_else(|| base.requires_approval.clone()),
            idle_threshold_ms: self
                .idle_threshold_ms
                .map(|ms| ms.max(crate::model::MIN_IDLE_THRESHOLD_MS))
                .unwrap_or(base.idle_threshold_ms),
            dry_run: self.dry_run,
            kill_switch: self.kill_switch,
        }
    }
}

/// Read-mostly handle shared by the Assigner, ConfirmScanner, and the
/// control surface. Cloned cheaply (everything behind `Arc`).
#[derive(Clone)]
pub struct PolicyHandle {
    inner: Arc<RwLock<Policy>>,
}

impl PolicyHandle {
    pub fn new(initial: Policy) -> Self {
        Self { inner: Arc::new(RwLock::new(initial)) }
    }

    pub async fn current(&self) -> Policy {
        self.inner.read().await.clone()
    }

    pub async fn replace(&self, policy: Policy) {
        *self.inner.write().await = policy;
    }

    /// Load `path` once and apply it, keeping whatever allow-lists aren't
    /// present in the file.
    pub async fn reload_from_file(&self, path: &Path) -> anyhow::Result<()> {
        let text = tokio::fs::read_to_string(path).await?;
        let file: PolicyFile = serde_json::from_str(&text)?;
        let base = self.current().await;
        self.replace(file.into_policy(&base)).await;
        Ok(())
    }

    /// Spawn a watcher that reloads `path` whenever it changes, until
    /// `shutdown` fires. Hot-reload with no scanner-loop restart, per the
    /// spec's "recognizer, operation allow-list, and kill switch are
    /// hot-reloadable" requirement.
    pub fn watch(self, path: PathBuf, shutdown: tokio_util::sync::CancellationToken) {
        tokio::spawn(async move {
            let (tx, mut rx) = mpsc::channel(16);
            let mut watcher: RecommendedWatcher = match notify::recommended_watcher(move |res| {
                let _ = tx.blocking_send(res);
            }) {
                Ok(w) => w,
                Err(e) => {
                    warn!("policy file watcher init failed: {e}");
                    return;
                }
            };
            if let Err(e) = watcher.watch(&path, RecursiveMode::NonRecursive) {
                warn!("policy file watch failed for {path:?}: {e}");
                return;
            }

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    event = rx.recv() => {
                        match event {
                            Some(Ok(_)) => {
                                if let Err(e) = self.reload_from_file(&path).await {
                                    warn!("policy reload failed: {e}");
                                } else {
                                    debug!("policy reloaded from {path:?}");
                                }
                            }
                            Some(Err(e)) => warn!("policy watcher error: {e}"),
                            None => break,
                        }
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[tokio::test]
    async fn replace_is_visible_to_readers() {
        let handle = PolicyHandle::new(Policy::default());
        let mut policy = Policy::default();
        policy.kill_switch = true;
        handle.replace(policy).await;
        assert!(handle.current().await.kill_switch);
    }

    #[tokio::test]
    async fn reload_from_file_preserves_unset_allow_lists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.json");
        tokio::fs::write(&path, r#"{"kill_switch": true, "excluded_sessions": ["s1"]}"#).await.unwrap();

        let base = Policy::default();
        let safe_before = base.safe_operations.clone();
        let handle = PolicyHandle::new(base);
        handle.reload_from_file(&path).await.unwrap();

        let after = handle.current().await;
        assert!(after.kill_switch);
        assert_eq!(after.excluded_sessions, BTreeSet::from(["s1".to_string()]));
        assert_eq!(after.safe_operations, safe_before);
    }

    #[tokio::test]
    async fn idle_threshold_floor_is_enforced_on_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.json");
        tokio::fs::write(&path, r#"{"idle_threshold_ms": 100}"#).await.unwrap();

        let handle = PolicyHandle::new(Policy::default());
        handle.reload_from_file(&path).await.unwrap();
        assert_eq!(handle.current().await.idle_threshold_ms, crate::model::MIN_IDLE_THRESHOLD_MS);
    }
}
