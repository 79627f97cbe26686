// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor: owns the three long-running loops (C, E, F) and performs the
//! orderly shutdown spec.md §7 requires on a Fatal error or external signal
//! — drain Store, release busy sessions back to pending, close transport.
//! Mirrors `coop::run::PreparedSession`'s shutdown path.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::assigner::Assigner;
use crate::confirm::ConfirmScanner;
use crate::model::SessionStatus;
use crate::registry::SessionRegistry;
use crate::store::Store;

pub struct Supervisor {
    store: Arc<Store>,
    registry: Arc<SessionRegistry>,
    assigner: Arc<Assigner>,
    confirm_scanner: Arc<ConfirmScanner>,
    shutdown: CancellationToken,
}

impl Supervisor {
    pub fn new(
        store: Arc<Store>,
        registry: Arc<SessionRegistry>,
        assigner: Arc<Assigner>,
        confirm_scanner: Arc<ConfirmScanner>,
        shutdown: CancellationToken,
    ) -> Self {
        Self { store, registry, assigner, confirm_scanner, shutdown }
    }

    /// Spawn the three loops and block until `shutdown` fires (externally,
    /// e.g. a signal handler, or via [`Self::shutdown_token`]), then drain.
    pub async fn run(&self) -> anyhow::Result<()> {
        let registry_handle: JoinHandle<()> = {
            let registry = self.registry.clone();
            let shutdown = self.shutdown.clone();
            tokio::spawn(async move { registry.run(shutdown).await })
        };
        let assigner_handle: JoinHandle<()> = {
            let assigner = self.assigner.clone();
            let shutdown = self.shutdown.clone();
            tokio::spawn(async move { assigner.run(shutdown).await })
        };
        let confirm_handle: JoinHandle<()> = {
            let confirm_scanner = self.confirm_scanner.clone();
            let shutdown = self.shutdown.clone();
            tokio::spawn(async move { confirm_scanner.run(shutdown).await })
        };

        self.shutdown.cancelled().await;
        info!("shutdown signal received, draining");

        for (name, handle) in [("registry", registry_handle), ("assigner", assigner_handle), ("confirm_scanner", confirm_handle)] {
            if let Err(e) = handle.await {
                error!(loop_name = name, "loop task panicked during shutdown: {e}");
            }
        }

        self.drain().await
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Release every busy session's in-flight prompt back to `pending`
    /// (spec §7: "release busy sessions back to pending"). Transport is
    /// closed implicitly once every `Arc<dyn PaneTransport>` handle this
    /// process held is dropped alongside the loops above.
    async fn drain(&self) -> anyhow::Result<()> {
        let sessions = self.store.list_sessions().await?;
        let busy: Vec<_> = sessions.into_iter().filter(|s| s.status == SessionStatus::Busy).collect();
        if busy.is_empty() {
            info!("drain complete, no busy sessions to release");
            return Ok(());
        }
        for session in &busy {
            if let Err(e) = self.store.abort_and_requeue(&session.name).await {
                warn!(session = %session.name, "failed to release session during drain: {e}");
            }
        }
        info!(released = busy.len(), "drain complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::killswitch::PolicyHandle;
    use crate::model::{Policy, Provider};
    use crate::pane::fake::FakePaneTransport;
    use crate::registry::DEFAULT_SCAN_INTERVAL;
    use std::collections::BTreeSet;
    use std::time::Duration;

    #[tokio::test]
    async fn drain_requeues_busy_sessions_and_leaves_idle_sessions_untouched() {
        let transport = Arc::new(FakePaneTransport::new());
        let store = Store::connect_in_memory().await.unwrap();
        store.insert_session("busy", Provider::Claude, BTreeSet::from(["claude".to_string()]), 0).await.unwrap();
        store.insert_session("idle", Provider::Claude, BTreeSet::new(), 0).await.unwrap();
        let prompt_id = store.enqueue("p", 0, BTreeSet::new(), None, 3).await.unwrap();
        store.claim_prompt("busy", BTreeSet::from(["claude".to_string()]), 0).await.unwrap();

        let registry = Arc::new(SessionRegistry::new(transport.clone(), store.clone(), DEFAULT_SCAN_INTERVAL));
        let assigner = Arc::new(Assigner::new(transport.clone(), store.clone(), registry.clone(), Duration::from_secs(1), DEFAULT_SCAN_INTERVAL));
        let policy = PolicyHandle::new(Policy::default());
        let confirm_scanner = Arc::new(ConfirmScanner::new(transport, store.clone(), policy));
        let supervisor = Supervisor::new(store.clone(), registry, assigner, confirm_scanner, CancellationToken::new());

        supervisor.drain().await.unwrap();

        assert_eq!(store.get_session("busy").await.unwrap().unwrap().status, SessionStatus::Idle);
        assert_eq!(store.get_session("idle").await.unwrap().unwrap().status, SessionStatus::Idle);
        assert_eq!(store.get_prompt(prompt_id).await.unwrap().unwrap().status, crate::model::PromptStatus::Pending);
    }
}
