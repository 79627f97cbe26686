// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for end-to-end scenario tests (spec.md §8, scenarios A-F).
//! Builds the real `Store`, `SessionRegistry`, `Assigner`, and `ConfirmScanner`
//! against a [`FakePaneTransport`] double — no subprocess, no network.

use std::sync::Arc;
use std::time::Duration;

use coop::assigner::Assigner;
use coop::confirm::ConfirmScanner;
use coop::killswitch::PolicyHandle;
use coop::model::Policy;
use coop::pane::fake::FakePaneTransport;
use coop::registry::SessionRegistry;
use coop::store::Store;

/// Everything one scenario test needs, wired together in-process.
pub struct Harness {
    pub transport: Arc<FakePaneTransport>,
    pub store: Arc<Store>,
    pub registry: Arc<SessionRegistry>,
    pub assigner: Arc<Assigner>,
    pub confirm_scanner: Arc<ConfirmScanner>,
    pub policy: PolicyHandle,
}

impl Harness {
    pub async fn new(policy: Policy) -> Self {
        let transport = Arc::new(FakePaneTransport::new());
        let store = Store::connect_in_memory().await.expect("in-memory store");
        let policy = PolicyHandle::new(policy);

        let registry =
            Arc::new(SessionRegistry::new(transport.clone(), store.clone(), Duration::from_secs(10)));
        let assigner = Arc::new(Assigner::new(
            transport.clone(),
            store.clone(),
            registry.clone(),
            Duration::from_secs(1),
            Duration::from_secs(10),
        ));
        let confirm_scanner =
            Arc::new(ConfirmScanner::new(transport.clone(), store.clone(), policy.clone()));

        Self { transport, store, registry, assigner, confirm_scanner, policy }
    }

    pub async fn default_policy() -> Self {
        Self::new(Policy::default()).await
    }
}
