// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::error::TransportError;
use crate::model::{Provider, PromptStatus};
use crate::pane::fake::FakePaneTransport;
use crate::registry::{SessionRegistry, DEFAULT_SCAN_INTERVAL};
use std::collections::BTreeSet;

async fn fixture() -> (Arc<FakePaneTransport>, Arc<Store>, Arc<SessionRegistry>, Assigner) {
    let transport = Arc::new(FakePaneTransport::new());
    let store = Store::connect_in_memory().await.unwrap();
    let registry = Arc::new(SessionRegistry::new(transport.clone(), store.clone(), DEFAULT_SCAN_INTERVAL));
    let assigner = Assigner::new(
        transport.clone(),
        store.clone(),
        registry.clone(),
        DEFAULT_TICK_INTERVAL,
        DEFAULT_SCAN_INTERVAL,
    );
    (transport, store, registry, assigner)
}

// Scenario A — happy path.
#[tokio::test]
async fn happy_path_delivers_and_transitions_to_in_progress() {
    let (transport, store, registry, assigner) = fixture().await;
    transport.register_pane("s1", "claude");
    registry.reconcile_once().await.unwrap();
    let id = store.enqueue("hello", 0, BTreeSet::new(), None, 3).await.unwrap();

    let delivered = assigner.tick_once().await.unwrap();

    assert_eq!(delivered, 1);
    let prompt = store.get_prompt(id).await.unwrap().unwrap();
    assert_eq!(prompt.status, PromptStatus::InProgress);
    assert!(transport.calls().iter().any(|c| c.contains("send_text(s1")));

    store.release_session("s1", crate::model::Outcome::Success).await.unwrap();
    assert_eq!(store.get_prompt(id).await.unwrap().unwrap().status, PromptStatus::Completed);
    assert_eq!(store.get_session("s1").await.unwrap().unwrap().status, crate::model::SessionStatus::Idle);
}

// Scenario B — pane vanishes between claim and send.
#[tokio::test]
async fn pane_vanishing_between_claim_and_send_requeues_prompt() {
    let (transport, store, registry, assigner) = fixture().await;
    transport.register_pane("s1", "claude");
    registry.reconcile_once().await.unwrap();
    let id = store.enqueue("hello", 0, BTreeSet::new(), None, 3).await.unwrap();
    transport.fail_next_send("s1", TransportError::NotFound);

    let delivered = assigner.tick_once().await.unwrap();
    assert_eq!(delivered, 0);

    let prompt = store.get_prompt(id).await.unwrap().unwrap();
    assert_eq!(prompt.status, PromptStatus::Pending);
    assert_eq!(prompt.retry_count, 1);
    assert_eq!(prompt.last_error.as_deref(), Some("pane disappeared between claim and send"));
    assert!(store.get_session("s1").await.unwrap().is_none());

    // Next tick with a replacement pane completes the prompt.
    transport.register_pane("s2", "claude");
    registry.reconcile_once().await.unwrap();
    let delivered = assigner.tick_once().await.unwrap();
    assert_eq!(delivered, 1);
    assert_eq!(store.get_prompt(id).await.unwrap().unwrap().assigned_session.as_deref(), Some("s2"));
}

// Scenario B' — transient send failure must free the session, not just the prompt.
#[tokio::test]
async fn transient_send_failure_requeues_prompt_and_frees_session() {
    let (transport, store, registry, assigner) = fixture().await;
    transport.register_pane("s1", "claude");
    registry.reconcile_once().await.unwrap();
    let id = store.enqueue("hello", 0, BTreeSet::new(), None, 3).await.unwrap();
    transport.fail_next_send("s1", TransportError::Transient("socket hiccup".into()));

    let delivered = assigner.tick_once().await.unwrap();
    assert_eq!(delivered, 0);

    let prompt = store.get_prompt(id).await.unwrap().unwrap();
    assert_eq!(prompt.status, PromptStatus::Pending);
    assert_eq!(prompt.retry_count, 1);

    let session = store.get_session("s1").await.unwrap().unwrap();
    assert_eq!(session.status, crate::model::SessionStatus::Idle);
    assert!(session.current_prompt_id.is_none());

    // Next tick claims and delivers the now-unstuck prompt to the same session.
    let delivered = assigner.tick_once().await.unwrap();
    assert_eq!(delivered, 1);
    assert_eq!(store.get_prompt(id).await.unwrap().unwrap().assigned_session.as_deref(), Some("s1"));
}

#[tokio::test]
async fn fatal_transport_error_fails_prompt_immediately() {
    let (transport, store, registry, assigner) = fixture().await;
    transport.register_pane("s1", "claude");
    registry.reconcile_once().await.unwrap();
    let id = store.enqueue("hello", 0, BTreeSet::new(), None, 3).await.unwrap();
    transport.fail_next_send("s1", TransportError::Fatal("misconfigured".into()));

    assigner.tick_once().await.unwrap();

    let prompt = store.get_prompt(id).await.unwrap().unwrap();
    assert_eq!(prompt.status, PromptStatus::Failed);
}

// Scenario F — FIFO under contention across two idle sessions.
#[tokio::test]
async fn fifo_under_contention_claims_highest_priority_then_earliest() {
    let (transport, store, registry, assigner) = fixture().await;
    transport.register_pane("s1", "claude");
    transport.register_pane("s2", "claude");
    registry.reconcile_once().await.unwrap();

    let p1 = store.enqueue("p1", 1, BTreeSet::new(), None, 3).await.unwrap();
    let p2 = store.enqueue("p2", 1, BTreeSet::new(), None, 3).await.unwrap();
    let p3 = store.enqueue("p3", 2, BTreeSet::new(), None, 3).await.unwrap();

    let delivered = assigner.tick_once().await.unwrap();
    assert_eq!(delivered, 2);

    let p1_status = store.get_prompt(p1).await.unwrap().unwrap().status;
    let p2_status = store.get_prompt(p2).await.unwrap().unwrap().status;
    let p3_status = store.get_prompt(p3).await.unwrap().unwrap().status;

    assert_ne!(p3_status, PromptStatus::Pending, "highest priority prompt must be claimed");
    assert_eq!(p2_status, PromptStatus::Pending, "later-arriving equal-priority prompt stays pending");
    assert_ne!(p1_status, PromptStatus::Pending, "earlier equal-priority prompt is claimed over p2");
}
