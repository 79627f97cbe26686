// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end versions of spec.md §8's lettered scenarios, run against a
//! [`coop::pane::fake::FakePaneTransport`] rather than real tmux panes.

use std::collections::BTreeSet;

use coop::error::TransportError;
use coop::model::{now_ms, ConfirmDecision, Outcome, Policy, PromptStatus, SessionStatus};

use coop_specs::Harness;

// -- Scenario A: happy path --------------------------------------------------

#[tokio::test]
async fn scenario_a_happy_path() {
    let h = Harness::default_policy().await;

    let prompt_id = h.store.enqueue("hello", 0, BTreeSet::new(), None, 3).await.unwrap();

    h.transport.register_pane("s1", "claude: working");
    h.registry.reconcile_once().await.unwrap();

    let delivered = h.assigner.tick_once().await.unwrap();
    assert_eq!(delivered, 1);

    let prompt = h.store.get_prompt(prompt_id).await.unwrap().unwrap();
    assert_eq!(prompt.status, PromptStatus::InProgress);
    assert!(h.transport.calls().iter().any(|c| c.starts_with("send_text(s1,")));

    h.store.release_session("s1", Outcome::Success).await.unwrap();

    let prompt = h.store.get_prompt(prompt_id).await.unwrap().unwrap();
    assert_eq!(prompt.status, PromptStatus::Completed);
    let session = h.store.get_session("s1").await.unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Idle);
}

// -- Scenario B: pane vanishes between claim and send ------------------------

#[tokio::test]
async fn scenario_b_pane_vanishes_between_claim_and_send() {
    let h = Harness::default_policy().await;

    let prompt_id = h.store.enqueue("hello", 0, BTreeSet::new(), None, 3).await.unwrap();

    h.transport.register_pane("s1", "claude: working");
    h.registry.reconcile_once().await.unwrap();

    h.transport.fail_next_send("s1", TransportError::NotFound);
    let delivered = h.assigner.tick_once().await.unwrap();
    assert_eq!(delivered, 0);

    let prompt = h.store.get_prompt(prompt_id).await.unwrap().unwrap();
    assert_eq!(prompt.status, PromptStatus::Pending);
    assert_eq!(prompt.retry_count, 1);
    assert_eq!(prompt.last_error.as_deref(), Some("pane disappeared between claim and send"));
    assert!(h.store.get_session("s1").await.unwrap().is_none());

    h.transport.register_pane("s2", "claude: working");
    h.registry.reconcile_once().await.unwrap();
    let delivered = h.assigner.tick_once().await.unwrap();
    assert_eq!(delivered, 1);

    let prompt = h.store.get_prompt(prompt_id).await.unwrap().unwrap();
    assert_eq!(prompt.status, PromptStatus::InProgress);
    assert_eq!(prompt.assigned_session.as_deref(), Some("s2"));
}

// -- Scenario C: active human typist ------------------------------------------

#[tokio::test]
async fn scenario_c_active_typist_then_idle_confirms_once() {
    let mut policy = Policy::default();
    policy.idle_threshold_ms = 3_000;
    let h = Harness::new(policy).await;

    h.transport.register_pane("s1", "claude: working");
    h.registry.reconcile_once().await.unwrap();
    h.transport.set_tail("s1", "Read file foo.rs\n1. No  2. Yes");
    h.transport.set_last_input_at("s1", now_ms() - 1_000);

    let sent = h.confirm_scanner.tick_once().await.unwrap();
    assert_eq!(sent, 0);
    assert!(!h.transport.calls().iter().any(|c| c.starts_with("send_key")));

    let records = h.store.list_confirmations_for_session("s1").await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].decision, ConfirmDecision::SkippedActive);

    h.transport.set_last_input_at("s1", now_ms() - 4_000);
    let sent = h.confirm_scanner.tick_once().await.unwrap();
    assert_eq!(sent, 1);
    assert!(h.transport.calls().iter().any(|c| c.starts_with("send_key(s1,")));

    let records = h.store.list_confirmations_for_session("s1").await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].decision, ConfirmDecision::AutoConfirm);
}

// -- Scenario D: unsafe operation ---------------------------------------------

#[tokio::test]
async fn scenario_d_unsafe_operation_never_confirmed() {
    let h = Harness::default_policy().await;

    h.transport.register_pane("s1", "claude: working");
    h.registry.reconcile_once().await.unwrap();
    h.transport.set_tail("s1", "Bash command\nrm -rf /tmp/x\n1. No  2. Yes");
    h.transport.set_last_input_at("s1", now_ms() - 60_000);

    for _ in 0..3 {
        let sent = h.confirm_scanner.tick_once().await.unwrap();
        assert_eq!(sent, 0);
    }
    assert!(!h.transport.calls().iter().any(|c| c.starts_with("send_key")));

    let records = h.store.list_confirmations_for_session("s1").await.unwrap();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.decision == ConfirmDecision::SkippedUnsafe));

    // Assigner is unaffected by an unsafe dialog sitting in the pane.
    h.store.enqueue("hello", 0, BTreeSet::new(), None, 3).await.unwrap();
    let delivered = h.assigner.tick_once().await.unwrap();
    assert_eq!(delivered, 1);
}

// -- Scenario E: kill switch flipped mid-flight -------------------------------

#[tokio::test]
async fn scenario_e_kill_switch_blocks_then_unblocks() {
    let h = Harness::default_policy().await;

    h.transport.register_pane("s1", "claude: working");
    h.registry.reconcile_once().await.unwrap();
    h.transport.set_tail("s1", "Read file foo.rs\n1. No  2. Yes");
    h.transport.set_last_input_at("s1", now_ms() - 60_000);

    let mut killed = h.policy.current().await;
    killed.kill_switch = true;
    h.policy.replace(killed).await;

    let sent = h.confirm_scanner.tick_once().await.unwrap();
    assert_eq!(sent, 0);
    let records = h.store.list_confirmations_for_session("s1").await.unwrap();
    assert_eq!(records[0].decision, ConfirmDecision::SkippedKillswitch);

    let mut restored = h.policy.current().await;
    restored.kill_switch = false;
    h.policy.replace(restored).await;

    let sent = h.confirm_scanner.tick_once().await.unwrap();
    assert_eq!(sent, 1);
}

// -- Scenario F: FIFO under contention -----------------------------------------

#[tokio::test]
async fn scenario_f_fifo_under_contention() {
    let h = Harness::default_policy().await;

    let p1 = h.store.enqueue("p1", 1, BTreeSet::new(), None, 3).await.unwrap();
    let _p2 = h.store.enqueue("p2", 1, BTreeSet::new(), None, 3).await.unwrap();
    let p3 = h.store.enqueue("p3", 2, BTreeSet::new(), None, 3).await.unwrap();

    h.transport.register_pane("s1", "claude: working");
    h.transport.register_pane("s2", "claude: working");
    h.registry.reconcile_once().await.unwrap();

    let delivered = h.assigner.tick_once().await.unwrap();
    assert_eq!(delivered, 2);

    let p1_status = h.store.get_prompt(p1).await.unwrap().unwrap().status;
    let p3_status = h.store.get_prompt(p3).await.unwrap().unwrap().status;
    assert_eq!(p1_status, PromptStatus::InProgress);
    assert_eq!(p3_status, PromptStatus::InProgress);

    let p2_status = h.store.get_prompt(_p2).await.unwrap().unwrap().status;
    assert_eq!(p2_status, PromptStatus::Pending);

    h.store.release_session("s1", Outcome::Success).await.unwrap();
    let delivered = h.assigner.tick_once().await.unwrap();
    assert_eq!(delivered, 1);
    let p2_status = h.store.get_prompt(_p2).await.unwrap().unwrap().status;
    assert_eq!(p2_status, PromptStatus::InProgress);
}
