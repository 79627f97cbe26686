// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ConfirmScanner (component F): independently scans panes for confirmation
//! dialogs and auto-confirms the ones policy allows.

pub mod recognizer;

use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::killswitch::PolicyHandle;
use crate::model::{now_ms, ConfirmDecision};
use crate::pane::PaneTransport;
use crate::store::Store;

use recognizer::{recognize, RecognizerRule, DEFAULT_RULES};

/// Default tick interval (spec §4.F default: 0.5s).
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(500);
/// Default tail length read per pane (spec §4.F default: 40 lines).
pub const DEFAULT_TAIL_LINES: usize = 40;
/// Dedup window: at most one `auto_confirm` per (session, fingerprint)
/// (spec §4.F step 5 default: 2s).
pub const DEDUP_WINDOW_MS: i64 = 2_000;
/// Coordination window after E's claim during which F must not send a
/// confirmation keystroke to that session (spec §5, default: 1s).
pub const COORDINATION_WINDOW_MS: i64 = 1_000;

/// A sha256-based fingerprint identifying a specific dialog instance on a
/// specific session, used for the dedup-window check. Not a spec-mandated
/// format; any stable derivation from (session, operation_class,
/// operation_detail) would do.
fn dialog_fingerprint(session_name: &str, operation_class: &str, operation_detail: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(session_name.as_bytes());
    hasher.update(b"\0");
    hasher.update(operation_class.as_bytes());
    hasher.update(b"\0");
    hasher.update(operation_detail.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub struct ConfirmScanner {
    transport: Arc<dyn PaneTransport>,
    store: Arc<Store>,
    policy: PolicyHandle,
    rules: Vec<RecognizerRule>,
    tick_interval: Duration,
    tail_lines: usize,
}

impl ConfirmScanner {
    pub fn new(transport: Arc<dyn PaneTransport>, store: Arc<Store>, policy: PolicyHandle) -> Self {
        Self {
            transport,
            store,
            policy,
            rules: DEFAULT_RULES.to_vec(),
            tick_interval: DEFAULT_TICK_INTERVAL,
            tail_lines: DEFAULT_TAIL_LINES,
        }
    }

    pub fn with_rules(mut self, rules: Vec<RecognizerRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// One scan pass over every tracked session. Returns how many
    /// `auto_confirm` keystrokes were actually sent, for test assertions.
    pub async fn tick_once(&self) -> anyhow::Result<usize> {
        let policy = self.policy.current().await;
        if policy.kill_switch {
            // Still record the skip per-session so the audit trail reflects
            // why nothing was confirmed, matching scenario E's contract.
        }

        let sessions = self.store.list_sessions().await?;
        let mut sent = 0;

        for session in sessions {
            if policy.excluded_sessions.contains(&session.name) {
                continue;
            }

            // Coordination window: never race E's own write to this pane.
            if session.status == crate::model::SessionStatus::Busy {
                if let Some(last_assigned_at) = session.last_assigned_at {
                    if now_ms() - last_assigned_at < COORDINATION_WINDOW_MS {
                        continue;
                    }
                }
            }

            let tail = match self.transport.read_tail(&session.name, self.tail_lines).await {
                Ok(text) => text,
                Err(e) => {
                    debug!(session = %session.name, error = %e, "confirm scanner read_tail failed");
                    continue;
                }
            };

            let Some(recognition) = recognize(&tail, &self.rules) else { continue };

            if self.decide_and_act(&session.name, &recognition, &policy).await? {
                sent += 1;
            }
        }

        Ok(sent)
    }

    /// Precondition chain (spec §4.F step 4) plus the send (step 5). Returns
    /// `true` if a keystroke was actually sent.
    async fn decide_and_act(
        &self,
        session_name: &str,
        recognition: &recognizer::Recognition,
        policy: &crate::model::Policy,
    ) -> anyhow::Result<bool> {
        let now = now_ms();

        let decision = if policy.kill_switch {
            Some(ConfirmDecision::SkippedKillswitch)
        } else if !policy.is_safe(&recognition.operation_class) {
            Some(ConfirmDecision::SkippedUnsafe)
        } else {
            let last_input_at = self.transport.last_input_at(session_name).await.unwrap_or(0);
            if now - last_input_at < policy.idle_threshold_ms {
                Some(ConfirmDecision::SkippedActive)
            } else if policy.dry_run {
                Some(ConfirmDecision::DryRun)
            } else {
                None
            }
        };

        let fingerprint = dialog_fingerprint(session_name, &recognition.operation_class, &recognition.operation_detail);

        if let Some(decision) = decision {
            self.store
                .insert_confirmation(
                    session_name,
                    &recognition.operation_class,
                    &recognition.operation_detail,
                    &fingerprint,
                    decision,
                    now,
                    None,
                )
                .await?;
            debug!(session = %session_name, decision = decision.as_str(), "confirmation_skipped");
            return Ok(false);
        }

        if self.store.has_recent_auto_confirm(session_name, &fingerprint, now, DEDUP_WINDOW_MS).await? {
            return Ok(false);
        }

        self.transport.send_key(session_name, &recognition.confirm_key).await?;
        self.store
            .insert_confirmation(
                session_name,
                &recognition.operation_class,
                &recognition.operation_detail,
                &fingerprint,
                ConfirmDecision::AutoConfirm,
                now,
                Some(recognition.confirm_key.clone()),
            )
            .await?;
        info!(session = %session_name, operation = %recognition.operation_class, "auto_confirm");
        Ok(true)
    }

    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(e) = self.tick_once().await {
                        warn!("confirm scanner tick failed: {e}");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
