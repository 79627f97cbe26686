// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Assigner (component E): the scheduling loop. Pairs idle, live sessions
//! with the highest-priority compatible pending prompt and delivers it.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::backoff::BackoffPolicy;
use crate::error::{AssignError, StoreError, TransportError};
use crate::model::now_ms;
use crate::pane::PaneTransport;
use crate::registry::SessionRegistry;
use crate::store::Store;

/// Default tick interval (spec §4.E default: 1s).
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);
/// Staleness window multiplier applied to the registry's scan interval.
pub const STALENESS_WINDOW_MULTIPLIER: i64 = 2;
/// Key sequence appended to prompt content before sending (spec: "prompt
/// text + submit_key").
pub const SUBMIT_KEY: &str = "\r";
/// Whether `assigned -> in_progress` happens immediately at successful send,
/// per the design's resolution of the open question (default: instantaneous).
pub const IN_PROGRESS_ON_SEND: bool = true;

pub struct Assigner {
    transport: Arc<dyn PaneTransport>,
    store: Arc<Store>,
    registry: Arc<SessionRegistry>,
    backoff: BackoffPolicy,
    tick_interval: Duration,
    staleness_window_ms: i64,
}

impl Assigner {
    pub fn new(
        transport: Arc<dyn PaneTransport>,
        store: Arc<Store>,
        registry: Arc<SessionRegistry>,
        tick_interval: Duration,
        scan_interval: Duration,
    ) -> Self {
        Self {
            transport,
            store,
            registry,
            backoff: BackoffPolicy::default(),
            tick_interval,
            staleness_window_ms: scan_interval.as_millis() as i64 * STALENESS_WINDOW_MULTIPLIER,
        }
    }

    /// One scheduling tick (spec §4.E). Returns the number of prompts
    /// successfully delivered, for test assertions.
    pub async fn tick_once(&self) -> anyhow::Result<usize> {
        let now = now_ms();
        for prompt_id in self.store.fail_prompts_with_missing_target().await? {
            let err = AssignError::PolicyDenied(format!("prompt {prompt_id} pinned to a nonexistent session"));
            warn!(prompt_id, error = %err, "prompt_failed_policy_denied");
        }
        let candidates = self.store.list_idle_sessions_seen_since(now - self.staleness_window_ms).await?;
        let mut delivered = 0;

        for session in candidates {
            match self.assign_one(&session.name, session.capabilities.clone()).await {
                Ok(true) => delivered += 1,
                Ok(false) => {}
                Err(e) => warn!(session = %session.name, error = %e, "assigner tick error"),
            }
        }
        Ok(delivered)
    }

    /// Attempt to claim and deliver a prompt to a single session. Returns
    /// `Ok(true)` on successful delivery, `Ok(false)` on a benign no-op
    /// (no eligible prompt, or contention), and `Err` only for conditions
    /// the caller should log as loop errors.
    async fn assign_one(&self, session_name: &str, capabilities: std::collections::BTreeSet<String>) -> Result<bool, AssignError> {
        // Step 2.a: re-verify liveness before touching Store.
        let live = self.transport.list_panes().await.map_err(|e| match e {
            TransportError::Fatal(msg) => AssignError::Fatal(msg),
            _ => AssignError::Transient("list_panes failed".into()),
        })?;
        if !live.iter().any(|p| p.name == session_name) {
            if let Err(e) = self.registry.reconcile_once().await {
                warn!("synchronous reconcile failed: {e}");
            }
            return Ok(false);
        }

        // Step 2.b: claim.
        let now = now_ms();
        let prompt = match self.store.claim_prompt(session_name, capabilities, now).await {
            Ok(Some(p)) => p,
            Ok(None) => return Ok(false),
            Err(StoreError::Contention) => return Ok(false),
            Err(StoreError::NotFound) => return Ok(false),
            Err(e) => return Err(AssignError::Fatal(e.to_string())),
        };

        // Step 2.c: send.
        let text = format!("{}{}", prompt.content, SUBMIT_KEY);
        match self.transport.send_text(session_name, &text).await {
            Ok(()) => {
                info!(prompt_id = prompt.id, session = %session_name, "prompt_assigned");
                if IN_PROGRESS_ON_SEND {
                    if let Err(e) = self.store.mark_in_progress(prompt.id).await {
                        warn!("failed to mark prompt {} in_progress: {e}", prompt.id);
                    } else {
                        info!(prompt_id = prompt.id, "prompt_in_progress");
                    }
                }
                Ok(true)
            }
            Err(TransportError::NotFound) => {
                if let Err(e) = self.registry.reconcile_once().await {
                    warn!("synchronous reconcile failed: {e}");
                }
                self.store
                    .increment_retry(prompt.id, "pane disappeared between claim and send")
                    .await
                    .map_err(|e| AssignError::Fatal(e.to_string()))?;
                info!(prompt_id = prompt.id, "prompt_retry_pane_vanished");
                Ok(false)
            }
            Err(TransportError::Transient(msg)) => {
                // The pane itself is still live (step 2.a passed); only the
                // send failed. increment_retry only touches the prompt row,
                // so the session must be freed separately or it stays busy
                // forever, pointing at a prompt that moved on without it.
                let delay_ms = self.backoff.delay_for_attempt(prompt.retry_count + 1);
                self.store
                    .increment_retry(
                        prompt.id,
                        &format!("transient send failure: {msg} (backed off {delay_ms}ms)"),
                    )
                    .await
                    .map_err(|e| AssignError::Fatal(e.to_string()))?;
                self.store
                    .free_session(session_name)
                    .await
                    .map_err(|e| AssignError::Fatal(e.to_string()))?;
                info!(prompt_id = prompt.id, "prompt_retry_transient");
                Ok(false)
            }
            Err(TransportError::Fatal(msg)) => {
                self.store
                    .fail_prompt(prompt.id, &format!("fatal transport error: {msg}"))
                    .await
                    .map_err(|e| AssignError::Fatal(e.to_string()))?;
                warn!(prompt_id = prompt.id, "prompt_failed_fatal");
                Ok(false)
            }
        }
    }

    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(e) = self.tick_once().await {
                        warn!("assigner tick failed: {e}");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "assigner_tests.rs"]
mod tests;
