// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SessionRegistry (component C): reconciles Store's session table against
//! PaneTransport's live pane set on a fixed tick.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::model::{now_ms, Provider};
use crate::pane::{PaneHandle, PaneTransport};
use crate::store::Store;

/// Default reconciliation interval (spec §4.C default: 10s).
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(10);

/// Best-effort provider classification over a pane's title/command hint.
/// Ambiguous panes classify as `Unknown` with empty capabilities, per spec:
/// the Assigner will not match such a session unless pinned by
/// `target_session`.
pub fn classify_provider(title_hint: &str) -> Provider {
    let hint = title_hint.to_lowercase();
    let patterns: [(Provider, &str); 3] =
        [(Provider::Claude, r"\bclaude\b"), (Provider::Codex, r"\bcodex\b"), (Provider::Gemini, r"\bgemini\b")];
    for (provider, pattern) in patterns {
        // Safe to unwrap: patterns are fixed, valid literals.
        let re = Regex::new(pattern).expect("static classification regex must compile");
        if re.is_match(&hint) {
            return provider;
        }
    }
    Provider::Unknown
}

/// Runs the reconciliation loop until `shutdown` is cancelled.
pub struct SessionRegistry {
    transport: Arc<dyn PaneTransport>,
    store: Arc<Store>,
    scan_interval: Duration,
}

impl SessionRegistry {
    pub fn new(transport: Arc<dyn PaneTransport>, store: Arc<Store>, scan_interval: Duration) -> Self {
        Self { transport, store, scan_interval }
    }

    /// Run one reconciliation pass (spec §4.C steps 1-5). Exposed separately
    /// from `run` so the Assigner can trigger a synchronous reconcile
    /// in-between ticks (step 2.a of its own loop).
    pub async fn reconcile_once(&self) -> anyhow::Result<()> {
        let now = now_ms();
        let live: HashMap<String, PaneHandle> =
            self.transport.list_panes().await?.into_iter().map(|p| (p.name.clone(), p)).collect();
        let stored = self.store.list_sessions().await?;

        // Step 3: stored sessions whose pane vanished.
        for session in &stored {
            if !live.contains_key(&session.name) {
                if let Some(prompt_id) = session.current_prompt_id {
                    self.store.increment_retry(prompt_id, "session vanished").await?;
                }
                self.store.delete_session(&session.name).await?;
                info!(session = %session.name, "session_reaped");
            }
        }

        let stored_names: BTreeSet<String> = stored.iter().map(|s| s.name.clone()).collect();

        // Step 4: live panes not yet tracked.
        for (name, pane) in &live {
            if !stored_names.contains(name) {
                let provider = classify_provider(&pane.title_hint);
                let capabilities = provider.default_capabilities();
                self.store.insert_session(name, provider, capabilities, now).await?;
                debug!(session = %name, provider = provider.as_str(), "session_discovered");
            }
        }

        // Step 5: panes present in both — refresh and re-classify.
        for (name, pane) in &live {
            if stored_names.contains(name) {
                let provider = classify_provider(&pane.title_hint);
                let capabilities = provider.default_capabilities();
                self.store.touch_session(name, provider, capabilities, now).await?;
            }
        }

        Ok(())
    }

    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.scan_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(e) = self.reconcile_once().await {
                        warn!("session registry reconcile failed: {e}");
                    }
                }
            }
        }
    }
}
