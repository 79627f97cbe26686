// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PaneTransport: the single choke point for all external multiplexer I/O.
//!
//! Centralizing every external call behind this trait lets the rest of the
//! system be driven by a deterministic fake in tests.

pub mod fake;
pub mod tmux;

use std::future::Future;
use std::pin::Pin;

use crate::error::TransportError;
use crate::model::EpochMs;

/// A pane discovered by [`PaneTransport::list_panes`].
#[derive(Debug, Clone)]
pub struct PaneHandle {
    pub name: String,
    /// Best-effort text useful for provider classification: pane title,
    /// running command line, or similar. May be empty.
    pub title_hint: String,
}

/// Object-safe transport over an external terminal multiplexer.
///
/// All operations are logically synchronous from the caller's perspective
/// (each returns a future that resolves once the underlying call completes)
/// and may fail with [`TransportError::NotFound`] (pane vanished),
/// `Transient` (transport hiccup), or `Fatal` (transport misconfigured).
/// Implementations are not required to make `send_text` idempotent at the
/// keystroke level; callers own retry semantics.
pub trait PaneTransport: Send + Sync + 'static {
    fn list_panes(&self) -> Pin<Box<dyn Future<Output = Result<Vec<PaneHandle>, TransportError>> + Send + '_>>;

    fn read_tail(
        &self,
        pane: &str,
        n_lines: usize,
    ) -> Pin<Box<dyn Future<Output = Result<String, TransportError>> + Send + '_>>;

    fn send_text(
        &self,
        pane: &str,
        text: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + '_>>;

    fn send_key(
        &self,
        pane: &str,
        keysym: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + '_>>;

    fn last_input_at(
        &self,
        pane: &str,
    ) -> Pin<Box<dyn Future<Output = Result<EpochMs, TransportError>> + Send + '_>>;
}
