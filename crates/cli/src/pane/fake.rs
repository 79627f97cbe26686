// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deterministic in-memory [`PaneTransport`] for tests.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use crate::error::TransportError;
use crate::model::{now_ms, EpochMs};

use super::{PaneHandle, PaneTransport};

#[derive(Debug, Clone)]
struct FakePane {
    title_hint: String,
    tail: String,
    last_input_at: EpochMs,
    /// Next `send_text`/`send_key` call on this pane returns this error.
    next_error: Option<TransportError>,
}

/// Scripted, deterministic pane transport. Tests register panes, set their
/// tail content / last-input time, and record every call made against them.
pub struct FakePaneTransport {
    panes: Mutex<HashMap<String, FakePane>>,
    calls: Mutex<Vec<String>>,
}

impl Default for FakePaneTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl FakePaneTransport {
    pub fn new() -> Self {
        Self { panes: Mutex::new(HashMap::new()), calls: Mutex::new(Vec::new()) }
    }

    pub fn register_pane(&self, name: &str, title_hint: &str) {
        self.panes.lock().expect("panes lock poisoned").insert(
            name.to_string(),
            FakePane {
                title_hint: title_hint.to_string(),
                tail: String::new(),
                last_input_at: now_ms(),
                next_error: None,
            },
        );
    }

    pub fn remove_pane(&self, name: &str) {
        self.panes.lock().expect("panes lock poisoned").remove(name);
    }

    pub fn set_tail(&self, name: &str, tail: &str) {
        if let Some(pane) = self.panes.lock().expect("panes lock poisoned").get_mut(name) {
            pane.tail = tail.to_string();
        }
    }

    pub fn set_last_input_at(&self, name: &str, at: EpochMs) {
        if let Some(pane) = self.panes.lock().expect("panes lock poisoned").get_mut(name) {
            pane.last_input_at = at;
        }
    }

    /// Arrange for the next `send_text`/`send_key` against `name` to fail.
    pub fn fail_next_send(&self, name: &str, err: TransportError) {
        if let Some(pane) = self.panes.lock().expect("panes lock poisoned").get_mut(name) {
            pane.next_error = Some(err);
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock poisoned").clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().expect("calls lock poisoned").push(call.into());
    }
}

impl PaneTransport for FakePaneTransport {
    fn list_panes(&self) -> Pin<Box<dyn Future<Output = Result<Vec<PaneHandle>, TransportError>> + Send + '_>> {
        Box::pin(async move {
            self.record("list_panes");
            let panes = self.panes.lock().expect("panes lock poisoned");
            Ok(panes
                .iter()
                .map(|(name, pane)| PaneHandle { name: name.clone(), title_hint: pane.title_hint.clone() })
                .collect())
        })
    }

    fn read_tail(
        &self,
        pane: &str,
        _n_lines: usize,
    ) -> Pin<Box<dyn Future<Output = Result<String, TransportError>> + Send + '_>> {
        let pane = pane.to_string();
        Box::pin(async move {
            self.record(format!("read_tail({pane})"));
            let panes = self.panes.lock().expect("panes lock poisoned");
            panes.get(&pane).map(|p| p.tail.clone()).ok_or(TransportError::NotFound)
        })
    }

    fn send_text(
        &self,
        pane: &str,
        text: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + '_>> {
        let pane = pane.to_string();
        let text = text.to_string();
        Box::pin(async move {
            self.record(format!("send_text({pane}, {text:?})"));
            let mut panes = self.panes.lock().expect("panes lock poisoned");
            let entry = panes.get_mut(&pane).ok_or(TransportError::NotFound)?;
            if let Some(err) = entry.next_error.take() {
                return Err(err);
            }
            entry.last_input_at = now_ms();
            Ok(())
        })
    }

    fn send_key(
        &self,
        pane: &str,
        keysym: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + '_>> {
        let pane = pane.to_string();
        let keysym = keysym.to_string();
        Box::pin(async move {
            self.record(format!("send_key({pane}, {keysym})"));
            let mut panes = self.panes.lock().expect("panes lock poisoned");
            let entry = panes.get_mut(&pane).ok_or(TransportError::NotFound)?;
            if let Some(err) = entry.next_error.take() {
                return Err(err);
            }
            Ok(())
        })
    }

    fn last_input_at(
        &self,
        pane: &str,
    ) -> Pin<Box<dyn Future<Output = Result<EpochMs, TransportError>> + Send + '_>> {
        let pane = pane.to_string();
        Box::pin(async move {
            let panes = self.panes.lock().expect("panes lock poisoned");
            panes.get(&pane).map(|p| p.last_input_at).ok_or(TransportError::NotFound)
        })
    }
}
