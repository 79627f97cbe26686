// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CompletionSink: the outbound half of the completion callback contract.
//! On a prompt's terminal transition the core may notify an external
//! collaborator; delivery is at-least-once, so consumers must dedupe on
//! `prompt_id + status`.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Serialize;
use tracing::warn;

use crate::model::PromptStatus;

/// Maximum delivery attempts before giving up and logging.
const MAX_ATTEMPTS: u32 = 3;
/// Delay between delivery attempts.
const RETRY_DELAY: Duration = Duration::from_millis(500);
/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// A prompt's terminal-transition event, as posted to the sink URL.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionEvent {
    pub prompt_id: i64,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CompletionEvent {
    pub fn new(prompt_id: i64, status: PromptStatus, error: Option<String>) -> Self {
        Self { prompt_id, status: status.as_str(), error }
    }
}

/// Object-safe sink for terminal prompt events. Boxed-future return shape
/// matches [`crate::pane::PaneTransport`]'s convention for trait objects
/// shared across loop tasks.
pub trait CompletionSink: Send + Sync + 'static {
    fn notify(&self, event: CompletionEvent) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// Discards every event. Used in tests and when no sink URL is configured.
pub struct NoopCompletionSink;

impl CompletionSink for NoopCompletionSink {
    fn notify(&self, _event: CompletionEvent) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async {})
    }
}

/// POSTs each event to a fixed URL, matching the teacher's `Distributor`
/// push-with-retry pattern over a bounded-timeout `reqwest::Client`.
pub struct HttpCompletionSink {
    client: reqwest::Client,
    url: String,
}

impl HttpCompletionSink {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            url: url.into(),
        }
    }
}

impl CompletionSink for HttpCompletionSink {
    fn notify(&self, event: CompletionEvent) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            for attempt in 0..MAX_ATTEMPTS {
                match self.client.post(&self.url).json(&event).send().await {
                    Ok(resp) if resp.status().is_success() => return,
                    Ok(resp) => {
                        warn!(prompt_id = event.prompt_id, status = resp.status().as_u16(), attempt, "completion sink rejected event");
                    }
                    Err(e) => {
                        warn!(prompt_id = event.prompt_id, attempt, "completion sink delivery failed: {e}");
                    }
                }
                if attempt + 1 < MAX_ATTEMPTS {
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            }
            warn!(prompt_id = event.prompt_id, "completion sink delivery exhausted retries, dropping event");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_sink_accepts_any_event() {
        let sink = NoopCompletionSink;
        sink.notify(CompletionEvent::new(1, PromptStatus::Completed, None)).await;
    }

    #[test]
    fn completion_event_omits_error_when_none() {
        let event = CompletionEvent::new(1, PromptStatus::Completed, None);
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("error"));
    }

    #[test]
    fn completion_event_includes_error_when_present() {
        let event = CompletionEvent::new(1, PromptStatus::Failed, Some("boom".into()));
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("boom"));
    }
}
