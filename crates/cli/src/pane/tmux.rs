// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A [`PaneTransport`] backed by shelling out to the `tmux` CLI.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;

use crate::error::TransportError;
use crate::model::EpochMs;

use super::{PaneHandle, PaneTransport};

/// Default per-call timeout applied to every `tmux` invocation.
const CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Shells out to a `tmux` binary (optionally against a named socket) for
/// every pane operation. Each call is a separate process spawn; this keeps
/// the implementation simple and matches how comparable agent-orchestration
/// tools drive tmux (one-shot CLI invocations rather than a persistent
/// control-mode connection).
pub struct TmuxTransport {
    socket: Option<String>,
}

impl TmuxTransport {
    pub fn new(socket: Option<String>) -> Self {
        Self { socket }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new("tmux");
        if let Some(socket) = &self.socket {
            cmd.arg("-L").arg(socket);
        }
        cmd.args(args);
        cmd
    }

    async fn run(&self, args: &[&str]) -> Result<String, TransportError> {
        let output = timeout(CALL_TIMEOUT, self.command(args).output())
            .await
            .map_err(|_| TransportError::Transient("tmux call timed out".into()))?
            .map_err(|e| TransportError::Fatal(format!("failed to spawn tmux: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("can't find pane") || stderr.contains("can't find window") {
                return Err(TransportError::NotFound);
            }
            return Err(TransportError::Transient(stderr.trim().to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl PaneTransport for TmuxTransport {
    fn list_panes(&self) -> Pin<Box<dyn Future<Output = Result<Vec<PaneHandle>, TransportError>> + Send + '_>> {
        Box::pin(async move {
            let out = self
                .run(&[
                    "list-panes",
                    "-a",
                    "-F",
                    "#{pane_id}\t#{pane_title}\t#{pane_current_command}",
                ])
                .await?;
            Ok(out
                .lines()
                .filter_map(|line| {
                    let mut parts = line.splitn(3, '\t');
                    let name = parts.next()?.to_string();
                    let title = parts.next().unwrap_or("");
                    let command = parts.next().unwrap_or("");
                    Some(PaneHandle {
                        name,
                        title_hint: format!("{title} {command}").trim().to_string(),
                    })
                })
                .collect())
        })
    }

    fn read_tail(
        &self,
        pane: &str,
        n_lines: usize,
    ) -> Pin<Box<dyn Future<Output = Result<String, TransportError>> + Send + '_>> {
        let pane = pane.to_string();
        Box::pin(async move {
            let start = format!("-{n_lines}");
            self.run(&["capture-pane", "-p", "-t", &pane, "-S", &start]).await
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
            self.run(&["send-keys", "-t", &pane, "-l", "--", &text]).await?;
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
            self.run(&["send-keys", "-t", &pane, &keysym]).await?;
            Ok(())
        })
    }

    fn last_input_at(
        &self,
        pane: &str,
    ) -> Pin<Box<dyn Future<Output = Result<EpochMs, TransportError>> + Send + '_>> {
        let pane = pane.to_string();
        Box::pin(async move {
            let out = self
                .run(&["display-message", "-p", "-t", &pane, "#{pane_activity}"])
                .await?;
            out.trim()
                .parse::<i64>()
                .map(|secs| secs * 1000)
                .map_err(|_| TransportError::Transient("unparseable pane_activity".into()))
        })
    }
}
