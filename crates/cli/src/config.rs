// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::Parser;

use crate::model::MIN_IDLE_THRESHOLD_MS;

/// Prompt assignment & auto-confirmation core: pairs queued prompts with
/// idle agent panes and auto-confirms safe interactive dialogs.
#[derive(Debug, Parser)]
#[command(name = "coop", version, about)]
pub struct Config {
    /// Path to the embedded SQLite store. `:memory:` for an ephemeral store.
    #[arg(long, env = "COOP_STORE_PATH", default_value = "coop.db")]
    pub store_path: String,

    /// tmux socket name/path passed to every `tmux` invocation. Empty uses
    /// the default socket.
    #[arg(long, env = "COOP_TMUX_SOCKET")]
    pub tmux_socket: Option<String>,

    /// SessionRegistry reconciliation interval, in seconds.
    #[arg(long, env = "COOP_SCAN_INTERVAL_SECS", default_value = "10")]
    pub scan_interval_secs: u64,

    /// Assigner scheduling tick interval, in seconds.
    #[arg(long, env = "COOP_TICK_INTERVAL_SECS", default_value = "1")]
    pub tick_interval_secs: u64,

    /// ConfirmScanner tick interval, in milliseconds.
    #[arg(long, env = "COOP_CONFIRM_TICK_INTERVAL_MS", default_value = "500")]
    pub confirm_tick_interval_ms: u64,

    /// Minimum pane quiet time before auto-confirmation may fire, in
    /// milliseconds. Floored at `MIN_IDLE_THRESHOLD_MS` by `validate`.
    #[arg(long, env = "COOP_IDLE_THRESHOLD_MS", default_value = "30000")]
    pub idle_threshold_ms: i64,

    /// Recognize dialogs and log the decision, but never send a keystroke.
    #[arg(long, env = "COOP_DRY_RUN")]
    pub dry_run: bool,

    /// Disable all auto-confirmation keystrokes without stopping assignment.
    #[arg(long, env = "COOP_KILL_SWITCH")]
    pub kill_switch: bool,

    /// Path to a JSON policy control file, hot-reloaded on change.
    #[arg(long, env = "COOP_POLICY_FILE")]
    pub policy_file: Option<PathBuf>,

    /// Completion-callback sink URL; omit to disable the callback.
    #[arg(long, env = "COOP_SINK_URL")]
    pub sink_url: Option<String>,

    /// Log format (json or text).
    #[arg(long, env = "COOP_LOG_FORMAT", default_value = "json")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "COOP_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Validate cross-field constraints after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.scan_interval_secs == 0 {
            anyhow::bail!("--scan-interval-secs must be greater than zero");
        }
        if self.tick_interval_secs == 0 {
            anyhow::bail!("--tick-interval-secs must be greater than zero");
        }
        if self.confirm_tick_interval_ms == 0 {
            anyhow::bail!("--confirm-tick-interval-ms must be greater than zero");
        }
        if self.idle_threshold_ms < MIN_IDLE_THRESHOLD_MS {
            anyhow::bail!(
                "--idle-threshold-ms must be at least {MIN_IDLE_THRESHOLD_MS}ms, got {}",
                self.idle_threshold_ms
            );
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
