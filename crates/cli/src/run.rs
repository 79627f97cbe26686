// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Top-level wiring — assembles Store, PaneTransport, Policy, and the three
//! long-running loops into a [`Supervisor`], then runs it to completion.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::assigner::Assigner;
use crate::config::Config;
use crate::confirm::ConfirmScanner;
use crate::killswitch::PolicyHandle;
use crate::model::Policy;
use crate::pane::tmux::TmuxTransport;
use crate::pane::PaneTransport;
use crate::registry::SessionRegistry;
use crate::store::Store;
use crate::supervisor::Supervisor;

/// Priority: `--log-level`/`COOP_LOG_LEVEL` > `RUST_LOG` > default `"info"`.
pub fn init_tracing(config: &Config) {
    use tracing_subscriber::fmt;

    let filter = if std::env::var("COOP_LOG_LEVEL").is_err() && config.log_level == "info" {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
    } else {
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let result = match config.log_format.as_str() {
        "json" => fmt::fmt().with_env_filter(filter).json().try_init(),
        _ => fmt::fmt().with_env_filter(filter).try_init(),
    };
    drop(result);
}

fn policy_from_config(config: &Config) -> Policy {
    let mut policy = Policy::default();
    policy.idle_threshold_ms = config.idle_threshold_ms;
    policy.dry_run = config.dry_run;
    policy.kill_switch = config.kill_switch;
    policy
}

/// A fully-prepared run ready to drive via [`Supervisor::run`]. Returned by
/// [`prepare`] so integration tests can reach into `store`/`policy` before
/// starting the loops.
pub struct PreparedRun {
    pub store: Arc<Store>,
    pub policy: PolicyHandle,
    pub supervisor: Arc<Supervisor>,
}

pub async fn prepare(config: Config) -> anyhow::Result<PreparedRun> {
    config.validate()?;
    init_tracing(&config);

    let store = Store::connect(&config.store_path).await?;
    let transport: Arc<dyn PaneTransport> = Arc::new(TmuxTransport::new(config.tmux_socket.clone()));

    let policy = PolicyHandle::new(policy_from_config(&config));
    let shutdown = CancellationToken::new();

    if let Some(path) = &config.policy_file {
        policy.reload_from_file(path).await?;
        policy.clone().watch(path.clone(), shutdown.clone());
    }

    let scan_interval = Duration::from_secs(config.scan_interval_secs);
    let tick_interval = Duration::from_secs(config.tick_interval_secs);
    let confirm_tick_interval = Duration::from_millis(config.confirm_tick_interval_ms);

    let registry = Arc::new(SessionRegistry::new(transport.clone(), store.clone(), scan_interval));
    let assigner = Arc::new(Assigner::new(transport.clone(), store.clone(), registry.clone(), tick_interval, scan_interval));
    let confirm_scanner =
        Arc::new(ConfirmScanner::new(transport, store.clone(), policy.clone()).with_tick_interval(confirm_tick_interval));

    let supervisor = Arc::new(Supervisor::new(store.clone(), registry, assigner, confirm_scanner, shutdown));

    Ok(PreparedRun { store, policy, supervisor })
}

/// Run until an external shutdown signal (Ctrl-C) arrives, then drain.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let prepared = prepare(config).await?;
    let shutdown = prepared.supervisor.shutdown_token();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            shutdown.cancel();
        }
    });

    prepared.supervisor.run().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn prepare_wires_up_an_in_memory_store() {
        let config = Config {
            store_path: ":memory:".to_string(),
            tmux_socket: None,
            scan_interval_secs: 10,
            tick_interval_secs: 1,
            confirm_tick_interval_ms: 500,
            idle_threshold_ms: 30_000,
            dry_run: false,
            kill_switch: false,
            policy_file: None,
            sink_url: None,
            log_format: "text".to_string(),
            log_level: "info".to_string(),
        };

        let prepared = prepare(config).await.unwrap();
        assert!(prepared.store.list_sessions().await.unwrap().is_empty());
        assert!(!prepared.policy.current().await.kill_switch);
    }
}
