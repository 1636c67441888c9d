// Copyright 2026-Present the radosgw-ops-exporter Contributors
// SPDX-License-Identifier: Apache-2.0

mod config_load;
mod orchestrator;

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

/// Exit codes — §6 EXPANDED: 0 on clean cancellation, 1 on a configuration
/// error, 2 on an unopenable log file or bind failure at startup.
const EXIT_OK: i32 = 0;
const EXIT_CONFIG_ERROR: i32 = 1;
const EXIT_STARTUP_FAILURE: i32 = 2;

fn main() {
    pretty_env_logger::init();

    let config_path = parse_args();

    let config = match config_load::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            log::error!("configuration error: {e:#}");
            std::process::exit(EXIT_CONFIG_ERROR);
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("failed to start async runtime: {e}");
            std::process::exit(EXIT_STARTUP_FAILURE);
        }
    };

    let exit_code = runtime.block_on(run(config));
    std::process::exit(exit_code);
}

async fn run(config: radosgw_ops_core::Config) -> i32 {
    let cancel = CancellationToken::new();

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        log::info!("shutdown signal received");
        signal_cancel.cancel();
    });

    match orchestrator::run(config, cancel).await {
        Ok(()) => EXIT_OK,
        Err(e) => {
            log::error!("fatal startup failure: {e:#}");
            EXIT_STARTUP_FAILURE
        }
    }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => {}
        _ = sigint.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

/// A single `--config <path>` argument, matching the minimal CLI surface
/// this workspace's small internal tools use — no subcommands, no flags
/// beyond the one needed to locate a configuration file.
fn parse_args() -> Option<PathBuf> {
    parse_args_from(std::env::args().skip(1))
}

fn parse_args_from(mut args: impl Iterator<Item = String>) -> Option<PathBuf> {
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            return Some(PathBuf::from(path));
        }
    }
    None
}
