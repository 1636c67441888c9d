// Copyright 2026-Present the radosgw-ops-exporter Contributors
// SPDX-License-Identifier: Apache-2.0

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

use radosgw_ops_core::{decoder, Config};
use radosgw_ops_export::{BusPublisher, ScrapeRegistry};
use radosgw_ops_metrics::MetricStore;
use radosgw_ops_tailer::socket::SocketMode;
use radosgw_ops_tailer::{rotate, should_rotate, watch, LogSource};

/// Wires the four cooperating tasks named in §5 together: T-src (file
/// tail + socket ingress), T-tick (snapshot/delta/export, with bus
/// publication folded in per §9), and T-scrape (HTTP `/metrics`), plus the
/// main task that waits on `cancel`.
pub async fn run(config: Config, cancel: CancellationToken) -> Result<()> {
    let store = Arc::new(MetricStore::new(
        &config.metric_families,
        config.max_keys_per_map,
    ));

    let registry = Arc::new(
        ScrapeRegistry::new(
            &config.metric_families,
            &config.latency_families,
            &config.pod_name,
            config.track_parse_errors,
        )
        .context("building scrape registry")?,
    );

    {
        let registry = registry.clone();
        store.set_latency_callback(Arc::new(move |sample| {
            registry.observe_latency(&sample);
        }));
    }

    let bus = if config.bus_enable {
        match &config.bus_url {
            Some(url) => match BusPublisher::connect(
                url,
                config.raw_subject.clone(),
                config.metrics_subject.clone(),
            )
            .await
            {
                Ok(bus) => Some(Arc::new(bus)),
                Err(e) => {
                    log::warn!("bus connection failed, continuing without bus publication: {e}");
                    None
                }
            },
            None => {
                log::warn!("bus_enable is set but bus_url is empty, skipping bus publication");
                None
            }
        }
    } else {
        None
    };

    let mut tasks = Vec::new();

    if config.scrape_enable {
        let addr: SocketAddr = ([0, 0, 0, 0], config.scrape_port).into();
        let registry = registry.clone();
        let cancel = cancel.clone();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = radosgw_ops_export::scrape::serve(addr, registry, cancel).await {
                log::error!("scrape endpoint exited: {e}");
            }
        }));
    }

    if let Some(log_path) = config.log_file_path.clone() {
        let store = store.clone();
        let registry = registry.clone();
        let bus = bus.clone();
        let cancel = cancel.clone();
        let ignore_anonymous = config.ignore_anonymous;
        let truncate_on_start = config.truncate_log_on_start;
        let max_size_mb = config.max_log_file_size_mb.max(0) as u64;
        let retention_days = config.log_retention_days.max(0) as u64;
        tasks.push(tokio::spawn(async move {
            tail_source(
                log_path,
                store,
                registry,
                bus,
                cancel,
                ignore_anonymous,
                truncate_on_start,
                max_size_mb,
                retention_days,
            )
            .await
        }));
    }

    if let Some(socket_path) = config.socket_path.clone() {
        let store = store.clone();
        let registry = registry.clone();
        let bus = bus.clone();
        let cancel = cancel.clone();
        let ignore_anonymous = config.ignore_anonymous;
        tasks.push(tokio::spawn(async move {
            tail_socket(socket_path, store, registry, bus, cancel, ignore_anonymous).await
        }));
    }

    {
        let store = store.clone();
        let registry = registry.clone();
        let bus = bus.clone();
        let cancel = cancel.clone();
        let tick = Duration::from_secs(config.scrape_interval_seconds.max(1));
        tasks.push(tokio::spawn(async move {
            run_coordinator(store, registry, bus, tick, cancel).await;
        }));
    }

    cancel.cancelled().await;
    log::info!("shutdown signal observed, waiting for tasks to finish");

    let grace = Duration::from_secs(5);
    for task in tasks {
        if tokio::time::timeout(grace, task).await.is_err() {
            log::warn!("a task did not finish within the shutdown grace period");
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn tail_source(
    log_path: String,
    store: Arc<MetricStore>,
    registry: Arc<ScrapeRegistry>,
    bus: Option<Arc<BusPublisher>>,
    cancel: CancellationToken,
    ignore_anonymous: bool,
    truncate_on_start: bool,
    max_size_mb: u64,
    retention_days: u64,
) {
    let path = PathBuf::from(&log_path);
    let mut source = LogSource::new(&path);

    if truncate_on_start {
        if let Err(e) = rotate(&path, retention_days) {
            log::error!("{log_path}: startup rotation failed: {e}");
        }
        source.reset();
    }

    let (_watcher, mut events) = match watch(&path) {
        Ok(pair) => pair,
        Err(e) => {
            log::error!("{log_path}: failed to install file watcher: {e}");
            return;
        }
    };

    drain(&path, &mut source, &store, &registry, &bus, ignore_anonymous, max_size_mb, retention_days).await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            event = events.recv() => {
                if event.is_none() {
                    return;
                }
                drain(&path, &mut source, &store, &registry, &bus, ignore_anonymous, max_size_mb, retention_days).await;
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn drain(
    path: &std::path::Path,
    source: &mut LogSource,
    store: &MetricStore,
    registry: &ScrapeRegistry,
    bus: &Option<Arc<BusPublisher>>,
    ignore_anonymous: bool,
    max_size_mb: u64,
    retention_days: u64,
) {
    match source.poll() {
        Ok(result) => {
            for line in result.lines {
                match decoder::decode(&line, ignore_anonymous) {
                    Ok(Some(record)) => {
                        store.record(&record);
                        if let Some(bus) = bus {
                            bus.publish_record(&record).await;
                        }
                    }
                    Ok(None) => {
                        log::trace!("{}: skipping filtered line (empty status or ignored anonymous user)", path.display());
                    }
                    Err(e) => {
                        log::trace!("{}: skipping unparseable line: {e}", path.display());
                        registry.record_parse_error();
                    }
                }
            }
        }
        Err(e) => log::warn!("{}: tail error: {e}", path.display()),
    }

    if let Ok(metadata) = std::fs::metadata(path) {
        let modified = metadata.modified().unwrap_or(SystemTime::now());
        if should_rotate(metadata.len(), modified, max_size_mb, retention_days, SystemTime::now()) {
            if let Err(e) = rotate(path, retention_days) {
                log::error!("{}: rotation failed: {e}", path.display());
            } else {
                source.reset();
            }
        }
    }
}

async fn tail_socket(
    socket_path: String,
    store: Arc<MetricStore>,
    registry: Arc<ScrapeRegistry>,
    bus: Option<Arc<BusPublisher>>,
    cancel: CancellationToken,
    ignore_anonymous: bool,
) {
    let mut rx = match radosgw_ops_tailer::listen_socket(&socket_path, SocketMode::Stream) {
        Ok(rx) => rx,
        Err(e) => {
            log::error!("{socket_path}: failed to bind socket ingress: {e}");
            return;
        }
    };

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            line = rx.recv() => {
                let Some(line) = line else { return };
                match decoder::decode(&line, ignore_anonymous) {
                    Ok(Some(record)) => {
                        store.record(&record);
                        if let Some(bus) = &bus {
                            bus.publish_record(&record).await;
                        }
                    }
                    Ok(None) => {
                        log::trace!("{socket_path}: skipping filtered line (empty status or ignored anonymous user)");
                    }
                    Err(e) => {
                        log::trace!("{socket_path}: skipping unparseable line: {e}");
                        registry.record_parse_error();
                    }
                }
            }
        }
    }
}

async fn run_coordinator(
    store: Arc<MetricStore>,
    registry: Arc<ScrapeRegistry>,
    bus: Option<Arc<BusPublisher>>,
    tick: Duration,
    cancel: CancellationToken,
) {
    let previous = radosgw_ops_metrics::snapshot::PreviousSnapshot::new();
    let mut ticker = interval(tick);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {
                let current = store.snapshot();
                let previous_snapshot = previous.load();
                let delta = current.subtract(&previous_snapshot);

                registry.apply_delta(&delta, &current);

                if let Some(bus) = &bus {
                    bus.publish_snapshot(&current).await;
                }

                previous.store(current);
            }
        }
    }
}
