// Copyright 2026-Present the radosgw-ops-exporter Contributors
// SPDX-License-Identifier: Apache-2.0

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to bind scrape listener on {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("prometheus registry error: {0}")]
    Registry(#[from] prometheus::Error),

    #[error("bus connection failed: {0}")]
    Bus(#[from] async_nats::ConnectError),

    #[error("bus publish failed: {0}")]
    Publish(#[from] async_nats::PublishError),
}
