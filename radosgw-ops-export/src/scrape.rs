// Copyright 2026-Present the radosgw-ops-exporter Contributors
// SPDX-License-Identifier: Apache-2.0

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use prometheus::{Encoder, TextEncoder};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::registry::ScrapeRegistry;

/// Serves `GET /metrics` on `addr` until `cancel` fires — §6 "Output 1".
///
/// T-scrape's only suspension point is the network per §5; this task reads
/// the registry and never touches the Metric Store directly.
pub async fn serve(
    addr: SocketAddr,
    registry: Arc<ScrapeRegistry>,
    cancel: CancellationToken,
) -> Result<(), Error> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| Error::Bind { addr, source })?;
    log::info!("scrape endpoint listening on {addr}");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                log::info!("scrape endpoint on {addr} shutting down");
                return Ok(());
            }
            accepted = listener.accept() => {
                let (stream, _peer) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        log::warn!("scrape endpoint accept error: {e}");
                        continue;
                    }
                };
                let registry = registry.clone();
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);
                    let service = service_fn(move |req| handle(req, registry.clone()));
                    if let Err(e) = ConnBuilder::new(hyper_util::rt::TokioExecutor::new())
                        .serve_connection(io, service)
                        .await
                    {
                        log::debug!("scrape connection error: {e}");
                    }
                });
            }
        }
    }
}

async fn handle(
    req: Request<Incoming>,
    registry: Arc<ScrapeRegistry>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    if req.uri().path() != "/metrics" {
        let response = Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from_static(b"not found")))
            .expect("static response is well-formed");
        return Ok(response);
    }

    let families = registry.inner().gather();
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buf) {
        log::error!("failed to encode scrape response: {e}");
        let response = Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .body(Full::new(Bytes::from_static(b"encoding error")))
            .expect("static response is well-formed");
        return Ok(response);
    }

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(hyper::header::CONTENT_TYPE, encoder.format_type())
        .body(Full::new(Bytes::from(buf)))
        .expect("well-formed response");
    Ok(response)
}
