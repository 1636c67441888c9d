// Copyright 2026-Present the radosgw-ops-exporter Contributors
// SPDX-License-Identifier: Apache-2.0

use std::path::{Path, PathBuf};

use tokio::io::AsyncReadExt;
use tokio::net::{UnixDatagram, UnixListener};
use tokio::sync::mpsc;

use crate::error::Error;

/// Which Unix domain socket mode the Log Source's alternative ingress uses
/// — §4.1 "Socket ingress", "(datagram or stream, per config)".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketMode {
    Datagram,
    Stream,
}

/// Largest single datagram or stream-connection payload accepted as one
/// line. A RadosGW ops-log entry is a single bounded JSON object; a client
/// sending more than this is misbehaving and the excess is dropped.
const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Binds `path` in the given mode and returns a channel of raw lines, one
/// per accepted datagram or stream connection.
///
/// Each line is fed to the same Entry Decoder path as file-tailed lines —
/// this function does no JSON validation itself, matching the separation
/// of concerns between ingress and decode used throughout this crate.
pub fn listen(
    path: impl Into<PathBuf>,
    mode: SocketMode,
) -> Result<mpsc::Receiver<String>, Error> {
    let path = path.into();
    std::fs::remove_file(&path).ok();

    let (tx, rx) = mpsc::channel(256);

    match mode {
        SocketMode::Datagram => spawn_datagram(path, tx)?,
        SocketMode::Stream => spawn_stream(path, tx)?,
    }

    Ok(rx)
}

fn spawn_datagram(path: PathBuf, tx: mpsc::Sender<String>) -> Result<(), Error> {
    let socket = UnixDatagram::bind(&path).map_err(|e| Error::Io {
        path: path.clone(),
        source: e,
    })?;

    tokio::spawn(async move {
        let mut buf = vec![0u8; MAX_LINE_BYTES];
        loop {
            let n = match socket.recv(&mut buf).await {
                Ok(n) => n,
                Err(e) => {
                    log::warn!("{}: datagram read error: {e}", path.display());
                    continue;
                }
            };
            let line = String::from_utf8_lossy(&buf[..n]).trim().to_string();
            if line.is_empty() {
                continue;
            }
            if tx.send(line).await.is_err() {
                break;
            }
        }
    });

    Ok(())
}

fn spawn_stream(path: PathBuf, tx: mpsc::Sender<String>) -> Result<(), Error> {
    let listener = UnixListener::bind(&path).map_err(|e| Error::Io {
        path: path.clone(),
        source: e,
    })?;

    tokio::spawn(async move {
        loop {
            let (stream, _addr) = match listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    log::warn!("{}: accept error: {e}", path.display());
                    continue;
                }
            };
            let tx = tx.clone();
            let path = path.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, &tx).await {
                    log::warn!("{}: connection error: {e}", path.display());
                }
            });
        }
    });

    Ok(())
}

async fn handle_connection(
    mut stream: tokio::net::UnixStream,
    tx: &mpsc::Sender<String>,
) -> std::io::Result<()> {
    let mut buf = Vec::with_capacity(4096);
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() > MAX_LINE_BYTES {
            break;
        }
    }

    let line = String::from_utf8_lossy(&buf).trim().to_string();
    if !line.is_empty() {
        let _ = tx.send(line).await;
    }
    Ok(())
}

pub fn socket_parent_exists(path: &Path) -> bool {
    path.parent().map(Path::exists).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn stream_connection_yields_one_line_per_connection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ops.sock");

        let mut rx = listen(&path, SocketMode::Stream).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let mut stream = tokio::net::UnixStream::connect(&path).await.unwrap();
        stream.write_all(b"{\"a\":1}").await.unwrap();
        drop(stream);

        let line = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(line, "{\"a\":1}");
    }

    #[tokio::test]
    async fn datagram_yields_trimmed_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ops.sock");

        let mut rx = listen(&path, SocketMode::Datagram).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let client = UnixDatagram::unbound().unwrap();
        client.send_to(b"{\"a\":2}\n", &path).await.unwrap();

        let line = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(line, "{\"a\":2}");
    }
}
