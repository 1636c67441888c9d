// Copyright 2026-Present the radosgw-ops-exporter Contributors
// SPDX-License-Identifier: Apache-2.0

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::error::Error;

/// Coalescing window applied to raw filesystem events before a tick is
/// handed to the caller — §4.1 "debounced (coalesced over a short window,
/// nominally ~100ms) so that a burst of writes yields one tail pass".
const DEBOUNCE: Duration = Duration::from_millis(100);

/// A single debounced notification that `path` has new data (or was
/// otherwise touched — rotation, truncation) and should be polled.
#[derive(Debug, Clone)]
pub struct WatchEvent {
    pub path: PathBuf,
}

/// Installs a filesystem watch on `path`'s parent directory and returns a
/// channel of debounced [`WatchEvent`]s.
///
/// Watching the parent directory rather than the file itself is deliberate:
/// a copy-truncate rotation (§4.6) unlinks and recreates the path, and most
/// platform backends silently drop a watch on a file once it is removed.
/// The returned watcher value must be kept alive for the channel to keep
/// producing events; dropping it tears the watch down.
pub fn watch(path: impl AsRef<Path>) -> Result<(RecommendedWatcher, mpsc::Receiver<WatchEvent>), Error> {
    let path = path.as_ref().to_path_buf();
    let watch_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let (raw_tx, mut raw_rx) = mpsc::unbounded_channel();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                let _ = raw_tx.send(event);
            }
        },
        Config::default(),
    )?;
    watcher.watch(&watch_dir, RecursiveMode::NonRecursive)?;

    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(async move {
        loop {
            let event = match raw_rx.recv().await {
                Some(event) => event,
                None => break,
            };
            if !touches(&event, &path) {
                continue;
            }

            // Drain anything else that arrives within the debounce window
            // so a burst of writes collapses into one tick.
            tokio::time::sleep(DEBOUNCE).await;
            while raw_rx.try_recv().is_ok() {}

            if tx.send(WatchEvent { path: path.clone() }).await.is_err() {
                break;
            }
        }
    });

    Ok((watcher, rx))
}

fn touches(event: &notify::Event, path: &Path) -> bool {
    event.paths.iter().any(|p| p == path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    #[tokio::test]
    async fn fires_on_write_to_watched_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ops.log");
        std::fs::write(&path, b"").unwrap();

        let (_watcher, mut rx) = watch(&path).unwrap();

        std::fs::write(&path, b"{\"a\":1}\n").unwrap();

        let event = tokio::time::timeout(StdDuration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for watch event")
            .expect("channel closed");
        assert_eq!(event.path, path);
    }

    #[tokio::test]
    async fn ignores_events_for_unrelated_files_in_same_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ops.log");
        let unrelated = dir.path().join("other.log");
        std::fs::write(&path, b"").unwrap();

        let (_watcher, mut rx) = watch(&path).unwrap();

        std::fs::write(&unrelated, b"noise").unwrap();

        let result = tokio::time::timeout(StdDuration::from_millis(500), rx.recv()).await;
        assert!(result.is_err(), "expected no event for unrelated file");
    }
}
