// Copyright 2026-Present the radosgw-ops-exporter Contributors
// SPDX-License-Identifier: Apache-2.0

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::error::Error;

/// Decides whether the source log needs rotating right now — §4.6
/// "Triggered by the source when size >= max_size_mb * 2^20 (if
/// max_size_mb > 0) or age >= retention_days * 24h (if retention_days > 0)".
pub fn should_rotate(
    size_bytes: u64,
    modified: SystemTime,
    max_size_mb: u64,
    retention_days: u64,
    now: SystemTime,
) -> bool {
    if max_size_mb > 0 && size_bytes >= max_size_mb * 1024 * 1024 {
        return true;
    }
    if retention_days > 0 {
        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
        if age >= Duration::from_secs(retention_days * 24 * 3600) {
            return true;
        }
    }
    false
}

/// Performs the copy-truncate rotation described in §4.6 and spawns a
/// detached background sweep of `<dir>` for `radosgw.log.*` files older than
/// `retention_days`.
///
/// Returns `Ok(())` once the original has been truncated and is safe to
/// re-arm a watcher on. Per §4.6's failure semantics: a copy failure
/// leaves the original untouched; a truncate failure after a successful
/// copy leaves both files in place for the operator to reconcile — neither
/// case is escalated to the caller as fatal, since rotation failure must
/// not interrupt ingestion.
pub fn rotate(path: &Path, retention_days: u64) -> Result<(), Error> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let timestamp = timestamp_suffix(SystemTime::now());
    let rotated = dir.join(format!("radosgw.log.{timestamp}"));

    if let Err(e) = std::fs::copy(path, &rotated) {
        log::error!(
            "{}: rotation copy to {} failed, leaving original in place: {e}",
            path.display(),
            rotated.display()
        );
        return Ok(());
    }

    if let Err(e) = truncate(path) {
        log::error!(
            "{}: truncate after copy to {} failed, both files retained: {e}",
            path.display(),
            rotated.display()
        );
        return Ok(());
    }

    let dir = dir.to_path_buf();
    tokio::spawn(async move {
        sweep(&dir, retention_days);
    });

    Ok(())
}

fn truncate(path: &Path) -> std::io::Result<()> {
    let file = std::fs::OpenOptions::new().write(true).open(path)?;
    file.set_len(0)
}

fn timestamp_suffix(now: SystemTime) -> String {
    let datetime: chrono::DateTime<chrono::Utc> = now.into();
    datetime.format("%Y%m%d-%H%M%S").to_string()
}

/// Walks `dir` for `radosgw.log.*` files and deletes those older than
/// `retention_days` — §4.6 step 4. Deletion errors are logged and left for
/// the next rotation's sweep to retry, per §4.6's failure semantics.
fn sweep(dir: &Path, retention_days: u64) {
    if retention_days == 0 {
        return;
    }
    let max_age = Duration::from_secs(retention_days * 24 * 3600);
    let now = SystemTime::now();

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("{}: retention sweep could not list directory: {e}", dir.display());
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => continue,
        };
        if !name.starts_with("radosgw.log.") {
            continue;
        }

        let modified = match entry.metadata().and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                log::warn!("{}: could not stat rotated file: {e}", path.display());
                continue;
            }
        };
        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
        if age < max_age {
            continue;
        }

        if let Err(e) = std::fs::remove_file(&path) {
            log::warn!("{}: retention sweep failed to delete: {e}", path.display());
        }
    }
}

pub fn rotated_file_name(dir: &Path, timestamp: SystemTime) -> PathBuf {
    dir.join(format!("radosgw.log.{}", timestamp_suffix(timestamp)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn should_rotate_on_size_threshold() {
        let now = SystemTime::now();
        assert!(should_rotate(2 * 1024 * 1024, now, 1, 0, now));
        assert!(!should_rotate(512 * 1024, now, 1, 0, now));
    }

    #[test]
    fn should_rotate_on_age_threshold() {
        let now = SystemTime::now();
        let old = now - Duration::from_secs(2 * 24 * 3600);
        assert!(should_rotate(0, old, 0, 1, now));
        assert!(!should_rotate(0, now, 0, 1, now));
    }

    #[test]
    fn zero_thresholds_never_trigger() {
        let now = SystemTime::now();
        let old = now - Duration::from_secs(365 * 24 * 3600);
        assert!(!should_rotate(u64::MAX, old, 0, 0, now));
    }

    #[tokio::test]
    async fn rotate_copies_and_truncates_original() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("radosgw.log");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"{\"a\":1}\n").unwrap();
        drop(f);

        rotate(&path, 0).unwrap();

        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
        let rotated_count = std::fs::read_dir(dir.path())
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .starts_with("radosgw.log.")
            })
            .count();
        assert_eq!(rotated_count, 1);
    }

    #[tokio::test]
    async fn rotate_leaves_original_untouched_when_copy_source_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.log");
        assert!(rotate(&path, 0).is_ok());
    }
}
