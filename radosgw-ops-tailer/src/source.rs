// Copyright 2026-Present the radosgw-ops-exporter Contributors
// SPDX-License-Identifier: Apache-2.0

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::Error;

/// Buffered-reader floor mandated by §4.1 ("a buffered reader sized at >=64
/// KiB"). Used as the read chunk size per poll, not a hard cap — a single
/// poll may still return fewer or more complete lines depending on how much
/// was appended since the last event.
const MIN_READ_CHUNK: usize = 64 * 1024;

/// Caps how many bytes of an in-progress (no trailing newline) line are
/// carried forward between polls, so a file that never produces a newline
/// cannot grow this buffer without bound.
const MAX_PARTIAL_BYTES: usize = 8 * 1024 * 1024;

/// The file-tailing state machine described in §4.1.
///
/// One `LogSource` owns exactly one path and exactly one byte offset. It is
/// not `Clone` — T-src is its sole owner and caller per §5.
pub struct LogSource {
    path: PathBuf,
    offset: u64,
    partial: String,
}

/// Outcome of a single [`LogSource::poll`] call.
#[derive(Debug, Default)]
pub struct PollResult {
    /// Complete, validated (`{`...`}`) lines read this poll, in file order.
    pub lines: Vec<String>,
    /// `true` if this poll observed the file shrink and reset the offset —
    /// the "informational signal" named in §4.1.
    pub truncated: bool,
}

impl LogSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        LogSource {
            path: path.into(),
            offset: 0,
            partial: String::new(),
        }
    }

    pub fn with_offset(path: impl Into<PathBuf>, offset: u64) -> Self {
        LogSource {
            path: path.into(),
            offset,
            partial: String::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Resets the offset to zero, e.g. after an explicit startup rotation
    /// (§4.1 "Optional startup rotation") or an out-of-band rotation (§4.6
    /// step 3, "re-arm the watcher on the (now empty) original path").
    pub fn reset(&mut self) {
        self.offset = 0;
        self.partial.clear();
    }

    /// Reads forward from the last-known offset to end-of-file, per §4.1.
    ///
    /// A missing file is not an error — §4.6 notes this is expected right
    /// after rotation — and simply yields no lines. I/O errors while
    /// reading are reported to the caller for logging; the offset already
    /// advanced by whatever was successfully read is preserved so the next
    /// call resumes from there (§4.1 "Failure semantics").
    pub fn poll(&mut self) -> Result<PollResult, Error> {
        let metadata = match std::fs::metadata(&self.path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(PollResult::default())
            }
            Err(e) => {
                return Err(Error::Io {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };

        let size = metadata.len();
        let mut truncated = false;

        if size < self.offset {
            log::info!(
                "{}: file shrank from {} to {} bytes, resetting offset",
                self.path.display(),
                self.offset,
                size
            );
            self.offset = 0;
            self.partial.clear();
            truncated = true;
        }

        if size == self.offset {
            return Ok(PollResult {
                lines: Vec::new(),
                truncated,
            });
        }

        let lines = self.read_forward()?;
        Ok(PollResult { lines, truncated })
    }

    fn read_forward(&mut self) -> Result<Vec<String>, Error> {
        let mut file = File::open(&self.path).map_err(|e| Error::Io {
            path: self.path.clone(),
            source: e,
        })?;
        file.seek(SeekFrom::Start(self.offset))
            .map_err(|e| Error::Io {
                path: self.path.clone(),
                source: e,
            })?;

        let mut buf = Vec::new();
        let mut chunk = vec![0u8; MIN_READ_CHUNK];
        loop {
            let n = file.read(&mut chunk).map_err(|e| Error::Io {
                path: self.path.clone(),
                source: e,
            })?;
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            self.offset += n as u64;
        }

        if buf.is_empty() {
            return Ok(Vec::new());
        }

        self.partial.push_str(&String::from_utf8_lossy(&buf));

        if self.partial.len() > MAX_PARTIAL_BYTES {
            log::warn!(
                "{}: partial line buffer exceeded {} bytes, discarding fragment",
                self.path.display(),
                MAX_PARTIAL_BYTES
            );
            self.partial.clear();
            return Ok(Vec::new());
        }

        let complete = match self.partial.rfind('\n') {
            Some(idx) => {
                let complete = self.partial[..idx].to_string();
                self.partial = self.partial[idx + 1..].to_string();
                complete
            }
            None => return Ok(Vec::new()),
        };

        Ok(complete
            .lines()
            .map(str::trim)
            .filter(|line| is_valid_line(line))
            .map(str::to_string)
            .collect())
    }
}

/// §4.1: "validates that each line begins with `{` and ends with `}`".
fn is_valid_line(line: &str) -> bool {
    line.starts_with('{') && line.ends_with('}')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_path() -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!(
            "radosgw-ops-tailer-test-{}-{}",
            std::process::id(),
            uniq()
        ));
        p
    }

    fn uniq() -> u64 {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        COUNTER.fetch_add(1, Ordering::Relaxed)
    }

    #[test]
    fn reads_lines_appended_after_last_offset() {
        let path = temp_path();
        std::fs::write(&path, b"{\"a\":1}\n{\"a\":2}\n").unwrap();

        let mut source = LogSource::new(&path);
        let result = source.poll().unwrap();
        assert_eq!(result.lines, vec!["{\"a\":1}", "{\"a\":2}"]);
        assert!(!result.truncated);

        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(f, "{{\"a\":3}}").unwrap();

        let result = source.poll().unwrap();
        assert_eq!(result.lines, vec!["{\"a\":3}"]);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn truncation_resets_offset_to_zero() {
        let path = temp_path();
        std::fs::write(&path, b"{\"a\":1}\n{\"a\":2}\n").unwrap();

        let mut source = LogSource::new(&path);
        source.poll().unwrap();
        assert!(source.offset() > 0);

        std::fs::write(&path, b"{\"a\":3}\n").unwrap();
        let result = source.poll().unwrap();
        assert!(result.truncated);
        assert_eq!(result.lines, vec!["{\"a\":3}"]);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_file_yields_no_lines_and_no_error() {
        let path = temp_path();
        let mut source = LogSource::new(&path);
        let result = source.poll().unwrap();
        assert!(result.lines.is_empty());
    }

    #[test]
    fn invalid_lines_are_skipped() {
        let path = temp_path();
        std::fs::write(&path, b"not json\n{\"a\":1}\n{missing close bracket\n").unwrap();

        let mut source = LogSource::new(&path);
        let result = source.poll().unwrap();
        assert_eq!(result.lines, vec!["{\"a\":1}"]);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn partial_line_without_trailing_newline_is_carried_forward() {
        let path = temp_path();
        std::fs::write(&path, b"{\"a\":1}\n{\"a\":2").unwrap();

        let mut source = LogSource::new(&path);
        let result = source.poll().unwrap();
        assert_eq!(result.lines, vec!["{\"a\":1}"]);

        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(f, "}}").unwrap();

        let result = source.poll().unwrap();
        assert_eq!(result.lines, vec!["{\"a\":2}"]);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn empty_object_line_is_accepted_by_brace_validation() {
        let path = temp_path();
        std::fs::write(&path, b"{}\n").unwrap();
        let mut source = LogSource::new(&path);
        let result = source.poll().unwrap();
        assert_eq!(result.lines, vec!["{}"]);
        std::fs::remove_file(&path).ok();
    }
}
