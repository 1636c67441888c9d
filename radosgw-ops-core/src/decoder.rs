// Copyright 2026-Present the radosgw-ops-exporter Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::error::Error;
use crate::record::OperationRecord;

/// Parses one raw log line into a validated [`OperationRecord`] — §4.2.
///
/// Returns `Ok(None)` for a line that parsed but was filtered (empty status,
/// or `ignore_anonymous` configured and `user == "anonymous"`), and
/// `Err` only for a JSON parse failure — callers distinguish the two for
/// logging (`trace!`) without the distinction affecting any counted metric.
pub fn decode(line: &str, ignore_anonymous: bool) -> Result<Option<OperationRecord>, Error> {
    let record: OperationRecord = serde_json::from_str(line)?;

    if record.http_status.is_empty() {
        return Ok(None);
    }

    if ignore_anonymous && record.user == "anonymous" {
        return Ok(None);
    }

    Ok(Some(record))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_skipped_for_empty_status() {
        let result = decode("{}", false).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn malformed_json_is_an_error() {
        let result = decode("not json", false);
        assert!(result.is_err());
    }

    #[test]
    fn anonymous_user_is_skipped_when_configured() {
        let line = r#"{"user":"anonymous","http_status":"200"}"#;
        assert!(decode(line, true).unwrap().is_none());
        let record = decode(line, false).unwrap().unwrap();
        assert_eq!(record.user, "anonymous");
    }

    #[test]
    fn valid_record_is_decoded_and_normalized() {
        let line = r#"{"user":"alice$acme","bucket":"acme/b1","uri":"GET /b1/k HTTP/1.1","http_status":"200","bytes_sent":100,"total_time":150}"#;
        let record = decode(line, false).unwrap().unwrap();
        assert_eq!(record.identity(), ("alice", "acme"));
        assert_eq!(record.normalized_bucket(), "b1");
        assert_eq!(record.bytes_sent, 100);
        assert_eq!(record.total_time, 150);
    }
}
