// Copyright 2026-Present the radosgw-ops-exporter Contributors
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::identity;
use crate::method::{extract_method, Method};

/// One decoded line from the RadosGW operations log — §3.
///
/// Every field defaults to the zero value of its type when absent from the
/// source JSON, per the invariant in §3.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub remote_addr: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub operation: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default, rename = "http_status")]
    pub http_status: String,
    #[serde(default)]
    pub error_code: String,
    #[serde(default)]
    pub bytes_sent: u64,
    #[serde(default)]
    pub bytes_received: u64,
    #[serde(default)]
    pub object_size: u64,
    #[serde(default)]
    pub total_time: u64,
    #[serde(default)]
    pub user_agent: String,
    #[serde(default)]
    pub referrer: String,
    #[serde(default)]
    pub trans_id: String,
    #[serde(default)]
    pub authentication_type: String,
    #[serde(default)]
    pub access_key_id: String,
    #[serde(default)]
    pub temp_url: bool,
}

impl OperationRecord {
    /// Splits the raw `user` field into `(user, tenant)` — §3 "Identity split".
    ///
    /// `"alice$acme"` -> `("alice", "acme")`; `"bob"` -> `("bob", "none")`.
    pub fn identity(&self) -> (&str, &str) {
        identity::split(&self.user)
    }

    /// The `user$tenant` composite used as a key segment in most storage maps.
    pub fn user_tenant_key(&self) -> String {
        let (user, tenant) = self.identity();
        format!("{user}${tenant}")
    }

    /// Bucket name after normalization — §3: keep the segment after the last
    /// `/`, stripping any tenant/user prefix the gateway may have added.
    pub fn normalized_bucket(&self) -> &str {
        normalize_bucket(&self.bucket)
    }

    /// The HTTP method extracted from the request line — §4.2.
    pub fn method(&self) -> Method {
        extract_method(&self.uri)
    }

    /// `true` when the status does not start with `2` — used by every
    /// Errors* map in §4.3.
    pub fn is_error(&self) -> bool {
        !self.http_status.starts_with('2')
    }
}

/// Keeps the segment after the last `/` in a bucket name — `"acme/b1"` -> `"b1"`.
pub fn normalize_bucket(bucket: &str) -> &str {
    match bucket.rfind('/') {
        Some(idx) => &bucket[idx + 1..],
        None => bucket,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_splits_on_dollar() {
        let mut rec = OperationRecord::default();
        rec.user = "carol$dev".to_string();
        assert_eq!(rec.identity(), ("carol", "dev"));
    }

    #[test]
    fn identity_defaults_tenant_to_none() {
        let mut rec = OperationRecord::default();
        rec.user = "bob".to_string();
        assert_eq!(rec.identity(), ("bob", "none"));
    }

    #[test]
    fn bucket_normalization_strips_prefix() {
        assert_eq!(normalize_bucket("acme/b1"), "b1");
        assert_eq!(normalize_bucket("b1"), "b1");
        assert_eq!(normalize_bucket("a/b/c"), "c");
    }

    #[test]
    fn empty_record_has_unknown_method_and_empty_status() {
        let rec: OperationRecord = serde_json::from_str("{}").unwrap();
        assert_eq!(rec.method(), Method::Unknown);
        assert_eq!(rec.http_status, "");
    }

    #[test]
    fn is_error_checks_leading_digit() {
        let mut rec = OperationRecord::default();
        rec.http_status = "200".to_string();
        assert!(!rec.is_error());
        rec.http_status = "404".to_string();
        assert!(rec.is_error());
    }
}
