// Copyright 2026-Present the radosgw-ops-exporter Contributors
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use dashmap::DashMap;

use radosgw_ops_core::config::MetricFamilies;
use radosgw_ops_core::OperationRecord;

use crate::latency::{noop, LatencyCallback, LatencySample};
use crate::snapshot::Snapshot;

/// Governs whether the Exporter should still call `add(0)` for a delta of
/// zero on this map — §4.5: "Zero-valued updates SHOULD still call add(0)
/// for error families... and MAY be elided for request/bytes families".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZeroPolicy {
    AlwaysEmit,
    ElideZero,
}

/// Resolved per-record context, computed once per [`MetricStore::record`]
/// call and threaded through every map's key-composition function rather
/// than recomputed per map.
struct RecordCtx<'a> {
    user_tenant: &'a str,
    tenant: &'a str,
    bucket: &'a str,
    method: &'a str,
    status: &'a str,
    ip: &'a str,
    operation: &'a str,
    is_error: bool,
    timeout_type: Option<&'static str>,
    category: &'static str,
    bytes_sent: u64,
    bytes_received: u64,
}

type Compose = fn(&RecordCtx) -> Option<(String, u64)>;

struct MapDef {
    name: &'static str,
    family: fn(&MetricFamilies) -> bool,
    zero_policy: ZeroPolicy,
    compose: Compose,
}

macro_rules! map_def {
    ($name:literal, $family:expr, $policy:expr, |$ctx:ident| $body:expr) => {
        MapDef {
            name: $name,
            family: $family,
            zero_policy: $policy,
            compose: |$ctx: &RecordCtx| -> Option<(String, u64)> { $body },
        }
    };
}

/// Timeout type classification — §4.3 "Timeout types".
fn timeout_type(status: &str) -> Option<&'static str> {
    match status {
        "408" => Some("request_timeout"),
        "504" => Some("gateway_timeout"),
        "598" => Some("network_read_timeout"),
        "499" => Some("client_closed_request"),
        _ => None,
    }
}

/// Error category classification — §4.3 "Error category".
fn error_category(status: &str, is_error: bool) -> &'static str {
    if !is_error {
        return "none";
    }
    match status {
        "408" | "504" | "598" | "499" => "timeout",
        "502" | "503" => "connection",
        s if s.starts_with('4') => "client",
        s if s.starts_with('5') => "server",
        _ => "unknown",
    }
}

const MAP_DEFS: &[MapDef] = &[
    map_def!("RequestsDetailed", |f| f.requests_detailed, ZeroPolicy::ElideZero, |c| {
        Some((format!("{}|{}|{}|{}", c.user_tenant, c.bucket, c.method, c.status), 1))
    }),
    map_def!("RequestsByUser", |f| f.requests_by_user, ZeroPolicy::ElideZero, |c| {
        Some((format!("{}|{}|{}|{}", c.user_tenant, c.bucket, c.method, c.status), 1))
    }),
    map_def!("RequestsByBucket", |f| f.requests_by_bucket, ZeroPolicy::ElideZero, |c| {
        Some((format!("{}|{}|{}|{}", c.bucket, c.user_tenant, c.method, c.status), 1))
    }),
    map_def!("RequestsByTenant", |f| f.requests_by_tenant, ZeroPolicy::ElideZero, |c| {
        Some((format!("{}|{}|{}", c.tenant, c.method, c.status), 1))
    }),
    map_def!("RequestsByMethodDetailed", |f| f.requests_by_method, ZeroPolicy::ElideZero, |c| {
        Some((format!("{}|{}|{}", c.user_tenant, c.bucket, c.method), 1))
    }),
    map_def!("RequestsByMethodPerUser", |f| f.requests_by_method, ZeroPolicy::ElideZero, |c| {
        Some((format!("{}|{}", c.user_tenant, c.method), 1))
    }),
    map_def!("RequestsByMethodPerBucket", |f| f.requests_by_method, ZeroPolicy::ElideZero, |c| {
        Some((format!("{}|{}|{}", c.tenant, c.bucket, c.method), 1))
    }),
    map_def!("RequestsByMethodPerTenant", |f| f.requests_by_method, ZeroPolicy::ElideZero, |c| {
        Some((format!("{}|{}", c.tenant, c.method), 1))
    }),
    map_def!("RequestsByMethodGlobal", |f| f.requests_by_method, ZeroPolicy::ElideZero, |c| {
        Some((c.method.to_string(), 1))
    }),
    map_def!("RequestsByOperationDetailed", |f| f.requests_by_operation, ZeroPolicy::ElideZero, |c| {
        Some((format!("{}|{}|{}|{}", c.user_tenant, c.bucket, c.operation, c.method), 1))
    }),
    map_def!("RequestsByOperationPerUser", |f| f.requests_by_operation, ZeroPolicy::ElideZero, |c| {
        Some((format!("{}|{}|{}", c.user_tenant, c.operation, c.method), 1))
    }),
    map_def!("RequestsByOperationPerBucket", |f| f.requests_by_operation, ZeroPolicy::ElideZero, |c| {
        Some((format!("{}|{}|{}|{}", c.tenant, c.bucket, c.operation, c.method), 1))
    }),
    map_def!("RequestsByOperationPerTenant", |f| f.requests_by_operation, ZeroPolicy::ElideZero, |c| {
        Some((format!("{}|{}|{}", c.tenant, c.operation, c.method), 1))
    }),
    map_def!("RequestsByOperationGlobal", |f| f.requests_by_operation, ZeroPolicy::ElideZero, |c| {
        Some((format!("{}|{}", c.operation, c.method), 1))
    }),
    map_def!("RequestsByStatusDetailed", |f| f.requests_by_status, ZeroPolicy::ElideZero, |c| {
        Some((format!("{}|{}|{}", c.user_tenant, c.bucket, c.status), 1))
    }),
    map_def!("RequestsByStatusPerUser", |f| f.requests_by_status, ZeroPolicy::ElideZero, |c| {
        Some((format!("{}|{}", c.user_tenant, c.status), 1))
    }),
    map_def!("RequestsByStatusPerBucket", |f| f.requests_by_status, ZeroPolicy::ElideZero, |c| {
        Some((format!("{}|{}|{}", c.tenant, c.bucket, c.status), 1))
    }),
    map_def!("RequestsByStatusPerTenant", |f| f.requests_by_status, ZeroPolicy::ElideZero, |c| {
        Some((format!("{}|{}", c.tenant, c.status), 1))
    }),
    map_def!("BytesSentDetailed", |f| f.bytes_sent, ZeroPolicy::ElideZero, |c| {
        Some((format!("{}|{}", c.user_tenant, c.bucket), c.bytes_sent))
    }),
    map_def!("BytesSentPerUser", |f| f.bytes_sent, ZeroPolicy::ElideZero, |c| {
        Some((c.user_tenant.to_string(), c.bytes_sent))
    }),
    map_def!("BytesSentPerBucket", |f| f.bytes_sent, ZeroPolicy::ElideZero, |c| {
        Some((format!("{}|{}", c.tenant, c.bucket), c.bytes_sent))
    }),
    map_def!("BytesSentPerTenant", |f| f.bytes_sent, ZeroPolicy::ElideZero, |c| {
        Some((c.tenant.to_string(), c.bytes_sent))
    }),
    map_def!("BytesReceivedDetailed", |f| f.bytes_received, ZeroPolicy::ElideZero, |c| {
        Some((format!("{}|{}", c.user_tenant, c.bucket), c.bytes_received))
    }),
    map_def!("BytesReceivedPerUser", |f| f.bytes_received, ZeroPolicy::ElideZero, |c| {
        Some((c.user_tenant.to_string(), c.bytes_received))
    }),
    map_def!("BytesReceivedPerBucket", |f| f.bytes_received, ZeroPolicy::ElideZero, |c| {
        Some((format!("{}|{}", c.tenant, c.bucket), c.bytes_received))
    }),
    map_def!("BytesReceivedPerTenant", |f| f.bytes_received, ZeroPolicy::ElideZero, |c| {
        Some((c.tenant.to_string(), c.bytes_received))
    }),
    map_def!("ErrorsDetailed", |f| f.errors, ZeroPolicy::AlwaysEmit, |c| {
        c.is_error.then(|| (format!("{}|{}|{}", c.user_tenant, c.bucket, c.status), 1))
    }),
    map_def!("ErrorsPerUser", |f| f.errors, ZeroPolicy::AlwaysEmit, |c| {
        c.is_error.then(|| (format!("{}|{}", c.user_tenant, c.status), 1))
    }),
    map_def!("ErrorsPerBucket", |f| f.errors, ZeroPolicy::AlwaysEmit, |c| {
        c.is_error.then(|| (format!("{}|{}|{}", c.tenant, c.bucket, c.status), 1))
    }),
    map_def!("ErrorsPerTenant", |f| f.errors, ZeroPolicy::AlwaysEmit, |c| {
        c.is_error.then(|| (format!("{}|{}", c.tenant, c.status), 1))
    }),
    map_def!("ErrorsPerStatus", |f| f.errors, ZeroPolicy::AlwaysEmit, |c| {
        c.is_error.then(|| (c.status.to_string(), 1))
    }),
    map_def!("ErrorsPerIP", |f| f.errors, ZeroPolicy::AlwaysEmit, |c| {
        c.is_error.then(|| (format!("{}|{}|{}", c.ip, c.tenant, c.status), 1))
    }),
    map_def!("TimeoutErrors", |f| f.timeout_errors, ZeroPolicy::AlwaysEmit, |c| {
        c.timeout_type
            .map(|t| (format!("{}|{}|{}", c.user_tenant, c.bucket, t), 1))
    }),
    map_def!("ErrorsByCategory", |f| f.errors_by_category, ZeroPolicy::AlwaysEmit, |c| {
        c.is_error
            .then(|| (format!("{}|{}|{}|{}", c.tenant, c.bucket, c.category, c.status), 1))
    }),
    map_def!("RequestsByIPDetailed", |f| f.requests_by_ip, ZeroPolicy::ElideZero, |c| {
        Some((format!("{}|{}", c.user_tenant, c.ip), 1))
    }),
    map_def!("RequestsPerIPPerTenant", |f| f.requests_by_ip, ZeroPolicy::ElideZero, |c| {
        Some((format!("{}|{}", c.tenant, c.ip), 1))
    }),
    map_def!("RequestsByIPBucketMethodTenant", |f| f.requests_by_ip, ZeroPolicy::ElideZero, |c| {
        Some((format!("{}|{}|{}|{}", c.ip, c.bucket, c.method, c.tenant), 1))
    }),
    map_def!("RequestsPerTenantFromIP", |f| f.requests_by_ip, ZeroPolicy::ElideZero, |c| {
        Some((c.tenant.to_string(), 1))
    }),
    map_def!("BytesSentByIPDetailed", |f| f.requests_by_ip, ZeroPolicy::ElideZero, |c| {
        Some((format!("{}|{}", c.user_tenant, c.ip), c.bytes_sent))
    }),
    map_def!("BytesSentPerIPPerTenant", |f| f.requests_by_ip, ZeroPolicy::ElideZero, |c| {
        Some((format!("{}|{}", c.tenant, c.ip), c.bytes_sent))
    }),
    map_def!("BytesSentByIPBucketMethodTenant", |f| f.requests_by_ip, ZeroPolicy::ElideZero, |c| {
        Some((format!("{}|{}|{}|{}", c.ip, c.bucket, c.method, c.tenant), c.bytes_sent))
    }),
    map_def!("BytesSentPerTenantFromIP", |f| f.requests_by_ip, ZeroPolicy::ElideZero, |c| {
        Some((c.tenant.to_string(), c.bytes_sent))
    }),
    map_def!("BytesReceivedByIPDetailed", |f| f.requests_by_ip, ZeroPolicy::ElideZero, |c| {
        Some((format!("{}|{}", c.user_tenant, c.ip), c.bytes_received))
    }),
    map_def!("BytesReceivedPerIPPerTenant", |f| f.requests_by_ip, ZeroPolicy::ElideZero, |c| {
        Some((format!("{}|{}", c.tenant, c.ip), c.bytes_received))
    }),
    map_def!("BytesReceivedByIPBucketMethodTenant", |f| f.requests_by_ip, ZeroPolicy::ElideZero, |c| {
        Some((format!("{}|{}|{}|{}", c.ip, c.bucket, c.method, c.tenant), c.bytes_received))
    }),
    map_def!("BytesReceivedPerTenantFromIP", |f| f.requests_by_ip, ZeroPolicy::ElideZero, |c| {
        Some((c.tenant.to_string(), c.bytes_received))
    }),
];

/// The Metric Store — §4.3. Each live map is a `DashMap<String, AtomicU64>`;
/// `DashMap::entry().or_insert_with()` gives the "CAS on first insert,
/// second writer adds into the winner" discipline directly, with the shard
/// lock held only for the instant of insertion.
pub struct MetricStore {
    maps: HashMap<&'static str, DashMap<String, AtomicU64>>,
    total_requests: AtomicU64,
    bytes_sent_total: AtomicU64,
    bytes_received_total: AtomicU64,
    total_errors: AtomicU64,
    max_keys_per_map: usize,
    latency: ArcSwap<dyn Fn(LatencySample) + Send + Sync>,
}

impl MetricStore {
    pub fn new(families: &MetricFamilies, max_keys_per_map: usize) -> Self {
        let maps = MAP_DEFS
            .iter()
            .filter(|def| (def.family)(families))
            .map(|def| (def.name, DashMap::new()))
            .collect();

        MetricStore {
            maps,
            total_requests: AtomicU64::new(0),
            bytes_sent_total: AtomicU64::new(0),
            bytes_received_total: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            max_keys_per_map,
            latency: ArcSwap::from_pointee(noop()),
        }
    }

    /// Installs the latency-observation callback, called once at startup by
    /// the Exporter after it knows which histogram families are enabled.
    pub fn set_latency_callback(&self, callback: LatencyCallback) {
        self.latency.store(callback);
    }

    /// Every storage map name that is currently live, for diagnostics and
    /// for the Exporter to iterate when composing a scrape registry.
    pub fn live_map_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.maps.keys().copied()
    }

    /// Per-map key count, exposed for monitoring per §5 "Implementations
    /// SHOULD expose per-map cardinality".
    pub fn cardinality(&self) -> HashMap<&'static str, usize> {
        self.maps.iter().map(|(name, map)| (*name, map.len())).collect()
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    /// Applies one [`OperationRecord`]'s effect to every live map and the
    /// four atomic scalars — §4.3, §4.4. Per §5's ordering rule, the
    /// latency callback fires before this record's counters are
    /// incremented.
    pub fn record(&self, record: &OperationRecord) {
        if record.total_time > 0 {
            let (user, tenant) = record.identity();
            let sample = LatencySample {
                user: user.to_string(),
                tenant: tenant.to_string(),
                bucket: record.normalized_bucket().to_string(),
                method: record.method().to_string(),
                seconds: record.total_time as f64 / 1000.0,
            };
            (self.latency.load())(sample);
        }

        let user_tenant = record.user_tenant_key();
        let method = record.method().to_string();
        let is_error = record.is_error();
        let status = record.http_status.as_str();

        let ctx = RecordCtx {
            user_tenant: &user_tenant,
            tenant: record.identity().1,
            bucket: record.normalized_bucket(),
            method: &method,
            status,
            ip: &record.remote_addr,
            operation: &record.operation,
            is_error,
            timeout_type: timeout_type(status),
            category: error_category(status, is_error),
            bytes_sent: record.bytes_sent,
            bytes_received: record.bytes_received,
        };

        for def in MAP_DEFS {
            let map = match self.maps.get(def.name) {
                Some(map) => map,
                None => continue,
            };
            if let Some((key, delta)) = (def.compose)(&ctx) {
                self.bump(map, key, delta);
            }
        }

        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent_total
            .fetch_add(record.bytes_sent, Ordering::Relaxed);
        self.bytes_received_total
            .fetch_add(record.bytes_received, Ordering::Relaxed);
        if is_error {
            self.total_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn bump(&self, map: &DashMap<String, AtomicU64>, key: String, delta: u64) {
        if delta == 0 {
            return;
        }
        if let Some(counter) = map.get(&key) {
            counter.fetch_add(delta, Ordering::Relaxed);
            return;
        }
        if self.max_keys_per_map > 0 && map.len() >= self.max_keys_per_map {
            log::debug!("cardinality cap ({}) reached, dropping new key", self.max_keys_per_map);
            return;
        }
        map.entry(key)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(delta, Ordering::Relaxed);
    }

    /// Clones every atomic scalar and every live map at an instant — §3
    /// "Snapshot", §4.4 step 1.
    pub fn snapshot(&self) -> Snapshot {
        let maps = self
            .maps
            .iter()
            .map(|(name, map)| {
                let cloned: HashMap<String, u64> = map
                    .iter()
                    .map(|entry| (entry.key().clone(), entry.value().load(Ordering::Relaxed)))
                    .collect();
                (*name, cloned)
            })
            .collect();

        Snapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            bytes_sent_total: self.bytes_sent_total.load(Ordering::Relaxed),
            bytes_received_total: self.bytes_received_total.load(Ordering::Relaxed),
            total_errors: self.total_errors.load(Ordering::Relaxed),
            maps,
        }
    }

    pub fn map_zero_policy(name: &str) -> ZeroPolicy {
        MAP_DEFS
            .iter()
            .find(|def| def.name == name)
            .map(|def| def.zero_policy)
            .unwrap_or(ZeroPolicy::ElideZero)
    }

    pub fn map_names() -> impl Iterator<Item = &'static str> {
        MAP_DEFS.iter().map(|def| def.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radosgw_ops_core::OperationRecord;

    fn record(user: &str, bucket: &str, status: &str, bytes_sent: u64) -> OperationRecord {
        OperationRecord {
            user: user.to_string(),
            bucket: bucket.to_string(),
            uri: "GET /b/k HTTP/1.1".to_string(),
            http_status: status.to_string(),
            bytes_sent,
            total_time: 150,
            ..Default::default()
        }
    }

    #[test]
    fn request_counters_increment_across_enabled_maps() {
        let store = MetricStore::new(&MetricFamilies::default(), 0);
        store.record(&record("alice$acme", "acme/b1", "200", 100));

        assert_eq!(store.total_requests(), 1);
        let snap = store.snapshot();
        assert_eq!(snap.maps["RequestsDetailed"]["alice$acme|b1|GET|200"], 1);
        assert_eq!(snap.maps["RequestsByMethodGlobal"]["GET"], 1);
        assert_eq!(snap.maps["BytesSentPerTenant"]["acme"], 100);
    }

    #[test]
    fn error_maps_only_populate_on_error_status() {
        let store = MetricStore::new(&MetricFamilies::default(), 0);
        store.record(&record("alice$acme", "acme/b1", "200", 10));
        store.record(&record("alice$acme", "acme/b1", "500", 10));

        let snap = store.snapshot();
        assert_eq!(snap.total_errors, 1);
        assert_eq!(snap.maps["ErrorsPerStatus"]["500"], 1);
        assert!(!snap.maps["ErrorsPerStatus"].contains_key("200"));
    }

    #[test]
    fn timeout_errors_classify_by_status() {
        let store = MetricStore::new(&MetricFamilies::default(), 0);
        store.record(&record("alice$acme", "acme/b1", "504", 0));

        let snap = store.snapshot();
        let key = "alice$acme|b1|gateway_timeout";
        assert_eq!(snap.maps["TimeoutErrors"][key], 1);
    }

    #[test]
    fn disabled_family_produces_no_map() {
        let mut families = MetricFamilies::default();
        families.requests_by_ip = false;
        let store = MetricStore::new(&families, 0);
        store.record(&record("alice$acme", "acme/b1", "200", 10));

        let snap = store.snapshot();
        assert!(!snap.maps.contains_key("RequestsByIPDetailed"));
    }

    #[test]
    fn cardinality_cap_drops_new_keys_but_keeps_existing_live() {
        let store = MetricStore::new(&MetricFamilies::default(), 1);
        store.record(&record("alice$acme", "acme/b1", "200", 0));
        store.record(&record("bob$acme", "acme/b1", "200", 0));

        let snap = store.snapshot();
        assert_eq!(snap.maps["RequestsByMethodGlobal"].len(), 1);
        assert_eq!(snap.maps["RequestsByMethodGlobal"]["GET"], 2);
    }

    #[test]
    fn second_writer_adds_into_first_writers_key() {
        let store = MetricStore::new(&MetricFamilies::default(), 0);
        for _ in 0..5 {
            store.record(&record("alice$acme", "acme/b1", "200", 1));
        }
        let snap = store.snapshot();
        assert_eq!(snap.maps["RequestsByMethodGlobal"]["GET"], 5);
    }

    #[test]
    fn latency_callback_fires_only_when_total_time_positive() {
        let store = MetricStore::new(&MetricFamilies::default(), 0);
        let seen = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let seen2 = seen.clone();
        store.set_latency_callback(std::sync::Arc::new(move |_s| {
            seen2.fetch_add(1, Ordering::Relaxed);
        }));

        let mut no_latency = record("alice$acme", "acme/b1", "200", 0);
        no_latency.total_time = 0;
        store.record(&no_latency);
        assert_eq!(seen.load(Ordering::Relaxed), 0);

        store.record(&record("alice$acme", "acme/b1", "200", 0));
        assert_eq!(seen.load(Ordering::Relaxed), 1);
    }
}
