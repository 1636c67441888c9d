// Copyright 2026-Present the radosgw-ops-exporter Contributors
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use prometheus::{Counter, CounterVec, Opts, Registry};

use radosgw_ops_core::config::{LatencyFamilies, MetricFamilies};
use radosgw_ops_metrics::snapshot::Snapshot;
use radosgw_ops_metrics::store::ZeroPolicy;
use radosgw_ops_metrics::{LatencySample, MetricStore};

use crate::error::Error;
use crate::histograms::Histograms;

/// One entry per storage map in §4.3's table: its Prometheus metric name
/// and the ordered label names its composite key decomposes into.
///
/// `labels` names the label set as it appears on the wire, so a map whose
/// key carries a `user$tenant` composite (§3 "Identity split") lists `user`
/// and `tenant` as two separate label names, not one — matching how
/// `histograms.rs` already decomposes the same composite. `user_tenant_key_index`
/// records where in the pipe-separated *key* (before any expansion) that
/// composite sits, so `ScrapeRegistry::add` knows which segment to split on
/// `$` before calling `get_metric_with_label_values`.
struct MapLabels {
    map_name: &'static str,
    metric_name: &'static str,
    family: fn(&MetricFamilies) -> bool,
    labels: &'static [&'static str],
    user_tenant_key_index: Option<usize>,
}

macro_rules! map_labels {
    ($map:literal, $metric:literal, $family:expr, $labels:expr) => {
        MapLabels {
            map_name: $map,
            metric_name: $metric,
            family: $family,
            labels: $labels,
            user_tenant_key_index: None,
        }
    };
}

/// Same as [`map_labels!`] but for a map whose key carries a `user$tenant`
/// composite at position `$index` — `labels` must already spell that
/// position out as two names (`"user"`, `"tenant"`) rather than one.
macro_rules! map_labels_ut {
    ($map:literal, $metric:literal, $family:expr, $labels:expr, $index:literal) => {
        MapLabels {
            map_name: $map,
            metric_name: $metric,
            family: $family,
            labels: $labels,
            user_tenant_key_index: Some($index),
        }
    };
}

const MAP_LABELS: &[MapLabels] = &[
    map_labels_ut!("RequestsDetailed", "radosgw_requests_detailed_total", |f| f.requests_detailed, &["user", "tenant", "bucket", "method", "status"], 0),
    map_labels_ut!("RequestsByUser", "radosgw_requests_by_user_total", |f| f.requests_by_user, &["user", "tenant", "bucket", "method", "status"], 0),
    map_labels_ut!("RequestsByBucket", "radosgw_requests_by_bucket_total", |f| f.requests_by_bucket, &["bucket", "user", "tenant", "method", "status"], 1),
    map_labels!("RequestsByTenant", "radosgw_requests_by_tenant_total", |f| f.requests_by_tenant, &["tenant", "method", "status"]),
    map_labels_ut!("RequestsByMethodDetailed", "radosgw_requests_by_method_detailed_total", |f| f.requests_by_method, &["user", "tenant", "bucket", "method"], 0),
    map_labels_ut!("RequestsByMethodPerUser", "radosgw_requests_by_method_per_user_total", |f| f.requests_by_method, &["user", "tenant", "method"], 0),
    map_labels!("RequestsByMethodPerBucket", "radosgw_requests_by_method_per_bucket_total", |f| f.requests_by_method, &["tenant", "bucket", "method"]),
    map_labels!("RequestsByMethodPerTenant", "radosgw_requests_by_method_per_tenant_total", |f| f.requests_by_method, &["tenant", "method"]),
    map_labels!("RequestsByMethodGlobal", "radosgw_requests_by_method_global_total", |f| f.requests_by_method, &["method"]),
    map_labels_ut!("RequestsByOperationDetailed", "radosgw_requests_by_operation_detailed_total", |f| f.requests_by_operation, &["user", "tenant", "bucket", "operation", "method"], 0),
    map_labels_ut!("RequestsByOperationPerUser", "radosgw_requests_by_operation_per_user_total", |f| f.requests_by_operation, &["user", "tenant", "operation", "method"], 0),
    map_labels!("RequestsByOperationPerBucket", "radosgw_requests_by_operation_per_bucket_total", |f| f.requests_by_operation, &["tenant", "bucket", "operation", "method"]),
    map_labels!("RequestsByOperationPerTenant", "radosgw_requests_by_operation_per_tenant_total", |f| f.requests_by_operation, &["tenant", "operation", "method"]),
    map_labels!("RequestsByOperationGlobal", "radosgw_requests_by_operation_global_total", |f| f.requests_by_operation, &["operation", "method"]),
    map_labels_ut!("RequestsByStatusDetailed", "radosgw_requests_by_status_detailed_total", |f| f.requests_by_status, &["user", "tenant", "bucket", "status"], 0),
    map_labels_ut!("RequestsByStatusPerUser", "radosgw_requests_by_status_per_user_total", |f| f.requests_by_status, &["user", "tenant", "status"], 0),
    map_labels!("RequestsByStatusPerBucket", "radosgw_requests_by_status_per_bucket_total", |f| f.requests_by_status, &["tenant", "bucket", "status"]),
    map_labels!("RequestsByStatusPerTenant", "radosgw_requests_by_status_per_tenant_total", |f| f.requests_by_status, &["tenant", "status"]),
    map_labels_ut!("BytesSentDetailed", "radosgw_bytes_sent_detailed_total", |f| f.bytes_sent, &["user", "tenant", "bucket"], 0),
    map_labels_ut!("BytesSentPerUser", "radosgw_bytes_sent_per_user_total", |f| f.bytes_sent, &["user", "tenant"], 0),
    map_labels!("BytesSentPerBucket", "radosgw_bytes_sent_per_bucket_total", |f| f.bytes_sent, &["tenant", "bucket"]),
    map_labels!("BytesSentPerTenant", "radosgw_bytes_sent_per_tenant_total", |f| f.bytes_sent, &["tenant"]),
    map_labels_ut!("BytesReceivedDetailed", "radosgw_bytes_received_detailed_total", |f| f.bytes_received, &["user", "tenant", "bucket"], 0),
    map_labels_ut!("BytesReceivedPerUser", "radosgw_bytes_received_per_user_total", |f| f.bytes_received, &["user", "tenant"], 0),
    map_labels!("BytesReceivedPerBucket", "radosgw_bytes_received_per_bucket_total", |f| f.bytes_received, &["tenant", "bucket"]),
    map_labels!("BytesReceivedPerTenant", "radosgw_bytes_received_per_tenant_total", |f| f.bytes_received, &["tenant"]),
    map_labels_ut!("ErrorsDetailed", "radosgw_errors_detailed_total", |f| f.errors, &["user", "tenant", "bucket", "status"], 0),
    map_labels_ut!("ErrorsPerUser", "radosgw_errors_per_user_total", |f| f.errors, &["user", "tenant", "status"], 0),
    map_labels!("ErrorsPerBucket", "radosgw_errors_per_bucket_total", |f| f.errors, &["tenant", "bucket", "status"]),
    map_labels!("ErrorsPerTenant", "radosgw_errors_per_tenant_total", |f| f.errors, &["tenant", "status"]),
    map_labels!("ErrorsPerStatus", "radosgw_errors_per_status_total", |f| f.errors, &["status"]),
    map_labels!("ErrorsPerIP", "radosgw_errors_per_ip_total", |f| f.errors, &["ip", "tenant", "status"]),
    map_labels_ut!("TimeoutErrors", "radosgw_timeout_errors_total", |f| f.timeout_errors, &["user", "tenant", "bucket", "timeout_type"], 0),
    map_labels!("ErrorsByCategory", "radosgw_errors_by_category_total", |f| f.errors_by_category, &["tenant", "bucket", "category", "status"]),
    map_labels_ut!("RequestsByIPDetailed", "radosgw_requests_by_ip_detailed_total", |f| f.requests_by_ip, &["user", "tenant", "ip"], 0),
    map_labels!("RequestsPerIPPerTenant", "radosgw_requests_per_ip_per_tenant_total", |f| f.requests_by_ip, &["tenant", "ip"]),
    map_labels!("RequestsByIPBucketMethodTenant", "radosgw_requests_by_ip_bucket_method_tenant_total", |f| f.requests_by_ip, &["ip", "bucket", "method", "tenant"]),
    map_labels!("RequestsPerTenantFromIP", "radosgw_requests_per_tenant_from_ip_total", |f| f.requests_by_ip, &["tenant"]),
    map_labels_ut!("BytesSentByIPDetailed", "radosgw_bytes_sent_by_ip_detailed_total", |f| f.requests_by_ip, &["user", "tenant", "ip"], 0),
    map_labels!("BytesSentPerIPPerTenant", "radosgw_bytes_sent_per_ip_per_tenant_total", |f| f.requests_by_ip, &["tenant", "ip"]),
    map_labels!("BytesSentByIPBucketMethodTenant", "radosgw_bytes_sent_by_ip_bucket_method_tenant_total", |f| f.requests_by_ip, &["ip", "bucket", "method", "tenant"]),
    map_labels!("BytesSentPerTenantFromIP", "radosgw_bytes_sent_per_tenant_from_ip_total", |f| f.requests_by_ip, &["tenant"]),
    map_labels_ut!("BytesReceivedByIPDetailed", "radosgw_bytes_received_by_ip_detailed_total", |f| f.requests_by_ip, &["user", "tenant", "ip"], 0),
    map_labels!("BytesReceivedPerIPPerTenant", "radosgw_bytes_received_per_ip_per_tenant_total", |f| f.requests_by_ip, &["tenant", "ip"]),
    map_labels!("BytesReceivedByIPBucketMethodTenant", "radosgw_bytes_received_by_ip_bucket_method_tenant_total", |f| f.requests_by_ip, &["ip", "bucket", "method", "tenant"]),
    map_labels!("BytesReceivedPerTenantFromIP", "radosgw_bytes_received_per_tenant_from_ip_total", |f| f.requests_by_ip, &["tenant"]),
];

/// A registered counter vector paired with the position (if any) of a
/// `user$tenant` composite in the storage key it is fed from, so `add` knows
/// which segment to expand into two label values before lookup.
struct RegisteredCounter {
    vec: CounterVec,
    user_tenant_key_index: Option<usize>,
}

/// Owns the scrape-format registry — §4.5. Built once at startup, never
/// lazily, per §9's "Global registry" redesign note: callers construct one
/// explicit `Registry` handle and pass it in rather than reaching for a
/// process-wide singleton.
pub struct ScrapeRegistry {
    registry: Registry,
    counters: HashMap<&'static str, RegisteredCounter>,
    histograms: Histograms,
    parse_errors: Option<Counter>,
}

impl ScrapeRegistry {
    pub fn new(
        metric_families: &MetricFamilies,
        latency_families: &LatencyFamilies,
        pod_name: &str,
        track_parse_errors: bool,
    ) -> Result<Self, Error> {
        let registry = Registry::new();
        let mut counters = HashMap::new();

        for def in MAP_LABELS.iter().filter(|def| (def.family)(metric_families)) {
            let opts = Opts::new(def.metric_name, format!("radosgw ops-log {} total", def.map_name))
                .const_label("pod", pod_name);
            let vec = CounterVec::new(opts, def.labels)?;
            registry.register(Box::new(vec.clone()))?;
            counters.insert(
                def.map_name,
                RegisteredCounter {
                    vec,
                    user_tenant_key_index: def.user_tenant_key_index,
                },
            );
        }

        let histograms = Histograms::new(&registry, latency_families)?;

        let parse_errors = if track_parse_errors {
            let opts = Opts::new("radosgw_parse_errors_total", "lines rejected with a JSON parse error")
                .const_label("pod", pod_name);
            let counter = Counter::with_opts(opts)?;
            registry.register(Box::new(counter.clone()))?;
            Some(counter)
        } else {
            None
        };

        Ok(ScrapeRegistry {
            registry,
            counters,
            histograms,
            parse_errors,
        })
    }

    /// §7(c): "parse errors... counted in a dedicated `parse_errors_total`
    /// if enabled". A no-op when `track_parse_errors` is off.
    pub fn record_parse_error(&self) {
        if let Some(counter) = &self.parse_errors {
            counter.inc();
        }
    }

    /// §4.4 step 3 / §4.5: applies one tick's delta to every enabled
    /// counter vector. `current` is consulted only for `AlwaysEmit` maps
    /// (error families), to force a zero `add` for keys whose delta elided
    /// to nothing this tick but whose label set already exists.
    pub fn apply_delta(&self, delta: &Snapshot, current: &Snapshot) {
        for (map_name, counter) in &self.counters {
            match MetricStore::map_zero_policy(map_name) {
                ZeroPolicy::ElideZero => {
                    if let Some(map) = delta.maps.get(map_name) {
                        for (key, value) in map {
                            self.add(counter, map_name, key, *value as f64);
                        }
                    }
                }
                ZeroPolicy::AlwaysEmit => {
                    if let Some(current_map) = current.maps.get(map_name) {
                        for key in current_map.keys() {
                            let value = delta
                                .maps
                                .get(map_name)
                                .and_then(|m| m.get(key))
                                .copied()
                                .unwrap_or(0);
                            self.add(counter, map_name, key, value as f64);
                        }
                    }
                }
            }
        }
    }

    /// Splits the raw pipe-separated key into label values, further
    /// expanding the `user$tenant` segment (if the map has one, per
    /// `histograms.rs`'s decomposition of the same composite) into separate
    /// `user` and `tenant` values before the vector lookup.
    fn add(&self, counter: &RegisteredCounter, map_name: &str, key: &str, value: f64) {
        let segments = key.split('|');
        let labels: Vec<&str> = match counter.user_tenant_key_index {
            Some(index) => segments
                .enumerate()
                .flat_map(|(i, segment)| {
                    if i == index {
                        let mut parts = segment.splitn(2, '$');
                        let user = parts.next().unwrap_or("");
                        let tenant = parts.next().unwrap_or("none");
                        vec![user, tenant]
                    } else {
                        vec![segment]
                    }
                })
                .collect(),
            None => segments.collect(),
        };
        match counter.vec.get_metric_with_label_values(&labels) {
            Ok(metric) => metric.inc_by(value),
            Err(e) => log::warn!("{map_name}: could not select label set for key {key:?}: {e}"),
        }
    }

    pub fn observe_latency(&self, sample: &LatencySample) {
        self.histograms.observe(sample);
    }

    pub fn inner(&self) -> &Registry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;

    fn snap(maps: &[(&'static str, &[(&str, u64)])]) -> Snapshot {
        Snapshot {
            total_requests: 0,
            bytes_sent_total: 0,
            bytes_received_total: 0,
            total_errors: 0,
            maps: maps
                .iter()
                .map(|(name, entries)| {
                    let inner: StdHashMap<String, u64> =
                        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect();
                    (*name, inner)
                })
                .collect(),
        }
    }

    #[test]
    fn apply_delta_increments_matching_counter() {
        let registry = ScrapeRegistry::new(&MetricFamilies::default(), &LatencyFamilies::default(), "pod-a", false).unwrap();
        let delta = snap(&[("RequestsByMethodGlobal", &[("GET", 3)])]);
        let current = snap(&[("RequestsByMethodGlobal", &[("GET", 3)])]);

        registry.apply_delta(&delta, &current);

        let families = registry.inner().gather();
        let family = families
            .iter()
            .find(|f| f.get_name() == "radosgw_requests_by_method_global_total")
            .unwrap();
        assert_eq!(family.get_metric()[0].get_counter().get_value(), 3.0);
    }

    #[test]
    fn user_tenant_composite_splits_into_separate_labels() {
        let registry = ScrapeRegistry::new(&MetricFamilies::default(), &LatencyFamilies::default(), "pod-a", false).unwrap();
        let delta = snap(&[("RequestsDetailed", &[("alice$acme|b1|GET|200", 1)])]);
        let current = delta.clone();

        registry.apply_delta(&delta, &current);

        let families = registry.inner().gather();
        let family = families
            .iter()
            .find(|f| f.get_name() == "radosgw_requests_detailed_total")
            .unwrap();
        let metric = &family.get_metric()[0];
        let label_map: StdHashMap<&str, &str> = metric
            .get_label()
            .iter()
            .map(|l| (l.get_name(), l.get_value()))
            .collect();

        assert_eq!(label_map.get("user"), Some(&"alice"));
        assert_eq!(label_map.get("tenant"), Some(&"acme"));
        assert_eq!(label_map.get("bucket"), Some(&"b1"));
        assert_eq!(label_map.get("method"), Some(&"GET"));
        assert_eq!(label_map.get("status"), Some(&"200"));
        assert!(!label_map.contains_key("user_tenant"));
        assert_eq!(metric.get_counter().get_value(), 1.0);
    }

    #[test]
    fn user_tenant_composite_without_dollar_falls_back_to_none_tenant() {
        let registry = ScrapeRegistry::new(&MetricFamilies::default(), &LatencyFamilies::default(), "pod-a", false).unwrap();
        let delta = snap(&[("RequestsDetailed", &[("bob|b1|GET|200", 1)])]);
        let current = delta.clone();

        registry.apply_delta(&delta, &current);

        let families = registry.inner().gather();
        let family = families
            .iter()
            .find(|f| f.get_name() == "radosgw_requests_detailed_total")
            .unwrap();
        let metric = &family.get_metric()[0];
        let label_map: StdHashMap<&str, &str> = metric
            .get_label()
            .iter()
            .map(|l| (l.get_name(), l.get_value()))
            .collect();

        assert_eq!(label_map.get("user"), Some(&"bob"));
        assert_eq!(label_map.get("tenant"), Some(&"none"));
    }

    #[test]
    fn error_family_emits_zero_for_existing_key_with_no_delta() {
        let registry = ScrapeRegistry::new(&MetricFamilies::default(), &LatencyFamilies::default(), "pod-a", false).unwrap();

        let current = snap(&[("ErrorsPerStatus", &[("500", 1)])]);
        registry.apply_delta(&current, &current);

        let next_current = snap(&[("ErrorsPerStatus", &[("500", 1)])]);
        let empty_delta = snap(&[]);
        registry.apply_delta(&empty_delta, &next_current);

        let families = registry.inner().gather();
        let family = families
            .iter()
            .find(|f| f.get_name() == "radosgw_errors_per_status_total")
            .unwrap();
        assert_eq!(family.get_metric()[0].get_counter().get_value(), 1.0);
    }

    #[test]
    fn disabled_family_has_no_counter() {
        let mut families = MetricFamilies::default();
        families.requests_by_ip = false;
        let registry = ScrapeRegistry::new(&families, &LatencyFamilies::default(), "pod-a", false).unwrap();

        let families_out = registry.inner().gather();
        assert!(!families_out
            .iter()
            .any(|f| f.get_name() == "radosgw_requests_by_ip_detailed_total"));
    }

    #[test]
    fn parse_error_counter_absent_when_disabled() {
        let registry = ScrapeRegistry::new(&MetricFamilies::default(), &LatencyFamilies::default(), "pod-a", false).unwrap();
        registry.record_parse_error();
        let families_out = registry.inner().gather();
        assert!(!families_out
            .iter()
            .any(|f| f.get_name() == "radosgw_parse_errors_total"));
    }

    #[test]
    fn parse_error_counter_increments_when_enabled() {
        let registry = ScrapeRegistry::new(&MetricFamilies::default(), &LatencyFamilies::default(), "pod-a", true).unwrap();
        registry.record_parse_error();
        registry.record_parse_error();

        let families_out = registry.inner().gather();
        let family = families_out
            .iter()
            .find(|f| f.get_name() == "radosgw_parse_errors_total")
            .unwrap();
        assert_eq!(family.get_metric()[0].get_counter().get_value(), 2.0);
    }
}
