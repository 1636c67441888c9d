// Copyright 2026-Present the radosgw-ops-exporter Contributors
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

/// Every field enumerated in §6. Plain data — no IO, no env parsing.
/// The agent binary is responsible for populating this from a file or
/// defaults; the core/tailer/metrics/export crates only ever read it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_file_path: Option<String>,
    pub socket_path: Option<String>,

    pub truncate_log_on_start: bool,
    pub log_retention_days: i64,
    pub max_log_file_size_mb: i64,

    pub scrape_enable: bool,
    pub scrape_port: u16,
    pub scrape_interval_seconds: u64,

    pub bus_enable: bool,
    pub bus_url: Option<String>,
    pub raw_subject: Option<String>,
    pub metrics_subject: Option<String>,

    pub log_to_stdout: bool,
    pub pretty_print: bool,
    pub ignore_anonymous: bool,
    pub pod_name: String,

    pub metric_families: MetricFamilies,
    pub latency_families: LatencyFamilies,
    pub track_everything: bool,

    pub track_parse_errors: bool,
    pub max_keys_per_map: usize,

    pub audit: AuditConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_file_path: None,
            socket_path: None,

            truncate_log_on_start: false,
            log_retention_days: 7,
            max_log_file_size_mb: 256,

            scrape_enable: true,
            scrape_port: 9242,
            scrape_interval_seconds: 60,

            bus_enable: false,
            bus_url: None,
            raw_subject: None,
            metrics_subject: None,

            log_to_stdout: true,
            pretty_print: false,
            ignore_anonymous: false,
            pod_name: "radosgw-ops-exporter".to_string(),

            metric_families: MetricFamilies::default(),
            latency_families: LatencyFamilies::default(),
            track_everything: false,

            track_parse_errors: false,
            max_keys_per_map: 0,

            audit: AuditConfig::default(),
        }
    }
}

impl Config {
    /// Applies `track_everything`: the shortcut that enables every *detailed*
    /// family (§6). Called once after deserializing a configuration file.
    pub fn apply_shortcuts(&mut self) {
        if self.track_everything {
            self.metric_families.enable_all_detailed();
            self.latency_families = LatencyFamilies::all_enabled();
        }
    }
}

/// One boolean per storage map named in §4.3's table. Grouped by dimension
/// rather than spelled out per exact map name, since most maps share an
/// enable flag with their aggregated siblings (the table's "Detailed" /
/// "PerUser" / "PerBucket" / "PerTenant" / "Global" variants of the same
/// dimension are controlled together) — operators who want finer control
/// can still disable a whole dimension to drop its detailed map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricFamilies {
    pub requests_detailed: bool,
    pub requests_by_user: bool,
    pub requests_by_bucket: bool,
    pub requests_by_tenant: bool,
    pub requests_by_method: bool,
    pub requests_by_operation: bool,
    pub requests_by_status: bool,
    pub bytes_sent: bool,
    pub bytes_received: bool,
    pub errors: bool,
    pub timeout_errors: bool,
    pub errors_by_category: bool,
    pub requests_by_ip: bool,
}

impl Default for MetricFamilies {
    fn default() -> Self {
        MetricFamilies {
            requests_detailed: true,
            requests_by_user: true,
            requests_by_bucket: true,
            requests_by_tenant: true,
            requests_by_method: true,
            requests_by_operation: true,
            requests_by_status: true,
            bytes_sent: true,
            bytes_received: true,
            errors: true,
            timeout_errors: true,
            errors_by_category: true,
            requests_by_ip: false,
        }
    }
}

impl MetricFamilies {
    pub fn enable_all_detailed(&mut self) {
        *self = MetricFamilies {
            requests_detailed: true,
            requests_by_user: true,
            requests_by_bucket: true,
            requests_by_tenant: true,
            requests_by_method: true,
            requests_by_operation: true,
            requests_by_status: true,
            bytes_sent: true,
            bytes_received: true,
            errors: true,
            timeout_errors: true,
            errors_by_category: true,
            requests_by_ip: true,
        };
    }
}

/// One boolean per latency-histogram family named in §4.5.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LatencyFamilies {
    pub detailed: bool,
    pub per_user: bool,
    pub per_bucket: bool,
    pub per_bucket_and_method: bool,
    pub per_tenant: bool,
    pub per_method: bool,
}

impl Default for LatencyFamilies {
    fn default() -> Self {
        LatencyFamilies {
            detailed: true,
            per_user: false,
            per_bucket: false,
            per_bucket_and_method: false,
            per_tenant: false,
            per_method: true,
        }
    }
}

impl LatencyFamilies {
    pub fn all_enabled() -> Self {
        LatencyFamilies {
            detailed: true,
            per_user: true,
            per_bucket: true,
            per_bucket_and_method: true,
            per_tenant: true,
            per_method: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub enabled: bool,
    pub url: Option<String>,
    pub queue: Option<String>,
    pub buffer_size: usize,
    pub debug: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        AuditConfig {
            enabled: false,
            url: None,
            queue: None,
            buffer_size: 20,
            debug: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.scrape_interval_seconds, 60);
        assert_eq!(cfg.audit.buffer_size, 20);
        assert!(cfg.scrape_enable);
        assert!(!cfg.bus_enable);
    }

    #[test]
    fn track_everything_enables_all_detailed_families() {
        let mut cfg = Config::default();
        cfg.track_everything = true;
        cfg.metric_families.requests_by_ip = false;
        cfg.apply_shortcuts();
        assert!(cfg.metric_families.requests_by_ip);
        assert!(cfg.latency_families.per_bucket);
    }

    #[test]
    fn deserializes_partial_toml_with_defaults() {
        let cfg: Config = toml_like_from_json();
        assert_eq!(cfg.scrape_port, 9242);
    }

    fn toml_like_from_json() -> Config {
        serde_json::from_str(r#"{"log_file_path": "/var/log/radosgw.log"}"#).unwrap()
    }
}
