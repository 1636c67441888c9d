// Copyright 2026-Present the radosgw-ops-exporter Contributors
// SPDX-License-Identifier: Apache-2.0

use prometheus::{HistogramVec, Registry};

use radosgw_ops_core::config::LatencyFamilies;
use radosgw_ops_metrics::LatencySample;

use crate::error::Error;

/// The five latency label shapes named in §4.5, realized as six registered
/// vectors since `per_bucket` and `per_bucket_and_method` are independently
/// toggled in configuration despite sharing a label set.
///
/// Histograms never carry the `pod` label — Glossary, "Pod label".
pub struct Histograms {
    detailed: Option<HistogramVec>,
    per_user: Option<HistogramVec>,
    per_bucket: Option<HistogramVec>,
    per_bucket_and_method: Option<HistogramVec>,
    per_tenant: Option<HistogramVec>,
    per_method: Option<HistogramVec>,
}

impl Histograms {
    pub fn new(registry: &Registry, families: &LatencyFamilies) -> Result<Self, Error> {
        let detailed = register_if(
            registry,
            families.detailed,
            "radosgw_latency_seconds_detailed",
            &["user", "tenant", "bucket", "method"],
        )?;
        let per_user = register_if(
            registry,
            families.per_user,
            "radosgw_latency_seconds_per_user",
            &["user", "tenant", "method"],
        )?;
        let per_bucket = register_if(
            registry,
            families.per_bucket,
            "radosgw_latency_seconds_per_bucket",
            &["tenant", "bucket", "method"],
        )?;
        let per_bucket_and_method = register_if(
            registry,
            families.per_bucket_and_method,
            "radosgw_latency_seconds_per_bucket_and_method",
            &["tenant", "bucket", "method"],
        )?;
        let per_tenant = register_if(
            registry,
            families.per_tenant,
            "radosgw_latency_seconds_per_tenant",
            &["tenant", "method"],
        )?;
        let per_method = register_if(
            registry,
            families.per_method,
            "radosgw_latency_seconds_per_method",
            &["method"],
        )?;

        Ok(Histograms {
            detailed,
            per_user,
            per_bucket,
            per_bucket_and_method,
            per_tenant,
            per_method,
        })
    }

    /// Observes one latency sample into every enabled vector — §4.5 "The
    /// latency callback... observes the sample into every enabled vector".
    pub fn observe(&self, sample: &LatencySample) {
        if let Some(h) = &self.detailed {
            h.with_label_values(&[&sample.user, &sample.tenant, &sample.bucket, &sample.method])
                .observe(sample.seconds);
        }
        if let Some(h) = &self.per_user {
            h.with_label_values(&[&sample.user, &sample.tenant, &sample.method])
                .observe(sample.seconds);
        }
        if let Some(h) = &self.per_bucket {
            h.with_label_values(&[&sample.tenant, &sample.bucket, &sample.method])
                .observe(sample.seconds);
        }
        if let Some(h) = &self.per_bucket_and_method {
            h.with_label_values(&[&sample.tenant, &sample.bucket, &sample.method])
                .observe(sample.seconds);
        }
        if let Some(h) = &self.per_tenant {
            h.with_label_values(&[&sample.tenant, &sample.method])
                .observe(sample.seconds);
        }
        if let Some(h) = &self.per_method {
            h.with_label_values(&[&sample.method]).observe(sample.seconds);
        }
    }
}

fn register_if(
    registry: &Registry,
    enabled: bool,
    name: &str,
    labels: &[&str],
) -> Result<Option<HistogramVec>, Error> {
    if !enabled {
        return Ok(None);
    }
    let opts = prometheus::HistogramOpts::new(name, format!("{name} latency in seconds"));
    let vec = HistogramVec::new(opts, labels)?;
    registry.register(Box::new(vec.clone()))?;
    Ok(Some(vec))
}
