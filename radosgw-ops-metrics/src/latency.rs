// Copyright 2026-Present the radosgw-ops-exporter Contributors
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

/// The `(user, tenant, bucket, method, seconds)` tuple handed to a
/// [`LatencyCallback`] — §4.3 "Latency dispatch".
#[derive(Debug, Clone)]
pub struct LatencySample {
    pub user: String,
    pub tenant: String,
    pub bucket: String,
    pub method: String,
    pub seconds: f64,
}

/// First-class injected callback, not a global — §9's redesign note and
/// §4.3's "The default callback is a no-op". The Exporter sets this once at
/// startup by examining which histogram families (§4.5) are enabled.
pub type LatencyCallback = Arc<dyn Fn(LatencySample) + Send + Sync>;

/// The default no-op callback installed when nothing is listening.
pub fn noop() -> LatencyCallback {
    Arc::new(|_sample| {})
}
