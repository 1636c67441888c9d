// Copyright 2026-Present the radosgw-ops-exporter Contributors
// SPDX-License-Identifier: Apache-2.0

pub mod latency;
pub mod snapshot;
pub mod store;

pub use latency::{LatencyCallback, LatencySample};
pub use snapshot::Snapshot;
pub use store::MetricStore;
