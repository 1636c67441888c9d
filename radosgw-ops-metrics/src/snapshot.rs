// Copyright 2026-Present the radosgw-ops-exporter Contributors
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use arc_swap::ArcSwap;
use serde::Serialize;

/// A value-type deep copy of every atomic scalar and every live map at an
/// instant — §3 "Snapshot".
#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    pub total_requests: u64,
    pub bytes_sent_total: u64,
    pub bytes_received_total: u64,
    pub total_errors: u64,
    pub maps: HashMap<&'static str, HashMap<String, u64>>,
}

impl Snapshot {
    /// `delta = current - previous`, defined per-key as `max(0, current -
    /// previous)` — §3. Keys present only in `current` carry their full
    /// value; keys whose delta is zero are omitted entirely. The Exporter
    /// is responsible for §4.5's "always emit" policy on error families,
    /// which re-introduces a zero for keys present in `current` but absent
    /// from this delta.
    pub fn subtract(&self, previous: &Snapshot) -> Snapshot {
        let maps = self
            .maps
            .iter()
            .map(|(name, current_map)| {
                let previous_map = previous.maps.get(name);
                let delta_map = current_map
                    .iter()
                    .filter_map(|(key, &current_value)| {
                        let previous_value =
                            previous_map.and_then(|m| m.get(key)).copied().unwrap_or(0);
                        let delta = current_value.saturating_sub(previous_value);
                        if delta == 0 {
                            None
                        } else {
                            Some((key.clone(), delta))
                        }
                    })
                    .collect();
                (*name, delta_map)
            })
            .collect();

        Snapshot {
            total_requests: self.total_requests.saturating_sub(previous.total_requests),
            bytes_sent_total: self
                .bytes_sent_total
                .saturating_sub(previous.bytes_sent_total),
            bytes_received_total: self
                .bytes_received_total
                .saturating_sub(previous.bytes_received_total),
            total_errors: self.total_errors.saturating_sub(previous.total_errors),
            maps,
        }
    }

    /// Serialization format for bus publication — §4.5: a JSON object whose
    /// keys are the enabled map names plus the four scalar totals.
    pub fn to_bus_json(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        obj.insert("total_requests".into(), self.total_requests.into());
        obj.insert("bytes_sent".into(), self.bytes_sent_total.into());
        obj.insert("bytes_received".into(), self.bytes_received_total.into());
        obj.insert("errors".into(), self.total_errors.into());
        for (name, map) in &self.maps {
            obj.insert((*name).into(), serde_json::to_value(map).unwrap_or_default());
        }
        serde_json::Value::Object(obj)
    }
}

/// Lock-free single-writer/multi-reader handoff of the "previous snapshot"
/// the Coordinator retains between ticks — §3 "Snapshots live for one
/// scrape interval". T-tick is the sole writer; any reader gets a
/// point-in-time `Arc` without blocking the writer.
pub struct PreviousSnapshot {
    inner: ArcSwap<Snapshot>,
}

impl PreviousSnapshot {
    pub fn new() -> Self {
        PreviousSnapshot {
            inner: ArcSwap::from_pointee(Snapshot::default()),
        }
    }

    pub fn load(&self) -> std::sync::Arc<Snapshot> {
        self.inner.load_full()
    }

    pub fn store(&self, snapshot: Snapshot) {
        self.inner.store(std::sync::Arc::new(snapshot));
    }
}

impl Default for PreviousSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(total: u64, maps: &[(&'static str, &[(&str, u64)])]) -> Snapshot {
        Snapshot {
            total_requests: total,
            bytes_sent_total: 0,
            bytes_received_total: 0,
            total_errors: 0,
            maps: maps
                .iter()
                .map(|(name, entries)| {
                    (
                        *name,
                        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn subtract_computes_per_key_delta() {
        let previous = snap(10, &[("RequestsByMethodGlobal", &[("GET", 5)])]);
        let current = snap(15, &[("RequestsByMethodGlobal", &[("GET", 8)])]);

        let delta = current.subtract(&previous);
        assert_eq!(delta.total_requests, 5);
        assert_eq!(delta.maps["RequestsByMethodGlobal"]["GET"], 3);
    }

    #[test]
    fn subtract_never_goes_negative_on_counter_reset() {
        let previous = snap(100, &[("RequestsByMethodGlobal", &[("GET", 50)])]);
        let current = snap(5, &[("RequestsByMethodGlobal", &[("GET", 2)])]);

        let delta = current.subtract(&previous);
        assert_eq!(delta.total_requests, 0);
        assert!(!delta.maps["RequestsByMethodGlobal"].contains_key("GET"));
    }

    #[test]
    fn new_key_in_current_carries_full_value() {
        let previous = snap(0, &[("RequestsByMethodGlobal", &[])]);
        let current = snap(1, &[("RequestsByMethodGlobal", &[("PUT", 1)])]);

        let delta = current.subtract(&previous);
        assert_eq!(delta.maps["RequestsByMethodGlobal"]["PUT"], 1);
    }

    #[test]
    fn previous_snapshot_handoff_reads_latest_store() {
        let holder = PreviousSnapshot::new();
        assert_eq!(holder.load().total_requests, 0);

        holder.store(snap(42, &[]));
        assert_eq!(holder.load().total_requests, 42);
    }
}
