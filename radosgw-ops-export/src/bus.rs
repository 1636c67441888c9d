// Copyright 2026-Present the radosgw-ops-exporter Contributors
// SPDX-License-Identifier: Apache-2.0

use async_nats::Client;

use radosgw_ops_core::OperationRecord;
use radosgw_ops_metrics::Snapshot;

use crate::error::Error;

/// Publishes per-record and per-tick snapshot JSON to the message bus —
/// §6 "Output 2". Publication errors are logged and swallowed: per §7(d)
/// the snapshot is retained for the next tick and nothing else buffers.
pub struct BusPublisher {
    client: Client,
    raw_subject: Option<String>,
    metrics_subject: Option<String>,
}

impl BusPublisher {
    pub async fn connect(
        url: &str,
        raw_subject: Option<String>,
        metrics_subject: Option<String>,
    ) -> Result<Self, Error> {
        let client = async_nats::connect(url).await?;
        Ok(BusPublisher {
            client,
            raw_subject,
            metrics_subject,
        })
    }

    /// Subject `<raw>` carries per-record JSON objects — the Operation
    /// Record as received.
    pub async fn publish_record(&self, record: &OperationRecord) {
        let Some(subject) = &self.raw_subject else {
            return;
        };
        let payload = match serde_json::to_vec(record) {
            Ok(payload) => payload,
            Err(e) => {
                log::warn!("failed to serialize record for bus publication: {e}");
                return;
            }
        };
        if let Err(e) = self.client.publish(subject.clone(), payload.into()).await {
            log::warn!("bus publish to {subject} failed: {e}");
        }
    }

    /// Subject `<metrics>.metrics` carries snapshot JSON — §4.4 step 4.
    pub async fn publish_snapshot(&self, snapshot: &Snapshot) {
        let Some(prefix) = &self.metrics_subject else {
            return;
        };
        let subject = format!("{prefix}.metrics");
        let payload = match serde_json::to_vec(&snapshot.to_bus_json()) {
            Ok(payload) => payload,
            Err(e) => {
                log::warn!("failed to serialize snapshot for bus publication: {e}");
                return;
            }
        };
        if let Err(e) = self.client.publish(subject.clone(), payload.into()).await {
            log::warn!("bus publish to {subject} failed: {e}");
        }
    }
}
