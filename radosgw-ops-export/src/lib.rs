// Copyright 2026-Present the radosgw-ops-exporter Contributors
// SPDX-License-Identifier: Apache-2.0

pub mod bus;
pub mod error;
pub mod histograms;
pub mod registry;
pub mod scrape;

pub use bus::BusPublisher;
pub use error::Error;
pub use registry::ScrapeRegistry;
