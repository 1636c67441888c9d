// Copyright 2026-Present the radosgw-ops-exporter Contributors
// SPDX-License-Identifier: Apache-2.0

pub mod error;
pub mod rotator;
pub mod socket;
pub mod source;
pub mod watcher;

pub use error::Error;
pub use rotator::{rotate, should_rotate};
pub use socket::{listen as listen_socket, SocketMode};
pub use source::LogSource;
pub use watcher::{watch, WatchEvent};
