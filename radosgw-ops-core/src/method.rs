// Copyright 2026-Present the radosgw-ops-exporter Contributors
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::str::FromStr;

/// The HTTP method extracted from a RadosGW request line.
///
/// Anything outside the fixed set gateway operations actually emit collapses
/// to `Unknown` rather than being rejected — §4.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
    Head,
    Options,
    Patch,
    Unknown,
}

impl FromStr for Method {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "GET" => Method::Get,
            "PUT" => Method::Put,
            "POST" => Method::Post,
            "DELETE" => Method::Delete,
            "HEAD" => Method::Head,
            "OPTIONS" => Method::Options,
            "PATCH" => Method::Patch,
            _ => Method::Unknown,
        })
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Patch => "PATCH",
            Method::Unknown => "UNKNOWN",
        })
    }
}

/// Extracts the method token from a request line such as `"GET /b1/k HTTP/1.1"`.
pub fn extract_method(request_line: &str) -> Method {
    request_line
        .split_whitespace()
        .next()
        .map(|tok| tok.parse().unwrap_or(Method::Unknown))
        .unwrap_or(Method::Unknown)
}
