// Copyright 2026-Present the radosgw-ops-exporter Contributors
// SPDX-License-Identifier: Apache-2.0

/// The tenant used when a raw user identifier carries no `$tenant` suffix.
pub const DEFAULT_TENANT: &str = "none";

/// Splits a raw RadosGW user identifier of the shape `user` or `user$tenant`
/// into `(user, tenant)` — §3 "Identity split".
pub fn split(raw_user: &str) -> (&str, &str) {
    match raw_user.split_once('$') {
        Some((user, tenant)) => (user, tenant),
        None => (raw_user, DEFAULT_TENANT),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_first_dollar_only() {
        assert_eq!(split("alice$acme"), ("alice", "acme"));
    }

    #[test]
    fn falls_back_to_default_tenant() {
        assert_eq!(split("bob"), ("bob", DEFAULT_TENANT));
    }

    #[test]
    fn empty_string_is_its_own_user_with_default_tenant() {
        assert_eq!(split(""), ("", DEFAULT_TENANT));
    }
}
