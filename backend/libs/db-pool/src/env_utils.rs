//! Environment variable parsing helpers

use std::str::FromStr;

/// Parse an environment variable, falling back to `default` when it is
/// missing or does not parse
pub fn parse_env_with_default<T: FromStr>(key: &str, default: T) -> T {
    parse_env_optional(key).unwrap_or(default)
}

/// Parse an environment variable, `None` if missing or invalid
fn parse_env_optional<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
