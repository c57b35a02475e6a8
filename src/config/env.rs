// src/config/env.rs
// Environment-based settings

/// Enables mirroring of mysqld output when set to a truthy value
pub const VERBOSE_ENV: &str = "MYSQLTEST_VERBOSE";

/// Read MYSQLTEST_VERBOSE; absent or unrecognized means silent
pub fn verbose_from_env() -> bool {
    std::env::var(VERBOSE_ENV)
        .ok()
        .and_then(|v| parse_bool(&v))
        .unwrap_or(false)
}

pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
