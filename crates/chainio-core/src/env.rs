//! Environment variable utilities
//!
//! Every chainio knob can be overridden from the environment. Values that
//! fail to parse are ignored and the compiled default is kept.
//!
//! ```ignore
//! use chainio_core::env::{env_get, env_get_bool};
//!
//! let iovs: usize = env_get("CHAINIO_IOVS", 64);
//! let greedy = env_get_bool("CHAINIO_GREEDY", false);
//! ```

use std::str::FromStr;

/// Parse `key` as `T`, falling back to `default` when unset or malformed.
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    env_get_opt(key).unwrap_or(default)
}

/// Parse `key` as `T` if it is set and well-formed.
#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Boolean switch.
///
/// `1`, `true`, `yes`, `on` are true and `0`, `false`, `no`, `off` are
/// false (any case). Anything else, or an unset variable, yields `default`.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => match val.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}
