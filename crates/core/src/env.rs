//! Environment-variable parsing helpers shared by every binary.
//!
//! Configuration loaders take a lookup closure instead of reading
//! `std::env` directly, so tests can feed a fixed map without mutating the
//! process environment.

use std::str::FromStr;

use crate::error::ConfigError;

/// Source of configuration values keyed by variable name.
pub trait Lookup {
    fn get(&self, key: &str) -> Option<String>;
}

impl<F> Lookup for F
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        self(key)
    }
}

/// Lookup backed by the real process environment.
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Read an optional string value.
pub fn optional(env: &impl Lookup, key: &str) -> Option<String> {
    env.get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read a required string value.
pub fn required(env: &impl Lookup, key: &'static str) -> Result<String, ConfigError> {
    optional(env, key).ok_or(ConfigError::Missing(key))
}

/// Parse an optional value, returning `None` when the variable is unset.
pub fn parse_optional<T>(env: &impl Lookup, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional(env, key) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::Invalid {
                key,
                value: raw,
                reason: e.to_string(),
            }),
        None => Ok(None),
    }
}

/// Parse a value, falling back to `default` when the variable is unset.
pub fn parse_or<T>(env: &impl Lookup, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    Ok(parse_optional(env, key)?.unwrap_or(default))
}

/// Split a comma-separated list, dropping empty entries.
pub fn list(env: &impl Lookup, key: &str) -> Vec<String> {
    optional(env, key)
        .map(|raw| {
            raw.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}
