//! Engine configuration: hardcoded defaults with `WEBFORAGE_*` overrides.
//! Numeric knobs are clamped so a stray env var cannot disable the safety
//! bounds.

use std::time::Duration;
use webforage_local::default_user_agent;

pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 3_600;
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// User agent header sent on every outbound request.
    pub user_agent: String,
    /// Robots verdict when robots.txt itself cannot be fetched.
    pub robots_fail_open: bool,
    /// How long a completed run stays servable from cache.
    pub cache_ttl: Duration,
    /// Cached runs kept at once; overflow evicts the oldest.
    pub cache_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self {
            user_agent: default_user_agent(),
            robots_fail_open: env_bool("WEBFORAGE_ROBOTS_FAIL_OPEN", true),
            cache_ttl: Duration::from_secs(env_u64(
                "WEBFORAGE_CACHE_TTL_SECONDS",
                DEFAULT_CACHE_TTL_SECONDS,
                1,
                86_400,
            )),
            cache_capacity: env_u64(
                "WEBFORAGE_CACHE_CAPACITY",
                DEFAULT_CACHE_CAPACITY as u64,
                1,
                65_536,
            ) as usize,
        }
    }
}

pub(crate) fn env_trimmed(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_bool(key: &str, default: bool) -> bool {
    match env_trimmed(key) {
        Some(v) => match v.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        None => default,
    }
}

fn env_u64(key: &str, default: u64, min: u64, max: u64) -> u64 {
    env_trimmed(key)
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
        .clamp(min, max)
}
