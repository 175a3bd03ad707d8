use std::time::Duration;
use tracing::warn;

pub struct Config {
    pub data_dir: String,
    pub ttl_grace: Duration,
    pub sweep_interval: Duration,
    pub max_key_attempts: usize,
}

impl Config {
    const DEFAULT_DATA_DIR: &str = "./data";
    const DEFAULT_TTL_GRACE_SECS: u64 = 3600;
    const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
    pub const DEFAULT_MAX_KEY_ATTEMPTS: usize = 16;

    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            data_dir: lookup("RESULTS_CACHE_DATA_DIR")
                .unwrap_or_else(|| Self::DEFAULT_DATA_DIR.to_string()),
            ttl_grace: Duration::from_secs(parse_or(
                &lookup,
                "RESULTS_CACHE_TTL_GRACE_SECS",
                Self::DEFAULT_TTL_GRACE_SECS,
            )),
            sweep_interval: Duration::from_secs(positive_or(
                &lookup,
                "RESULTS_CACHE_SWEEP_INTERVAL_SECS",
                Self::DEFAULT_SWEEP_INTERVAL_SECS,
            )),
            max_key_attempts: parse_or(
                &lookup,
                "RESULTS_CACHE_MAX_KEY_ATTEMPTS",
                Self::DEFAULT_MAX_KEY_ATTEMPTS,
            ),
        }
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + std::fmt::Display + Copy,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse::<T>().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", name, raw, default);
            default
        }),
        None => default,
    }
}

// A zero period is rejected like an unparsable one
fn positive_or<F>(lookup: &F, name: &str, default: u64) -> u64
where
    F: Fn(&str) -> Option<String>,
{
    match parse_or(lookup, name, default) {
        0 => {
            warn!("{} must be greater than zero, using default {}", name, default);
            default
        }
        value => value,
    }
}
