//! Runtime configuration, read once from the environment at startup.
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

pub const PORTSCAN_TIMEOUT_MS: &str = "PORTSCAN_TIMEOUT_MS";
pub const MAX_PORT: &str = "MAX_PORT";
pub const RESCAN_INTERVAL_MINUTES: &str = "RESCAN_INTERVAL_MINUTES";
pub const PORTSCAN_WORKERS: &str = "PORTSCAN_WORKERS";
pub const MAX_PARALLEL_POD_SCANS: &str = "MAX_PARALLEL_POD_SCANS";
pub const PRUNE_STALE_SERIES: &str = "PRUNE_STALE_SERIES";
pub const LISTEN_ADDR: &str = "LISTEN_ADDR";

/// Scanner and exporter settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Upper bound for a single TCP connect attempt.
    pub probe_timeout: Duration,
    /// Declared ports above this value are never probed.
    pub max_port: u32,
    /// Sleep between the end of one cycle and the start of the next.
    pub rescan_interval: Duration,
    /// Capacity of the cycle-level limiter.
    pub cycle_workers: usize,
    /// Capacity of the pod-level limiter shared by all pods of a cycle.
    pub max_parallel_pod_scans: usize,
    /// Remove series that were not observed in the last successful cycle.
    pub prune_stale_series: bool,
    pub listen_addr: SocketAddr,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_millis(150),
            max_port: 65535,
            rescan_interval: Duration::from_secs(10 * 60),
            cycle_workers: 6,
            max_parallel_pod_scans: 5,
            prune_stale_series: true,
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// Values that fail to parse fall back to their default and are logged as
    /// warnings. Limiter capacities are raised to at least one and a zero probe
    /// timeout falls back to the default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let default_timeout_ms = defaults.probe_timeout.as_millis() as u64;
        let probe_timeout = match parse_or(&lookup, PORTSCAN_TIMEOUT_MS, default_timeout_ms) {
            0 => {
                log::warn!(
                    "`{PORTSCAN_TIMEOUT_MS}` of 0 would close every port, using default `{default_timeout_ms}`"
                );
                default_timeout_ms
            }
            ms => ms,
        };
        let rescan_minutes = parse_or(
            &lookup,
            RESCAN_INTERVAL_MINUTES,
            defaults.rescan_interval.as_secs() / 60,
        );

        Self {
            probe_timeout: Duration::from_millis(probe_timeout),
            max_port: parse_or(&lookup, MAX_PORT, defaults.max_port),
            rescan_interval: Duration::from_secs(rescan_minutes.saturating_mul(60)),
            cycle_workers: at_least_one(
                PORTSCAN_WORKERS,
                parse_or(&lookup, PORTSCAN_WORKERS, defaults.cycle_workers),
            ),
            max_parallel_pod_scans: at_least_one(
                MAX_PARALLEL_POD_SCANS,
                parse_or(
                    &lookup,
                    MAX_PARALLEL_POD_SCANS,
                    defaults.max_parallel_pod_scans,
                ),
            ),
            prune_stale_series: parse_or(
                &lookup,
                PRUNE_STALE_SERIES,
                defaults.prune_stale_series,
            ),
            listen_addr: parse_or(&lookup, LISTEN_ADDR, defaults.listen_addr),
        }
    }
}

/// Reads `key` from the process environment, warning about non-UTF-8 values.
fn env_lookup(key: &str) -> Option<String> {
    match std::env::var(key) {
        Ok(value) => Some(value),
        Err(std::env::VarError::NotPresent) => None,
        Err(std::env::VarError::NotUnicode(raw)) => {
            log::warn!("ignoring non-UTF-8 value {raw:?} for `{key}`, using default");
            None
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, fallback: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return fallback;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => value,
        Err(_) => {
            log::warn!("ignoring invalid value `{raw}` for `{key}`, using default `{fallback}`");
            fallback
        }
    }
}

fn at_least_one(key: &str, value: usize) -> usize {
    if value == 0 {
        log::warn!("`{key}` must be at least 1, using 1");
        return 1;
    }
    value
}
