use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::FixedOffset;

use crate::catalog::CacheConfig;

/// Runtime settings, read from `VOLLY_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub metrics_port: Option<u16>,
    /// `None` disables the TTL; the snapshot then lives until invalidated.
    pub cache_ttl: Option<Duration>,
    pub load_timeout: Option<Duration>,
    pub warm_interval: Duration,
    pub compact_threshold: u64,
    /// Offset in which search dates are read.
    pub date_offset: FixedOffset,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let data_dir = lookup("VOLLY_DATA_DIR").unwrap_or_else(|| "./data".into());
        let metrics_port = parse_opt(&lookup, "VOLLY_METRICS_PORT")?;
        let ttl_secs: u64 = parse_opt(&lookup, "VOLLY_CACHE_TTL_SECS")?.unwrap_or(300);
        let timeout_ms: u64 = parse_opt(&lookup, "VOLLY_LOAD_TIMEOUT_MS")?.unwrap_or(5_000);
        let warm_secs: u64 = parse_opt(&lookup, "VOLLY_WARM_INTERVAL_SECS")?.unwrap_or(60);
        let compact_threshold = parse_opt(&lookup, "VOLLY_COMPACT_THRESHOLD")?.unwrap_or(1000);
        let offset_minutes: i32 =
            parse_opt(&lookup, "VOLLY_DATE_UTC_OFFSET_MINUTES")?.unwrap_or(0);

        if warm_secs == 0 {
            return Err("VOLLY_WARM_INTERVAL_SECS must be positive".into());
        }
        let date_offset = offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| format!("VOLLY_DATE_UTC_OFFSET_MINUTES out of range: {offset_minutes}"))?;

        Ok(Self {
            data_dir: PathBuf::from(data_dir),
            metrics_port,
            cache_ttl: (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs)),
            load_timeout: (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms)),
            warm_interval: Duration::from_secs(warm_secs),
            compact_threshold,
            date_offset,
        })
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            ttl: self.cache_ttl,
            load_timeout: self.load_timeout,
        }
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("catalog.wal")
    }
}

fn parse_opt<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, String>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| format!("invalid {key}={raw:?}: {e}")),
    }
}
