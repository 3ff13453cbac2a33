//! Cache configuration.
//!
//! Controls the read-path cache via the `[cache]` section of `penmark.toml`.

use std::time::Duration;

use serde::Deserialize;

pub(crate) const DEFAULT_TTL_SECONDS: u64 = 300;
pub(crate) const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 60;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Serve reads from the cache and invalidate it on writes.
    pub enabled: bool,
    /// TTL applied when `set` is called without an explicit TTL.
    pub default_ttl_seconds: u64,
    /// Cadence of the background expiry sweep.
    pub sweep_interval_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl_seconds: DEFAULT_TTL_SECONDS,
            sweep_interval_seconds: DEFAULT_SWEEP_INTERVAL_SECONDS,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            default_ttl_seconds: settings.default_ttl.as_secs(),
            sweep_interval_seconds: settings.sweep_interval.as_secs(),
        }
    }
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_seconds)
    }

    /// Sweep cadence, clamped to at least one second.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds.max(1))
    }
}
