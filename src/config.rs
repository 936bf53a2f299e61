use serde::Deserialize;
use std::time::Duration;

/// Longest accepted response TTL (30 days).
pub const MAX_TTL_SECS: u64 = 30 * 86_400;

// ─── Top-level config ────────────────────────────────────────────

/// Everything the service reads at startup.
///
/// Loaded from an optional `learnhub.toml` and then overridden by
/// `LEARNHUB__SECTION__KEY` environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub environment: String,
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub monitoring: MonitoringConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// `None` runs the facade in local-only mode.
    pub redis_url: Option<String>,
    pub key_prefix: String,
    pub default_ttl_secs: u64,
    /// Serialize concurrent misses for the same key behind a per-key lock.
    pub coalesce_misses: bool,
    /// Upper bound on live entries in the in-process tier.
    pub max_local_entries: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub capacity: usize,
    pub aggregation_interval_ms: u64,
    pub stream_interval_ms: u64,
    pub alerts: AlertThresholds,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    pub max_average_ms: f64,
    pub max_p95_ms: f64,
    pub max_error_rate: f64,
    pub min_cache_hit_rate: f64,
    /// Cache hit rate is ignored for endpoints below this volume.
    pub min_requests_for_hit_rate: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

// ─── Defaults ────────────────────────────────────────────────────

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: "development".into(),
            server: ServerConfig::default(),
            cache: CacheConfig::default(),
            monitoring: MonitoringConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            key_prefix: "learnhub".into(),
            default_ttl_secs: 300,
            coalesce_misses: false,
            max_local_entries: 10_000,
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 10_000,
            aggregation_interval_ms: 300_000,
            stream_interval_ms: 2_000,
            alerts: AlertThresholds::default(),
        }
    }
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            max_average_ms: 1_000.0,
            max_p95_ms: 3_000.0,
            max_error_rate: 5.0,
            min_cache_hit_rate: 20.0,
            min_requests_for_hit_rate: 10,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ─── Derived values ──────────────────────────────────────────────

impl AppConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Periodic aggregation is skipped under CI and in the test environment.
    pub fn periodic_aggregation_allowed(&self) -> bool {
        self.monitoring.enabled
            && self.environment != "test"
            && std::env::var_os("CI").is_none()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.monitoring.capacity == 0 {
            return Err("monitoring.capacity must be greater than 0".into());
        }
        if self.monitoring.aggregation_interval_ms == 0 {
            return Err("monitoring.aggregation_interval_ms must be greater than 0".into());
        }
        if self.monitoring.stream_interval_ms == 0 {
            return Err("monitoring.stream_interval_ms must be greater than 0".into());
        }
        if self.cache.default_ttl_secs == 0 || self.cache.default_ttl_secs > MAX_TTL_SECS {
            return Err(format!(
                "cache.default_ttl_secs must be between 1 and {MAX_TTL_SECS}"
            ));
        }
        if self.cache.max_local_entries == 0 {
            return Err("cache.max_local_entries must be greater than 0".into());
        }
        Ok(())
    }
}

impl MonitoringConfig {
    pub fn aggregation_interval(&self) -> Duration {
        Duration::from_millis(self.aggregation_interval_ms)
    }

    pub fn stream_interval(&self) -> Duration {
        Duration::from_millis(self.stream_interval_ms)
    }
}

// ─── Loader ──────────────────────────────────────────────────────

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    const DEFAULT_PATH: &str = "learnhub.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_PATH));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // e.g. LEARNHUB__CACHE__REDIS_URL=redis://127.0.0.1:6379/
        builder = builder.add_source(
            Environment::with_prefix("LEARNHUB")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
