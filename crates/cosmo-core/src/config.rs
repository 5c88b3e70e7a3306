use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

/// Environment variable overriding `server.bind`
pub const ENV_BIND: &str = "COSMO_BIND";
/// Environment variable overriding `cache.ttl_secs`
pub const ENV_CACHE_TTL: &str = "COSMO_CACHE_TTL_SECS";

/// Cache TTLs above this are accepted with a warning
const STALE_TTL_SECS: u64 = 24 * 60 * 60;
/// Cache TTLs above this are rejected
const MAX_TTL_SECS: u64 = 30 * STALE_TTL_SECS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The server refuses to start
    Error,
    /// Logged at startup, otherwise ignored
    Warning,
}

/// A problem with one config field, named by its `section.key` path
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: Severity,
    pub field: &'static str,
    pub message: String,
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Everything [`Config::validate`] found wrong with a config
#[derive(Debug, Clone, Default)]
pub struct ConfigReport {
    issues: Vec<ConfigIssue>,
}

impl ConfigReport {
    fn push(&mut self, severity: Severity, field: &'static str, message: impl Into<String>) {
        self.issues.push(ConfigIssue {
            severity,
            field,
            message: message.into(),
        });
    }

    pub fn errors(&self) -> impl Iterator<Item = &ConfigIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ConfigIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    /// Severity of the first issue reported for `field`, if any
    pub fn severity_of(&self, field: &str) -> Option<Severity> {
        self.issues
            .iter()
            .find(|i| i.field == field)
            .map(|i| i.severity)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Open-Meteo endpoints and client settings
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Response cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Request defaults
    #[serde(default)]
    pub weather: WeatherDefaults,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Interval between expired-entry sweeps in seconds (0 disables the sweeper)
    #[serde(default = "default_cache_sweep_secs")]
    pub cache_sweep_secs: u64,
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_cache_sweep_secs() -> u64 {
    60
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            cache_sweep_secs: default_cache_sweep_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Geocoding search endpoint
    #[serde(default = "default_geocoding_url")]
    pub geocoding_url: String,

    /// Forecast endpoint
    #[serde(default = "default_forecast_url")]
    pub forecast_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// User-Agent sent to upstream providers
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_geocoding_url() -> String {
    "https://geocoding-api.open-meteo.com/v1/search".to_string()
}

fn default_forecast_url() -> String {
    "https://api.open-meteo.com/v1/forecast".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    concat!("cosmoweather/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            geocoding_url: default_geocoding_url(),
            forecast_url: default_forecast_url(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Time-to-live for geocoding, autocomplete and forecast entries
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_ttl_secs() -> u64 {
    300
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherDefaults {
    /// Hourly variables requested when the caller does not pass `hourly_vars`
    #[serde(default = "default_hourly_vars")]
    pub default_hourly_vars: String,

    /// Number of autocomplete suggestions when the caller does not pass `limit`
    #[serde(default = "default_autocomplete_limit")]
    pub default_autocomplete_limit: u32,
}

fn default_hourly_vars() -> String {
    "temperature_2m,relativehumidity_2m,windspeed_10m".to_string()
}

fn default_autocomplete_limit() -> u32 {
    6
}

impl Default for WeatherDefaults {
    fn default() -> Self {
        Self {
            default_hourly_vars: default_hourly_vars(),
            default_autocomplete_limit: default_autocomplete_limit(),
        }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, the default location is
    /// tried and a missing file yields the built-in defaults. Environment
    /// overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.display().to_string()).into());
                }
                Self::from_file(p)?
            }
            None => match Self::default_path() {
                Some(p) if p.exists() => Self::from_file(&p)?,
                _ => {
                    tracing::debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Load configuration and refuse it if [`Config::validate`] finds errors.
    ///
    /// Every error is listed in the returned [`ConfigError::Invalid`];
    /// warnings are logged and handed back with the config.
    pub fn load_validated(path: Option<&Path>) -> Result<(Self, ConfigReport)> {
        let config = Self::load(path)?;
        let report = config.validate();

        if report.has_errors() {
            let errors: Vec<String> = report.errors().map(ToString::to_string).collect();
            return Err(ConfigError::Invalid(errors.join("; ")).into());
        }

        for warning in report.warnings() {
            tracing::warn!(field = warning.field, "Config warning: {}", warning.message);
        }

        Ok((config, report))
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: Config = toml::from_str(&contents).map_err(ConfigError::from)?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply `COSMO_*` overrides using the given variable lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup(ENV_BIND) {
            self.server.bind = bind;
        }

        if let Some(ttl) = lookup(ENV_CACHE_TTL) {
            self.cache.ttl_secs =
                ttl.trim()
                    .parse::<u64>()
                    .map_err(|e| ConfigError::InvalidOverride {
                        name: ENV_CACHE_TTL.to_string(),
                        message: e.to_string(),
                    })?;
        }

        Ok(())
    }

    /// Check every field, collecting errors and warnings instead of stopping
    /// at the first one.
    pub fn validate(&self) -> ConfigReport {
        use Severity::{Error, Warning};
        let mut report = ConfigReport::default();

        if self.server.bind.parse::<SocketAddr>().is_err() {
            report.push(
                Error,
                "server.bind",
                format!("Not a socket address: {}", self.server.bind),
            );
        }

        check_url(&self.upstream.geocoding_url, "upstream.geocoding_url", &mut report);
        check_url(&self.upstream.forecast_url, "upstream.forecast_url", &mut report);

        if self.upstream.timeout_secs == 0 {
            report.push(Error, "upstream.timeout_secs", "Timeout must be greater than 0");
        }

        match self.cache.ttl_secs {
            0 => report.push(Error, "cache.ttl_secs", "Cache TTL must be greater than 0"),
            ttl if ttl > MAX_TTL_SECS => report.push(
                Error,
                "cache.ttl_secs",
                format!("Cache TTL may be at most {} seconds (30 days)", MAX_TTL_SECS),
            ),
            ttl if ttl > STALE_TTL_SECS => report.push(
                Warning,
                "cache.ttl_secs",
                "Cache TTL is more than 24 hours; forecasts will go stale",
            ),
            _ => {}
        }

        if self.server.cache_sweep_secs == 0 {
            report.push(
                Warning,
                "server.cache_sweep_secs",
                "Expired-entry sweeper disabled (0 seconds)",
            );
        }

        if self.weather.default_autocomplete_limit == 0 {
            report.push(
                Error,
                "weather.default_autocomplete_limit",
                "Autocomplete limit must be greater than 0",
            );
        }

        report
    }

    /// Get the default path of the configuration file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("cosmoweather").join("config.toml"))
    }
}

/// Upstream endpoints must be absolute http(s) URLs with a host
fn check_url(raw: &str, field: &'static str, report: &mut ConfigReport) {
    let url = match Url::parse(raw) {
        Ok(url) => url,
        Err(e) => return report.push(Severity::Error, field, format!("Invalid URL: {}", e)),
    };

    if !matches!(url.scheme(), "http" | "https") {
        report.push(
            Severity::Error,
            field,
            format!("URL must use http or https scheme, got: {}", url.scheme()),
        );
    }
    if url.host().is_none() {
        report.push(Severity::Error, field, "URL must have a host");
    }
}
