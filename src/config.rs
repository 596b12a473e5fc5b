//! Service configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::CacheStore;
use crate::fetch::{DEFAULT_ANONYMIZER_URL, DEFAULT_ZONE_BASE_URL};
use crate::{Error, Result};

/// File names probed by [`Config::discover`], in order.
pub const CONFIG_FILE_NAMES: [&str; 3] = ["zoneauth.json", "zoneauth.yaml", "zoneauth.yml"];

/// Directories probed by [`Config::discover`], in order.
pub const CONFIG_SEARCH_DIRS: [&str; 2] = [".", "/etc"];

/// Service configuration, immutable once loaded.
///
/// Keys are camelCase in the file, e.g.
///
/// ```json
/// {
///   "listenAddress": "127.0.0.1",
///   "port": 8080,
///   "cacheDirectory": "/var/cache/zoneauth",
///   "allowedCountries": ["us", "ca"],
///   "blockAnonymizers": true
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Address the HTTP front end binds to
    pub listen_address: String,
    /// Port the HTTP front end binds to
    pub port: u16,
    /// Directory holding cached zone files and the exit list
    pub cache_directory: PathBuf,
    /// Countries to keep zones for
    pub allowed_countries: Vec<String>,
    /// Deny addresses on the anonymizer exit list
    pub block_anonymizers: bool,
    /// Base URL of `{country}-aggregated.zone` files
    pub zone_base_url: String,
    /// URL of the anonymizer exit list
    pub anonymizer_url: String,
    /// Zone freshness threshold in hours
    pub max_age_hours: u64,
    /// Exit-list freshness threshold in hours, at least 1
    pub anonymizer_max_age_hours: u64,
    /// Periodic refresh interval; startup-only refresh when absent
    pub refresh_interval_secs: Option<u64>,
    /// Per-request fetch timeout in seconds
    pub fetch_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_address: "127.0.0.1".to_string(),
            port: 8080,
            cache_directory: PathBuf::from("./cache"),
            allowed_countries: Vec::new(),
            block_anonymizers: false,
            zone_base_url: DEFAULT_ZONE_BASE_URL.to_string(),
            anonymizer_url: DEFAULT_ANONYMIZER_URL.to_string(),
            max_age_hours: 160,
            anonymizer_max_age_hours: 1,
            refresh_interval_secs: None,
            fetch_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Load and validate a configuration file.
    ///
    /// `.yaml` and `.yml` files are parsed as YAML, anything else as JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        if is_yaml {
            Self::from_yaml_str(&content)
        } else {
            Self::from_json_str(&content)
        }
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()
    }

    /// Parse and validate a YAML configuration.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()
    }

    /// Search the default locations for a configuration file.
    pub fn discover() -> Result<Option<(Self, PathBuf)>> {
        let dirs: Vec<&Path> = CONFIG_SEARCH_DIRS.iter().map(Path::new).collect();
        Self::discover_in(&dirs)
    }

    /// Search `dirs` for the first existing configuration file and load it.
    ///
    /// Returns `Ok(None)` if no candidate exists.
    pub fn discover_in(dirs: &[&Path]) -> Result<Option<(Self, PathBuf)>> {
        for dir in dirs {
            for name in CONFIG_FILE_NAMES {
                let path = dir.join(name);
                if path.is_file() {
                    let config = Self::load(&path)?;
                    return Ok(Some((config, path)));
                }
            }
        }
        Ok(None)
    }

    /// Normalize country codes and reject unusable values.
    pub fn validate(mut self) -> Result<Self> {
        let mut countries: Vec<String> = Vec::with_capacity(self.allowed_countries.len());
        for raw in &self.allowed_countries {
            let code = normalize_country(raw)?;
            if !countries.contains(&code) {
                countries.push(code);
            }
        }
        self.allowed_countries = countries;

        check_hours("maxAgeHours", self.max_age_hours)?;
        check_hours("anonymizerMaxAgeHours", self.anonymizer_max_age_hours)?;
        if self.fetch_timeout_secs == 0 {
            return Err(Error::Config(
                "fetchTimeoutSecs must be greater than 0".into(),
            ));
        }
        if self.refresh_interval_secs == Some(0) {
            return Err(Error::Config(
                "refreshIntervalSecs must be greater than 0".into(),
            ));
        }
        if self.zone_base_url.trim().is_empty() {
            return Err(Error::Config("zoneBaseUrl must not be empty".into()));
        }
        if self.block_anonymizers && self.anonymizer_url.trim().is_empty() {
            return Err(Error::Config(
                "anonymizerUrl must be set when blockAnonymizers is enabled".into(),
            ));
        }
        Ok(self)
    }

    /// `address:port` string for the listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen_address, self.port)
    }

    /// Zone freshness threshold.
    pub fn zone_max_age(&self) -> Duration {
        hours(self.max_age_hours)
    }

    /// Exit-list freshness threshold.
    pub fn anonymizer_max_age(&self) -> Duration {
        hours(self.anonymizer_max_age_hours)
    }

    /// Periodic refresh interval, if enabled.
    pub fn refresh_interval(&self) -> Option<Duration> {
        self.refresh_interval_secs.map(Duration::from_secs)
    }

    /// Per-request fetch timeout.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Cache store configured with this configuration's directory and thresholds.
    pub fn cache_store(&self) -> CacheStore {
        CacheStore::new(&self.cache_directory)
            .with_zone_max_age(self.zone_max_age())
            .with_exclusion_max_age(self.anonymizer_max_age())
    }
}

/// Largest accepted freshness threshold, in hours.
pub const MAX_AGE_HOURS_LIMIT: u64 = u64::MAX / 3600;

fn check_hours(key: &str, value: u64) -> Result<()> {
    if value == 0 || value > MAX_AGE_HOURS_LIMIT {
        return Err(Error::Config(format!(
            "{} must be between 1 and {}",
            key, MAX_AGE_HOURS_LIMIT
        )));
    }
    Ok(())
}

fn hours(value: u64) -> Duration {
    Duration::from_secs(value.saturating_mul(3600))
}

/// Trim and lower-case a country code, requiring two ASCII letters.
pub fn normalize_country(code: &str) -> Result<String> {
    let code = code.trim();
    if code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(code.to_ascii_lowercase())
    } else {
        Err(Error::InvalidCountryCode(code.to_string()))
    }
}
