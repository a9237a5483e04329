//! Application settings loaded from config.toml
//!
//! The file carries scheduling knobs and the catalog reference data (packages and bundles)
//! used to seed the database on startup. A missing file is not an error: the defaults
//! describe an empty catalog with no maintenance pass.

use crate::errors::{Error, Result};
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Default location of the configuration file, overridable with `TUTORING_CONFIG`
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Scheduling and storage knobs
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    /// Packages to seed
    #[serde(default)]
    pub packages: Vec<PackageConfig>,
    /// Bundles to seed
    #[serde(default)]
    pub bundles: Vec<BundleConfig>,
}

/// `[scheduling]` table
#[derive(Debug, Default, Deserialize, Clone)]
pub struct SchedulingConfig {
    /// PENDING bookings older than this many minutes are cancelled by the maintenance pass
    pub stale_pending_minutes: Option<i64>,
    /// Whether SQL statements are logged by the driver
    #[serde(default)]
    pub sqlx_logging: bool,
}

impl SchedulingConfig {
    /// Age after which a PENDING booking is stale, if the maintenance pass is enabled
    #[must_use]
    pub fn stale_pending_age(&self) -> Option<Duration> {
        self.stale_pending_minutes.and_then(Duration::try_minutes)
    }
}

/// Configuration for a single package
#[derive(Debug, Deserialize, Clone)]
pub struct PackageConfig {
    /// Unique package name
    pub name: String,
    /// Optional description
    pub description: Option<String>,
    /// List price
    pub price: f64,
    /// Subjects covered
    #[serde(default)]
    pub subjects: Vec<String>,
}

/// Configuration for a single bundle
#[derive(Debug, Deserialize, Clone)]
pub struct BundleConfig {
    /// Unique bundle name
    pub name: String,
    /// Optional description
    pub description: Option<String>,
    /// Discount on the sum of member prices, 0 to 100
    #[serde(default)]
    pub discount_percent: i32,
    /// Whether the bundle is featured
    #[serde(default)]
    pub is_featured: bool,
    /// Member package names, in display order
    pub packages: Vec<String>,
}

/// Loads configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file exists but cannot be read
/// - The TOML syntax is invalid
/// - Required fields are missing
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        info!("No configuration file at {:?}; using defaults", path);
        return Ok(Config::default());
    }

    debug!("Loading configuration from {:?}", path);
    let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
        message: format!("Failed to read config file {path:?}: {e}"),
    })?;

    parse_config(&contents)
}

/// Parses configuration from TOML text
pub fn parse_config(contents: &str) -> Result<Config> {
    let config: Config = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;

    if let Some(minutes) = config.scheduling.stale_pending_minutes {
        if minutes <= 0 {
            return Err(Error::Config {
                message: format!("stale_pending_minutes must be positive, got {minutes}"),
            });
        }
        let in_range = Duration::try_minutes(minutes)
            .and_then(|age| Utc::now().checked_sub_signed(age))
            .is_some();
        if !in_range {
            return Err(Error::Config {
                message: format!("stale_pending_minutes is out of range, got {minutes}"),
            });
        }
    }

    Ok(config)
}

/// Loads configuration from `TUTORING_CONFIG`, or ./config.toml when unset
pub fn load_default_config() -> Result<Config> {
    let path =
        std::env::var("TUTORING_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    load_config(path)
}
