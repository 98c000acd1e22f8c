//! Configuration file support for the rating tools.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/rating/config.toml`.

use crate::lookup::LookupPolicy;
use crate::points::CsvPointStore;
use crate::rating_set::{default_time_lookup, RatingSet};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub rating: RatingConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory of CSV point files for lazily loaded ratings
    #[serde(default = "default_points_dir")]
    pub points_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            points_dir: default_points_dir(),
        }
    }
}

/// Defaults applied to every loaded rating set
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RatingConfig {
    /// Methods for choosing among effective times: in range, before the
    /// first, after the last
    #[serde(default = "default_time_lookup_names")]
    pub time_lookup: Vec<String>,

    #[serde(default)]
    pub default_units: Option<String>,

    #[serde(default)]
    pub default_vertical_datum: Option<String>,

    #[serde(default)]
    pub round: bool,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            time_lookup: default_time_lookup_names(),
            default_units: None,
            default_vertical_datum: None,
            round: false,
        }
    }
}

impl RatingConfig {
    /// The configured time lookup as a validated policy
    pub fn time_lookup(&self) -> Result<LookupPolicy> {
        LookupPolicy::parse(&self.time_lookup)
            .map_err(|e| Error::Config(format!("Invalid [rating] time_lookup: {}", e)))
    }

    /// Apply these defaults to a rating set
    pub fn apply(&self, set: &mut RatingSet) -> Result<()> {
        set.set_time_lookup(self.time_lookup()?);
        if let Some(units) = &self.default_units {
            set.set_default_data_units(Some(units))?;
        }
        if let Some(datum) = &self.default_vertical_datum {
            if set.vertical_datum_info().is_some() {
                set.set_default_vertical_datum(Some(datum))?;
            } else {
                tracing::debug!(
                    "Ignoring default vertical datum {} for {} without vertical datum info",
                    datum,
                    set.specification().id()
                );
            }
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Default value functions
fn default_points_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rating")
        .join("points")
}

fn default_time_lookup_names() -> Vec<String> {
    default_time_lookup()
        .names()
        .iter()
        .map(|name| name.to_string())
        .collect()
}

fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::debug!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.rating.time_lookup()?;
        crate::logging::level_filter(&config.logging.level)?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rating")
            .join("config.toml")
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    /// The configured point store
    pub fn point_store(&self) -> Arc<CsvPointStore> {
        Arc::new(CsvPointStore::new(&self.data.points_dir))
    }

    /// Attach the point store to lazy ratings and apply rating defaults
    pub fn configure(&self, set: &mut RatingSet) -> Result<()> {
        if set.ratings().any(|r| !r.has_rating_points()) {
            set.set_point_source(self.point_store());
        }
        self.rating.apply(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::LookupMethod;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.rating.time_lookup().unwrap(), default_time_lookup());
        assert!(!config.rating.round);
        assert_eq!(config.logging.level, "info");
        assert!(config.data.points_dir.ends_with("rating/points"));
    }

    #[test]
    fn test_config_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.rating.default_vertical_datum = Some("NAVD-88".into());
        config.save_to(&path).unwrap();

        let parsed = Config::load_from(&path).unwrap();
        assert_eq!(parsed.rating.time_lookup, config.rating.time_lookup);
        assert_eq!(parsed.rating.default_vertical_datum.as_deref(), Some("NAVD-88"));
        assert_eq!(parsed.data.points_dir, config.data.points_dir);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[rating]
time_lookup = ["linear", "error", "previous"]
round = true
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        let policy = config.rating.time_lookup().unwrap();
        assert_eq!(policy.in_range, LookupMethod::Linear);
        assert_eq!(policy.out_range_low, LookupMethod::Error);
        assert!(config.rating.round);
        assert_eq!(config.logging.level, "info"); // default
    }

    #[test]
    fn test_invalid_time_lookup() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[rating]\ntime_lookup = [\"LINEAR\", \"CUBIC\", \"NULL\"]\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));
    }
}
