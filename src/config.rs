/// Service configuration.
///
/// Loaded from a TOML file (default `quakeledger.toml`). Every section is
/// optional; a missing file yields the defaults. The database URL may also
/// come from `DATABASE_URL` (read through `.env` when present), which is
/// how deployments usually supply it.

use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

use crate::deagg::DEFAULT_SEED;
use crate::logging::LogLevel;
use crate::model::ConfigError;

pub const DEFAULT_CONFIG_PATH: &str = "quakeledger.toml";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub output: OutputConfig,
    pub sampling: SamplingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// QuakeML file the query result is written to.
    pub path: String,
    /// Agency written for events that do not name one.
    pub provider: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: "test.xml".to_string(),
            provider: "GFZ".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SamplingConfig {
    pub seed: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self { seed: DEFAULT_SEED }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            timestamps: false,
        }
    }
}

impl LoggingConfig {
    pub fn level(&self) -> Result<LogLevel, ConfigError> {
        self.level.parse()
    }
}

impl Config {
    pub fn from_toml_str(contents: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })
    }

    /// Loads `path`, falling back to defaults when it does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        let config = Self::from_toml_str(&contents, &display)?;
        config.logging.level()?;
        Ok(config)
    }

    /// The configured database URL, else `DATABASE_URL` from the
    /// environment or `.env`.
    pub fn database_url(&self) -> Result<String, ConfigError> {
        if let Some(url) = &self.database.url {
            return Ok(url.clone());
        }
        dotenv::dotenv().ok();
        env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
    }
}
