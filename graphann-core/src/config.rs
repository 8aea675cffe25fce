//! # Configuration Management
//!
//! Handles configuration for index builds, searches and logging.
//!
//! Every section has a `Default`, so a TOML file only needs to name the
//! values it changes:
//!
//! ```toml
//! [build]
//! max_degree = 32
//! alpha = 1.2
//!
//! [logging]
//! level = "debug"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::{default_threads, BuildParams, SearchParams};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub build: BuildConfig,
    pub search: SearchConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load a TOML configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::io(format!("reading config {}", path.display()), e))?;
        Self::from_toml(&text)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text).map_err(|e| Error::Configuration {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges in every section
    pub fn validate(&self) -> Result<()> {
        self.build
            .to_params()
            .validate()
            .map_err(|e| Error::Configuration { message: format!("[build] {}", e) })?;
        if self.search.k == 0 {
            return Err(Error::Configuration { message: "[search] k must be at least 1".into() });
        }
        self.search
            .to_params()
            .validate()
            .map_err(|e| Error::Configuration { message: format!("[search] {}", e) })?;
        Ok(())
    }
}

/// Graph construction configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub max_degree: usize,
    pub l_build: usize,
    pub alpha: f32,
    /// 0 means one thread per available core
    pub num_threads: usize,
    pub batch_fraction: f64,
    pub seed: u64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        let params = BuildParams::default();
        Self {
            max_degree: params.max_degree,
            l_build: params.l_build,
            alpha: params.alpha,
            num_threads: 0,
            batch_fraction: params.batch_fraction,
            seed: params.seed,
        }
    }
}

impl BuildConfig {
    pub fn to_params(&self) -> BuildParams {
        BuildParams {
            max_degree: self.max_degree,
            l_build: self.l_build,
            alpha: self.alpha,
            num_threads: resolve_threads(self.num_threads),
            batch_fraction: self.batch_fraction,
            seed: self.seed,
        }
    }
}

/// Query configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub k: usize,
    pub l_search: usize,
    pub visit_limit: Option<usize>,
    /// 0 means one thread per available core
    pub num_threads: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            k: 10,
            l_search: 100,
            visit_limit: None,
            num_threads: 0,
        }
    }
}

impl SearchConfig {
    pub fn to_params(&self) -> SearchParams {
        SearchParams {
            k: self.k,
            l_search: self.l_search,
            visit_limit: self.visit_limit,
        }
    }

    pub fn threads(&self) -> usize {
        resolve_threads(self.num_threads)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Text,
        }
    }
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_tracing(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Log formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

fn resolve_threads(requested: usize) -> usize {
    if requested == 0 {
        default_threads()
    } else {
        requested
    }
}
