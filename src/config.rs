//! Runtime configuration (`nativebridge.toml`)

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{RtResult, RuntimeError};
use crate::logging::{self, LogConfig};
use crate::runtime::{self, DEFAULT_RECURSION_LIMIT};

/// Name looked up by [`Config::discover`]
pub const CONFIG_FILE: &str = "nativebridge.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_recursion_limit")]
    pub recursion_limit: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    #[serde(default)]
    pub spans: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
            file: None,
            spans: false,
        }
    }
}

fn default_recursion_limit() -> u32 {
    DEFAULT_RECURSION_LIMIT
}

fn default_level() -> String {
    "warn".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> RtResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| RuntimeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&content)
            .map_err(|e| RuntimeError::Config(format!("{}: {}", path.display(), e)))?;
        logging::log_config_loaded(path);
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> RtResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| RuntimeError::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Find `nativebridge.toml` in the current directory or its parents
    pub fn discover() -> RtResult<Self> {
        let mut current = std::env::current_dir().ok();
        while let Some(dir) = current {
            let candidate = dir.join(CONFIG_FILE);
            if candidate.is_file() {
                return Self::from_file(&candidate);
            }
            current = dir.parent().map(Path::to_path_buf);
        }
        Ok(Self::default())
    }

    pub fn to_toml(&self) -> RtResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| RuntimeError::Config(format!("failed to serialize config: {}", e)))
    }

    /// Apply `NATIVEBRIDGE_RECURSION_LIMIT` if set
    pub fn with_env(mut self) -> RtResult<Self> {
        if let Ok(value) = std::env::var("NATIVEBRIDGE_RECURSION_LIMIT") {
            self.runtime.recursion_limit = value.trim().parse().map_err(|_| {
                RuntimeError::Config(format!(
                    "NATIVEBRIDGE_RECURSION_LIMIT must be a positive integer, got '{}'",
                    value
                ))
            })?;
            self.validate()?;
        }
        Ok(self)
    }

    fn validate(&self) -> RtResult<()> {
        if self.runtime.recursion_limit == 0 {
            return Err(RuntimeError::Config(
                "runtime.recursion_limit must be at least 1".to_string(),
            ));
        }
        if logging::parse_level(&self.logging.level).is_none() {
            return Err(RuntimeError::Config(format!(
                "unknown log level '{}'",
                self.logging.level
            )));
        }
        Ok(())
    }

    /// Logging settings with environment overrides on top
    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            level: logging::parse_level(&self.logging.level).unwrap_or(tracing::Level::WARN),
            log_path: self.logging.file.clone(),
            json_format: self.logging.json,
            show_spans: self.logging.spans,
        }
        .with_env()
    }

    /// Install the recursion limit for this thread and threads started later
    pub fn apply(&self) {
        runtime::set_default_recursion_limit(self.runtime.recursion_limit);
        logging::log_recursion_limit(self.runtime.recursion_limit);
    }
}
