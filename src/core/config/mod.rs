//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! There are two configuration scopes:
//! - **Global**: User-level settings
//! - **Codebase**: Settings stored next to the branches
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. Codebase config file
//! 4. CLI flags (not handled here)
//!
//! # Example
//!
//! ```no_run
//! use trellis::core::config::Config;
//! use std::path::Path;
//!
//! let result = Config::load(Some(Path::new(".trellis"))).unwrap();
//! let config = result.config;
//!
//! println!("Branch: {}", config.default_branch());
//! println!("Debounce: {:?}", config.debounce());
//! ```

pub mod schema;

pub use schema::{CodebaseConfig, GlobalConfig};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::core::paths::CodebasePaths;

/// Branch loaded when nothing else is configured.
pub const DEFAULT_BRANCH: &str = "master";

/// Suffix of watched source files when nothing else is configured.
pub const DEFAULT_SOURCE_SUFFIX: &str = ".u";

/// Debounce quiet interval when nothing else is configured.
pub const DEFAULT_DEBOUNCE_MS: u64 = 400;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration.
    pub config: Config,
}

/// Merged configuration from all sources.
///
/// Accessors apply precedence: codebase config overrides global config.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Global configuration
    pub global: GlobalConfig,
    /// Codebase configuration (if present)
    pub codebase: Option<CodebaseConfig>,
    global_path: Option<PathBuf>,
    codebase_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// If `codebase` is provided, also loads `<codebase>/config.toml`.
    ///
    /// # Errors
    ///
    /// Returns an error if config files exist but cannot be parsed.
    /// Missing config files are not an error (defaults are used).
    pub fn load(codebase: Option<&Path>) -> Result<ConfigLoadResult, ConfigError> {
        let global_path = Self::find_global();
        Self::load_from(global_path.as_deref(), codebase)
    }

    /// Load configuration from an explicit global file and codebase root.
    ///
    /// # Errors
    ///
    /// Returns an error if a present file cannot be read, parsed or validated.
    pub fn load_from(
        global_path: Option<&Path>,
        codebase: Option<&Path>,
    ) -> Result<ConfigLoadResult, ConfigError> {
        let global = match global_path {
            Some(path) if path.exists() => read_toml::<GlobalConfig>(path)?,
            _ => GlobalConfig::default(),
        };

        let codebase_path = codebase
            .map(|root| CodebasePaths::new(root).config_path())
            .filter(|path| path.exists());
        let codebase_config = match &codebase_path {
            Some(path) => Some(read_toml::<CodebaseConfig>(path)?),
            None => None,
        };

        global.validate()?;
        if let Some(ref c) = codebase_config {
            c.validate()?;
        }

        Ok(ConfigLoadResult {
            config: Config {
                global,
                codebase: codebase_config,
                global_path: global_path
                    .filter(|path| path.exists())
                    .map(Path::to_path_buf),
                codebase_path,
            },
        })
    }

    /// Locate the global config file, if any exists.
    fn find_global() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("TRELLIS_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("trellis/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        dirs::home_dir()
            .map(|home| home.join(".trellis/config.toml"))
            .filter(|path| path.exists())
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    /// Branch loaded at startup. Defaults to `master`.
    pub fn default_branch(&self) -> &str {
        self.codebase
            .as_ref()
            .and_then(|c| c.default_branch.as_deref())
            .unwrap_or(DEFAULT_BRANCH)
    }

    /// Directory watched for source files. Defaults to the working directory.
    pub fn source_dir(&self) -> PathBuf {
        self.codebase
            .as_ref()
            .and_then(|c| c.source_dir.as_deref())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Suffix of watched source files. Defaults to `.u`.
    pub fn source_suffix(&self) -> &str {
        self.codebase
            .as_ref()
            .and_then(|c| c.source_suffix.as_deref())
            .or(self.global.source_suffix.as_deref())
            .unwrap_or(DEFAULT_SOURCE_SUFFIX)
    }

    /// Debounce quiet interval. Defaults to 400ms.
    pub fn debounce(&self) -> Duration {
        let ms = self
            .codebase
            .as_ref()
            .and_then(|c| c.debounce_ms)
            .or(self.global.debounce_ms)
            .unwrap_or(DEFAULT_DEBOUNCE_MS);
        Duration::from_millis(ms)
    }

    /// Whether prompts are allowed. Defaults to `true`.
    pub fn interactive(&self) -> bool {
        self.global.interactive.unwrap_or(true)
    }

    /// Get the path to the loaded global config file.
    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    /// Get the path to the loaded codebase config file.
    pub fn codebase_config_loaded_from(&self) -> Option<&Path> {
        self.codebase_path.as_deref()
    }
}

fn read_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
