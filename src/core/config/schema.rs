//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Global Config
//!
//! Located at (in order of precedence):
//! 1. `$TRELLIS_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/trellis/config.toml`
//! 3. `~/.trellis/config.toml` (canonical write location)
//!
//! # Codebase Config
//!
//! Located at `<codebase>/config.toml`.
//!
//! # Validation
//!
//! Config values are validated after parsing to ensure they conform to
//! expected formats (e.g., the default branch must be a valid branch name).

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::BranchName;

/// Global configuration (user scope).
///
/// # Example
///
/// ```toml
/// interactive = true
/// debounce_ms = 400
/// source_suffix = ".u"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Whether ambiguous renames may prompt
    pub interactive: Option<bool>,

    /// Quiet interval before a burst of branch-file changes is flushed
    pub debounce_ms: Option<u64>,

    /// Suffix of watched source files
    pub source_suffix: Option<String>,
}

impl GlobalConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_debounce(self.debounce_ms)?;
        validate_suffix(self.source_suffix.as_deref())
    }
}

/// Codebase configuration.
///
/// # Example
///
/// ```toml
/// default_branch = "master"
/// source_dir = "src"
/// source_suffix = ".u"
/// debounce_ms = 250
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CodebaseConfig {
    /// Branch loaded at startup
    pub default_branch: Option<String>,

    /// Directory watched for source files
    pub source_dir: Option<String>,

    /// Suffix of watched source files
    pub source_suffix: Option<String>,

    /// Quiet interval before a burst of branch-file changes is flushed
    pub debounce_ms: Option<u64>,
}

impl CodebaseConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(branch) = &self.default_branch {
            BranchName::new(branch).map_err(|e| {
                ConfigError::InvalidValue(format!("invalid default branch: {}", e))
            })?;
        }

        if let Some(dir) = &self.source_dir {
            if dir.is_empty() {
                return Err(ConfigError::InvalidValue(
                    "source_dir cannot be empty".to_string(),
                ));
            }
        }

        validate_debounce(self.debounce_ms)?;
        validate_suffix(self.source_suffix.as_deref())
    }
}

fn validate_debounce(debounce_ms: Option<u64>) -> Result<(), ConfigError> {
    if debounce_ms == Some(0) {
        return Err(ConfigError::InvalidValue(
            "debounce_ms must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_suffix(suffix: Option<&str>) -> Result<(), ConfigError> {
    if let Some(suffix) = suffix {
        if suffix.is_empty() || suffix.contains('/') {
            return Err(ConfigError::InvalidValue(format!(
                "invalid source suffix '{}'",
                suffix
            )));
        }
    }
    Ok(())
}
