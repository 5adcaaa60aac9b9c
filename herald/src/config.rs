//! Dispatcher configuration
//!
//! Every field has a default, so a config file only lists what it changes:
//!
//! ```json
//! { "prefix": "?", "respond_to_usage_errors": false }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for loading a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// How raw input lines are recognised and how usage errors are reported
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Text a line must start with to be treated as a command
    pub prefix: String,

    /// Send usage errors back through the messenger
    pub respond_to_usage_errors: bool,

    /// Match the prefix exactly instead of ignoring case
    pub case_sensitive_prefix: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            prefix: "!".to_string(),
            respond_to_usage_errors: true,
            case_sensitive_prefix: true,
        }
    }
}

impl DispatchConfig {
    /// Parse a JSON document
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_usage_responses(mut self, enabled: bool) -> Self {
        self.respond_to_usage_errors = enabled;
        self
    }

    pub fn with_case_sensitive_prefix(mut self, enabled: bool) -> Self {
        self.case_sensitive_prefix = enabled;
        self
    }
}
