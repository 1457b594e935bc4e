//! Sandbox configuration management
//!
//! Handles config loading, validation, and environment variable processing
//! following the precedence: defaults -> .env files -> SANDBOX_* env vars.

use crate::primitives::*;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

mod loader;

/// Default configuration values
pub mod defaults {
    pub const BACKEND: &str = "embedded";
    pub const LOG_LEVEL: &str = "1"; // Warnings and errors only by default
    pub const LOG_FORMAT: &str = "text";
    pub const LOG_OUTPUT: &str = "test";
    pub const HTTP_TIMEOUT: &str = "30";
    pub const ENV_PREFIX: &str = "SANDBOX_";
    pub const ENV_FILES: [&str; 2] = [".env.testing", ".env"];
}

/// Default value functions for configuration fields
mod default_fns {
    use super::*;

    pub fn backend() -> BackendKind {
        defaults::BACKEND.parse().unwrap_or(BackendKind::Embedded)
    }

    pub fn log_level() -> u8 {
        defaults::LOG_LEVEL.parse().unwrap_or(1)
    }

    pub fn log_format() -> LogFormat {
        defaults::LOG_FORMAT.parse().unwrap_or(LogFormat::Text)
    }

    pub fn log_output() -> LogOutput {
        defaults::LOG_OUTPUT.parse().unwrap_or(LogOutput::Test)
    }

    pub fn http_timeout() -> u64 {
        defaults::HTTP_TIMEOUT.parse().unwrap_or(30)
    }
}

/// Sandbox configuration structure
///
/// Field names map to `SANDBOX_<FIELD>` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct SandboxConfig {
    /// Storage backend family (embedded, client-server)
    #[serde(
        default = "default_fns::backend",
        deserialize_with = "deserialize_from_str"
    )]
    pub backend: BackendKind,

    /// Embedded database file; in-memory when unset
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Start every test with unmatched HTTP requests blocked
    #[serde(default)]
    pub block_unmatched: bool,

    /// Treat a backend without transactional DDL as unable to isolate tests
    #[serde(default)]
    pub require_transactional_ddl: bool,

    /// Verbosity level (0=error, 1=warn, 2=info, 3=debug, 4=trace)
    #[serde(default = "default_fns::log_level")]
    pub log_level: u8,

    /// Output format (text, json, pretty)
    #[serde(
        default = "default_fns::log_format",
        deserialize_with = "deserialize_from_str"
    )]
    pub log_format: LogFormat,

    /// Log output stream (stderr, stdout, test)
    #[serde(
        default = "default_fns::log_output",
        deserialize_with = "deserialize_from_str"
    )]
    pub log_output: LogOutput,

    /// Timeout in seconds for requests that pass through to the network
    #[serde(default = "default_fns::http_timeout")]
    pub http_timeout: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            backend: default_fns::backend(),
            database_path: None,
            block_unmatched: false,
            require_transactional_ddl: false,
            log_level: default_fns::log_level(),
            log_format: default_fns::log_format(),
            log_output: default_fns::log_output(),
            http_timeout: default_fns::http_timeout(),
        }
    }
}

impl SandboxConfig {
    /// Create LoggerConfig from the sandbox settings
    pub fn to_logger_config(&self) -> LoggerConfig {
        LoggerConfig {
            level: LogLevel::from_verbosity(self.log_level),
            format: self.log_format,
            output: self.log_output,
        }
    }

    /// Timeout applied to pass-through HTTP requests
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout)
    }

    /// Validate the final configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http_timeout == 0 {
            return Err(ConfigError::ValidationFailed {
                reason: "http_timeout must be greater than zero".to_string(),
            });
        }

        if let Some(path) = &self.database_path {
            if self.backend != BackendKind::Embedded {
                return Err(ConfigError::ValidationFailed {
                    reason: format!(
                        "database_path is only meaningful for the embedded backend, got {:?}",
                        self.backend
                    ),
                });
            }

            let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
            if let Some(parent) = parent
                && !parent.is_dir()
            {
                return Err(ConfigError::ValidationFailed {
                    reason: format!("database directory does not exist: {}", parent.display()),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    include!("mod.test.rs");
}
