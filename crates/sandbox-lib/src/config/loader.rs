//! Configuration loading
//!
//! Coordinates the .env files and the SANDBOX_* environment into one
//! validated `SandboxConfig`.

use super::{SandboxConfig, defaults};
use crate::primitives::ConfigError;
use tracing::debug;

impl SandboxConfig {
    /// Load config: defaults -> .env files -> SANDBOX_* env vars
    pub fn load() -> Result<Self, ConfigError> {
        use dotenvy::from_filename;

        // .env files are optional; only unreadable or malformed ones are errors
        for env_file in defaults::ENV_FILES {
            match from_filename(env_file) {
                Ok(path) => debug!(file = %path.display(), "Loaded environment file"),
                Err(e) if e.not_found() => {}
                Err(e) => {
                    return Err(ConfigError::EnvFileError {
                        file: env_file.to_string(),
                        source: e,
                    });
                }
            }
        }

        let config: Self = envy::prefixed(defaults::ENV_PREFIX).from_env()?;
        config.validate()?;

        debug!(backend = ?config.backend, "Sandbox configuration loaded");
        Ok(config)
    }

    /// Build a config from explicit key/value pairs instead of the process
    /// environment. Keys carry the `SANDBOX_` prefix like real variables.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let pairs = vars.into_iter().map(|(k, v)| (k.into(), v.into()));
        let config: Self = envy::prefixed(defaults::ENV_PREFIX).from_iter(pairs)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    include!("loader.test.rs");
}
