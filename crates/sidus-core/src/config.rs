//! Runtime configuration loader.
//!
//! Reads a `sidus.toml` and deserializes it into [`RuntimeConfig`]. Falls
//! back to defaults when the file is missing or malformed, so an agent can
//! always start.

use std::path::Path;

use sidus_types::config::RuntimeConfig;
use sidus_types::error::ConfigError;

/// Conventional file name for runtime configuration.
pub const CONFIG_FILE_NAME: &str = "sidus.toml";

/// Load runtime configuration from `path`, failing on any problem.
///
/// # Errors
///
/// [`ConfigError::Io`] when the file cannot be read and
/// [`ConfigError::Parse`] when it is not a valid runtime configuration.
pub async fn try_load_runtime_config(path: &Path) -> Result<RuntimeConfig, ConfigError> {
    let content = tokio::fs::read_to_string(path).await?;
    toml::from_str::<RuntimeConfig>(&content)
        .map(RuntimeConfig::validate)
        .map_err(|err| ConfigError::Parse(format!("{}: {err}", path.display())))
}

/// Load runtime configuration from `path`.
///
/// - Missing file: defaults.
/// - Unreadable or unparseable file: a warning, then defaults.
///
/// The result is always passed through [`RuntimeConfig::validate`].
pub async fn load_runtime_config(path: &Path) -> RuntimeConfig {
    match try_load_runtime_config(path).await {
        Ok(config) => config,
        Err(ConfigError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No {} found, using defaults", path.display());
            RuntimeConfig::default()
        }
        Err(err) => {
            tracing::warn!("Failed to load {}: {err}, using defaults", path.display());
            RuntimeConfig::default()
        }
    }
}

/// Load `{dir}/sidus.toml`.
pub async fn load_runtime_config_from_dir(dir: &Path) -> RuntimeConfig {
    load_runtime_config(&dir.join(CONFIG_FILE_NAME)).await
}
