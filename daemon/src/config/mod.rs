use config::{Config, Environment, File};
use umbra_engine::config::{ConfigValidationError, EngineConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod collaborators;

pub use collaborators::{CollaboratorsConfig, CommandTemplate};

/// Prefix of environment overrides, e.g. `UMBRA_IDLE_CHECKER__ENABLED=true`.
pub const ENV_PREFIX: &str = "UMBRA";

#[derive(Error, Debug)]
pub enum ConfigLoadError {
    #[error("Failed to determine config directory")]
    ConfigDir,

    #[error("Configuration loading failed: {0}. Please check your config file and environment variables.")]
    Load(#[source] config::ConfigError),

    #[error("Failed to deserialize config: {0}")]
    Deserialize(#[source] config::ConfigError),

    #[error("Configuration validation failed:\n{}", format_validation(.0))]
    Validation(Vec<ConfigValidationError>),
}

fn format_validation(errors: &[ConfigValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.user_message())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Everything the daemon reads from its config file.
///
/// The engine settings sit at the top level of the file; `[logging]` and
/// `[collaborators]` belong to the daemon only.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(flatten)]
    engine: EngineConfig,
    #[serde(default)]
    logging: LoggingConfig,
    #[serde(default)]
    collaborators: CollaboratorsConfig,
}

impl AppConfig {
    pub fn engine(&self) -> &EngineConfig {
        &self.engine
    }

    pub fn into_engine(self) -> EngineConfig {
        self.engine
    }

    pub fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    pub fn collaborators(&self) -> &CollaboratorsConfig {
        &self.collaborators
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
pub struct LoggingConfig {
    level: Option<String>,
    file: Option<String>,
}

impl LoggingConfig {
    pub fn level(&self) -> &str {
        self.level.as_deref().unwrap_or("info")
    }

    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }
}

/// Directory holding the daemon's configuration.
pub fn config_dir() -> Result<PathBuf, ConfigLoadError> {
    dirs::config_dir()
        .map(|mut path| {
            path.push("umbra");
            path
        })
        .ok_or(ConfigLoadError::ConfigDir)
}

pub fn default_config_path() -> Result<PathBuf, ConfigLoadError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Load, deserialize and validate the configuration at `path`.
///
/// Values from a `.env` file and `UMBRA_*` environment variables override the
/// file. Every validation problem is reported at once.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigLoadError> {
    dotenv::dotenv().ok();

    let env_source = Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true);

    let config = Config::builder()
        .add_source(File::from(path))
        .add_source(env_source)
        .build()
        .map_err(ConfigLoadError::Load)?;

    let app_config = config
        .try_deserialize::<AppConfig>()
        .map_err(ConfigLoadError::Deserialize)?;

    app_config
        .engine
        .validate()
        .map_err(ConfigLoadError::Validation)?;
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_defaults() {
        let logging = LoggingConfig::default();
        assert_eq!(logging.level(), "info");
        assert_eq!(logging.file(), None);
    }

    #[test]
    fn test_default_path_ends_with_umbra_config() {
        if let Ok(path) = default_config_path() {
            assert!(path.ends_with("umbra/config.toml"));
        }
    }

    #[test]
    fn test_validation_message_lists_every_problem() {
        let error = ConfigLoadError::Validation(vec![
            ConfigValidationError::GpuThreshold {
                configured: 150,
                limit: 100,
            },
            ConfigValidationError::GpuSamples {
                configured: 500,
                limit: 100,
            },
        ]);
        let message = error.to_string();
        assert!(message.contains("gpu_monitoring.threshold"));
        assert!(message.contains("gpu_monitoring.samples"));
    }
}
