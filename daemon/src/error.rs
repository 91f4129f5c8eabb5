use crate::config::ConfigLoadError;
use umbra_engine::common::EngineError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DaemonError {
    #[error(transparent)]
    Config(#[from] ConfigLoadError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Failed to watch config file: {0}")]
    Watch(#[from] notify::Error),

    #[error("Failed to install logger: {0}")]
    Logger(#[from] log::SetLoggerError),
}

pub type DaemonResult<T> = Result<T, DaemonError>;
