use thiserror::Error;

/// Failures reported by subsystem collaborators (appliers, probes, script runners,
/// visual refreshers).
///
/// These never escape the engine: they are caught at the component or module
/// boundary, logged, and the affected unit retries on the next tick with its
/// cached state left untouched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApplyError {
    /// The underlying OS call or command failed.
    #[error("{subsystem} apply failed: {reason}")]
    Failed { subsystem: String, reason: String },

    /// The subsystem could not be queried for its live state.
    #[error("{subsystem} state query failed: {reason}")]
    QueryFailed { subsystem: String, reason: String },

    /// The operation did not complete within its time limit.
    #[error("{subsystem} timed out after {millis}ms")]
    Timeout { subsystem: String, millis: u64 },

    /// No backend is available for this subsystem on the current platform.
    #[error("{subsystem} is not supported on this platform")]
    Unsupported { subsystem: String },

    /// A component panicked while switching. Reported by the component manager.
    #[error("component {component} panicked while switching")]
    Panicked { component: String },
}

impl ApplyError {
    pub fn failed(subsystem: impl Into<String>, reason: impl ToString) -> Self {
        ApplyError::Failed {
            subsystem: subsystem.into(),
            reason: reason.to_string(),
        }
    }

    pub fn query_failed(subsystem: impl Into<String>, reason: impl ToString) -> Self {
        ApplyError::QueryFailed {
            subsystem: subsystem.into(),
            reason: reason.to_string(),
        }
    }

    pub fn unsupported(subsystem: impl Into<String>) -> Self {
        ApplyError::Unsupported {
            subsystem: subsystem.into(),
        }
    }
}

/// Errors raised while subscribing to an external OS setting.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WatcherError {
    #[error("could not subscribe to {setting}: {reason}")]
    SubscribeFailed { setting: String, reason: String },

    #[error("could not read {setting}: {reason}")]
    ReadFailed { setting: String, reason: String },

    #[error("watcher for {setting} is unavailable")]
    Unavailable { setting: String },
}

/// Engine-level errors.
///
/// # Error Categories
///
/// - [`ModuleUnavailable`] - a module factory could not build its module (for
///   example because the collaborator it needs is missing). The warden logs it and
///   retries on its next reconciliation.
/// - [`TimerNotFound`] - a module declared a timer affinity with no running timer.
/// - [`InvalidConfiguration`] - a configuration snapshot failed validation and was
///   rejected; the previous snapshot stays in effect.
/// - [`InvalidCommand`] - a command carried arguments the engine cannot act on.
/// - [`Shutdown`] - the engine is shutting down and no longer accepts work.
///
/// [`ModuleUnavailable`]: EngineError::ModuleUnavailable
/// [`TimerNotFound`]: EngineError::TimerNotFound
/// [`InvalidConfiguration`]: EngineError::InvalidConfiguration
/// [`InvalidCommand`]: EngineError::InvalidCommand
/// [`Shutdown`]: EngineError::Shutdown
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("module {module} could not be created: {reason}")]
    ModuleUnavailable { module: String, reason: String },

    #[error("no timer registered for affinity {affinity}")]
    TimerNotFound { affinity: String },

    #[error("invalid configuration: {}", .0.join("; "))]
    InvalidConfiguration(Vec<String>),

    #[error("invalid command: {reason}")]
    InvalidCommand { reason: String },

    #[error("engine is shutting down")]
    Shutdown,
}

impl EngineError {
    pub fn module_unavailable(module: impl Into<String>, reason: impl ToString) -> Self {
        EngineError::ModuleUnavailable {
            module: module.into(),
            reason: reason.to_string(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
