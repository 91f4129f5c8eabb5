//! Seams to the outside world.
//!
//! The engine never touches the OS directly. Theme writes, probes and the night
//! light watcher are injected through the traits below, bundled in
//! [`Collaborators`].

use crate::common::{ApplyError, WatcherError};
use crate::model::{RefreshType, SunTimes, Theme};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashSet;
use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Writes a value into one OS subsystem and reads it back.
#[async_trait]
pub trait Applier<V>: Send + Sync
where
    V: Send + Sync + 'static,
{
    async fn apply(&self, value: &V) -> Result<(), ApplyError>;

    /// Live value, `None` if the subsystem cannot report it.
    async fn query(&self) -> Result<Option<V>, ApplyError>;
}

/// A fully resolved script call.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptInvocation {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub timeout: Duration,
    pub working_directory: Option<PathBuf>,
}

#[async_trait]
pub trait ScriptRunner: Send + Sync {
    async fn run(&self, script: &ScriptInvocation) -> Result<(), ApplyError>;
}

/// Time since the last user input.
pub trait IdleProbe: Send + Sync {
    fn idle_duration(&self) -> Result<Duration, ApplyError>;
}

pub trait ProcessProbe: Send + Sync {
    /// Names of the running processes.
    fn running_processes(&self) -> Result<HashSet<String>, ApplyError>;
}

#[async_trait]
pub trait GpuProbe: Send + Sync {
    /// Current GPU usage in percent.
    async fn usage_percent(&self) -> Result<u32, ApplyError>;
}

#[async_trait]
pub trait SunTimesProvider: Send + Sync {
    async fn sun_times(&self, date: NaiveDate) -> Result<SunTimes, ApplyError>;
}

pub type SubscriptionId = u64;
pub type SettingCallback = Arc<dyn Fn(bool) + Send + Sync>;

/// Watches a boolean OS setting such as night light.
pub trait OsSettingWatcher: Send + Sync {
    fn current(&self) -> Result<bool, WatcherError>;

    /// Call `callback` with the new value every time the setting changes.
    fn subscribe(&self, callback: SettingCallback) -> Result<SubscriptionId, WatcherError>;

    fn unsubscribe(&self, id: SubscriptionId);
}

/// Repaints the desktop after a switch.
#[async_trait]
pub trait VisualRefresher: Send + Sync {
    async fn refresh(&self, kind: RefreshType) -> Result<(), ApplyError>;
}

/// Applier that only logs. Used for subsystems without a configured backend.
#[derive(Debug, Clone)]
pub struct LogApplier {
    subsystem: &'static str,
}

impl LogApplier {
    pub fn new(subsystem: &'static str) -> Self {
        Self { subsystem }
    }
}

#[async_trait]
impl<V> Applier<V> for LogApplier
where
    V: Debug + Send + Sync + 'static,
{
    async fn apply(&self, value: &V) -> Result<(), ApplyError> {
        log::info!("{}: would apply {:?}", self.subsystem, value);
        Ok(())
    }

    async fn query(&self) -> Result<Option<V>, ApplyError> {
        Ok(None)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LogScriptRunner;

#[async_trait]
impl ScriptRunner for LogScriptRunner {
    async fn run(&self, script: &ScriptInvocation) -> Result<(), ApplyError> {
        log::info!(
            "Script {}: would run {} {}",
            script.name,
            script.command,
            script.args.join(" ")
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct LogRefresher;

#[async_trait]
impl VisualRefresher for LogRefresher {
    async fn refresh(&self, kind: RefreshType) -> Result<(), ApplyError> {
        log::info!("Would perform {kind} visual refresh");
        Ok(())
    }
}

/// Everything the engine talks to. Probes are optional; modules that need a
/// missing probe cannot be created and the warden keeps retrying.
#[derive(Clone)]
pub struct Collaborators {
    pub system_theme: Arc<dyn Applier<Theme>>,
    pub apps_theme: Arc<dyn Applier<Theme>>,
    pub taskbar_accent: Arc<dyn Applier<bool>>,
    pub accent_color: Arc<dyn Applier<bool>>,
    pub wallpaper: Arc<dyn Applier<PathBuf>>,
    pub cursor: Arc<dyn Applier<String>>,
    pub scripts: Arc<dyn ScriptRunner>,
    pub refresher: Arc<dyn VisualRefresher>,
    pub idle: Option<Arc<dyn IdleProbe>>,
    pub processes: Option<Arc<dyn ProcessProbe>>,
    pub gpu: Option<Arc<dyn GpuProbe>>,
    pub sun_times: Option<Arc<dyn SunTimesProvider>>,
    pub night_light: Option<Arc<dyn OsSettingWatcher>>,
}

impl Collaborators {
    /// Logging appliers everywhere and no probes.
    pub fn logging() -> Self {
        Self {
            system_theme: Arc::new(LogApplier::new("system_theme")),
            apps_theme: Arc::new(LogApplier::new("apps_theme")),
            taskbar_accent: Arc::new(LogApplier::new("taskbar_accent")),
            accent_color: Arc::new(LogApplier::new("accent_color")),
            wallpaper: Arc::new(LogApplier::new("wallpaper")),
            cursor: Arc::new(LogApplier::new("cursor")),
            scripts: Arc::new(LogScriptRunner),
            refresher: Arc::new(LogRefresher),
            idle: None,
            processes: None,
            gpu: None,
            sun_times: None,
            night_light: None,
        }
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self::logging()
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("idle", &self.idle.is_some())
            .field("processes", &self.processes.is_some())
            .field("gpu", &self.gpu.is_some())
            .field("sun_times", &self.sun_times.is_some())
            .field("night_light", &self.night_light.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_applier_accepts_everything() {
        let applier = LogApplier::new("system_theme");
        assert_eq!(
            Applier::<Theme>::apply(&applier, &Theme::Dark).await,
            Ok(())
        );
        assert_eq!(Applier::<Theme>::query(&applier).await, Ok(None));
    }

    #[test]
    fn test_logging_bundle_has_no_probes() {
        let collaborators = Collaborators::logging();
        assert!(collaborators.idle.is_none());
        assert!(collaborators.night_light.is_none());
    }
}
