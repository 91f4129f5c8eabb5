//! The long-running service: engine lifecycle plus config hot reload.

use crate::collaborators::build_collaborators;
use crate::config::{AppConfig, CollaboratorsConfig, load_config};
use crate::error::DaemonResult;
use crate::watcher::ConfigWatcher;
use umbra_engine::engine::Engine;
use umbra_engine::commands::EngineStatus;
use std::future::Future;
use std::path::{Path, PathBuf};

pub struct Service {
    engine: Engine,
    config_path: PathBuf,
    collaborators: CollaboratorsConfig,
}

impl Service {
    pub fn new(config_path: impl Into<PathBuf>, config: AppConfig) -> DaemonResult<Self> {
        let collaborators = config.collaborators().clone();
        let engine = Engine::new(config.into_engine(), build_collaborators(&collaborators))?;
        engine
            .state()
            .postpone()
            .on_cleared(|| log::info!("Postpone queue cleared"));

        Ok(Self {
            engine,
            config_path: config_path.into(),
            collaborators,
        })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Re-read the config file and hand the engine settings to the engine.
    /// Returns false when the file could not be used; the previous settings stay
    /// in effect then.
    pub async fn reload(&mut self) -> bool {
        let config = match load_config(&self.config_path) {
            Ok(config) => config,
            Err(e) => {
                log::error!("Keeping previous configuration: {}", e);
                return false;
            }
        };

        if config.collaborators() != &self.collaborators {
            log::warn!("Collaborator changes take effect after a restart");
        }

        match self.engine.reload_config(config.into_engine()).await {
            Ok(_) => true,
            Err(e) => {
                log::error!("Keeping previous configuration: {}", e);
                false
            }
        }
    }

    /// Reconcile every timer once and report the resulting state.
    pub async fn run_once(&self) -> DaemonResult<EngineStatus> {
        self.engine.initialize().await?;
        self.engine.tick_all().await;
        let status = self.engine.status().await;
        self.engine.shutdown().await;
        Ok(status)
    }

    /// Run until `shutdown` resolves, reloading whenever the config file changes.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) -> DaemonResult<()> {
        self.engine.start().await?;

        let mut watcher = match ConfigWatcher::new(&self.config_path) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                log::warn!("Config hot reload disabled: {}", e);
                None
            }
        };

        tokio::pin!(shutdown);
        loop {
            let changed = tokio::select! {
                _ = &mut shutdown => break,
                changed = next_change(&mut watcher) => changed,
            };
            if changed.is_none() {
                log::warn!("Config watcher stopped, hot reload disabled");
                watcher = None;
                continue;
            }
            log::info!("Config file changed, reloading");
            self.reload().await;
        }

        self.engine.shutdown().await;
        log::info!("Service stopped");
        Ok(())
    }
}

async fn next_change(watcher: &mut Option<ConfigWatcher>) -> Option<()> {
    match watcher {
        Some(watcher) => watcher.changed().await,
        None => std::future::pending().await,
    }
}
