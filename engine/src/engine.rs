//! Engine assembly and lifecycle.

use crate::clock::{Clock, SystemClock};
use crate::collaborators::Collaborators;
use crate::commands::{EngineCommand, EngineResponse, EngineStatus};
use crate::common::{EngineError, EngineResult};
use crate::components::{ComponentManager, default_components};
use crate::config::{ConfigStore, ConfigValidationError, EngineConfig};
use crate::model::{SwitchEventArgs, SwitchSource};
use crate::modules::timer::ModuleTimers;
use crate::modules::{GovernorModule, Module, ModuleRegistry, WardenModule};
use crate::postpone::{PostponeItem, SESSION_LOCK};
use crate::refresh::RefreshCoordinator;
use crate::state::GlobalState;
use crate::taskpool::TaskPool;
use crate::theme_manager::{SwitchOutcome, ThemeManager};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Long running background tasks: four timers, the refresh worker and the
/// governor wake-up listener.
const RESERVED_TASKS: usize = 6;

/// Shared handles passed to module factories.
#[derive(Clone)]
pub struct EngineContext {
    pub state: Arc<GlobalState>,
    pub config: Arc<ConfigStore>,
    pub theme_manager: Arc<ThemeManager>,
    pub clock: Arc<dyn Clock>,
    pub collaborators: Collaborators,
    pub tasks: Arc<TaskPool>,
}

/// The assembled switch engine.
///
/// Owns the timers, the warden and governor modules and the theme manager. The
/// host builds it once, calls [`start`](Engine::start) and talks to it through
/// [`execute_command`](Engine::execute_command) and
/// [`reload_config`](Engine::reload_config).
///
/// # Examples
///
/// ```no_run
/// use engine::collaborators::Collaborators;
/// use engine::commands::EngineCommand;
/// use engine::config::EngineConfig;
/// use engine::engine::Engine;
///
/// # async fn example() -> Result<(), engine::common::EngineError> {
/// let engine = Engine::new(EngineConfig::default(), Collaborators::logging())?;
/// engine.start().await;
///
/// let response = engine.execute_command(EngineCommand::GetStatus).await;
/// println!("{response:?}");
///
/// engine.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct Engine {
    context: EngineContext,
    timers: Arc<ModuleTimers>,
    governor: Arc<GovernorModule>,
    warden: Arc<WardenModule>,
    refresh: Arc<RefreshCoordinator>,
    initialized: AtomicBool,
    shut_down: AtomicBool,
}

impl Engine {
    pub fn new(config: EngineConfig, collaborators: Collaborators) -> EngineResult<Self> {
        Self::with_clock(config, collaborators, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: EngineConfig,
        collaborators: Collaborators,
        clock: Arc<dyn Clock>,
    ) -> EngineResult<Self> {
        Self::build(config, collaborators, clock, |_| {})
    }

    /// Build with a custom module registry. `configure` receives the default
    /// registry and may replace factories.
    pub fn with_registry(
        config: EngineConfig,
        collaborators: Collaborators,
        clock: Arc<dyn Clock>,
        configure: impl FnOnce(&mut ModuleRegistry),
    ) -> EngineResult<Self> {
        Self::build(config, collaborators, clock, configure)
    }

    fn build(
        config: EngineConfig,
        collaborators: Collaborators,
        clock: Arc<dyn Clock>,
        configure: impl FnOnce(&mut ModuleRegistry),
    ) -> EngineResult<Self> {
        config.validate().map_err(invalid_configuration)?;

        let state = Arc::new(GlobalState::new(clock.clone()));
        let refresh = Arc::new(RefreshCoordinator::new(collaborators.refresher.clone()));
        let components = ComponentManager::new(
            default_components(&state, &collaborators, &config),
            &config,
            refresh.clone(),
        );
        let tasks = Arc::new(TaskPool::new(
            config.tunable().max_background_tasks().max(RESERVED_TASKS),
        ));
        let timers = Arc::new(ModuleTimers::new(&config));
        let store = Arc::new(ConfigStore::new(config));
        let theme_manager = Arc::new(ThemeManager::new(
            state.clone(),
            components,
            store.clone(),
            clock.clone(),
        ));

        let context = EngineContext {
            state,
            config: store,
            theme_manager,
            clock,
            collaborators,
            tasks,
        };

        let governor = Arc::new(GovernorModule::new(&context));
        let mut registry = ModuleRegistry::with_defaults(governor.clone());
        configure(&mut registry);
        let warden = Arc::new(WardenModule::new(
            context.clone(),
            &timers,
            registry,
            governor.clone(),
        ));

        Ok(Self {
            context,
            timers,
            governor,
            warden,
            refresh,
            initialized: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn context(&self) -> &EngineContext {
        &self.context
    }

    pub fn state(&self) -> &Arc<GlobalState> {
        &self.context.state
    }

    pub fn theme_manager(&self) -> &Arc<ThemeManager> {
        &self.context.theme_manager
    }

    pub fn timers(&self) -> &Arc<ModuleTimers> {
        &self.timers
    }

    pub fn warden(&self) -> &Arc<WardenModule> {
        &self.warden
    }

    /// Register the warden, which reconciles modules right away. Does not start
    /// any background task; call [`tick_all`](Engine::tick_all) to drive timers
    /// by hand.
    pub async fn initialize(&self) -> EngineResult<()> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(EngineError::Shutdown);
        }
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let main = self.timers.get(self.warden.timer_affinity())?;
        main.register_module(self.warden.clone()).await;
        Ok(())
    }

    /// Initialise and start the timer loops, the refresh worker and the
    /// governor wake-up listener.
    pub async fn start(&self) -> EngineResult<()> {
        self.initialize().await?;
        let tasks = &self.context.tasks;

        for timer in self.timers.all() {
            tasks.execute("module timer", timer.run(tasks.token()));
        }
        tasks.execute("refresh worker", self.refresh.clone().run(tasks.token()));
        tasks.execute(
            "governor trigger",
            self.governor.clone().start_trigger_listener(tasks.token()),
        );
        log::info!("Engine started");
        Ok(())
    }

    /// Tick every timer once, main timer first.
    pub async fn tick_all(&self) {
        for timer in self.timers.all() {
            timer.tick().await;
        }
    }

    /// Validate and swap in a new configuration. On failure the previous one
    /// stays in effect.
    pub async fn reload_config(&self, config: EngineConfig) -> EngineResult<u64> {
        let generation = self
            .context
            .config
            .replace(config)
            .map_err(invalid_configuration)?;
        let config = self.context.config.snapshot();

        self.timers.apply_config(&config);
        let components = self.context.theme_manager.components();
        components.update_settings(&config).await;
        if config.theme_file_mode().enabled() {
            components.invoke_disable_incompatible().await;
        }
        // Components with reset caches only catch up if the governor asks again.
        self.governor.invalidate().await;
        if self.initialized.load(Ordering::SeqCst) {
            self.warden.reconcile().await;
        }
        log::info!("Configuration reloaded (generation {generation})");
        Ok(generation)
    }

    /// Execute a command and turn any failure into an error response.
    pub async fn execute_command(&self, command: EngineCommand) -> EngineResponse {
        log::debug!("Executing command: {command:?}");
        match self.handle_command(command).await {
            Ok(response) => response,
            Err(error) => {
                log::error!("Command execution failed: {error}");
                EngineResponse::error(&error)
            }
        }
    }

    async fn handle_command(&self, command: EngineCommand) -> EngineResult<EngineResponse> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(EngineError::Shutdown);
        }
        let manager = &self.context.theme_manager;

        let response = match command {
            EngineCommand::RequestSwitch { theme, source } => {
                let outcome = manager
                    .request_switch(SwitchEventArgs::new(source, theme))
                    .await;
                EngineResponse::SwitchRequested { outcome }
            }
            EngineCommand::SwitchThemeAutoPause { theme } => EngineResponse::SwitchRequested {
                outcome: manager.switch_theme_auto_pause(theme).await,
            },
            EngineCommand::SetForcedTheme { theme } => {
                let outcome = manager.set_forced_theme(theme).await;
                if outcome.is_some() && !theme.is_concrete() {
                    self.governor.invalidate().await;
                }
                EngineResponse::ForcedThemeSet { theme, outcome }
            }
            EngineCommand::ToggleSkipNextSwitch => EngineResponse::SkipNextSwitch {
                active: manager.toggle_skip_next_switch(),
            },
            EngineCommand::DelayAutoSwitch { minutes } => {
                if minutes == 0 {
                    return Err(EngineError::InvalidCommand {
                        reason: "delay must be at least one minute".to_string(),
                    });
                }
                let until = manager.delay_auto_switch(minutes).ok_or_else(|| {
                    EngineError::InvalidCommand {
                        reason: format!("could not delay switching by {minutes} minutes"),
                    }
                })?;
                EngineResponse::AutoSwitchDelayed { until }
            }
            EngineCommand::ClearPostpones => EngineResponse::PostponesCleared {
                removed: self.context.state.postpone().remove_user_clearable(),
            },
            EngineCommand::ForceRefresh => {
                manager.components().force_all().await;
                let theme = manager.current_theme();
                let outcome = manager
                    .request_switch(SwitchEventArgs::new(SwitchSource::Api, theme))
                    .await;
                EngineResponse::SwitchRequested { outcome }
            }
            EngineCommand::SessionLocked => {
                let item = PostponeItem::new(SESSION_LOCK).not_user_clearable();
                let postponed = self.context.state.postpone().add_item(item);
                if postponed {
                    log::info!("Session locked, automatic switching held");
                }
                EngineResponse::SessionLocked { postponed }
            }
            EngineCommand::SessionUnlocked => {
                self.context.state.postpone().remove(SESSION_LOCK);
                EngineResponse::Resynced {
                    outcome: self.resync(SwitchSource::SystemUnlock).await,
                }
            }
            EngineCommand::SystemResumed => {
                let expired = self.context.state.postpone().sync_expiry();
                if expired > 0 {
                    log::debug!("Removed {expired} postpones that expired during sleep");
                }
                EngineResponse::Resynced {
                    outcome: self.resync(SwitchSource::SystemResume).await,
                }
            }
            EngineCommand::GetStatus => EngineResponse::Status(Box::new(self.status().await)),
        };
        Ok(response)
    }

    async fn resync(&self, source: SwitchSource) -> Option<SwitchOutcome> {
        if !self.context.config.snapshot().auto_theme_switching_enabled() {
            log::info!("Automatic switching disabled, no action on {}", source);
            return None;
        }
        self.context.theme_manager.resync(source).await
    }

    pub async fn status(&self) -> EngineStatus {
        let state = &self.context.state;
        let config = self.context.config.snapshot();

        let mut modules = BTreeMap::new();
        for timer in self.timers.all() {
            modules.insert(timer.affinity().to_string(), timer.module_names().await);
        }

        EngineStatus {
            auto_theme_switching_enabled: config.auto_theme_switching_enabled(),
            governor: self.governor.active_kind().await,
            forced_theme: state.forced_theme(),
            requested_theme: state.requested_theme(),
            night_light_theme: state.night_light_theme(),
            theme_switch_approaching: state.theme_switch_approaching(),
            pending_resume_checks: state.pending_resume_checks(),
            postpones: state.postpone().items(),
            pending_switch: state.pending_switch(),
            component_themes: state.component_themes(),
            modules,
            sun_times: state.sun_times(),
            config_generation: self.context.config.generation(),
        }
    }

    /// Stop background tasks and deregister every module so cleanups release
    /// their postpones and subscriptions.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        log::info!("Shutting down engine");
        self.context.tasks.shutdown();
        for timer in self.timers.all() {
            timer.clear().await;
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

fn invalid_configuration(errors: Vec<ConfigValidationError>) -> EngineError {
    EngineError::InvalidConfiguration(errors.iter().map(|e| e.user_message()).collect())
}
