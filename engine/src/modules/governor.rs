use super::{Module, ModuleKind, TimerAffinity};
use crate::clock::Clock;
use crate::collaborators::OsSettingWatcher;
use crate::config::{ConfigStore, EngineConfig};
use crate::engine::EngineContext;
use crate::governors::{ActiveGovernor, NightLightGovernor, TimeSwitchGovernor};
use crate::model::{GovernorEvent, GovernorKind};
use crate::state::GlobalState;
use crate::theme_manager::ThemeManager;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;

/// Drives the active governor and turns its events into approach signals and
/// switch requests.
pub struct GovernorModule {
    state: Arc<GlobalState>,
    config: Arc<ConfigStore>,
    theme_manager: Arc<ThemeManager>,
    clock: Arc<dyn Clock>,
    night_light: Option<Arc<dyn OsSettingWatcher>>,
    active: Mutex<Option<ActiveGovernor>>,
    trigger: Arc<Notify>,
}

impl GovernorModule {
    pub fn new(context: &EngineContext) -> Self {
        Self {
            state: context.state.clone(),
            config: context.config.clone(),
            theme_manager: context.theme_manager.clone(),
            clock: context.clock.clone(),
            night_light: context.collaborators.night_light.clone(),
            active: Mutex::new(None),
            trigger: Arc::new(Notify::new()),
        }
    }

    fn build(&self, kind: GovernorKind) -> ActiveGovernor {
        match kind {
            GovernorKind::Default => ActiveGovernor::TimeBased(TimeSwitchGovernor::new(
                self.state.clone(),
                self.clock.clone(),
            )),
            GovernorKind::NightLight => ActiveGovernor::NightLightBased(NightLightGovernor::new(
                self.state.clone(),
                self.clock.clone(),
                self.night_light.clone(),
                self.trigger.clone(),
            )),
        }
    }

    /// Make `kind` the active governor. Returns true if a governor was created
    /// or swapped.
    pub async fn auto_manage_governors(&self, kind: GovernorKind) -> bool {
        let mut active = self.active.lock().await;
        if active.as_ref().map(ActiveGovernor::kind) == Some(kind) {
            return false;
        }
        let config = self.config.snapshot();
        self.swap(&mut active, kind, &config);
        true
    }

    fn swap(&self, active: &mut Option<ActiveGovernor>, kind: GovernorKind, config: &EngineConfig) {
        if let Some(mut previous) = active.take() {
            log::info!("Governor {:?} replaced by {:?}", previous.kind(), kind);
            previous.disable_hook();
        }
        let mut governor = self.build(kind);
        governor.enable_hook(config);
        *active = Some(governor);
        self.state.set_theme_switch_approaching(false);
    }

    /// Make the active governor send its current request again on the next
    /// run, even if it was already applied.
    pub async fn invalidate(&self) {
        if let Some(governor) = self.active.lock().await.as_mut() {
            log::debug!("Governor {:?} invalidated", governor.kind());
            governor.invalidate();
        }
    }

    pub async fn active_kind(&self) -> Option<GovernorKind> {
        self.active.lock().await.as_ref().map(ActiveGovernor::kind)
    }

    /// Fire whenever the night light governor signals an edge, until `cancel`.
    pub async fn start_trigger_listener(self: Arc<Self>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => return,
                () = self.trigger.notified() => {
                    if self.active.lock().await.is_some() {
                        log::debug!("Governor woken by external trigger");
                        self.fire().await;
                    }
                }
            }
        }
    }

    async fn handle_instant(&self, governor: &mut ActiveGovernor, event: GovernorEvent) {
        self.state.set_theme_switch_approaching(true);
        for dependency in self.state.switch_dependencies() {
            log::debug!("Running resume check of {}", dependency.name());
            dependency.fire().await;
        }
        if let Some(request) = event.request {
            let outcome = self.theme_manager.request_switch(request).await;
            governor.acknowledge(&outcome);
        }
        self.state.set_theme_switch_approaching(false);
    }
}

#[async_trait]
impl Module for GovernorModule {
    fn name(&self) -> &'static str {
        ModuleKind::Governor.name()
    }

    fn timer_affinity(&self) -> TimerAffinity {
        TimerAffinity::Main
    }

    fn priority(&self) -> i32 {
        1
    }

    fn fire_on_registration(&self) -> bool {
        true
    }

    async fn fire(&self) {
        let config = self.config.snapshot();
        let mut active = self.active.lock().await;
        if active.is_none() {
            self.swap(&mut active, config.governor(), &config);
        }
        let Some(governor) = active.as_mut() else {
            return;
        };

        let event = governor.run(&config);
        if event.instant {
            self.handle_instant(governor, event).await;
            return;
        }

        if event.in_switch_window && self.state.set_theme_switch_approaching(true) {
            log::info!("Theme switch approaching");
        }

        if let Some(request) = event.request {
            let outcome = self.theme_manager.request_switch(request).await;
            governor.acknowledge(&outcome);
        }

        if !event.in_switch_window && self.state.set_theme_switch_approaching(false) {
            log::debug!("Switch approach ended");
        }
    }

    async fn cleanup(&self) {
        if let Some(mut governor) = self.active.lock().await.take() {
            governor.disable_hook();
        }
        self.state.set_theme_switch_approaching(false);
    }
}
