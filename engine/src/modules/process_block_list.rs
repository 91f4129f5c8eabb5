use super::{Module, ModuleKind, TimerAffinity};
use crate::clock::Clock;
use crate::collaborators::ProcessProbe;
use crate::common::{EngineError, EngineResult};
use crate::config::{ConfigStore, EngineConfig};
use crate::engine::EngineContext;
use crate::governors::TimedThemeState;
use crate::model::GovernorKind;
use crate::state::GlobalState;
use async_trait::async_trait;
use chrono::TimeDelta;
use std::sync::Arc;

/// Minutes before a time based switch in which a held postpone is rechecked.
const RECHECK_GRACE_MINUTES: i64 = 1;

/// Holds switches back while a configured process is running.
pub struct ProcessBlockListModule {
    state: Arc<GlobalState>,
    config: Arc<ConfigStore>,
    clock: Arc<dyn Clock>,
    probe: Arc<dyn ProcessProbe>,
}

impl ProcessBlockListModule {
    pub fn new(context: &EngineContext) -> EngineResult<Self> {
        let probe = context.collaborators.processes.clone().ok_or_else(|| {
            EngineError::module_unavailable(
                ModuleKind::ProcessBlockList.name(),
                "no process probe configured",
            )
        })?;
        Ok(Self {
            state: context.state.clone(),
            config: context.config.clone(),
            clock: context.clock.clone(),
            probe,
        })
    }

    /// While postponing, the process list is only read again when a switch is
    /// close or already waiting.
    fn should_recheck(&self, config: &EngineConfig) -> bool {
        if self.state.theme_switch_approaching() || self.state.pending_switch().is_some() {
            return true;
        }
        if config.governor() != GovernorKind::Default {
            return true;
        }
        let now = self.clock.now();
        let next = TimedThemeState::compute(config, self.state.sun_times(), now).next_switch_time();
        now >= next - TimeDelta::minutes(RECHECK_GRACE_MINUTES)
    }

    fn blocked_process(&self, config: &EngineConfig) -> Option<String> {
        match self.probe.running_processes() {
            Ok(running) => config
                .process_block_list()
                .process_names()
                .iter()
                .find(|name| running.contains(name.as_str()))
                .cloned(),
            Err(e) => {
                log::warn!("Could not list processes: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl Module for ProcessBlockListModule {
    fn name(&self) -> &'static str {
        ModuleKind::ProcessBlockList.name()
    }

    fn timer_affinity(&self) -> TimerAffinity {
        TimerAffinity::Main
    }

    fn fire_on_registration(&self) -> bool {
        true
    }

    fn switch_dependency(&self) -> bool {
        true
    }

    async fn fire(&self) {
        let config = self.config.snapshot();
        let postpone = self.state.postpone();

        if config.process_block_list().process_names().is_empty() {
            postpone.remove(self.name());
            log::debug!("No processes are blocked, skipping checks");
        } else if postpone.contains(self.name()) && !self.should_recheck(&config) {
            log::debug!("No switch is due soon, skipping process check");
        } else if let Some(process) = self.blocked_process(&config) {
            if postpone.add(self.name()) {
                log::info!("Postponing theme switch, {} is running", process);
            }
        } else if postpone.remove(self.name()) {
            log::info!("Clearing postpone from process block list");
        }

        self.state.mark_resume_check_done(self.name());
    }

    async fn cleanup(&self) {
        if self.state.postpone().remove(self.name()) {
            log::info!("Removed leftover process block list postpone");
        }
    }
}
