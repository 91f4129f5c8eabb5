use super::{Module, ModuleKind, TimerAffinity};
use crate::collaborators::IdleProbe;
use crate::common::{EngineError, EngineResult};
use crate::config::ConfigStore;
use crate::engine::EngineContext;
use crate::postpone::PostponeItem;
use crate::state::GlobalState;
use async_trait::async_trait;
use std::sync::Arc;

/// Holds switches back while the user is active.
///
/// The postpone is released once no input was seen for the configured threshold.
pub struct IdleCheckModule {
    state: Arc<GlobalState>,
    config: Arc<ConfigStore>,
    probe: Arc<dyn IdleProbe>,
}

impl IdleCheckModule {
    pub fn new(context: &EngineContext) -> EngineResult<Self> {
        let probe = context.collaborators.idle.clone().ok_or_else(|| {
            EngineError::module_unavailable(ModuleKind::IdleCheck.name(), "no idle probe configured")
        })?;
        Ok(Self {
            state: context.state.clone(),
            config: context.config.clone(),
            probe,
        })
    }
}

#[async_trait]
impl Module for IdleCheckModule {
    fn name(&self) -> &'static str {
        ModuleKind::IdleCheck.name()
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
        let threshold = self.config.snapshot().idle_checker().threshold();
        let postpone = self.state.postpone();

        match self.probe.idle_duration() {
            Ok(idle) if idle >= threshold => {
                if postpone.remove(self.name()) {
                    log::info!(
                        "Allow theme switch, system idle for {}s (threshold {}s)",
                        idle.as_secs(),
                        threshold.as_secs()
                    );
                }
            }
            Ok(_) => {
                if postpone.add_item(PostponeItem::new(self.name()).not_user_clearable()) {
                    log::info!("Postponing theme switch until the system is idle");
                }
            }
            Err(e) => {
                log::warn!("Idle time unavailable, not holding switches back: {}", e);
                postpone.remove(self.name());
            }
        }
        self.state.mark_resume_check_done(self.name());
    }

    async fn cleanup(&self) {
        self.state.postpone().remove(self.name());
    }
}
