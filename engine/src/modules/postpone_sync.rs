use super::{Module, ModuleKind, TimerAffinity};
use crate::engine::EngineContext;
use crate::state::GlobalState;
use async_trait::async_trait;
use std::sync::Arc;

/// Drops postpones whose expiry passed without their timer firing, for example
/// after the machine slept through it.
pub struct PostponeSyncModule {
    state: Arc<GlobalState>,
}

impl PostponeSyncModule {
    pub fn new(context: &EngineContext) -> Self {
        Self {
            state: context.state.clone(),
        }
    }
}

#[async_trait]
impl Module for PostponeSyncModule {
    fn name(&self) -> &'static str {
        ModuleKind::PostponeSync.name()
    }

    fn timer_affinity(&self) -> TimerAffinity {
        TimerAffinity::StateUpdate
    }

    async fn fire(&self) {
        let expired = self.state.postpone().sync_expiry();
        if expired > 0 {
            log::info!("Removed {} expired postpones", expired);
        }
    }
}
