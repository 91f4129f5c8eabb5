use super::{Module, ModuleKind, TimerAffinity};
use crate::clock::Clock;
use crate::collaborators::SunTimesProvider;
use crate::common::{EngineError, EngineResult};
use crate::engine::EngineContext;
use crate::state::GlobalState;
use async_trait::async_trait;
use std::sync::Arc;

/// Refreshes sunrise and sunset for the current location.
pub struct GeopositionModule {
    state: Arc<GlobalState>,
    clock: Arc<dyn Clock>,
    provider: Arc<dyn SunTimesProvider>,
}

impl GeopositionModule {
    pub fn new(context: &EngineContext) -> EngineResult<Self> {
        let provider = context.collaborators.sun_times.clone().ok_or_else(|| {
            EngineError::module_unavailable(
                ModuleKind::Geoposition.name(),
                "no sun times provider configured",
            )
        })?;
        Ok(Self {
            state: context.state.clone(),
            clock: context.clock.clone(),
            provider,
        })
    }
}

#[async_trait]
impl Module for GeopositionModule {
    fn name(&self) -> &'static str {
        ModuleKind::Geoposition.name()
    }

    fn timer_affinity(&self) -> TimerAffinity {
        TimerAffinity::Geoposition
    }

    fn fire_on_registration(&self) -> bool {
        true
    }

    async fn fire(&self) {
        let today = self.clock.now().date();
        match self.provider.sun_times(today).await {
            Ok(times) => {
                if self.state.sun_times() != Some(times) {
                    log::info!(
                        "Sun times updated: sunrise {}, sunset {}",
                        times.sunrise,
                        times.sunset
                    );
                }
                self.state.set_sun_times(Some(times));
            }
            Err(e) => log::warn!("Could not update sun times, keeping previous: {}", e),
        }
    }

    async fn cleanup(&self) {
        self.state.set_sun_times(None);
    }
}
