use super::{Module, ModuleKind, TimerAffinity};
use crate::collaborators::GpuProbe;
use crate::common::{EngineError, EngineResult};
use crate::config::ConfigStore;
use crate::engine::EngineContext;
use crate::state::GlobalState;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug)]
struct Monitoring {
    active: bool,
    /// Cleared once monitoring ran in an approach window; set again after it ends.
    allowed: bool,
    low_samples: u32,
    alerted: bool,
}

impl Default for Monitoring {
    fn default() -> Self {
        Self {
            active: false,
            allowed: true,
            low_samples: 0,
            alerted: false,
        }
    }
}

/// Holds an approaching switch back while the GPU is busy.
///
/// Monitoring starts when a switch approaches and adds a postpone; it ends once
/// `samples` consecutive readings were at or below the threshold.
pub struct GpuMonitorModule {
    state: Arc<GlobalState>,
    config: Arc<ConfigStore>,
    probe: Arc<dyn GpuProbe>,
    monitoring: Mutex<Monitoring>,
}

impl GpuMonitorModule {
    pub fn new(context: &EngineContext) -> EngineResult<Self> {
        let probe = context.collaborators.gpu.clone().ok_or_else(|| {
            EngineError::module_unavailable(ModuleKind::GpuMonitor.name(), "no gpu probe configured")
        })?;
        Ok(Self {
            state: context.state.clone(),
            config: context.config.clone(),
            probe,
            monitoring: Mutex::new(Monitoring::default()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Monitoring> {
        self.monitoring.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns whether a sample should be taken.
    fn update_monitoring(&self) -> bool {
        let approaching = self.state.theme_switch_approaching();
        let postpone = self.state.postpone();
        let mut monitoring = self.lock();

        if !approaching && !monitoring.active {
            monitoring.allowed = true;
        }
        if approaching && !monitoring.active && monitoring.allowed {
            log::info!("Starting GPU usage monitoring, theme switch pending");
            postpone.add(self.name());
            monitoring.allowed = false;
            monitoring.active = true;
        }
        if monitoring.active && !postpone.contains(self.name()) {
            log::info!("GPU monitoring stopped, postpone was removed by the user");
            monitoring.active = false;
        }
        monitoring.active
    }

    fn finish(&self, monitoring: &mut Monitoring) {
        self.state.postpone().remove(self.name());
        monitoring.active = false;
        monitoring.alerted = false;
        monitoring.low_samples = 0;
    }
}

#[async_trait]
impl Module for GpuMonitorModule {
    fn name(&self) -> &'static str {
        ModuleKind::GpuMonitor.name()
    }

    fn timer_affinity(&self) -> TimerAffinity {
        TimerAffinity::Main
    }

    fn switch_dependency(&self) -> bool {
        true
    }

    async fn fire(&self) {
        if self.update_monitoring() {
            let config = self.config.snapshot();
            let threshold = config.gpu_monitoring().threshold();
            let samples = config.gpu_monitoring().samples();
            let reading = self.probe.usage_percent().await;

            let mut monitoring = self.lock();
            match reading {
                Err(e) => {
                    log::error!("Could not read GPU usage, re-enabling theme switch: {}", e);
                    self.finish(&mut monitoring);
                }
                Ok(usage) if usage <= threshold => {
                    monitoring.low_samples += 1;
                    if monitoring.low_samples >= samples {
                        log::info!(
                            "Ending GPU usage monitoring, re-enabling theme switch ({}% / {}%)",
                            usage,
                            threshold
                        );
                        self.finish(&mut monitoring);
                    } else {
                        log::debug!(
                            "Lower threshold sample {} ({}% / {}%)",
                            monitoring.low_samples,
                            usage,
                            threshold
                        );
                    }
                }
                Ok(usage) => {
                    if !monitoring.alerted {
                        log::info!("Postponing theme switch ({}% / {}%)", usage, threshold);
                        monitoring.alerted = true;
                    }
                    monitoring.low_samples = 0;
                }
            }
        }
        self.state.mark_resume_check_done(self.name());
    }

    async fn cleanup(&self) {
        let mut monitoring = self.lock();
        self.finish(&mut monitoring);
        log::debug!("Cleanup performed for module {}", self.name());
    }
}
