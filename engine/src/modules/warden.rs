use super::geoposition::GeopositionModule;
use super::gpu_monitor::GpuMonitorModule;
use super::idle::IdleCheckModule;
use super::postpone_sync::PostponeSyncModule;
use super::process_block_list::ProcessBlockListModule;
use super::timer::ModuleTimers;
use super::{GovernorModule, Module, ModuleKind, TimerAffinity};
use crate::common::EngineResult;
use crate::engine::EngineContext;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;

/// Builds a module from the engine context. Fails when something the module
/// needs is not available.
pub type ModuleFactory =
    Box<dyn Fn(&EngineContext) -> EngineResult<Arc<dyn Module>> + Send + Sync>;

/// How each [`ModuleKind`] is built.
pub struct ModuleRegistry {
    factories: HashMap<ModuleKind, ModuleFactory>,
}

impl ModuleRegistry {
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Factories for every built-in module. The governor module is shared with
    /// the warden so it can switch governors on configuration changes.
    pub fn with_defaults(governor: Arc<GovernorModule>) -> Self {
        let mut registry = Self::empty();
        registry.register(
            ModuleKind::Governor,
            Box::new(move |_: &EngineContext| Ok(governor.clone() as Arc<dyn Module>)),
        );
        registry.register(
            ModuleKind::IdleCheck,
            Box::new(|ctx: &EngineContext| Ok(Arc::new(IdleCheckModule::new(ctx)?) as Arc<dyn Module>)),
        );
        registry.register(
            ModuleKind::ProcessBlockList,
            Box::new(|ctx: &EngineContext| Ok(Arc::new(ProcessBlockListModule::new(ctx)?) as Arc<dyn Module>)),
        );
        registry.register(
            ModuleKind::GpuMonitor,
            Box::new(|ctx: &EngineContext| Ok(Arc::new(GpuMonitorModule::new(ctx)?) as Arc<dyn Module>)),
        );
        registry.register(
            ModuleKind::Geoposition,
            Box::new(|ctx: &EngineContext| Ok(Arc::new(GeopositionModule::new(ctx)?) as Arc<dyn Module>)),
        );
        registry.register(
            ModuleKind::PostponeSync,
            Box::new(|ctx: &EngineContext| Ok(Arc::new(PostponeSyncModule::new(ctx)) as Arc<dyn Module>)),
        );
        registry
    }

    /// Add or replace the factory for `kind`.
    pub fn register(&mut self, kind: ModuleKind, factory: ModuleFactory) {
        self.factories.insert(kind, factory);
    }

    fn create(&self, kind: ModuleKind, context: &EngineContext) -> Option<EngineResult<Arc<dyn Module>>> {
        self.factories.get(&kind).map(|factory| factory(context))
    }
}

/// What one reconciliation pass changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileReport {
    pub registered: Vec<&'static str>,
    pub deregistered: Vec<&'static str>,
    pub failed: Vec<(&'static str, String)>,
}

impl ReconcileReport {
    pub fn is_converged(&self) -> bool {
        self.registered.is_empty() && self.deregistered.is_empty()
    }
}

/// Keeps the set of registered modules in line with the configuration.
pub struct WardenModule {
    context: EngineContext,
    timers: Weak<ModuleTimers>,
    registry: ModuleRegistry,
    governor: Arc<GovernorModule>,
    reconciling: Mutex<()>,
}

impl WardenModule {
    pub fn new(
        context: EngineContext,
        timers: &Arc<ModuleTimers>,
        registry: ModuleRegistry,
        governor: Arc<GovernorModule>,
    ) -> Self {
        Self {
            context,
            timers: Arc::downgrade(timers),
            registry,
            governor,
            reconciling: Mutex::new(()),
        }
    }

    /// Register every desired module that is missing and deregister every
    /// registered module that is no longer desired. Running it again with the
    /// same configuration changes nothing.
    pub async fn reconcile(&self) -> ReconcileReport {
        let _guard = self.reconciling.lock().await;
        let mut report = ReconcileReport::default();
        let Some(timers) = self.timers.upgrade() else {
            return report;
        };
        let config = self.context.config.snapshot();

        for kind in ModuleKind::ALL {
            let name = kind.name();
            let desired = kind.desired(&config);
            let registered_on = timers.find(name).await;

            match (desired, registered_on) {
                (true, None) => match self.register(kind, &timers).await {
                    Ok(true) => report.registered.push(name),
                    Ok(false) => {}
                    Err(e) => {
                        log::warn!("{}", e);
                        report.failed.push((name, e.to_string()));
                    }
                },
                (false, Some(timer)) => {
                    if timer.deregister_module(name).await.is_some() {
                        self.context.state.remove_switch_dependency(name);
                        report.deregistered.push(name);
                    }
                }
                _ => {}
            }
        }

        if config.auto_theme_switching_enabled() {
            self.governor.auto_manage_governors(config.governor()).await;
        }
        report
    }

    async fn register(&self, kind: ModuleKind, timers: &ModuleTimers) -> EngineResult<bool> {
        let Some(created) = self.registry.create(kind, &self.context) else {
            log::debug!("No factory for {}", kind.name());
            return Ok(false);
        };
        let module = created?;
        let timer = timers.get(module.timer_affinity())?;
        if module.switch_dependency() {
            self.context.state.add_switch_dependency(module.clone());
        }
        Ok(timer.register_module(module).await)
    }
}

#[async_trait]
impl Module for WardenModule {
    fn name(&self) -> &'static str {
        "WardenModule"
    }

    fn timer_affinity(&self) -> TimerAffinity {
        TimerAffinity::Main
    }

    fn priority(&self) -> i32 {
        2
    }

    fn fire_on_registration(&self) -> bool {
        true
    }

    async fn fire(&self) {
        let report = self.reconcile().await;
        if !report.is_converged() {
            log::debug!(
                "Warden: registered [{}], deregistered [{}]",
                report.registered.join(", "),
                report.deregistered.join(", ")
            );
        }
    }

    async fn cleanup(&self) {
        let Some(timers) = self.timers.upgrade() else {
            return;
        };
        for kind in ModuleKind::ALL {
            if let Some(timer) = timers.find(kind.name()).await {
                timer.deregister_module(kind.name()).await;
                self.context.state.remove_switch_dependency(kind.name());
            }
        }
    }
}
