use super::SwitchComponent;
use crate::config::EngineConfig;
use crate::model::{RefreshType, SwitchEventArgs, Theme};
use crate::refresh::{RefreshCoordinator, RefreshRequest};
use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

struct ComponentSlot {
    component: Box<dyn SwitchComponent>,
    registration: usize,
    initialized: bool,
    force: bool,
    priority_to_dark: i32,
    priority_to_light: i32,
}

impl ComponentSlot {
    fn name(&self) -> &'static str {
        self.component.name()
    }

    async fn run_enable_hook(&mut self) {
        log::debug!("Running enable hook for {}", self.name());
        let hook = AssertUnwindSafe(self.component.enable_hook()).catch_unwind();
        match hook.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::error!("Error while running enable hook for {}: {e}", self.name()),
            Err(_) => log::error!("Enable hook for {} panicked", self.name()),
        }
        self.initialized = true;
    }

    async fn run_disable_hook(&mut self) {
        log::debug!("Running disable hook for {}", self.name());
        let hook = AssertUnwindSafe(self.component.disable_hook()).catch_unwind();
        match hook.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::error!("Error while running disable hook for {}: {e}", self.name()),
            Err(_) => log::error!("Disable hook for {} panicked", self.name()),
        }
        self.initialized = false;
    }
}

struct ManagerState {
    slots: Vec<ComponentSlot>,
    last_sorting: Theme,
    theme_file_mode: bool,
}

/// Outcome of one pass over the components.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    /// Components that switched, in execution order.
    pub updated: Vec<&'static str>,
    /// Components that failed, with the error message.
    pub failed: Vec<(&'static str, String)>,
    pub refresh: RefreshType,
}

impl RunReport {
    pub fn is_noop(&self) -> bool {
        self.updated.is_empty() && self.failed.is_empty()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Owns the switch components and runs them in priority order.
///
/// Runs are serialised: a request arriving while another run is in flight waits
/// for it to finish, so no component ever sees two concurrent switches.
pub struct ComponentManager {
    state: Mutex<ManagerState>,
    refresh: Arc<RefreshCoordinator>,
}

impl ComponentManager {
    pub fn new(
        components: Vec<Box<dyn SwitchComponent>>,
        config: &EngineConfig,
        refresh: Arc<RefreshCoordinator>,
    ) -> Self {
        let slots = components
            .into_iter()
            .enumerate()
            .map(|(registration, mut component)| {
                component.update_settings_state(config);
                let (priority_to_dark, priority_to_light) = priorities(component.as_ref(), config);
                ComponentSlot {
                    component,
                    registration,
                    initialized: false,
                    force: false,
                    priority_to_dark,
                    priority_to_light,
                }
            })
            .collect();

        Self {
            state: Mutex::new(ManagerState {
                slots,
                last_sorting: Theme::Unknown,
                theme_file_mode: config.theme_file_mode().enabled(),
            }),
            refresh,
        }
    }

    /// Run every eligible component for `event`.
    ///
    /// Components are sorted by the priority for the event's direction (lower
    /// first, registration order breaking ties). Disabled components that were
    /// initialised get their disable hook instead. A failing or panicking
    /// component is logged and does not stop the rest.
    pub async fn run(&self, event: &SwitchEventArgs) -> RunReport {
        let mut state = self.state.lock().await;
        let mut report = RunReport::default();
        let mut refresh_delay = Duration::ZERO;

        if state.last_sorting != event.theme() {
            sort_slots(&mut state.slots, event.theme());
            state.last_sorting = event.theme();
        }

        let theme_file_mode = state.theme_file_mode;
        for slot in state.slots.iter_mut() {
            if !slot.component.enabled() {
                if slot.initialized {
                    slot.run_disable_hook().await;
                }
                continue;
            }

            if theme_file_mode && !slot.component.theme_handler_compatible() {
                continue;
            }

            if !slot.initialized {
                slot.run_enable_hook().await;
            }

            let needs_update = std::panic::catch_unwind(AssertUnwindSafe(|| {
                slot.component.needs_update(event)
            }))
            .unwrap_or_else(|_| {
                log::error!("Update rule of {} panicked", slot.name());
                false
            });

            if !(needs_update || slot.force) {
                continue;
            }
            slot.force = false;

            let name = slot.name();
            let outcome = AssertUnwindSafe(slot.component.handle_switch(event))
                .catch_unwind()
                .await;
            match outcome {
                Ok(Ok(())) => {
                    report.updated.push(name);
                    let kind = slot.component.refresh_type();
                    if kind > RefreshType::None {
                        report.refresh = report.refresh.max(kind);
                        refresh_delay = refresh_delay.max(slot.component.refresh_delay());
                    }
                }
                Ok(Err(e)) => {
                    log::error!("Component {name} failed to switch: {e}");
                    report.failed.push((name, e.to_string()));
                }
                Err(_) => {
                    log::error!("Uncaught panic in component {name}");
                    report.failed.push((name, format!("component {name} panicked")));
                }
            }
        }
        drop(state);

        if report.refresh > RefreshType::None {
            self.refresh.enqueue(RefreshRequest {
                source: report.updated.join(", "),
                kind: report.refresh,
                delay: refresh_delay,
            });
        }

        if !report.is_noop() {
            log::debug!(
                "Component run for {} theme: updated [{}], failed [{}]",
                event.theme(),
                report.updated.join(", "),
                report
                    .failed
                    .iter()
                    .map(|(name, _)| *name)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        report
    }

    /// Hand every component a new settings snapshot.
    pub async fn update_settings(&self, config: &EngineConfig) {
        let mut state = self.state.lock().await;
        for slot in state.slots.iter_mut() {
            slot.component.update_settings_state(config);
            let (to_dark, to_light) = priorities(slot.component.as_ref(), config);
            slot.priority_to_dark = to_dark;
            slot.priority_to_light = to_light;
        }
        state.theme_file_mode = config.theme_file_mode().enabled();
        // Priorities may have moved.
        state.last_sorting = Theme::Unknown;
    }

    /// Make every component run on the next request regardless of its cache.
    pub async fn force_all(&self) {
        let mut state = self.state.lock().await;
        for slot in state.slots.iter_mut() {
            slot.force = true;
        }
    }

    /// Run disable hooks on initialised components that cannot work with theme
    /// file mode.
    pub async fn invoke_disable_incompatible(&self) {
        let mut state = self.state.lock().await;
        for slot in state.slots.iter_mut() {
            if slot.initialized && !slot.component.theme_handler_compatible() {
                slot.run_disable_hook().await;
            }
        }
    }

    /// Run disable hooks on every initialised component.
    pub async fn disable_all(&self) {
        let mut state = self.state.lock().await;
        for slot in state.slots.iter_mut() {
            if slot.initialized {
                slot.run_disable_hook().await;
            }
        }
    }

    /// Component names in their current execution order.
    pub async fn component_names(&self) -> Vec<&'static str> {
        let state = self.state.lock().await;
        state.slots.iter().map(|slot| slot.name()).collect()
    }

    pub async fn initialized_components(&self) -> Vec<&'static str> {
        let state = self.state.lock().await;
        state
            .slots
            .iter()
            .filter(|slot| slot.initialized)
            .map(|slot| slot.name())
            .collect()
    }
}

fn priorities(component: &dyn SwitchComponent, config: &EngineConfig) -> (i32, i32) {
    let overrides = config.components().priority_override(component.name());
    (
        overrides
            .and_then(|o| o.to_dark)
            .unwrap_or_else(|| component.priority_to_dark()),
        overrides
            .and_then(|o| o.to_light)
            .unwrap_or_else(|| component.priority_to_light()),
    )
}

fn sort_slots(slots: &mut [ComponentSlot], theme: Theme) {
    if theme == Theme::Dark {
        slots.sort_by_key(|slot| (slot.priority_to_dark, slot.registration));
    } else {
        slots.sort_by_key(|slot| (slot.priority_to_light, slot.registration));
    }
}
