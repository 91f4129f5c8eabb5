//! Process-wide engine state.
//!
//! One [`GlobalState`] is built per engine and handed to every module, governor and
//! component as an `Arc`. All fields sit behind a single mutex; the postpone queue
//! keeps its own lock so clear listeners can run without holding this one.

use crate::clock::Clock;
use crate::model::{SunTimes, SwitchEventArgs, Theme};
use crate::modules::Module;
use crate::postpone::PostponeManager;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

/// Tracks an imminent theme boundary and which dependency modules still have to
/// run their resume checks before it may be applied.
#[derive(Default)]
struct SwitchApproach {
    approaching: bool,
    dependencies: Vec<Arc<dyn Module>>,
    pending_checks: BTreeSet<&'static str>,
}

// Consolidated state to keep lock ordering trivial
#[derive(Default)]
struct StateInner {
    forced_theme: Theme,
    requested_theme: Theme,
    approach: SwitchApproach,
    component_themes: BTreeMap<&'static str, Theme>,
    pending_switch: Option<SwitchEventArgs>,
    night_light_theme: Theme,
    sun_times: Option<SunTimes>,
}

pub struct GlobalState {
    inner: Mutex<StateInner>,
    postpone: PostponeManager,
}

impl GlobalState {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(StateInner::default()),
            postpone: PostponeManager::new(clock),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StateInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn postpone(&self) -> &PostponeManager {
        &self.postpone
    }

    /// Theme that overrides every request while set. `Unknown` means unset.
    pub fn forced_theme(&self) -> Theme {
        self.lock().forced_theme
    }

    pub fn set_forced_theme(&self, theme: Theme) {
        self.lock().forced_theme = theme;
    }

    /// Last theme handed to the component manager.
    pub fn requested_theme(&self) -> Theme {
        self.lock().requested_theme
    }

    pub fn set_requested_theme(&self, theme: Theme) {
        self.lock().requested_theme = theme;
    }

    pub fn theme_switch_approaching(&self) -> bool {
        self.lock().approach.approaching
    }

    /// Set the approach flag. Raising it arms a resume check for every registered
    /// dependency; lowering it drops the outstanding ones. Returns whether the flag
    /// changed.
    pub fn set_theme_switch_approaching(&self, approaching: bool) -> bool {
        let mut inner = self.lock();
        let approach = &mut inner.approach;
        if approach.approaching == approaching {
            return false;
        }
        approach.approaching = approaching;
        approach.pending_checks = if approaching {
            approach.dependencies.iter().map(|m| m.name()).collect()
        } else {
            BTreeSet::new()
        };
        true
    }

    /// Register a dependency module. Returns false if one with the same name exists.
    pub fn add_switch_dependency(&self, module: Arc<dyn Module>) -> bool {
        let mut inner = self.lock();
        let approach = &mut inner.approach;
        if approach.dependencies.iter().any(|m| m.name() == module.name()) {
            return false;
        }
        if approach.approaching {
            approach.pending_checks.insert(module.name());
        }
        approach.dependencies.push(module);
        true
    }

    pub fn remove_switch_dependency(&self, name: &str) -> bool {
        let mut inner = self.lock();
        let approach = &mut inner.approach;
        approach.pending_checks.remove(name);
        let before = approach.dependencies.len();
        approach.dependencies.retain(|m| m.name() != name);
        approach.dependencies.len() != before
    }

    pub fn switch_dependencies(&self) -> Vec<Arc<dyn Module>> {
        self.lock().approach.dependencies.clone()
    }

    /// Record that a dependency finished its resume check for the current approach.
    pub fn mark_resume_check_done(&self, name: &str) {
        self.lock().approach.pending_checks.remove(name);
    }

    pub fn pending_resume_checks(&self) -> Vec<&'static str> {
        self.lock().approach.pending_checks.iter().copied().collect()
    }

    /// True unless a boundary is approaching and some dependency has not checked yet.
    pub fn approach_resolved(&self) -> bool {
        let inner = self.lock();
        !inner.approach.approaching || inner.approach.pending_checks.is_empty()
    }

    /// Last theme a component applied, `Unknown` if never or invalidated.
    pub fn component_theme(&self, component: &str) -> Theme {
        self.lock()
            .component_themes
            .get(component)
            .copied()
            .unwrap_or_default()
    }

    pub fn set_component_theme(&self, component: &'static str, theme: Theme) {
        self.lock().component_themes.insert(component, theme);
    }

    pub fn component_themes(&self) -> BTreeMap<String, Theme> {
        self.lock()
            .component_themes
            .iter()
            .map(|(name, theme)| (name.to_string(), *theme))
            .collect()
    }

    /// The request held back by a postpone, if any.
    pub fn pending_switch(&self) -> Option<SwitchEventArgs> {
        self.lock().pending_switch.clone()
    }

    pub fn set_pending_switch(&self, request: SwitchEventArgs) {
        self.lock().pending_switch = Some(request);
    }

    pub fn take_pending_switch(&self) -> Option<SwitchEventArgs> {
        self.lock().pending_switch.take()
    }

    /// Theme the night light governor currently asks for.
    pub fn night_light_theme(&self) -> Theme {
        self.lock().night_light_theme
    }

    pub fn set_night_light_theme(&self, theme: Theme) {
        self.lock().night_light_theme = theme;
    }

    /// Sun times from the location provider, overriding the configured times.
    pub fn sun_times(&self) -> Option<SunTimes> {
        self.lock().sun_times
    }

    pub fn set_sun_times(&self, sun_times: Option<SunTimes>) {
        self.lock().sun_times = sun_times;
    }
}

impl std::fmt::Debug for GlobalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("GlobalState")
            .field("forced_theme", &inner.forced_theme)
            .field("requested_theme", &inner.requested_theme)
            .field("approaching", &inner.approach.approaching)
            .field("pending_checks", &inner.approach.pending_checks)
            .field("component_themes", &inner.component_themes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::modules::TimerAffinity;
    use async_trait::async_trait;

    struct Dependency(&'static str);

    #[async_trait]
    impl Module for Dependency {
        fn name(&self) -> &'static str {
            self.0
        }

        fn timer_affinity(&self) -> TimerAffinity {
            TimerAffinity::Main
        }

        async fn fire(&self) {}
    }

    fn state() -> GlobalState {
        GlobalState::new(Arc::new(SystemClock))
    }

    #[test]
    fn test_approach_arms_checks_for_every_dependency() {
        let state = state();
        state.add_switch_dependency(Arc::new(Dependency("IdleCheckModule")));
        state.add_switch_dependency(Arc::new(Dependency("GpuMonitorModule")));
        assert!(state.approach_resolved());

        assert!(state.set_theme_switch_approaching(true));
        assert!(!state.set_theme_switch_approaching(true));
        assert!(!state.approach_resolved());
        assert_eq!(
            state.pending_resume_checks(),
            vec!["GpuMonitorModule", "IdleCheckModule"]
        );

        state.mark_resume_check_done("IdleCheckModule");
        assert!(!state.approach_resolved());
        state.mark_resume_check_done("GpuMonitorModule");
        assert!(state.approach_resolved());
    }

    #[test]
    fn test_lowering_approach_drops_pending_checks() {
        let state = state();
        state.add_switch_dependency(Arc::new(Dependency("IdleCheckModule")));
        state.set_theme_switch_approaching(true);
        state.set_theme_switch_approaching(false);

        assert!(state.pending_resume_checks().is_empty());
        assert!(state.approach_resolved());
    }

    #[test]
    fn test_dependencies_are_unique_and_removable() {
        let state = state();
        assert!(state.add_switch_dependency(Arc::new(Dependency("A"))));
        assert!(!state.add_switch_dependency(Arc::new(Dependency("A"))));
        state.set_theme_switch_approaching(true);

        assert!(state.remove_switch_dependency("A"));
        assert!(state.approach_resolved());
        assert!(state.switch_dependencies().is_empty());
        assert!(!state.remove_switch_dependency("A"));
    }

    #[test]
    fn test_component_themes_default_to_unknown() {
        let state = state();
        assert_eq!(state.component_theme("apps"), Theme::Unknown);
        state.set_component_theme("apps", Theme::Dark);
        assert_eq!(state.component_theme("apps"), Theme::Dark);
        assert_eq!(state.component_themes().get("apps"), Some(&Theme::Dark));
    }
}
