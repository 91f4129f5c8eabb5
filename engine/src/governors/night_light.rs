use crate::clock::Clock;
use crate::collaborators::{OsSettingWatcher, SettingCallback, SubscriptionId};
use crate::config::{EngineConfig, NightLightPolicy};
use crate::model::{GovernorEvent, SwitchEventArgs, SwitchSource, Theme};
use crate::postpone::PAUSE_AUTO_SWITCH;
use crate::state::GlobalState;
use crate::theme_manager::SwitchOutcome;
use chrono::{NaiveDateTime, TimeDelta};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

type Boundary = (Theme, Option<NaiveDateTime>);

#[derive(Debug, Default)]
struct Tracking {
    enabled: Option<bool>,
    /// `None` until the first edge after enabling; the offset counts as elapsed.
    last_change: Option<NaiveDateTime>,
    instant_pending: bool,
}

fn lock(tracking: &Mutex<Tracking>) -> MutexGuard<'_, Tracking> {
    tracking.lock().unwrap_or_else(|e| e.into_inner())
}

/// Follows the OS night light setting: dark while it is on, light while it is off.
///
/// Edges arrive through an [`OsSettingWatcher`] subscription. With the immediate
/// policy an edge wakes the governor module through `trigger`; with the debounced
/// policy it is only recorded and picked up on the next regular tick.
pub struct NightLightGovernor {
    state: Arc<GlobalState>,
    clock: Arc<dyn Clock>,
    watcher: Option<Arc<dyn OsSettingWatcher>>,
    subscription: Option<SubscriptionId>,
    tracking: Arc<Mutex<Tracking>>,
    trigger: Arc<Notify>,
    immediate: Arc<AtomicBool>,
    settled: Option<Boundary>,
    emitted: Option<Boundary>,
}

impl NightLightGovernor {
    pub fn new(
        state: Arc<GlobalState>,
        clock: Arc<dyn Clock>,
        watcher: Option<Arc<dyn OsSettingWatcher>>,
        trigger: Arc<Notify>,
    ) -> Self {
        Self {
            state,
            clock,
            watcher,
            subscription: None,
            tracking: Arc::new(Mutex::new(Tracking::default())),
            trigger,
            immediate: Arc::new(AtomicBool::new(true)),
            settled: None,
            emitted: None,
        }
    }

    pub fn enable_hook(&mut self, config: &EngineConfig) {
        log::info!("Night light governor selected");
        self.settled = None;
        self.emitted = None;
        *lock(&self.tracking) = Tracking::default();
        self.store_policy(config);
        self.connect();
    }

    pub fn disable_hook(&mut self) {
        if let (Some(watcher), Some(id)) = (&self.watcher, self.subscription.take()) {
            watcher.unsubscribe(id);
            log::debug!("Night light subscription {} released", id);
        }
        *lock(&self.tracking) = Tracking::default();
        self.invalidate();
    }

    /// Forget that the current edge was applied so the next run emits it again.
    pub fn invalidate(&mut self) {
        self.settled = None;
        self.emitted = None;
    }

    fn store_policy(&self, config: &EngineConfig) {
        let immediate = config.night_light().switch_policy() == NightLightPolicy::Immediate;
        self.immediate.store(immediate, Ordering::SeqCst);
    }

    /// Read the current value and subscribe to edges. Safe to call again after a
    /// failure; it does nothing once connected.
    fn connect(&mut self) {
        let Some(watcher) = self.watcher.clone() else {
            return;
        };

        if lock(&self.tracking).enabled.is_none() {
            match watcher.current() {
                Ok(enabled) => {
                    lock(&self.tracking).enabled = Some(enabled);
                    self.state.set_night_light_theme(theme_for(enabled));
                }
                Err(e) => {
                    log::warn!("Night light state unavailable: {}", e);
                    return;
                }
            }
        }

        if self.subscription.is_some() {
            return;
        }

        let callback = edge_callback(
            self.tracking.clone(),
            self.state.clone(),
            self.clock.clone(),
            self.trigger.clone(),
            self.immediate.clone(),
        );
        match watcher.subscribe(callback) {
            Ok(id) => self.subscription = Some(id),
            Err(e) => log::warn!("Night light subscription failed, will retry: {}", e),
        }
    }

    pub fn run(&mut self, config: &EngineConfig) -> GovernorEvent {
        if self.watcher.is_none() {
            log::debug!("No night light watcher configured");
            return GovernorEvent::default();
        }
        self.store_policy(config);
        self.connect();

        let now = self.clock.now();
        let mut tracking = lock(&self.tracking);
        let Some(enabled) = tracking.enabled else {
            return GovernorEvent::default();
        };

        let target = theme_for(enabled);
        let offset = if enabled {
            config.night_light().sunset_offset_min()
        } else {
            config.night_light().sunrise_offset_min()
        };
        let switch_at = tracking
            .last_change
            .map(|changed| changed + TimeDelta::minutes(offset));
        let elapsed = switch_at.is_none_or(|at| at <= now);

        let immediate = config.night_light().switch_policy() == NightLightPolicy::Immediate;
        let instant = immediate && tracking.instant_pending && elapsed;
        if elapsed {
            tracking.instant_pending = false;
        }

        let period = TimeDelta::from_std(config.tunable().main_timer_period())
            .unwrap_or_else(|_| TimeDelta::minutes(1));
        let in_switch_window =
            !instant && switch_at.is_some_and(|at| now < at && now >= at - period);

        let boundary = (target, tracking.last_change);
        drop(tracking);

        let event = GovernorEvent::window(in_switch_window).instant(instant);
        if !elapsed || self.settled == Some(boundary) {
            return event;
        }

        self.emitted = Some(boundary);
        let mut request = SwitchEventArgs::new(SwitchSource::NightLightTrackerModule, target);
        if let Some(at) = switch_at {
            request = request.with_switch_time(at);
        }
        event.with_request(request)
    }

    pub fn acknowledge(&mut self, outcome: &SwitchOutcome) {
        if outcome.settles() {
            if let Some(boundary) = self.emitted.take() {
                self.settled = Some(boundary);
            }
        }
    }
}

impl Drop for NightLightGovernor {
    fn drop(&mut self) {
        if let (Some(watcher), Some(id)) = (&self.watcher, self.subscription.take()) {
            watcher.unsubscribe(id);
        }
    }
}

fn theme_for(night_light_enabled: bool) -> Theme {
    if night_light_enabled {
        Theme::Dark
    } else {
        Theme::Light
    }
}

fn edge_callback(
    tracking: Arc<Mutex<Tracking>>,
    state: Arc<GlobalState>,
    clock: Arc<dyn Clock>,
    trigger: Arc<Notify>,
    immediate: Arc<AtomicBool>,
) -> SettingCallback {
    Arc::new(move |enabled: bool| {
        {
            let mut tracking = lock(&tracking);
            if tracking.enabled == Some(enabled) {
                return;
            }
            tracking.enabled = Some(enabled);
            tracking.last_change = Some(clock.now());
            tracking.instant_pending = true;
        }

        let theme = theme_for(enabled);
        log::info!("Night light turned {}, target theme {}", if enabled { "on" } else { "off" }, theme);
        state.set_night_light_theme(theme);

        // A skipped switch is consumed once night light returns to the applied theme.
        let postpone = state.postpone();
        if postpone.is_skip_next_switch() && theme == state.requested_theme() {
            postpone.remove(PAUSE_AUTO_SWITCH);
            log::info!("Skip next switch cleared by night light edge");
        }

        if immediate.load(Ordering::SeqCst) {
            trigger.notify_one();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::model::SkipType;
    use crate::testing::ManualSettingWatcher;
    use chrono::NaiveDate;

    struct Fixture {
        governor: NightLightGovernor,
        watcher: Arc<ManualSettingWatcher>,
        clock: Arc<ManualClock>,
        state: Arc<GlobalState>,
        trigger: Arc<Notify>,
    }

    fn fixture(initial: bool) -> Fixture {
        let clock = Arc::new(ManualClock::new(
            NaiveDate::from_ymd_opt(2026, 3, 2)
                .unwrap()
                .and_hms_opt(18, 0, 0)
                .unwrap(),
        ));
        let state = Arc::new(GlobalState::new(clock.clone()));
        let watcher = Arc::new(ManualSettingWatcher::new(initial));
        let trigger = Arc::new(Notify::new());
        let governor = NightLightGovernor::new(
            state.clone(),
            clock.clone(),
            Some(watcher.clone()),
            trigger.clone(),
        );
        Fixture {
            governor,
            watcher,
            clock,
            state,
            trigger,
        }
    }

    fn config(policy: &str, sunset_offset: i64) -> EngineConfig {
        serde_json::from_str(&format!(
            r#"{{ "night_light": {{ "switch_policy": "{policy}", "sunset_offset_min": {sunset_offset} }} }}"#
        ))
        .unwrap()
    }

    #[test]
    fn test_initial_state_emits_without_instant() {
        let mut f = fixture(false);
        let config = config("immediate", 0);
        f.governor.enable_hook(&config);
        assert_eq!(f.watcher.subscriber_count(), 1);

        let event = f.governor.run(&config);
        assert!(!event.instant);
        assert_eq!(event.request.map(|r| r.theme()), Some(Theme::Light));
        assert_eq!(f.state.night_light_theme(), Theme::Light);
    }

    #[tokio::test]
    async fn test_immediate_edge_notifies_and_is_instant() {
        let mut f = fixture(false);
        let config = config("immediate", 0);
        f.governor.enable_hook(&config);
        f.governor.run(&config);
        f.governor.acknowledge(&SwitchOutcome::NoChange { theme: Theme::Light });

        f.watcher.set(true);
        // The stored permit completes immediately.
        f.trigger.notified().await;

        let event = f.governor.run(&config);
        assert!(event.instant);
        let request = event.request.expect("request after edge");
        assert_eq!(request.theme(), Theme::Dark);
        assert_eq!(request.source(), SwitchSource::NightLightTrackerModule);
    }

    #[test]
    fn test_debounced_edge_waits_for_offset() {
        let mut f = fixture(false);
        let config = config("debounced", 5);
        f.governor.enable_hook(&config);
        f.governor.run(&config);
        f.governor.acknowledge(&SwitchOutcome::NoChange { theme: Theme::Light });

        f.watcher.set(true);
        f.clock.advance(TimeDelta::minutes(4) + TimeDelta::seconds(30));
        let event = f.governor.run(&config);
        assert!(event.in_switch_window);
        assert!(event.request.is_none());

        f.clock.advance(TimeDelta::seconds(30));
        let event = f.governor.run(&config);
        assert!(!event.instant);
        assert!(!event.in_switch_window);
        assert_eq!(event.request.map(|r| r.theme()), Some(Theme::Dark));
    }

    #[test]
    fn test_settled_edge_is_quiet() {
        let mut f = fixture(true);
        let config = config("immediate", 0);
        f.governor.enable_hook(&config);
        assert!(f.governor.run(&config).request.is_some());
        f.governor.acknowledge(&SwitchOutcome::NoChange { theme: Theme::Dark });
        assert!(f.governor.run(&config).request.is_none());

        f.governor.invalidate();
        let event = f.governor.run(&config);
        assert!(!event.instant);
        assert_eq!(event.request.map(|r| r.theme()), Some(Theme::Dark));
    }

    #[test]
    fn test_skip_cleared_when_night_light_returns() {
        let mut f = fixture(true);
        let config = config("immediate", 0);
        f.governor.enable_hook(&config);
        f.state.set_requested_theme(Theme::Dark);
        f.state.postpone().add_skip_next_switch(None, SkipType::Unspecified);

        f.watcher.set(false);
        assert!(f.state.postpone().is_skip_next_switch());

        f.watcher.set(true);
        assert!(!f.state.postpone().is_skip_next_switch());
    }

    #[test]
    fn test_disable_unsubscribes() {
        let mut f = fixture(true);
        let config = config("immediate", 0);
        f.governor.enable_hook(&config);
        f.governor.disable_hook();
        assert_eq!(f.watcher.subscriber_count(), 0);
    }

    #[test]
    fn test_refused_subscription_is_retried() {
        let mut f = fixture(true);
        let config = config("immediate", 0);
        f.watcher.refuse_subscriptions();
        f.governor.enable_hook(&config);
        assert_eq!(f.watcher.subscriber_count(), 0);
        // The current value is still known, so the governor keeps working.
        assert_eq!(f.governor.run(&config).request.map(|r| r.theme()), Some(Theme::Dark));
    }
}
