use super::timed_state::TimedThemeState;
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::model::{GovernorEvent, SwitchEventArgs, SwitchSource, Theme};
use crate::state::GlobalState;
use crate::theme_manager::SwitchOutcome;
use chrono::{NaiveDateTime, TimeDelta};
use std::sync::Arc;

type Boundary = (Theme, NaiveDateTime);

/// Decides the theme from the time of day.
///
/// A request is emitted for the current boundary until the theme manager reports
/// it applied (or already in place); after that the governor stays quiet until
/// the next boundary is crossed.
pub struct TimeSwitchGovernor {
    state: Arc<GlobalState>,
    clock: Arc<dyn Clock>,
    settled: Option<Boundary>,
    emitted: Option<Boundary>,
}

impl TimeSwitchGovernor {
    pub fn new(state: Arc<GlobalState>, clock: Arc<dyn Clock>) -> Self {
        Self {
            state,
            clock,
            settled: None,
            emitted: None,
        }
    }

    pub fn enable_hook(&mut self) {
        log::info!("Time switch governor selected");
        self.settled = None;
        self.emitted = None;
    }

    pub fn disable_hook(&mut self) {
        self.invalidate();
    }

    /// Forget that the current boundary was applied so the next run emits it again.
    pub fn invalidate(&mut self) {
        self.settled = None;
        self.emitted = None;
    }

    pub fn run(&mut self, config: &EngineConfig) -> GovernorEvent {
        let now = self.clock.now();
        let ts = TimedThemeState::compute(config, self.state.sun_times(), now);

        let approach = config.switch_window().approach();
        let in_switch_window = approach > TimeDelta::zero()
            && now >= ts.next_switch_time() - approach
            && now < ts.next_switch_time();

        let boundary = (ts.target_theme(), ts.current_switch_time());
        if self.settled == Some(boundary) {
            return GovernorEvent::window(in_switch_window);
        }

        self.emitted = Some(boundary);
        let request = SwitchEventArgs::new(SwitchSource::TimeSwitchModule, ts.target_theme())
            .with_switch_time(ts.current_switch_time());
        GovernorEvent::window(in_switch_window).with_request(request)
    }

    pub fn acknowledge(&mut self, outcome: &SwitchOutcome) {
        if outcome.settles() {
            if let Some(boundary) = self.emitted.take() {
                self.settled = Some(boundary);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::components::RunReport;
    use chrono::{NaiveDate, NaiveTime};

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 9, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn config() -> EngineConfig {
        serde_json::from_str(
            r#"{ "sunrise": "07:00:00", "sunset": "19:00:00", "switch_window": { "approach_minutes": 10 } }"#,
        )
        .unwrap()
    }

    fn governor(now: NaiveDateTime) -> (TimeSwitchGovernor, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(now));
        let state = Arc::new(GlobalState::new(clock.clone()));
        (TimeSwitchGovernor::new(state, clock.clone()), clock)
    }

    fn applied(theme: Theme) -> SwitchOutcome {
        SwitchOutcome::Applied {
            theme,
            report: RunReport::default(),
        }
    }

    #[test]
    fn test_window_before_sunset_then_request_at_sunset() {
        let config = config();
        let (mut governor, clock) = governor(at(18, 55));

        // Start-up sync emits the current theme and reports the window.
        let event = governor.run(&config);
        assert!(event.in_switch_window);
        assert_eq!(event.request.as_ref().map(|r| r.theme()), Some(Theme::Light));
        governor.acknowledge(&applied(Theme::Light));

        let quiet = governor.run(&config);
        assert!(quiet.in_switch_window);
        assert_eq!(quiet.request, None);

        clock.set(at(19, 0));
        let event = governor.run(&config);
        let request = event.request.expect("request at the boundary");
        assert_eq!(request.theme(), Theme::Dark);
        assert_eq!(request.source(), SwitchSource::TimeSwitchModule);
        assert_eq!(request.switch_time(), Some(at(19, 0)));
        assert!(!event.in_switch_window);
    }

    #[test]
    fn test_reemits_until_settled() {
        let config = config();
        let (mut governor, _) = governor(at(20, 0));

        assert!(governor.run(&config).request.is_some());
        governor.acknowledge(&SwitchOutcome::Postponed {
            theme: Theme::Dark,
            reasons: vec!["IdleCheckModule".to_string()],
        });
        assert!(governor.run(&config).request.is_some());

        governor.acknowledge(&SwitchOutcome::NoChange { theme: Theme::Dark });
        assert!(governor.run(&config).request.is_none());
    }

    #[test]
    fn test_invalidate_reemits_settled_boundary() {
        let config = config();
        let (mut governor, _) = governor(at(12, 0));

        assert!(governor.run(&config).request.is_some());
        governor.acknowledge(&applied(Theme::Light));
        assert!(governor.run(&config).request.is_none());

        governor.invalidate();
        let request = governor.run(&config).request.expect("request after invalidate");
        assert_eq!(request.theme(), Theme::Light);
        assert_eq!(request.switch_time(), Some(at(7, 0)));
    }

    #[test]
    fn test_outside_window() {
        let config = config();
        let (mut governor, _) = governor(at(12, 0));
        assert!(!governor.run(&config).in_switch_window);
    }

    #[test]
    fn test_zero_approach_disables_window() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "switch_window": { "approach_minutes": 0 } }"#).unwrap();
        let sunset = NaiveTime::from_hms_opt(20, 0, 0).unwrap();
        let (mut governor, _) = governor(NaiveDate::from_ymd_opt(2026, 9, 1)
            .unwrap()
            .and_time(sunset - TimeDelta::seconds(1)));
        assert!(!governor.run(&config).in_switch_window);
    }
}
