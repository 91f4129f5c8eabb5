use crate::config::EngineConfig;
use crate::model::{SunTimes, Theme};
use chrono::{NaiveDateTime, NaiveTime, TimeDelta};

/// Where "now" sits between sunrise and sunset.
///
/// Boundaries are laid out on the surrounding days so that a sunrise later than
/// sunset, or offsets pushing a boundary over midnight, need no special casing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedThemeState {
    target_theme: Theme,
    current_switch_time: NaiveDateTime,
    next_switch_time: NaiveDateTime,
    following_switch_time: NaiveDateTime,
}

impl TimedThemeState {
    /// Compute the state at `now`. Location sun times replace the configured ones
    /// when location is enabled and a value is available; offsets only apply in
    /// that case too.
    pub fn compute(
        config: &EngineConfig,
        location: Option<SunTimes>,
        now: NaiveDateTime,
    ) -> TimedThemeState {
        let (sunrise, sunset, sunrise_offset, sunset_offset) = match location {
            Some(sun) if config.location().enabled() => (
                sun.sunrise,
                sun.sunset,
                TimeDelta::minutes(config.location().sunrise_offset_min()),
                TimeDelta::minutes(config.location().sunset_offset_min()),
            ),
            _ => (
                config.sunrise(),
                config.sunset(),
                TimeDelta::zero(),
                TimeDelta::zero(),
            ),
        };
        Self::from_times(sunrise, sunset, sunrise_offset, sunset_offset, now)
    }

    pub fn from_times(
        sunrise: NaiveTime,
        sunset: NaiveTime,
        sunrise_offset: TimeDelta,
        sunset_offset: TimeDelta,
        now: NaiveDateTime,
    ) -> TimedThemeState {
        let today = now.date();
        let mut boundaries: Vec<(NaiveDateTime, Theme)> = (-1..=2)
            .flat_map(|day| {
                let date = today + TimeDelta::days(day);
                [
                    (date.and_time(sunrise) + sunrise_offset, Theme::Light),
                    (date.and_time(sunset) + sunset_offset, Theme::Dark),
                ]
            })
            .collect();
        boundaries.sort_by_key(|(time, _)| *time);

        // Yesterday's boundaries guarantee a current one, the two days ahead a
        // next and a following one.
        let next_index = boundaries
            .iter()
            .position(|(time, _)| *time > now)
            .unwrap_or(boundaries.len() - 2);
        let current_index = next_index.saturating_sub(1);
        let (current_switch_time, target_theme) = boundaries[current_index];

        TimedThemeState {
            target_theme,
            current_switch_time,
            next_switch_time: boundaries[next_index].0,
            following_switch_time: boundaries[(next_index + 1).min(boundaries.len() - 1)].0,
        }
    }

    /// Theme that should be active now.
    pub fn target_theme(&self) -> Theme {
        self.target_theme
    }

    /// The boundary that made `target_theme` current.
    pub fn current_switch_time(&self) -> NaiveDateTime {
        self.current_switch_time
    }

    pub fn next_switch_time(&self) -> NaiveDateTime {
        self.next_switch_time
    }

    /// The boundary after the next one.
    pub fn following_switch_time(&self) -> NaiveDateTime {
        self.following_switch_time
    }
}
