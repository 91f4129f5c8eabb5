//! Core value types shared across the engine.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod events;

pub use events::{GovernorEvent, SwitchEventArgs, ThemeOverride};

/// The theme the engine asks subsystems to apply.
///
/// `Unknown` means the engine has no opinion yet (also used as the "invalidated"
/// value of component caches). `Undefined` marks a live subsystem state that matches
/// neither configured theme, for example a wallpaper the user picked by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Unknown,
    Light,
    Dark,
    Undefined,
}

impl Theme {
    /// Light and Dark are the only themes that can be applied.
    pub fn is_concrete(self) -> bool {
        matches!(self, Theme::Light | Theme::Dark)
    }

    pub fn opposite(self) -> Theme {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
            other => other,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Theme::Unknown => "unknown",
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::Undefined => "undefined",
        };
        f.write_str(name)
    }
}

/// Origin of a switch request, used for logging and script filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchSource {
    /// Matches every source in script allow-lists.
    Any,
    TimeSwitchModule,
    NightLightTrackerModule,
    SystemResume,
    Manual,
    Hotkey,
    ExternalThemeSwitch,
    SystemUnlock,
    Api,
}

impl fmt::Display for SwitchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SwitchSource::Any => "any",
            SwitchSource::TimeSwitchModule => "time_switch_module",
            SwitchSource::NightLightTrackerModule => "night_light_tracker_module",
            SwitchSource::SystemResume => "system_resume",
            SwitchSource::Manual => "manual",
            SwitchSource::Hotkey => "hotkey",
            SwitchSource::ExternalThemeSwitch => "external_theme_switch",
            SwitchSource::SystemUnlock => "system_unlock",
            SwitchSource::Api => "api",
        };
        f.write_str(name)
    }
}

/// Per-component switching mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Follow the requested theme.
    #[default]
    Switch,
    LightOnly,
    DarkOnly,
    /// Keep the theme dark and only toggle the accent color.
    AccentOnly,
}

impl Mode {
    /// Resolve the theme a component should be in for a requested theme.
    pub fn resolve(self, requested: Theme) -> Theme {
        match self {
            Mode::Switch => requested,
            Mode::LightOnly => Theme::Light,
            Mode::DarkOnly | Mode::AccentOnly => Theme::Dark,
        }
    }
}

/// Selects which governor decides the theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GovernorKind {
    /// Time of day (fixed times or sunrise/sunset).
    #[default]
    Default,
    /// Follows the OS night light setting.
    NightLight,
}

impl fmt::Display for GovernorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GovernorKind::Default => f.write_str("default"),
            GovernorKind::NightLight => f.write_str("night_light"),
        }
    }
}

/// Visual refresh strength a component needs after switching. Ordered so that
/// the strongest request wins when several components coalesce.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RefreshType {
    #[default]
    None,
    Standard,
    Full,
}

impl fmt::Display for RefreshType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshType::None => f.write_str("none"),
            RefreshType::Standard => f.write_str("standard"),
            RefreshType::Full => f.write_str("full"),
        }
    }
}

/// Which boundary a skip-next postpone lasts until.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipType {
    #[default]
    Unspecified,
    UntilSunrise,
    UntilSunset,
}

/// Sunrise and sunset for one day, in local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SunTimes {
    pub sunrise: NaiveTime,
    pub sunset: NaiveTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_theme_opposite() {
        assert_eq!(Theme::Light.opposite(), Theme::Dark);
        assert_eq!(Theme::Dark.opposite(), Theme::Light);
        assert_eq!(Theme::Unknown.opposite(), Theme::Unknown);
        assert_eq!(Theme::Undefined.opposite(), Theme::Undefined);
    }

    #[test]
    fn test_only_light_and_dark_are_concrete() {
        assert!(Theme::Light.is_concrete());
        assert!(Theme::Dark.is_concrete());
        assert!(!Theme::Unknown.is_concrete());
        assert!(!Theme::Undefined.is_concrete());
    }

    #[test]
    fn test_mode_resolution() {
        assert_eq!(Mode::Switch.resolve(Theme::Light), Theme::Light);
        assert_eq!(Mode::Switch.resolve(Theme::Dark), Theme::Dark);
        assert_eq!(Mode::LightOnly.resolve(Theme::Dark), Theme::Light);
        assert_eq!(Mode::DarkOnly.resolve(Theme::Light), Theme::Dark);
        assert_eq!(Mode::AccentOnly.resolve(Theme::Light), Theme::Dark);
    }

    #[test]
    fn test_refresh_type_ordering() {
        assert!(RefreshType::Full > RefreshType::Standard);
        assert!(RefreshType::Standard > RefreshType::None);
        assert_eq!(
            [RefreshType::Standard, RefreshType::None, RefreshType::Full]
                .into_iter()
                .max(),
            Some(RefreshType::Full)
        );
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&SwitchSource::NightLightTrackerModule).unwrap();
        assert_eq!(json, "\"night_light_tracker_module\"");

        let kind: GovernorKind = serde_json::from_str("\"night_light\"").unwrap();
        assert_eq!(kind, GovernorKind::NightLight);

        let mode: Mode = serde_json::from_str("\"accent_only\"").unwrap();
        assert_eq!(mode, Mode::AccentOnly);
    }
}
