//! Engine configuration.
//!
//! [`EngineConfig`] is a plain snapshot: every field is optional and read through an
//! accessor carrying its default, so a partially filled file is always usable.
//! Snapshots are published through [`ConfigStore`] and replaced wholesale on reload.

pub mod components;
pub mod limits;
pub mod store;
pub mod validation;

pub use components::{
    AccentColorSettings, AppsSwitchSettings, ComponentsConfig, CursorSettings, PriorityOverride,
    ScriptEntry, ScriptSwitchSettings, SystemSwitchSettings, WallpaperSettings,
};
pub use store::ConfigStore;
pub use validation::ConfigValidationError;

use crate::model::GovernorKind;
use chrono::{NaiveTime, TimeDelta};
use limits::*;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::time::Duration;

/// Top-level engine configuration snapshot.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct EngineConfig {
    auto_theme_switching_enabled: Option<bool>,
    governor: Option<GovernorKind>,
    sunrise: Option<NaiveTime>,
    sunset: Option<NaiveTime>,

    #[serde(default)]
    location: LocationConfig,
    #[serde(default)]
    switch_window: SwitchWindowConfig,
    #[serde(default)]
    night_light: NightLightConfig,
    #[serde(default)]
    idle_checker: IdleCheckerConfig,
    #[serde(default)]
    process_block_list: ProcessBlockListConfig,
    #[serde(default)]
    gpu_monitoring: GpuMonitoringConfig,
    #[serde(default)]
    theme_file_mode: ThemeFileModeConfig,
    #[serde(default)]
    components: ComponentsConfig,
    #[serde(default)]
    tunable: TunableConfig,
}

impl EngineConfig {
    /// Validate the configuration against defined limits
    pub fn validate(&self) -> Result<(), Vec<ConfigValidationError>> {
        validation::validate(self)
    }

    pub fn auto_theme_switching_enabled(&self) -> bool {
        self.auto_theme_switching_enabled.unwrap_or(true)
    }

    pub fn governor(&self) -> GovernorKind {
        self.governor.unwrap_or_default()
    }

    pub fn sunrise(&self) -> NaiveTime {
        self.sunrise
            .or_else(|| NaiveTime::from_hms_opt(7, 0, 0))
            .unwrap_or(NaiveTime::MIN)
    }

    pub fn sunset(&self) -> NaiveTime {
        self.sunset
            .or_else(|| NaiveTime::from_hms_opt(20, 0, 0))
            .unwrap_or(NaiveTime::MIN)
    }

    pub fn location(&self) -> &LocationConfig {
        &self.location
    }

    pub fn switch_window(&self) -> &SwitchWindowConfig {
        &self.switch_window
    }

    pub fn night_light(&self) -> &NightLightConfig {
        &self.night_light
    }

    pub fn idle_checker(&self) -> &IdleCheckerConfig {
        &self.idle_checker
    }

    pub fn process_block_list(&self) -> &ProcessBlockListConfig {
        &self.process_block_list
    }

    pub fn gpu_monitoring(&self) -> &GpuMonitoringConfig {
        &self.gpu_monitoring
    }

    pub fn theme_file_mode(&self) -> &ThemeFileModeConfig {
        &self.theme_file_mode
    }

    pub fn components(&self) -> &ComponentsConfig {
        &self.components
    }

    pub fn tunable(&self) -> &TunableConfig {
        &self.tunable
    }

    // Builder-style setters used when assembling snapshots in code.

    pub fn with_auto_theme_switching(mut self, enabled: bool) -> Self {
        self.auto_theme_switching_enabled = Some(enabled);
        self
    }

    pub fn with_governor(mut self, governor: GovernorKind) -> Self {
        self.governor = Some(governor);
        self
    }

    pub fn with_sun_times(mut self, sunrise: NaiveTime, sunset: NaiveTime) -> Self {
        self.sunrise = Some(sunrise);
        self.sunset = Some(sunset);
        self
    }
}

/// Location based sun times and the offsets applied to them.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct LocationConfig {
    enabled: Option<bool>,
    sunrise_offset_min: Option<i64>,
    sunset_offset_min: Option<i64>,
}

impl LocationConfig {
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(false)
    }

    pub fn sunrise_offset_min(&self) -> i64 {
        self.sunrise_offset_min.unwrap_or(0)
    }

    pub fn sunset_offset_min(&self) -> i64 {
        self.sunset_offset_min.unwrap_or(0)
    }
}

/// How long before a boundary dependency modules start their resume checks.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct SwitchWindowConfig {
    approach_minutes: Option<u32>,
}

impl SwitchWindowConfig {
    pub fn approach_minutes(&self) -> u32 {
        self.approach_minutes.unwrap_or(5)
    }

    pub fn approach(&self) -> TimeDelta {
        TimeDelta::minutes(i64::from(self.approach_minutes()))
    }
}

/// How the night light governor reacts to an OS setting edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NightLightPolicy {
    /// Wake the governor on the edge and switch without an approach window.
    #[default]
    Immediate,
    /// Wait for the next main timer tick and go through the approach window.
    Debounced,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct NightLightConfig {
    switch_policy: Option<NightLightPolicy>,
    sunrise_offset_min: Option<i64>,
    sunset_offset_min: Option<i64>,
}

impl NightLightConfig {
    pub fn switch_policy(&self) -> NightLightPolicy {
        self.switch_policy.unwrap_or_default()
    }

    /// Delay applied after night light turns off before switching to light.
    pub fn sunrise_offset_min(&self) -> i64 {
        self.sunrise_offset_min.unwrap_or(0)
    }

    /// Delay applied after night light turns on before switching to dark.
    pub fn sunset_offset_min(&self) -> i64 {
        self.sunset_offset_min.unwrap_or(0)
    }

    pub fn with_switch_policy(mut self, policy: NightLightPolicy) -> Self {
        self.switch_policy = Some(policy);
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct IdleCheckerConfig {
    enabled: Option<bool>,
    threshold_minutes: Option<u64>,
}

impl IdleCheckerConfig {
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(false)
    }

    pub fn threshold_minutes(&self) -> u64 {
        self.threshold_minutes.unwrap_or(5)
    }

    pub fn threshold(&self) -> Duration {
        Duration::from_secs(self.threshold_minutes() * 60)
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ProcessBlockListConfig {
    enabled: Option<bool>,
    #[serde(default)]
    process_names: BTreeSet<String>,
}

impl ProcessBlockListConfig {
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(false)
    }

    pub fn process_names(&self) -> &BTreeSet<String> {
        &self.process_names
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct GpuMonitoringConfig {
    enabled: Option<bool>,
    threshold: Option<u32>,
    samples: Option<u32>,
}

impl GpuMonitoringConfig {
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(false)
    }

    /// Usage percentage at or below which the GPU counts as quiet.
    pub fn threshold(&self) -> u32 {
        self.threshold.unwrap_or(30)
    }

    /// Consecutive quiet samples required before the postpone is lifted.
    pub fn samples(&self) -> u32 {
        self.samples.unwrap_or(1).max(1)
    }
}

/// When enabled, a single theme file carries the system and app themes, so
/// components that cannot cooperate with it are skipped.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ThemeFileModeConfig {
    enabled: Option<bool>,
}

impl ThemeFileModeConfig {
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct TunableConfig {
    main_timer_secs: Option<u64>,
    debug_timer_message: Option<bool>,
    max_background_tasks: Option<usize>,
}

impl TunableConfig {
    pub fn main_timer_secs(&self) -> u64 {
        self.main_timer_secs.unwrap_or(60)
    }

    pub fn main_timer_period(&self) -> Duration {
        Duration::from_secs(self.main_timer_secs())
    }

    /// Log every timer tick at debug level.
    pub fn debug_timer_message(&self) -> bool {
        self.debug_timer_message.unwrap_or(false)
    }

    pub fn max_background_tasks(&self) -> usize {
        self.max_background_tasks.unwrap_or(16).max(1)
    }
}
