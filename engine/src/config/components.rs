//! Per-component settings sections.

use crate::model::{Mode, SwitchSource, Theme};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings for every built-in switch component plus optional priority overrides.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ComponentsConfig {
    #[serde(default)]
    system: SystemSwitchSettings,
    #[serde(default)]
    apps: AppsSwitchSettings,
    #[serde(default)]
    accent_color: AccentColorSettings,
    #[serde(default)]
    wallpaper: WallpaperSettings,
    #[serde(default)]
    cursor: CursorSettings,
    #[serde(default)]
    scripts: ScriptSwitchSettings,
    /// Keyed by component name.
    #[serde(default)]
    priorities: HashMap<String, PriorityOverride>,
}

impl ComponentsConfig {
    pub fn system(&self) -> &SystemSwitchSettings {
        &self.system
    }

    pub fn apps(&self) -> &AppsSwitchSettings {
        &self.apps
    }

    pub fn accent_color(&self) -> &AccentColorSettings {
        &self.accent_color
    }

    pub fn wallpaper(&self) -> &WallpaperSettings {
        &self.wallpaper
    }

    pub fn cursor(&self) -> &CursorSettings {
        &self.cursor
    }

    pub fn scripts(&self) -> &ScriptSwitchSettings {
        &self.scripts
    }

    pub fn priority_override(&self, component: &str) -> Option<&PriorityOverride> {
        self.priorities.get(component)
    }

    pub fn priorities(&self) -> &HashMap<String, PriorityOverride> {
        &self.priorities
    }
}

/// Overrides a component's built-in priorities. Lower runs first.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
pub struct PriorityOverride {
    pub to_dark: Option<i32>,
    pub to_light: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct SystemSwitchSettings {
    enabled: Option<bool>,
    mode: Option<Mode>,
    taskbar_switch_delay_ms: Option<u64>,
    taskbar_color_on_adaptive: Option<bool>,
    taskbar_color_when_non_adaptive: Option<Theme>,
}

impl SystemSwitchSettings {
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn mode(&self) -> Mode {
        self.mode.unwrap_or_default()
    }

    pub fn taskbar_switch_delay_ms(&self) -> u64 {
        self.taskbar_switch_delay_ms.unwrap_or(1200)
    }

    pub fn taskbar_switch_delay(&self) -> Duration {
        Duration::from_millis(self.taskbar_switch_delay_ms())
    }

    /// Show the accent color on the taskbar while dark in `Switch` mode.
    pub fn taskbar_color_on_adaptive(&self) -> bool {
        self.taskbar_color_on_adaptive.unwrap_or(false)
    }

    /// In `AccentOnly` mode, the requested theme that turns the taskbar accent on.
    pub fn taskbar_color_when_non_adaptive(&self) -> Theme {
        self.taskbar_color_when_non_adaptive.unwrap_or(Theme::Light)
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct AppsSwitchSettings {
    enabled: Option<bool>,
    mode: Option<Mode>,
}

impl AppsSwitchSettings {
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn mode(&self) -> Mode {
        self.mode.unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct AccentColorSettings {
    enabled: Option<bool>,
    enable_during: Option<Theme>,
}

impl AccentColorSettings {
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(false)
    }

    /// The theme during which window borders and title bars carry the accent color.
    pub fn enable_during(&self) -> Theme {
        self.enable_during.unwrap_or(Theme::Dark)
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct WallpaperSettings {
    enabled: Option<bool>,
    light: Option<PathBuf>,
    dark: Option<PathBuf>,
}

impl WallpaperSettings {
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(false)
    }

    pub fn path_for(&self, theme: Theme) -> Option<&Path> {
        match theme {
            Theme::Light => self.light.as_deref(),
            Theme::Dark => self.dark.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct CursorSettings {
    enabled: Option<bool>,
    light: Option<String>,
    dark: Option<String>,
}

impl CursorSettings {
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(false)
    }

    pub fn scheme_for(&self, theme: Theme) -> Option<&str> {
        match theme {
            Theme::Light => self.light.as_deref(),
            Theme::Dark => self.dark.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ScriptSwitchSettings {
    enabled: Option<bool>,
    #[serde(default)]
    scripts: Vec<ScriptEntry>,
}

impl ScriptSwitchSettings {
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(false)
    }

    pub fn scripts(&self) -> &[ScriptEntry] {
        &self.scripts
    }
}

/// A user script run on every theme switch.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ScriptEntry {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args_light: Vec<String>,
    #[serde(default)]
    pub args_dark: Vec<String>,
    /// Sources that may trigger this script. Empty means every source.
    #[serde(default)]
    pub allowed_sources: Vec<SwitchSource>,
    pub timeout_ms: Option<u64>,
    pub working_directory: Option<PathBuf>,
}

impl ScriptEntry {
    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms.unwrap_or(10_000)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms())
    }

    pub fn args_for(&self, theme: Theme) -> &[String] {
        match theme {
            Theme::Dark => &self.args_dark,
            _ => &self.args_light,
        }
    }

    pub fn allows(&self, source: SwitchSource) -> bool {
        self.allowed_sources.is_empty()
            || self
                .allowed_sources
                .iter()
                .any(|s| *s == SwitchSource::Any || *s == source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_defaults() {
        let config = ComponentsConfig::default();
        assert!(config.system().enabled());
        assert!(config.apps().enabled());
        assert!(!config.accent_color().enabled());
        assert!(!config.wallpaper().enabled());
        assert!(!config.scripts().enabled());
        assert_eq!(config.system().taskbar_switch_delay_ms(), 1200);
        assert_eq!(config.system().mode(), Mode::Switch);
        assert_eq!(config.accent_color().enable_during(), Theme::Dark);
    }

    #[test]
    fn test_script_source_filter() {
        let mut entry = ScriptEntry {
            name: "notify".to_string(),
            command: "notify-send".to_string(),
            ..ScriptEntry::default()
        };
        assert!(entry.allows(SwitchSource::Manual));

        entry.allowed_sources = vec![SwitchSource::TimeSwitchModule];
        assert!(entry.allows(SwitchSource::TimeSwitchModule));
        assert!(!entry.allows(SwitchSource::Manual));

        entry.allowed_sources.push(SwitchSource::Any);
        assert!(entry.allows(SwitchSource::Manual));
    }

    #[test]
    fn test_script_args_follow_theme() {
        let entry = ScriptEntry {
            args_light: vec!["--light".to_string()],
            args_dark: vec!["--dark".to_string()],
            ..ScriptEntry::default()
        };
        assert_eq!(entry.args_for(Theme::Dark), ["--dark".to_string()]);
        assert_eq!(entry.args_for(Theme::Light), ["--light".to_string()]);
    }
}
