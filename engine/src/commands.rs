//! Command surface of the engine.
//!
//! Front ends (CLI, IPC, hotkeys) never touch engine internals directly. They
//! build an [`EngineCommand`] and hand it to
//! [`Engine::execute_command`](crate::engine::Engine::execute_command), which
//! answers with an [`EngineResponse`].

use crate::common::EngineError;
use crate::model::{GovernorKind, SunTimes, SwitchEventArgs, SwitchSource, Theme};
use crate::postpone::PostponeItem;
use crate::theme_manager::SwitchOutcome;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;

/// Operations the engine accepts from the outside.
///
/// Every command that changes the theme goes through the theme manager, so
/// forced themes and postpones apply to it like to any governor request.
///
/// # Examples
///
/// ```no_run
/// use engine::commands::EngineCommand;
/// use engine::model::{SwitchSource, Theme};
///
/// let command = EngineCommand::RequestSwitch {
///     theme: Theme::Dark,
///     source: SwitchSource::Hotkey,
/// };
///
/// let command = EngineCommand::DelayAutoSwitch { minutes: 30 };
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    /// Request a specific theme.
    RequestSwitch {
        theme: Theme,
        source: SwitchSource,
    },

    /// Switch by hand and pause automatic switching if the result is off
    /// schedule. Without a theme the current one is inverted.
    SwitchThemeAutoPause { theme: Option<Theme> },

    /// Force a theme for every request. `Theme::Unknown` clears it.
    SetForcedTheme { theme: Theme },

    /// Pause or resume the next automatic switch.
    ToggleSkipNextSwitch,

    /// Hold off automatic switching for a number of minutes.
    DelayAutoSwitch { minutes: u32 },

    /// Remove every postpone the user may clear.
    ClearPostpones,

    /// Make every component apply the current theme again.
    ForceRefresh,

    /// The user session was locked. Automatic switching holds until unlock.
    SessionLocked,

    /// The user session was unlocked. Releases the lock postpone and requests
    /// the automatic target.
    SessionUnlocked,

    /// The machine woke from sleep. Expired postpones are swept and the
    /// automatic target is requested.
    SystemResumed,

    GetStatus,
}

/// Answers to [`EngineCommand`]s.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "response", rename_all = "snake_case")]
pub enum EngineResponse {
    SwitchRequested { outcome: SwitchOutcome },
    ForcedThemeSet {
        theme: Theme,
        /// `None` when the forced theme was already set to `theme`.
        outcome: Option<SwitchOutcome>,
    },
    SkipNextSwitch { active: bool },
    AutoSwitchDelayed { until: NaiveDateTime },
    PostponesCleared { removed: usize },
    SessionLocked { postponed: bool },
    /// `None` when no request was made after unlock or resume.
    Resynced { outcome: Option<SwitchOutcome> },
    Status(Box<EngineStatus>),
    Error { error: String },
}

impl EngineResponse {
    pub fn error(error: &EngineError) -> Self {
        EngineResponse::Error {
            error: error.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, EngineResponse::Error { .. })
    }
}

/// Diagnostic snapshot of the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStatus {
    pub auto_theme_switching_enabled: bool,
    pub governor: Option<GovernorKind>,
    pub forced_theme: Theme,
    pub requested_theme: Theme,
    pub night_light_theme: Theme,
    pub theme_switch_approaching: bool,
    pub pending_resume_checks: Vec<&'static str>,
    pub postpones: Vec<PostponeItem>,
    pub pending_switch: Option<SwitchEventArgs>,
    pub component_themes: BTreeMap<String, Theme>,
    /// Registered module names per timer.
    pub modules: BTreeMap<String, Vec<&'static str>>,
    pub sun_times: Option<SunTimes>,
    pub config_generation: u64,
}
