use super::{SwitchSource, Theme};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Why the theme of a request differs from what its source asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThemeOverride {
    /// A forced theme was active when the request arrived.
    Forced { requested: Theme },
}

/// An immutable switch request.
///
/// Overriding the theme produces a new value; the original request is never
/// mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchEventArgs {
    theme: Theme,
    source: SwitchSource,
    switch_time: Option<NaiveDateTime>,
    theme_override: Option<ThemeOverride>,
}

impl SwitchEventArgs {
    pub fn new(source: SwitchSource, theme: Theme) -> Self {
        Self {
            theme,
            source,
            switch_time: None,
            theme_override: None,
        }
    }

    /// Attach the boundary time this request was computed for.
    pub fn with_switch_time(mut self, switch_time: NaiveDateTime) -> Self {
        self.switch_time = Some(switch_time);
        self
    }

    /// Return a copy of this request carrying `theme` instead, remembering what
    /// the source originally asked for.
    pub fn with_forced_theme(&self, theme: Theme) -> Self {
        Self {
            theme,
            source: self.source,
            switch_time: self.switch_time,
            theme_override: Some(ThemeOverride::Forced {
                requested: self.theme,
            }),
        }
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn source(&self) -> SwitchSource {
        self.source
    }

    pub fn switch_time(&self) -> Option<NaiveDateTime> {
        self.switch_time
    }

    pub fn theme_override(&self) -> Option<ThemeOverride> {
        self.theme_override
    }
}

/// What a governor reports on each evaluation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GovernorEvent {
    /// A theme boundary is imminent; dependency modules should start checking.
    pub in_switch_window: bool,
    /// Skip the approach window and check dependencies right now.
    pub instant: bool,
    pub request: Option<SwitchEventArgs>,
}

impl GovernorEvent {
    pub fn window(in_switch_window: bool) -> Self {
        Self {
            in_switch_window,
            ..Self::default()
        }
    }

    pub fn with_request(mut self, request: SwitchEventArgs) -> Self {
        self.request = Some(request);
        self
    }

    pub fn instant(mut self, instant: bool) -> Self {
        self.instant = instant;
        self
    }
}
