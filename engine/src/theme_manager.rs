//! The single entry point for theme switches.
//!
//! Every path that wants to change the theme (governors, hotkeys, the command
//! surface) goes through [`ThemeManager::request_switch`], so forced themes and
//! postpones are enforced in one place.

use crate::clock::Clock;
use crate::components::{ComponentManager, RunReport};
use crate::config::ConfigStore;
use crate::governors::TimedThemeState;
use crate::model::{GovernorKind, SkipType, SwitchEventArgs, SwitchSource, Theme};
use crate::state::GlobalState;
use chrono::{NaiveDateTime, TimeDelta};
use serde::Serialize;
use std::sync::Arc;

/// What happened to a switch request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SwitchOutcome {
    /// Components ran and at least one of them switched or failed.
    Applied { theme: Theme, report: RunReport },
    /// Every component was already in the requested state.
    NoChange { theme: Theme },
    /// The postpone queue was not empty; nothing ran.
    Postponed { theme: Theme, reasons: Vec<String> },
    /// A switch is approaching and dependency modules have not checked in yet.
    AwaitingDependencies {
        theme: Theme,
        pending: Vec<&'static str>,
    },
    /// The request carried no concrete theme.
    Skipped { requested: Theme },
}

impl SwitchOutcome {
    /// True when the request is fully reflected in the subsystems, so the
    /// requester does not need to send it again.
    pub fn settles(&self) -> bool {
        match self {
            SwitchOutcome::Applied { report, .. } => report.is_complete_success(),
            SwitchOutcome::NoChange { .. } => true,
            _ => false,
        }
    }

    pub fn theme(&self) -> Theme {
        match self {
            SwitchOutcome::Applied { theme, .. }
            | SwitchOutcome::NoChange { theme }
            | SwitchOutcome::Postponed { theme, .. }
            | SwitchOutcome::AwaitingDependencies { theme, .. } => *theme,
            SwitchOutcome::Skipped { requested } => *requested,
        }
    }
}

pub struct ThemeManager {
    state: Arc<GlobalState>,
    components: ComponentManager,
    config: Arc<ConfigStore>,
    clock: Arc<dyn Clock>,
}

impl ThemeManager {
    pub fn new(
        state: Arc<GlobalState>,
        components: ComponentManager,
        config: Arc<ConfigStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            state,
            components,
            config,
            clock,
        }
    }

    pub fn components(&self) -> &ComponentManager {
        &self.components
    }

    /// Apply a switch request.
    ///
    /// A forced theme replaces the requested one. While anything is postponed, or
    /// while an approaching switch still waits for dependency modules, the
    /// request is only recorded; the requester is expected to send it again.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use engine::model::{SwitchEventArgs, SwitchSource, Theme};
    /// # async fn example(manager: &engine::theme_manager::ThemeManager) {
    /// let outcome = manager
    ///     .request_switch(SwitchEventArgs::new(SwitchSource::Manual, Theme::Dark))
    ///     .await;
    /// println!("{outcome:?}");
    /// # }
    /// ```
    pub async fn request_switch(&self, request: SwitchEventArgs) -> SwitchOutcome {
        let forced = self.state.forced_theme();
        let event = if forced.is_concrete() && forced != request.theme() {
            log::info!(
                "Forced theme {} overrides {} requested by {}",
                forced,
                request.theme(),
                request.source()
            );
            request.with_forced_theme(forced)
        } else {
            request
        };

        let theme = event.theme();
        if !theme.is_concrete() {
            log::debug!("Ignoring {} request without a concrete theme", event.source());
            return SwitchOutcome::Skipped { requested: theme };
        }

        let postpone = self.state.postpone();
        if postpone.is_postponed() {
            let reasons: Vec<String> = postpone
                .items()
                .iter()
                .map(|item| item.reason().to_string())
                .collect();
            if self.state.pending_switch().as_ref() == Some(&event) {
                log::debug!("Switch to {} still postponed: {}", theme, postpone.summary());
            } else {
                log::info!(
                    "Switch to {} from {} postponed: {}",
                    theme,
                    event.source(),
                    postpone.summary()
                );
                self.state.set_pending_switch(event);
            }
            return SwitchOutcome::Postponed { theme, reasons };
        }

        if !self.state.approach_resolved() {
            let pending = self.state.pending_resume_checks();
            log::debug!(
                "Switch to {} waits for resume checks: {}",
                theme,
                pending.join(", ")
            );
            self.state.set_pending_switch(event);
            return SwitchOutcome::AwaitingDependencies { theme, pending };
        }

        self.state.set_requested_theme(theme);
        let report = self.components.run(&event).await;
        self.state.take_pending_switch();

        if report.is_noop() {
            SwitchOutcome::NoChange { theme }
        } else {
            log::info!("Switched to {} theme ({})", theme, event.source());
            SwitchOutcome::Applied { theme, report }
        }
    }

    pub fn forced_theme(&self) -> Theme {
        self.state.forced_theme()
    }

    /// Set or clear (`Theme::Unknown`) the forced theme and request it right
    /// away. Clearing requests the automatic target instead. Returns `None` when
    /// the forced theme did not change.
    pub async fn set_forced_theme(&self, theme: Theme) -> Option<SwitchOutcome> {
        let previous = self.state.forced_theme();
        if previous == theme {
            return None;
        }
        self.state.set_forced_theme(theme);
        let target = if theme.is_concrete() {
            log::info!("Forced theme set to {}", theme);
            theme
        } else {
            log::info!("Forced theme cleared");
            self.automatic_target()
        };
        Some(
            self.request_switch(SwitchEventArgs::new(SwitchSource::Api, target))
                .await,
        )
    }

    /// Request the automatic target again after the session comes back (unlock
    /// or resume). Returns `None` while the user holds switching off with
    /// skip-next or a delay.
    pub async fn resync(&self, source: SwitchSource) -> Option<SwitchOutcome> {
        let postpone = self.state.postpone();
        if postpone.is_skip_next_switch() || postpone.is_user_delayed() {
            log::info!(
                "No refresh on {} due to user postpones: {}",
                source,
                postpone.summary()
            );
            return None;
        }
        log::info!("Refreshing theme on {}", source);
        Some(
            self.request_switch(SwitchEventArgs::new(source, self.automatic_target()))
                .await,
        )
    }

    /// Pause or resume the next automatic switch. Returns whether the pause is
    /// active afterwards.
    ///
    /// With the time governor the pause expires one second after the boundary
    /// being skipped. With the night light governor it has no expiry and is
    /// released by the next night light edge that matches the applied theme.
    pub fn toggle_skip_next_switch(&self) -> bool {
        let (expiry, skip_type) = self.skip_expiry();
        let active = self
            .state
            .postpone()
            .toggle_skip_next_switch(expiry, skip_type);
        match (active, expiry) {
            (true, Some(expiry)) => log::info!("Skipping next switch until {}", expiry),
            (true, None) => log::info!("Skipping next switch"),
            (false, _) => log::info!("Skip next switch cancelled"),
        }
        active
    }

    /// Hold off automatic switching for `minutes`. Returns the expiry.
    pub fn delay_auto_switch(&self, minutes: u32) -> Option<NaiveDateTime> {
        let expiry = self.state.postpone().add_user_delay(minutes);
        if let Some(expiry) = expiry {
            log::info!("Automatic switching delayed until {}", expiry);
        }
        expiry
    }

    /// Switch by hand and keep automatic switching from undoing it.
    ///
    /// User-clearable postpones are dropped first. Without an explicit theme the
    /// opposite of the current one is applied. If the result differs from what
    /// the active governor wants, the next automatic switch is skipped.
    pub async fn switch_theme_auto_pause(&self, theme: Option<Theme>) -> SwitchOutcome {
        let removed = self.state.postpone().remove_user_clearable();
        if removed > 0 {
            log::debug!("Cleared {} user postpones before manual switch", removed);
        }

        let theme = theme
            .filter(|theme| theme.is_concrete())
            .unwrap_or_else(|| self.current_theme().opposite());
        let outcome = self
            .request_switch(SwitchEventArgs::new(SwitchSource::Manual, theme))
            .await;

        let config = self.config.snapshot();
        if config.auto_theme_switching_enabled() && theme != self.automatic_target() {
            let (expiry, skip_type) = self.skip_expiry();
            if self
                .state
                .postpone()
                .add_skip_next_switch(expiry, skip_type)
            {
                log::info!("Manual switch to {} pauses automatic switching", theme);
            }
        }
        outcome
    }

    /// The theme last requested, or the automatic target before any request.
    pub fn current_theme(&self) -> Theme {
        match self.state.requested_theme() {
            Theme::Light => Theme::Light,
            Theme::Dark => Theme::Dark,
            _ => self.automatic_target(),
        }
    }

    /// The theme the active governor currently aims for.
    fn automatic_target(&self) -> Theme {
        let config = self.config.snapshot();
        match config.governor() {
            GovernorKind::Default => {
                TimedThemeState::compute(&config, self.state.sun_times(), self.clock.now())
                    .target_theme()
            }
            GovernorKind::NightLight => self.state.night_light_theme(),
        }
    }

    fn skip_expiry(&self) -> (Option<NaiveDateTime>, SkipType) {
        let config = self.config.snapshot();
        if config.governor() == GovernorKind::NightLight {
            return (None, SkipType::Unspecified);
        }

        let ts = TimedThemeState::compute(&config, self.state.sun_times(), self.clock.now());
        // Already off schedule: the next boundary brings the theme back in line.
        // On schedule: the next boundary is the one being skipped.
        let (boundary, resumes_with) = if self.state.requested_theme() == ts.target_theme() {
            (ts.following_switch_time(), ts.target_theme())
        } else {
            (ts.next_switch_time(), ts.target_theme().opposite())
        };
        let skip_type = match resumes_with {
            Theme::Light => SkipType::UntilSunrise,
            _ => SkipType::UntilSunset,
        };
        (Some(boundary + TimeDelta::seconds(1)), skip_type)
    }
}
