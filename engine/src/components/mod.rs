//! Switch components.
//!
//! Each component owns one subsystem (system theme, app theme, accent color,
//! wallpaper, cursor, user scripts). It decides whether it needs to run for a
//! request and applies the change through its collaborator. The
//! [`ComponentManager`](manager::ComponentManager) orders and runs them.

pub mod accent_color;
pub mod apps;
pub mod cursor;
pub mod manager;
pub mod scripts;
pub mod system;
pub mod wallpaper;

pub use accent_color::AccentColorComponent;
pub use apps::AppsComponent;
pub use cursor::CursorComponent;
pub use manager::{ComponentManager, RunReport};
pub use scripts::ScriptComponent;
pub use system::SystemComponent;
pub use wallpaper::WallpaperComponent;

use crate::collaborators::Collaborators;
use crate::common::ApplyError;
use crate::config::EngineConfig;
use crate::model::{RefreshType, SwitchEventArgs, Theme};
use crate::state::GlobalState;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// A unit that applies the theme to one subsystem.
///
/// Implementations keep their last applied state and answer
/// [`needs_update`](SwitchComponent::needs_update) from it, so running a component
/// twice for the same request only touches the subsystem once.
#[async_trait]
pub trait SwitchComponent: Send {
    fn name(&self) -> &'static str;

    fn enabled(&self) -> bool;

    /// Whether the component may run while theme file mode is on.
    fn theme_handler_compatible(&self) -> bool {
        true
    }

    /// Lower runs first when switching to dark.
    fn priority_to_dark(&self) -> i32 {
        0
    }

    /// Lower runs first when switching to light.
    fn priority_to_light(&self) -> i32 {
        0
    }

    fn refresh_type(&self) -> RefreshType {
        RefreshType::None
    }

    /// How long after switching the refresh should happen.
    fn refresh_delay(&self) -> Duration {
        Duration::ZERO
    }

    fn needs_update(&self, event: &SwitchEventArgs) -> bool;

    async fn handle_switch(&mut self, event: &SwitchEventArgs) -> Result<(), ApplyError>;

    /// Resynchronise cached state from the live subsystem.
    async fn enable_hook(&mut self) -> Result<(), ApplyError> {
        Ok(())
    }

    async fn disable_hook(&mut self) -> Result<(), ApplyError> {
        Ok(())
    }

    /// Take a new settings snapshot, invalidating cached state if relevant fields
    /// changed.
    fn update_settings_state(&mut self, config: &EngineConfig);
}

/// A component's last applied theme, stored in [`GlobalState`] under the
/// component's name.
#[derive(Debug, Clone)]
pub struct ThemeCache {
    state: Arc<GlobalState>,
    key: &'static str,
}

impl ThemeCache {
    pub fn new(state: Arc<GlobalState>, key: &'static str) -> Self {
        Self { state, key }
    }

    pub fn get(&self) -> Theme {
        self.state.component_theme(self.key)
    }

    pub fn set(&self, theme: Theme) {
        self.state.set_component_theme(self.key, theme);
    }

    /// Forget the applied theme so the next evaluation re-syncs.
    pub fn invalidate(&self) {
        self.set(Theme::Unknown);
    }
}

/// The built-in components, in registration order.
pub fn default_components(
    state: &Arc<GlobalState>,
    collaborators: &Collaborators,
    config: &EngineConfig,
) -> Vec<Box<dyn SwitchComponent>> {
    vec![
        Box::new(SystemComponent::new(
            config.components().system().clone(),
            collaborators.system_theme.clone(),
            collaborators.taskbar_accent.clone(),
            ThemeCache::new(state.clone(), system::NAME),
        )),
        Box::new(AppsComponent::new(
            config.components().apps().clone(),
            collaborators.apps_theme.clone(),
            ThemeCache::new(state.clone(), apps::NAME),
        )),
        Box::new(AccentColorComponent::new(
            config.components().accent_color().clone(),
            collaborators.accent_color.clone(),
            ThemeCache::new(state.clone(), accent_color::NAME),
        )),
        Box::new(WallpaperComponent::new(
            config.components().wallpaper().clone(),
            collaborators.wallpaper.clone(),
            ThemeCache::new(state.clone(), wallpaper::NAME),
        )),
        Box::new(CursorComponent::new(
            config.components().cursor().clone(),
            collaborators.cursor.clone(),
            ThemeCache::new(state.clone(), cursor::NAME),
        )),
        Box::new(ScriptComponent::new(
            config.components().scripts().clone(),
            collaborators.scripts.clone(),
            ThemeCache::new(state.clone(), scripts::NAME),
        )),
    ]
}
