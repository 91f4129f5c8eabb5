use super::{SwitchComponent, ThemeCache};
use crate::collaborators::Applier;
use crate::common::ApplyError;
use crate::config::{AccentColorSettings, EngineConfig};
use crate::model::{RefreshType, SwitchEventArgs, Theme};
use async_trait::async_trait;
use std::sync::Arc;

pub const NAME: &str = "accent_color";

/// Accent color on title bars and window borders, shown during one theme only.
pub struct AccentColorComponent {
    settings: AccentColorSettings,
    applier: Arc<dyn Applier<bool>>,
    cache: ThemeCache,
    active: Option<bool>,
}

impl AccentColorComponent {
    pub fn new(
        settings: AccentColorSettings,
        applier: Arc<dyn Applier<bool>>,
        cache: ThemeCache,
    ) -> Self {
        Self {
            settings,
            applier,
            cache,
            active: None,
        }
    }
}

#[async_trait]
impl SwitchComponent for AccentColorComponent {
    fn name(&self) -> &'static str {
        NAME
    }

    fn enabled(&self) -> bool {
        self.settings.enabled()
    }

    fn refresh_type(&self) -> RefreshType {
        RefreshType::Standard
    }

    fn needs_update(&self, event: &SwitchEventArgs) -> bool {
        if !event.theme().is_concrete() {
            return false;
        }
        let desired = event.theme() == self.settings.enable_during();
        self.cache.get() == Theme::Unknown || self.active != Some(desired)
    }

    async fn handle_switch(&mut self, event: &SwitchEventArgs) -> Result<(), ApplyError> {
        let desired = event.theme() == self.settings.enable_during();
        self.applier.apply(&desired).await?;
        self.active = Some(desired);
        self.cache.set(event.theme());
        log::info!(
            "Update info - accent color {} during {}",
            if desired { "enabled" } else { "disabled" },
            event.theme()
        );
        Ok(())
    }

    async fn enable_hook(&mut self) -> Result<(), ApplyError> {
        self.cache.invalidate();
        self.active = self.applier.query().await?;
        Ok(())
    }

    async fn disable_hook(&mut self) -> Result<(), ApplyError> {
        self.cache.invalidate();
        self.active = None;
        Ok(())
    }

    fn update_settings_state(&mut self, config: &EngineConfig) {
        let settings = config.components().accent_color();
        if settings.enable_during() != self.settings.enable_during() {
            self.cache.invalidate();
            self.active = None;
        }
        self.settings = settings.clone();
    }
}
