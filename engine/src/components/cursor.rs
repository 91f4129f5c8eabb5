use super::{SwitchComponent, ThemeCache};
use crate::collaborators::Applier;
use crate::common::ApplyError;
use crate::config::{CursorSettings, EngineConfig};
use crate::model::{SwitchEventArgs, Theme};
use async_trait::async_trait;
use std::sync::Arc;

pub const NAME: &str = "cursor";

/// Per-theme cursor scheme.
pub struct CursorComponent {
    settings: CursorSettings,
    applier: Arc<dyn Applier<String>>,
    cache: ThemeCache,
}

impl CursorComponent {
    pub fn new(
        settings: CursorSettings,
        applier: Arc<dyn Applier<String>>,
        cache: ThemeCache,
    ) -> Self {
        Self {
            settings,
            applier,
            cache,
        }
    }
}

#[async_trait]
impl SwitchComponent for CursorComponent {
    fn name(&self) -> &'static str {
        NAME
    }

    fn enabled(&self) -> bool {
        self.settings.enabled()
    }

    fn theme_handler_compatible(&self) -> bool {
        false
    }

    fn needs_update(&self, event: &SwitchEventArgs) -> bool {
        self.settings.scheme_for(event.theme()).is_some() && self.cache.get() != event.theme()
    }

    async fn handle_switch(&mut self, event: &SwitchEventArgs) -> Result<(), ApplyError> {
        let Some(scheme) = self.settings.scheme_for(event.theme()) else {
            return Ok(());
        };
        let scheme = scheme.to_string();
        self.applier.apply(&scheme).await?;
        self.cache.set(event.theme());
        log::info!("Update info - cursor scheme set to {scheme}");
        Ok(())
    }

    async fn enable_hook(&mut self) -> Result<(), ApplyError> {
        self.cache.invalidate();
        if let Some(live) = self.applier.query().await? {
            let theme = if self.settings.scheme_for(Theme::Light) == Some(live.as_str()) {
                Theme::Light
            } else if self.settings.scheme_for(Theme::Dark) == Some(live.as_str()) {
                Theme::Dark
            } else {
                Theme::Undefined
            };
            self.cache.set(theme);
        }
        Ok(())
    }

    async fn disable_hook(&mut self) -> Result<(), ApplyError> {
        self.cache.invalidate();
        Ok(())
    }

    fn update_settings_state(&mut self, config: &EngineConfig) {
        let settings = config.components().cursor();
        if *settings != self.settings {
            self.cache.invalidate();
        }
        self.settings = settings.clone();
    }
}
