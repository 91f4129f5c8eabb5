use super::{SwitchComponent, ThemeCache};
use crate::collaborators::Applier;
use crate::common::ApplyError;
use crate::config::{EngineConfig, WallpaperSettings};
use crate::model::{SwitchEventArgs, Theme};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const NAME: &str = "wallpaper";

/// Per-theme wallpaper image.
pub struct WallpaperComponent {
    settings: WallpaperSettings,
    applier: Arc<dyn Applier<PathBuf>>,
    cache: ThemeCache,
}

impl WallpaperComponent {
    pub fn new(
        settings: WallpaperSettings,
        applier: Arc<dyn Applier<PathBuf>>,
        cache: ThemeCache,
    ) -> Self {
        Self {
            settings,
            applier,
            cache,
        }
    }

    /// Which configured theme a live wallpaper belongs to.
    fn classify(&self, live: &Path) -> Theme {
        if self.settings.path_for(Theme::Light) == Some(live) {
            Theme::Light
        } else if self.settings.path_for(Theme::Dark) == Some(live) {
            Theme::Dark
        } else {
            Theme::Undefined
        }
    }
}

#[async_trait]
impl SwitchComponent for WallpaperComponent {
    fn name(&self) -> &'static str {
        NAME
    }

    fn enabled(&self) -> bool {
        self.settings.enabled()
    }

    fn needs_update(&self, event: &SwitchEventArgs) -> bool {
        self.settings.path_for(event.theme()).is_some() && self.cache.get() != event.theme()
    }

    async fn handle_switch(&mut self, event: &SwitchEventArgs) -> Result<(), ApplyError> {
        let Some(path) = self.settings.path_for(event.theme()) else {
            return Ok(());
        };
        let path = path.to_path_buf();
        self.applier.apply(&path).await?;
        self.cache.set(event.theme());
        log::info!("Update info - wallpaper set to {}", path.display());
        Ok(())
    }

    async fn enable_hook(&mut self) -> Result<(), ApplyError> {
        self.cache.invalidate();
        if let Some(live) = self.applier.query().await? {
            let theme = self.classify(&live);
            self.cache.set(theme);
        }
        Ok(())
    }

    async fn disable_hook(&mut self) -> Result<(), ApplyError> {
        self.cache.invalidate();
        Ok(())
    }

    fn update_settings_state(&mut self, config: &EngineConfig) {
        let settings = config.components().wallpaper();
        if *settings != self.settings {
            self.cache.invalidate();
        }
        self.settings = settings.clone();
    }
}
