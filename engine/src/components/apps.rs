use super::{SwitchComponent, ThemeCache};
use crate::collaborators::Applier;
use crate::common::ApplyError;
use crate::config::{AppsSwitchSettings, EngineConfig};
use crate::model::{SwitchEventArgs, Theme};
use async_trait::async_trait;
use std::sync::Arc;

pub const NAME: &str = "apps";

/// Application theme preference.
pub struct AppsComponent {
    settings: AppsSwitchSettings,
    applier: Arc<dyn Applier<Theme>>,
    cache: ThemeCache,
}

impl AppsComponent {
    pub fn new(
        settings: AppsSwitchSettings,
        applier: Arc<dyn Applier<Theme>>,
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
impl SwitchComponent for AppsComponent {
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
        let target = self.settings.mode().resolve(event.theme());
        target.is_concrete() && self.cache.get() != target
    }

    async fn handle_switch(&mut self, event: &SwitchEventArgs) -> Result<(), ApplyError> {
        let previous = self.cache.get();
        let target = self.settings.mode().resolve(event.theme());
        self.applier.apply(&target).await?;
        self.cache.set(target);
        log::info!(
            "Update info - previous: {previous}, now: {target}, mode: {:?}",
            self.settings.mode()
        );
        Ok(())
    }

    async fn enable_hook(&mut self) -> Result<(), ApplyError> {
        self.cache.invalidate();
        if let Some(theme) = self.applier.query().await? {
            self.cache.set(theme);
        }
        Ok(())
    }

    async fn disable_hook(&mut self) -> Result<(), ApplyError> {
        self.cache.invalidate();
        Ok(())
    }

    fn update_settings_state(&mut self, config: &EngineConfig) {
        let settings = config.components().apps();
        if settings.mode() != self.settings.mode() {
            self.cache.invalidate();
        }
        self.settings = settings.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::model::SwitchSource;
    use crate::state::GlobalState;
    use crate::testing::RecordingApplier;

    fn component(json: &str) -> (AppsComponent, Arc<RecordingApplier<Theme>>) {
        let config: EngineConfig = serde_json::from_str(json).unwrap();
        let applier = Arc::new(RecordingApplier::new("apps"));
        let state = Arc::new(GlobalState::new(Arc::new(SystemClock)));
        let component = AppsComponent::new(
            config.components().apps().clone(),
            applier.clone(),
            ThemeCache::new(state, NAME),
        );
        (component, applier)
    }

    #[tokio::test]
    async fn test_switches_once_per_theme() {
        let (mut apps, applier) = component("{}");
        let dark = SwitchEventArgs::new(SwitchSource::Manual, Theme::Dark);

        assert!(apps.needs_update(&dark));
        apps.handle_switch(&dark).await.unwrap();
        assert!(!apps.needs_update(&dark));
        assert_eq!(applier.applied(), vec![Theme::Dark]);
    }

    #[tokio::test]
    async fn test_unknown_request_never_needs_update() {
        let (apps, _) = component("{}");
        let unknown = SwitchEventArgs::new(SwitchSource::Manual, Theme::Unknown);
        assert!(!apps.needs_update(&unknown));
    }

    #[tokio::test]
    async fn test_mode_change_resets_cache() {
        let (mut apps, _) = component("{}");
        let light = SwitchEventArgs::new(SwitchSource::Manual, Theme::Light);
        apps.handle_switch(&light).await.unwrap();

        let changed: EngineConfig =
            serde_json::from_str(r#"{ "components": { "apps": { "mode": "light_only" } } }"#)
                .unwrap();
        apps.update_settings_state(&changed);

        assert_eq!(apps.cache.get(), Theme::Unknown);
        assert!(apps.needs_update(&light));
    }
}
