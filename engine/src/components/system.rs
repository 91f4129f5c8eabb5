use super::{SwitchComponent, ThemeCache};
use crate::collaborators::Applier;
use crate::common::ApplyError;
use crate::config::{EngineConfig, SystemSwitchSettings};
use crate::model::{Mode, SwitchEventArgs, Theme};
use async_trait::async_trait;
use std::sync::Arc;

pub const NAME: &str = "system";

/// System theme plus the taskbar accent color.
///
/// The accent can only show while the system theme is dark, and the shell needs a
/// moment between the two writes, so the component orders them by direction and
/// sleeps for the configured delay in between.
pub struct SystemComponent {
    settings: SystemSwitchSettings,
    theme: Arc<dyn Applier<Theme>>,
    taskbar_accent: Arc<dyn Applier<bool>>,
    cache: ThemeCache,
    accent_active: Option<bool>,
}

impl SystemComponent {
    pub fn new(
        settings: SystemSwitchSettings,
        theme: Arc<dyn Applier<Theme>>,
        taskbar_accent: Arc<dyn Applier<bool>>,
        cache: ThemeCache,
    ) -> Self {
        Self {
            settings,
            theme,
            taskbar_accent,
            cache,
            accent_active: None,
        }
    }

    fn target_theme(&self, event: &SwitchEventArgs) -> Theme {
        self.settings.mode().resolve(event.theme())
    }

    fn target_accent(&self, event: &SwitchEventArgs) -> bool {
        match self.settings.mode() {
            Mode::Switch | Mode::DarkOnly => {
                self.target_theme(event) == Theme::Dark && self.settings.taskbar_color_on_adaptive()
            }
            Mode::LightOnly => false,
            Mode::AccentOnly => event.theme() == self.settings.taskbar_color_when_non_adaptive(),
        }
    }

    async fn set_accent(&mut self, active: bool) -> Result<(), ApplyError> {
        self.taskbar_accent.apply(&active).await?;
        self.accent_active = Some(active);
        Ok(())
    }

    async fn set_theme(&mut self, theme: Theme) -> Result<(), ApplyError> {
        self.theme.apply(&theme).await?;
        self.cache.set(theme);
        Ok(())
    }
}

#[async_trait]
impl SwitchComponent for SystemComponent {
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
        let target = self.target_theme(event);
        if !target.is_concrete() {
            return false;
        }
        self.cache.get() != target || self.accent_active != Some(self.target_accent(event))
    }

    async fn handle_switch(&mut self, event: &SwitchEventArgs) -> Result<(), ApplyError> {
        let previous = (self.cache.get(), self.accent_active);
        let target = self.target_theme(event);
        let accent = self.target_accent(event);
        let theme_changes = self.cache.get() != target;
        let delay = self.settings.taskbar_switch_delay();

        if target == Theme::Light {
            if self.accent_active != Some(false) {
                self.set_accent(false).await?;
                if theme_changes {
                    tokio::time::sleep(delay).await;
                }
            }
            if theme_changes {
                self.set_theme(Theme::Light).await?;
            }
        } else {
            if theme_changes {
                self.set_theme(Theme::Dark).await?;
            }
            if self.accent_active != Some(accent) {
                if theme_changes {
                    tokio::time::sleep(delay).await;
                }
                self.set_accent(accent).await?;
            }
        }

        log::info!(
            "Update info - previous: {}/{}, now: {}/{}, mode: {:?}",
            previous.0,
            accent_label(previous.1),
            self.cache.get(),
            accent_label(self.accent_active),
            self.settings.mode()
        );
        Ok(())
    }

    async fn enable_hook(&mut self) -> Result<(), ApplyError> {
        self.cache.invalidate();
        self.accent_active = None;
        if let Some(theme) = self.theme.query().await? {
            self.cache.set(theme);
        }
        self.accent_active = self.taskbar_accent.query().await?;
        Ok(())
    }

    async fn disable_hook(&mut self) -> Result<(), ApplyError> {
        self.cache.invalidate();
        self.accent_active = None;
        Ok(())
    }

    fn update_settings_state(&mut self, config: &EngineConfig) {
        let settings = config.components().system();
        if *settings != self.settings {
            self.cache.invalidate();
            self.accent_active = None;
        }
        self.settings = settings.clone();
    }
}

fn accent_label(active: Option<bool>) -> &'static str {
    match active {
        Some(true) => "accent",
        Some(false) => "no accent",
        None => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::model::SwitchSource;
    use crate::state::GlobalState;
    use crate::testing::{Journal, RecordingApplier};

    struct Fixture {
        component: SystemComponent,
        theme: Arc<RecordingApplier<Theme>>,
        accent: Arc<RecordingApplier<bool>>,
        journal: Journal,
    }

    fn fixture(json: &str) -> Fixture {
        let config: EngineConfig = serde_json::from_str(json).unwrap();
        let journal = Journal::default();
        let theme = Arc::new(RecordingApplier::new("theme").with_journal(journal.clone()));
        let accent = Arc::new(RecordingApplier::new("accent").with_journal(journal.clone()));
        let state = Arc::new(GlobalState::new(Arc::new(SystemClock)));
        let component = SystemComponent::new(
            config.components().system().clone(),
            theme.clone(),
            accent.clone(),
            ThemeCache::new(state, NAME),
        );
        Fixture {
            component,
            theme,
            accent,
            journal,
        }
    }

    fn request(theme: Theme) -> SwitchEventArgs {
        SwitchEventArgs::new(SwitchSource::Manual, theme)
    }

    #[tokio::test(start_paused = true)]
    async fn test_dark_writes_theme_before_accent() {
        let mut f = fixture(
            r#"{ "components": { "system": { "taskbar_color_on_adaptive": true } } }"#,
        );
        let dark = request(Theme::Dark);

        assert!(f.component.needs_update(&dark));
        f.component.handle_switch(&dark).await.unwrap();

        assert_eq!(f.journal.entries(), vec!["theme:Dark", "accent:true"]);
        assert!(!f.component.needs_update(&dark));
    }

    #[tokio::test(start_paused = true)]
    async fn test_light_removes_accent_first() {
        let mut f = fixture(
            r#"{ "components": { "system": { "taskbar_color_on_adaptive": true } } }"#,
        );
        f.component.handle_switch(&request(Theme::Dark)).await.unwrap();
        f.journal.clear();

        f.component.handle_switch(&request(Theme::Light)).await.unwrap();
        assert_eq!(f.journal.entries(), vec!["accent:false", "theme:Light"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dark_only_ignores_requested_light() {
        let mut f = fixture(r#"{ "components": { "system": { "mode": "dark_only" } } }"#);
        let light = request(Theme::Light);

        f.component.handle_switch(&light).await.unwrap();
        assert_eq!(f.theme.applied(), vec![Theme::Dark]);
        assert!(!f.component.needs_update(&light));
        assert!(!f.component.needs_update(&request(Theme::Dark)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_accent_only_toggles_accent_and_stays_dark() {
        let mut f = fixture(r#"{ "components": { "system": { "mode": "accent_only" } } }"#);

        f.component.handle_switch(&request(Theme::Light)).await.unwrap();
        f.component.handle_switch(&request(Theme::Dark)).await.unwrap();

        assert_eq!(f.theme.applied(), vec![Theme::Dark]);
        assert_eq!(f.accent.applied(), vec![true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_write_keeps_cache() {
        let mut f = fixture("{}");
        f.theme.set_failing(true);
        let dark = request(Theme::Dark);

        assert!(f.component.handle_switch(&dark).await.is_err());
        assert!(f.component.needs_update(&dark));

        f.theme.set_failing(false);
        f.component.handle_switch(&dark).await.unwrap();
        assert!(!f.component.needs_update(&dark));
    }

    #[tokio::test]
    async fn test_enable_hook_reads_live_state() {
        let mut f = fixture("{}");
        f.theme.apply(&Theme::Dark).await.unwrap();
        f.accent.apply(&false).await.unwrap();

        f.component.enable_hook().await.unwrap();
        assert!(!f.component.needs_update(&request(Theme::Dark)));
        assert!(f.component.needs_update(&request(Theme::Light)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_settings_change_invalidates_cache() {
        let mut f = fixture("{}");
        f.component.handle_switch(&request(Theme::Light)).await.unwrap();
        assert!(!f.component.needs_update(&request(Theme::Light)));

        let changed: EngineConfig = serde_json::from_str(
            r#"{ "components": { "system": { "taskbar_switch_delay_ms": 500 } } }"#,
        )
        .unwrap();
        f.component.update_settings_state(&changed);
        assert!(f.component.needs_update(&request(Theme::Light)));

        // Same settings again must not invalidate.
        f.component.handle_switch(&request(Theme::Light)).await.unwrap();
        f.component.update_settings_state(&changed);
        assert!(!f.component.needs_update(&request(Theme::Light)));
    }
}
