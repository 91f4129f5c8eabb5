use super::{SwitchComponent, ThemeCache};
use crate::collaborators::{ScriptInvocation, ScriptRunner};
use crate::common::ApplyError;
use crate::config::{EngineConfig, ScriptSwitchSettings};
use crate::model::SwitchEventArgs;
use async_trait::async_trait;
use std::sync::Arc;

pub const NAME: &str = "scripts";

/// Runs user scripts after the built-in components.
pub struct ScriptComponent {
    settings: ScriptSwitchSettings,
    runner: Arc<dyn ScriptRunner>,
    cache: ThemeCache,
}

impl ScriptComponent {
    pub fn new(
        settings: ScriptSwitchSettings,
        runner: Arc<dyn ScriptRunner>,
        cache: ThemeCache,
    ) -> Self {
        Self {
            settings,
            runner,
            cache,
        }
    }
}

#[async_trait]
impl SwitchComponent for ScriptComponent {
    fn name(&self) -> &'static str {
        NAME
    }

    fn enabled(&self) -> bool {
        self.settings.enabled()
    }

    fn priority_to_dark(&self) -> i32 {
        30
    }

    fn priority_to_light(&self) -> i32 {
        30
    }

    fn needs_update(&self, event: &SwitchEventArgs) -> bool {
        event.theme().is_concrete() && self.cache.get() != event.theme()
    }

    /// Runs every script allowed for the request's source. A failing script does
    /// not stop the others, but the theme is only recorded once all succeeded.
    async fn handle_switch(&mut self, event: &SwitchEventArgs) -> Result<(), ApplyError> {
        let mut failures = Vec::new();
        for script in self.settings.scripts() {
            if !script.allows(event.source()) {
                log::debug!(
                    "Skipping script {}, source {} not allowed",
                    script.name,
                    event.source()
                );
                continue;
            }

            let invocation = ScriptInvocation {
                name: script.name.clone(),
                command: script.command.clone(),
                args: script.args_for(event.theme()).to_vec(),
                timeout: script.timeout(),
                working_directory: script.working_directory.clone(),
            };
            match self.runner.run(&invocation).await {
                Ok(()) => log::info!("Script {} ran for {} theme", script.name, event.theme()),
                Err(e) => {
                    log::error!("Script {} failed: {e}", script.name);
                    failures.push(script.name.clone());
                }
            }
        }

        if failures.is_empty() {
            self.cache.set(event.theme());
            Ok(())
        } else {
            Err(ApplyError::failed(
                NAME,
                format!("failed scripts: {}", failures.join(", ")),
            ))
        }
    }

    async fn enable_hook(&mut self) -> Result<(), ApplyError> {
        self.cache.invalidate();
        Ok(())
    }

    fn update_settings_state(&mut self, config: &EngineConfig) {
        let settings = config.components().scripts();
        if *settings != self.settings {
            self.cache.invalidate();
        }
        self.settings = settings.clone();
    }
}
