use serde::Deserialize;
use std::time::Duration;

const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 10_000;

/// A shell command run for one subsystem. `{value}` in `apply` is replaced with
/// the value being applied; `query` prints the live value on stdout.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CommandTemplate {
    pub apply: String,
    pub query: Option<String>,
}

impl CommandTemplate {
    pub fn render(&self, value: &str) -> String {
        self.apply.replace("{value}", value)
    }
}

/// `[collaborators]`: how the daemon reaches the desktop. Subsystems without a
/// command only log what they would do.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct CollaboratorsConfig {
    shell: Option<String>,
    timeout_ms: Option<u64>,
    pub system_theme: Option<CommandTemplate>,
    pub apps_theme: Option<CommandTemplate>,
    pub taskbar_accent: Option<CommandTemplate>,
    pub accent_color: Option<CommandTemplate>,
    pub wallpaper: Option<CommandTemplate>,
    pub cursor: Option<CommandTemplate>,
    pub refresh: Option<CommandTemplate>,
    process_probe: Option<bool>,
}

impl CollaboratorsConfig {
    /// Shell used to run command templates.
    pub fn shell(&self) -> &str {
        self.shell.as_deref().unwrap_or(if cfg!(windows) { "cmd" } else { "sh" })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(DEFAULT_COMMAND_TIMEOUT_MS))
    }

    /// Whether running processes are listed for the process block list.
    pub fn process_probe(&self) -> bool {
        self.process_probe.unwrap_or(true)
    }
}
