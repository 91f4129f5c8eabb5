//! Concrete collaborators backed by shell commands and `sysinfo`.

use crate::config::{CollaboratorsConfig, CommandTemplate};
use async_trait::async_trait;
use umbra_engine::collaborators::{
    Applier, Collaborators, LogApplier, LogRefresher, ProcessProbe, ScriptInvocation,
    ScriptRunner, VisualRefresher,
};
use umbra_engine::common::ApplyError;
use umbra_engine::model::{RefreshType, Theme};
use std::collections::HashSet;
use std::path::PathBuf;
use std::process::Output;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sysinfo::{ProcessesToUpdate, System};
use tokio::process::Command;

/// A value that can be passed to a shell command and read back from its output.
pub trait CommandValue: Sized {
    fn render(&self) -> String;

    /// `None` when the output carries no value.
    fn parse(output: &str) -> Option<Self>;
}

impl CommandValue for Theme {
    fn render(&self) -> String {
        self.to_string()
    }

    fn parse(output: &str) -> Option<Self> {
        match output.trim().to_lowercase().as_str() {
            "" => None,
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => Some(Theme::Undefined),
        }
    }
}

impl CommandValue for bool {
    fn render(&self) -> String {
        self.to_string()
    }

    fn parse(output: &str) -> Option<Self> {
        match output.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        }
    }
}

impl CommandValue for PathBuf {
    fn render(&self) -> String {
        self.display().to_string()
    }

    fn parse(output: &str) -> Option<Self> {
        let trimmed = output.trim();
        (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
    }
}

impl CommandValue for String {
    fn render(&self) -> String {
        self.clone()
    }

    fn parse(output: &str) -> Option<Self> {
        let trimmed = output.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

/// Runs `line` through `shell`, failing on timeout or a non-zero exit status.
async fn run_shell(
    subsystem: &str,
    shell: &str,
    line: &str,
    timeout: Duration,
) -> Result<Output, ApplyError> {
    let flag = if shell.eq_ignore_ascii_case("cmd") { "/C" } else { "-c" };
    let mut command = Command::new(shell);
    command.arg(flag).arg(line).kill_on_drop(true);
    run_command(subsystem, command, timeout).await
}

async fn run_command(
    subsystem: &str,
    mut command: Command,
    timeout: Duration,
) -> Result<Output, ApplyError> {
    let output = match tokio::time::timeout(timeout, command.output()).await {
        Ok(result) => result.map_err(|e| ApplyError::failed(subsystem, e))?,
        Err(_) => {
            return Err(ApplyError::Timeout {
                subsystem: subsystem.to_string(),
                millis: timeout.as_millis() as u64,
            });
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ApplyError::failed(
            subsystem,
            format!("{} {}", output.status, stderr.trim()),
        ));
    }
    Ok(output)
}

/// Applies a value by running the subsystem's command template.
pub struct CommandApplier {
    subsystem: &'static str,
    template: CommandTemplate,
    shell: String,
    timeout: Duration,
}

impl CommandApplier {
    pub fn new(
        subsystem: &'static str,
        template: CommandTemplate,
        shell: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            subsystem,
            template,
            shell: shell.into(),
            timeout,
        }
    }
}

#[async_trait]
impl<V> Applier<V> for CommandApplier
where
    V: CommandValue + Send + Sync + 'static,
{
    async fn apply(&self, value: &V) -> Result<(), ApplyError> {
        let line = self.template.render(&value.render());
        log::debug!("{}: running {}", self.subsystem, line);
        run_shell(self.subsystem, &self.shell, &line, self.timeout).await?;
        Ok(())
    }

    async fn query(&self) -> Result<Option<V>, ApplyError> {
        let Some(query) = &self.template.query else {
            return Ok(None);
        };
        let output = run_shell(self.subsystem, &self.shell, query, self.timeout)
            .await
            .map_err(|e| ApplyError::query_failed(self.subsystem, e))?;
        Ok(V::parse(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Runs user scripts as child processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessScriptRunner;

#[async_trait]
impl ScriptRunner for ProcessScriptRunner {
    async fn run(&self, script: &ScriptInvocation) -> Result<(), ApplyError> {
        let mut command = Command::new(&script.command);
        command.args(&script.args).kill_on_drop(true);
        if let Some(dir) = &script.working_directory {
            command.current_dir(dir);
        }
        let output = run_command(&script.name, command, script.timeout).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            log::debug!("Script {} output: {}", script.name, stdout.trim());
        }
        Ok(())
    }
}

/// Lists running processes through `sysinfo`.
pub struct SysinfoProcessProbe {
    system: Mutex<System>,
}

impl SysinfoProcessProbe {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SysinfoProcessProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessProbe for SysinfoProcessProbe {
    fn running_processes(&self) -> Result<HashSet<String>, ApplyError> {
        let mut system = self.system.lock().unwrap_or_else(|e| e.into_inner());
        system.refresh_processes(ProcessesToUpdate::All, true);
        Ok(system
            .processes()
            .values()
            .map(|process| process.name().to_string_lossy().into_owned())
            .collect())
    }
}

/// Runs the refresh command template with the refresh type as `{value}`.
pub struct CommandRefresher {
    template: CommandTemplate,
    shell: String,
    timeout: Duration,
}

impl CommandRefresher {
    pub fn new(template: CommandTemplate, shell: impl Into<String>, timeout: Duration) -> Self {
        Self {
            template,
            shell: shell.into(),
            timeout,
        }
    }
}

#[async_trait]
impl VisualRefresher for CommandRefresher {
    async fn refresh(&self, kind: RefreshType) -> Result<(), ApplyError> {
        if kind == RefreshType::None {
            return Ok(());
        }
        let line = self.template.render(&kind.to_string());
        run_shell("refresh", &self.shell, &line, self.timeout).await?;
        Ok(())
    }
}

fn applier<V>(
    subsystem: &'static str,
    template: Option<&CommandTemplate>,
    config: &CollaboratorsConfig,
) -> Arc<dyn Applier<V>>
where
    V: CommandValue + std::fmt::Debug + Send + Sync + 'static,
{
    match template {
        Some(template) => Arc::new(CommandApplier::new(
            subsystem,
            template.clone(),
            config.shell(),
            config.timeout(),
        )),
        None => Arc::new(LogApplier::new(subsystem)),
    }
}

/// Build the engine's collaborators from `[collaborators]`.
pub fn build_collaborators(config: &CollaboratorsConfig) -> Collaborators {
    let refresher: Arc<dyn VisualRefresher> = match &config.refresh {
        Some(template) => Arc::new(CommandRefresher::new(
            template.clone(),
            config.shell(),
            config.timeout(),
        )),
        None => Arc::new(LogRefresher),
    };
    let processes: Option<Arc<dyn ProcessProbe>> = config
        .process_probe()
        .then(|| Arc::new(SysinfoProcessProbe::new()) as Arc<dyn ProcessProbe>);

    Collaborators {
        system_theme: applier("system_theme", config.system_theme.as_ref(), config),
        apps_theme: applier("apps_theme", config.apps_theme.as_ref(), config),
        taskbar_accent: applier("taskbar_accent", config.taskbar_accent.as_ref(), config),
        accent_color: applier("accent_color", config.accent_color.as_ref(), config),
        wallpaper: applier("wallpaper", config.wallpaper.as_ref(), config),
        cursor: applier("cursor", config.cursor.as_ref(), config),
        scripts: Arc::new(ProcessScriptRunner),
        refresher,
        processes,
        ..Collaborators::logging()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claims::{assert_err, assert_ok};

    #[test]
    fn test_parse_theme_output() {
        assert_eq!(Theme::parse("dark\n"), Some(Theme::Dark));
        assert_eq!(Theme::parse("  Light "), Some(Theme::Light));
        assert_eq!(Theme::parse("prefer-contrast"), Some(Theme::Undefined));
        assert_eq!(Theme::parse(""), None);
    }

    #[test]
    fn test_parse_bool_output() {
        assert_eq!(bool::parse("1"), Some(true));
        assert_eq!(bool::parse("off\n"), Some(false));
        assert_eq!(bool::parse("maybe"), None);
    }

    #[test]
    fn test_parse_path_output() {
        assert_eq!(
            PathBuf::parse("/usr/share/backgrounds/night.png\n"),
            Some(PathBuf::from("/usr/share/backgrounds/night.png"))
        );
        assert_eq!(PathBuf::parse("   "), None);
    }

    #[test]
    fn test_unconfigured_subsystems_only_log() {
        let collaborators = build_collaborators(&CollaboratorsConfig::default());
        assert!(collaborators.processes.is_some());
        assert!(collaborators.idle.is_none());
    }

    #[cfg(unix)]
    mod unix {
        use super::*;

        fn template(apply: &str, query: Option<&str>) -> CommandTemplate {
            CommandTemplate {
                apply: apply.to_string(),
                query: query.map(str::to_string),
            }
        }

        #[tokio::test]
        async fn test_command_applier_runs_rendered_template() {
            let applier = CommandApplier::new(
                "system_theme",
                template("test {value} = dark", Some("echo dark")),
                "sh",
                Duration::from_secs(5),
            );
            assert_ok!(Applier::<Theme>::apply(&applier, &Theme::Dark).await);
            assert_err!(Applier::<Theme>::apply(&applier, &Theme::Light).await);
            assert_eq!(
                Applier::<Theme>::query(&applier).await,
                Ok(Some(Theme::Dark))
            );
        }

        #[tokio::test]
        async fn test_command_applier_without_query_reports_nothing() {
            let applier =
                CommandApplier::new("cursor", template("true", None), "sh", Duration::from_secs(5));
            assert_eq!(Applier::<String>::query(&applier).await, Ok(None));
        }

        #[tokio::test]
        async fn test_command_timeout() {
            let applier = CommandApplier::new(
                "wallpaper",
                template("sleep 5", None),
                "sh",
                Duration::from_millis(50),
            );
            let result = Applier::<PathBuf>::apply(&applier, &PathBuf::from("/tmp/x.png")).await;
            assert!(matches!(result, Err(ApplyError::Timeout { millis: 50, .. })));
        }

        #[tokio::test]
        async fn test_script_runner_reports_exit_status() {
            let runner = ProcessScriptRunner;
            let mut script = ScriptInvocation {
                name: "notify".to_string(),
                command: "sh".to_string(),
                args: vec!["-c".to_string(), "exit 0".to_string()],
                timeout: Duration::from_secs(5),
                working_directory: None,
            };
            assert_ok!(runner.run(&script).await);

            script.args = vec!["-c".to_string(), "exit 3".to_string()];
            assert!(matches!(
                runner.run(&script).await,
                Err(ApplyError::Failed { .. })
            ));
        }

        #[tokio::test]
        async fn test_refresh_skips_none() {
            let refresher =
                CommandRefresher::new(template("exit 1", None), "sh", Duration::from_secs(5));
            assert_ok!(refresher.refresh(RefreshType::None).await);
            assert_err!(refresher.refresh(RefreshType::Full).await);
        }
    }
}
