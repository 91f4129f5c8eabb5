use super::EngineConfig;
use super::limits::*;
use std::collections::HashSet;

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid tunable.main_timer_secs: {configured} (min: {min_limit}, max: {max_limit})")]
    MainTimer {
        configured: u64,
        min_limit: u64,
        max_limit: u64,
    },
    #[error("Invalid switch_window.approach_minutes: {configured} (limit: {limit})")]
    ApproachWindow { configured: u32, limit: u32 },
    #[error("Invalid {field}: {configured} (limit: +/-{limit})")]
    Offset {
        field: &'static str,
        configured: i64,
        limit: i64,
    },
    #[error("Invalid gpu_monitoring.threshold: {configured} (limit: {limit})")]
    GpuThreshold { configured: u32, limit: u32 },
    #[error("Invalid gpu_monitoring.samples: {configured} (limit: {limit})")]
    GpuSamples { configured: u32, limit: u32 },
    #[error("Invalid idle_checker.threshold_minutes: {configured} (min: 1, max: {limit})")]
    IdleThreshold { configured: u64, limit: u64 },
    #[error("Invalid components.system.taskbar_switch_delay_ms: {configured} (limit: {limit})")]
    TaskbarDelay { configured: u64, limit: u64 },
    #[error("Script #{index} has no name")]
    ScriptName { index: usize },
    #[error("Script {name} has no command")]
    ScriptCommand { name: String },
    #[error("Script name {name} is used more than once")]
    DuplicateScript { name: String },
    #[error("Invalid timeout_ms for script {name}: {configured} (limit: {limit})")]
    ScriptTimeout {
        name: String,
        configured: u64,
        limit: u64,
    },
    #[error("sunrise and sunset are both {time}")]
    SunTimesEqual { time: String },
}

impl ConfigValidationError {
    pub fn user_message(&self) -> String {
        match self {
            ConfigValidationError::MainTimer {
                configured,
                min_limit,
                max_limit,
            } => format!(
                "Main timer period out of range!\n\nYour configured value: {configured} seconds\nValid range: {min_limit} - {max_limit} seconds\n\nPlease update tunable.main_timer_secs in config.toml."
            ),
            ConfigValidationError::ApproachWindow { configured, limit } => format!(
                "Switch approach window too long!\n\nYour configured value: {configured} minutes\nMaximum: {limit} minutes\n\nPlease update switch_window.approach_minutes in config.toml."
            ),
            ConfigValidationError::Offset {
                field,
                configured,
                limit,
            } => format!(
                "Offset out of range!\n\nYour configured value: {configured} minutes\nValid range: -{limit} - {limit} minutes\n\nPlease update {field} in config.toml."
            ),
            ConfigValidationError::GpuThreshold { configured, limit } => format!(
                "GPU usage threshold is a percentage!\n\nYour configured value: {configured}\nMaximum: {limit}\n\nPlease update gpu_monitoring.threshold in config.toml."
            ),
            ConfigValidationError::GpuSamples { configured, limit } => format!(
                "Too many GPU samples!\n\nYour configured value: {configured}\nMaximum: {limit}\n\nPlease update gpu_monitoring.samples in config.toml."
            ),
            ConfigValidationError::IdleThreshold { configured, limit } => format!(
                "Idle threshold out of range!\n\nYour configured value: {configured} minutes\nValid range: 1 - {limit} minutes\n\nPlease update idle_checker.threshold_minutes in config.toml."
            ),
            ConfigValidationError::TaskbarDelay { configured, limit } => format!(
                "Taskbar switch delay too long!\n\nYour configured value: {configured} ms\nMaximum: {limit} ms\n\nPlease update components.system.taskbar_switch_delay_ms in config.toml."
            ),
            ConfigValidationError::ScriptName { index } => format!(
                "Script entry {index} has no name.\n\nEvery entry under components.scripts.scripts needs a unique name."
            ),
            ConfigValidationError::ScriptCommand { name } => format!(
                "Script {name} has no command.\n\nPlease set the command for {name} in config.toml."
            ),
            ConfigValidationError::DuplicateScript { name } => format!(
                "Script name {name} appears more than once.\n\nScript names must be unique."
            ),
            ConfigValidationError::ScriptTimeout {
                name,
                configured,
                limit,
            } => format!(
                "Script timeout too long!\n\nScript: {name}\nYour configured value: {configured} ms\nMaximum: {limit} ms"
            ),
            ConfigValidationError::SunTimesEqual { time } => format!(
                "Sunrise and sunset are both set to {time}.\n\nPlease configure two different times."
            ),
        }
    }
}

pub(super) fn validate(config: &EngineConfig) -> Result<(), Vec<ConfigValidationError>> {
    let mut errors = Vec::new();

    let main_timer = config.tunable().main_timer_secs();
    if !(MIN_MAIN_TIMER_SECS..=MAX_MAIN_TIMER_SECS).contains(&main_timer) {
        errors.push(ConfigValidationError::MainTimer {
            configured: main_timer,
            min_limit: MIN_MAIN_TIMER_SECS,
            max_limit: MAX_MAIN_TIMER_SECS,
        });
    }

    let approach = config.switch_window().approach_minutes();
    if approach > MAX_APPROACH_MINUTES {
        errors.push(ConfigValidationError::ApproachWindow {
            configured: approach,
            limit: MAX_APPROACH_MINUTES,
        });
    }

    let offsets = [
        (
            "location.sunrise_offset_min",
            config.location().sunrise_offset_min(),
        ),
        (
            "location.sunset_offset_min",
            config.location().sunset_offset_min(),
        ),
        (
            "night_light.sunrise_offset_min",
            config.night_light().sunrise_offset_min(),
        ),
        (
            "night_light.sunset_offset_min",
            config.night_light().sunset_offset_min(),
        ),
    ];
    for (field, configured) in offsets {
        if configured.abs() > MAX_OFFSET_MINUTES {
            errors.push(ConfigValidationError::Offset {
                field,
                configured,
                limit: MAX_OFFSET_MINUTES,
            });
        }
    }

    let gpu = config.gpu_monitoring();
    if gpu.threshold() > MAX_GPU_THRESHOLD {
        errors.push(ConfigValidationError::GpuThreshold {
            configured: gpu.threshold(),
            limit: MAX_GPU_THRESHOLD,
        });
    }
    if gpu.samples() > MAX_GPU_SAMPLES {
        errors.push(ConfigValidationError::GpuSamples {
            configured: gpu.samples(),
            limit: MAX_GPU_SAMPLES,
        });
    }

    let idle = config.idle_checker().threshold_minutes();
    if idle == 0 || idle > MAX_IDLE_THRESHOLD_MINUTES {
        errors.push(ConfigValidationError::IdleThreshold {
            configured: idle,
            limit: MAX_IDLE_THRESHOLD_MINUTES,
        });
    }

    let delay = config.components().system().taskbar_switch_delay_ms();
    if delay > MAX_TASKBAR_SWITCH_DELAY_MS {
        errors.push(ConfigValidationError::TaskbarDelay {
            configured: delay,
            limit: MAX_TASKBAR_SWITCH_DELAY_MS,
        });
    }

    let mut seen = HashSet::new();
    for (index, script) in config.components().scripts().scripts().iter().enumerate() {
        if script.name.trim().is_empty() {
            errors.push(ConfigValidationError::ScriptName { index });
            continue;
        }
        if script.command.trim().is_empty() {
            errors.push(ConfigValidationError::ScriptCommand {
                name: script.name.clone(),
            });
        }
        if !seen.insert(script.name.as_str()) {
            errors.push(ConfigValidationError::DuplicateScript {
                name: script.name.clone(),
            });
        }
        if script.timeout_ms() > MAX_SCRIPT_TIMEOUT_MS {
            errors.push(ConfigValidationError::ScriptTimeout {
                name: script.name.clone(),
                configured: script.timeout_ms(),
                limit: MAX_SCRIPT_TIMEOUT_MS,
            });
        }
    }

    if config.sunrise() == config.sunset() {
        errors.push(ConfigValidationError::SunTimesEqual {
            time: config.sunrise().format("%H:%M").to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claims::{assert_err, assert_ok};

    fn parse(json: &str) -> EngineConfig {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_default_config_is_valid() {
        assert_ok!(EngineConfig::default().validate());
    }

    #[test]
    fn test_collects_every_problem() {
        let config = parse(
            r#"{
                "tunable": { "main_timer_secs": 0 },
                "gpu_monitoring": { "threshold": 150 },
                "location": { "sunset_offset_min": -900 }
            }"#,
        );
        let errors = assert_err!(config.validate());
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ConfigValidationError::GpuThreshold {
            configured: 150,
            limit: MAX_GPU_THRESHOLD,
        }));
        assert!(errors.contains(&ConfigValidationError::Offset {
            field: "location.sunset_offset_min",
            configured: -900,
            limit: MAX_OFFSET_MINUTES,
        }));
    }

    #[test]
    fn test_script_entries_are_checked() {
        let config = parse(
            r#"{
                "components": { "scripts": { "enabled": true, "scripts": [
                    { "name": "wallpaper", "command": "feh" },
                    { "name": "wallpaper", "command": "" },
                    { "name": " ", "command": "true" }
                ] } }
            }"#,
        );
        let errors = assert_err!(config.validate());
        assert!(errors.contains(&ConfigValidationError::ScriptCommand {
            name: "wallpaper".to_string()
        }));
        assert!(errors.contains(&ConfigValidationError::DuplicateScript {
            name: "wallpaper".to_string()
        }));
        assert!(errors.contains(&ConfigValidationError::ScriptName { index: 2 }));
    }

    #[test]
    fn test_equal_sun_times_rejected() {
        let config = parse(r#"{ "sunrise": "08:00:00", "sunset": "08:00:00" }"#);
        let errors = assert_err!(config.validate());
        assert_eq!(
            errors,
            vec![ConfigValidationError::SunTimesEqual {
                time: "08:00".to_string()
            }]
        );
        assert!(errors[0].user_message().contains("08:00"));
    }
}
