/// Bounds accepted by configuration validation.

/// Shortest main timer period (seconds)
pub const MIN_MAIN_TIMER_SECS: u64 = 1;

/// Longest main timer period (one hour)
pub const MAX_MAIN_TIMER_SECS: u64 = 3600;

/// Longest approach window before a boundary (12 hours)
pub const MAX_APPROACH_MINUTES: u32 = 720;

/// Largest sunrise/sunset offset in either direction (12 hours)
pub const MAX_OFFSET_MINUTES: i64 = 720;

/// GPU usage is a percentage
pub const MAX_GPU_THRESHOLD: u32 = 100;

/// Maximum number of consecutive GPU samples
pub const MAX_GPU_SAMPLES: u32 = 60;

/// Longest idle threshold (one day)
pub const MAX_IDLE_THRESHOLD_MINUTES: u64 = 1440;

/// Longest script run time (five minutes)
pub const MAX_SCRIPT_TIMEOUT_MS: u64 = 300_000;

/// Longest pause between taskbar and system theme writes
pub const MAX_TASKBAR_SWITCH_DELAY_MS: u64 = 10_000;
