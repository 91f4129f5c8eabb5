//! Periodic modules and the timers that drive them.
//!
//! A [`Module`] is a unit of periodic work bound to one [`TimerAffinity`]. The
//! [`WardenModule`](warden::WardenModule) decides which optional modules should
//! exist and registers them with their timer; everything else only ever sees the
//! module through this trait.

pub mod geoposition;
pub mod governor;
pub mod gpu_monitor;
pub mod idle;
pub mod postpone_sync;
pub mod process_block_list;
pub mod timer;
pub mod warden;

pub use governor::GovernorModule;
pub use timer::ModuleTimer;
pub use warden::{ModuleFactory, ModuleRegistry, WardenModule};

use crate::config::EngineConfig;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Which timer a module runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerAffinity {
    Main,
    Io,
    Geoposition,
    StateUpdate,
}

impl TimerAffinity {
    pub const ALL: [TimerAffinity; 4] = [
        TimerAffinity::Main,
        TimerAffinity::Io,
        TimerAffinity::Geoposition,
        TimerAffinity::StateUpdate,
    ];

    /// Tick period of the timer for this affinity.
    pub fn period(self, config: &EngineConfig) -> Duration {
        match self {
            TimerAffinity::Main => config.tunable().main_timer_period(),
            TimerAffinity::Io => Duration::from_secs(2 * 60 * 60),
            TimerAffinity::Geoposition => Duration::from_secs(60 * 60),
            TimerAffinity::StateUpdate => Duration::from_secs(5 * 60),
        }
    }
}

impl fmt::Display for TimerAffinity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerAffinity::Main => f.write_str("main"),
            TimerAffinity::Io => f.write_str("io"),
            TimerAffinity::Geoposition => f.write_str("geoposition"),
            TimerAffinity::StateUpdate => f.write_str("state_update"),
        }
    }
}

/// Every module the warden knows how to manage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    Governor,
    IdleCheck,
    ProcessBlockList,
    GpuMonitor,
    Geoposition,
    PostponeSync,
}

impl ModuleKind {
    pub const ALL: [ModuleKind; 6] = [
        ModuleKind::Governor,
        ModuleKind::IdleCheck,
        ModuleKind::ProcessBlockList,
        ModuleKind::GpuMonitor,
        ModuleKind::Geoposition,
        ModuleKind::PostponeSync,
    ];

    /// Registration name; also the postpone reason a module uses.
    pub fn name(self) -> &'static str {
        match self {
            ModuleKind::Governor => "GovernorModule",
            ModuleKind::IdleCheck => "IdleCheckModule",
            ModuleKind::ProcessBlockList => "ProcessBlockListModule",
            ModuleKind::GpuMonitor => "GpuMonitorModule",
            ModuleKind::Geoposition => "GeopositionModule",
            ModuleKind::PostponeSync => "PostponeSyncModule",
        }
    }

    /// Whether the configuration asks for this module to be running.
    pub fn desired(self, config: &EngineConfig) -> bool {
        match self {
            ModuleKind::Governor => config.auto_theme_switching_enabled(),
            ModuleKind::IdleCheck => {
                config.auto_theme_switching_enabled() && config.idle_checker().enabled()
            }
            ModuleKind::ProcessBlockList => {
                config.auto_theme_switching_enabled() && config.process_block_list().enabled()
            }
            ModuleKind::GpuMonitor => {
                config.auto_theme_switching_enabled() && config.gpu_monitoring().enabled()
            }
            ModuleKind::Geoposition => {
                config.auto_theme_switching_enabled() && config.location().enabled()
            }
            ModuleKind::PostponeSync => true,
        }
    }
}

/// A unit of periodic work.
#[async_trait]
pub trait Module: Send + Sync {
    fn name(&self) -> &'static str;

    fn timer_affinity(&self) -> TimerAffinity;

    /// Higher fires first within a tick.
    fn priority(&self) -> i32 {
        0
    }

    /// Fire once right after registration.
    fn fire_on_registration(&self) -> bool {
        false
    }

    /// Resume-check dependency that must run before an approaching switch
    /// is applied.
    fn switch_dependency(&self) -> bool {
        false
    }

    async fn fire(&self);

    /// Run before the module is added to its timer.
    async fn enable_hook(&self) {}

    /// Run after the module is removed from its timer. Releases postpones and
    /// subscriptions the module holds.
    async fn cleanup(&self) {}
}
