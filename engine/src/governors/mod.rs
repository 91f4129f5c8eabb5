//! Governors decide which theme is due and when.
//!
//! Exactly one governor is active at a time. [`ActiveGovernor`] carries the kind
//! as an explicit tag so the governor module can swap implementations on a
//! configuration change without inspecting concrete types.

pub mod night_light;
pub mod time_switch;
pub mod timed_state;

pub use night_light::NightLightGovernor;
pub use time_switch::TimeSwitchGovernor;
pub use timed_state::TimedThemeState;

use crate::config::EngineConfig;
use crate::model::{GovernorEvent, GovernorKind};
use crate::theme_manager::SwitchOutcome;

pub enum ActiveGovernor {
    TimeBased(TimeSwitchGovernor),
    NightLightBased(NightLightGovernor),
}

impl ActiveGovernor {
    pub fn kind(&self) -> GovernorKind {
        match self {
            ActiveGovernor::TimeBased(_) => GovernorKind::Default,
            ActiveGovernor::NightLightBased(_) => GovernorKind::NightLight,
        }
    }

    pub fn run(&mut self, config: &EngineConfig) -> GovernorEvent {
        match self {
            ActiveGovernor::TimeBased(governor) => governor.run(config),
            ActiveGovernor::NightLightBased(governor) => governor.run(config),
        }
    }

    pub fn enable_hook(&mut self, config: &EngineConfig) {
        match self {
            ActiveGovernor::TimeBased(governor) => governor.enable_hook(),
            ActiveGovernor::NightLightBased(governor) => governor.enable_hook(config),
        }
    }

    pub fn disable_hook(&mut self) {
        match self {
            ActiveGovernor::TimeBased(governor) => governor.disable_hook(),
            ActiveGovernor::NightLightBased(governor) => governor.disable_hook(),
        }
    }

    pub fn invalidate(&mut self) {
        match self {
            ActiveGovernor::TimeBased(governor) => governor.invalidate(),
            ActiveGovernor::NightLightBased(governor) => governor.invalidate(),
        }
    }

    /// Report what the theme manager did with the last emitted request.
    pub fn acknowledge(&mut self, outcome: &SwitchOutcome) {
        match self {
            ActiveGovernor::TimeBased(governor) => governor.acknowledge(outcome),
            ActiveGovernor::NightLightBased(governor) => governor.acknowledge(outcome),
        }
    }
}

impl std::fmt::Debug for ActiveGovernor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ActiveGovernor({:?})", self.kind())
    }
}
