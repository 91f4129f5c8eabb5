//! # Umbra - Theme Switching Service
//!
//! Hosts the switch engine as a background process. This crate owns everything
//! that touches the machine: the config file and its hot reload, logging, the
//! command line, and the collaborators that carry theme changes to the desktop
//! through shell commands.
//!
//! ## Modules
//!
//! - [`config`] - `AppConfig` loading with the `config` crate
//! - [`collaborators`] - shell-command appliers, script runner and process probe
//! - [`service`] - engine lifecycle and reload loop
//! - [`watcher`] - debounced config file watcher
//! - [`logger`] - `fern` logger setup
//! - [`cli`] - command line definition

pub mod cli;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod logger;
pub mod service;
pub mod watcher;

pub use error::{DaemonError, DaemonResult};
pub use service::Service;
