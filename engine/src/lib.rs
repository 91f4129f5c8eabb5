//! # Umbra Engine
//!
//! Core library of the umbra background service. It decides when the desktop
//! should switch between light and dark and drives the subsystems that apply
//! the switch. Platform specifics live behind collaborator traits supplied by
//! the host.
//!
//! ## Modules
//!
//! - [`engine`] - Engine assembly, lifecycle and command execution
//! - [`commands`] - Command and response types of the public command surface
//! - [`theme_manager`] - Single entry point for switch requests
//! - [`components`] - Switch components and the manager running them
//! - [`governors`] - Time and night light governors
//! - [`modules`] - Periodic modules, their timers and the warden
//! - [`postpone`] - Postpone queue holding automatic switches back
//! - [`state`] - Process-wide shared state
//! - [`config`] - Typed configuration, validation and the snapshot store
//! - [`collaborators`] - Traits for appliers, probes and watchers
//! - [`refresh`] - Coalesced visual refresh after a switch
//! - [`model`] - Themes, sources and switch events
//! - [`clock`] - Wall clock abstraction
//! - [`taskpool`] - Task pool for background work
//! - `testing` - Recording collaborators and probes for tests (`test-utils` feature)
//! - [`common`] - Error types

pub mod clock;
pub mod collaborators;
pub mod commands;
pub mod common;
pub mod components;
pub mod config;
pub mod engine;
pub mod governors;
pub mod model;
pub mod modules;
pub mod postpone;
pub mod refresh;
pub mod state;
pub mod taskpool;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod theme_manager;
