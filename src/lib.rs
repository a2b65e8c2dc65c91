//! Tankwatch firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;
pub mod pins;
pub mod tank;
pub mod telemetry;
pub mod update;

// Hardware-facing modules; each carries a host simulation behind the same
// API so the library builds off-target.
pub mod adapters;
pub mod sensors;
