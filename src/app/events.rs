//! Outbound application events.
//!
//! The [`DeviceLoop`](super::device_loop::DeviceLoop) emits these through
//! the [`EventSink`](super::ports::EventSink) port. Adapters on the other
//! side decide what to do with them; the shipped one writes the diagnostic
//! log stream.

use crate::error::Error;
use crate::tank::{AlertEvent, TankReading};
use crate::telemetry::SessionState;
use crate::update::UpdateOutcome;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The device loop has started (carries the running firmware version).
    Started { version: &'static str },

    /// The boot-time update attempt finished.
    UpdateFinished(UpdateOutcome),

    /// The telemetry session moved between states.
    SessionChanged { from: SessionState, to: SessionState },

    /// One acquisition produced a reading.
    Reading {
        distance_cm: f32,
        reading: TankReading,
    },

    /// One acquisition was abandoned; retried next period.
    CycleSkipped(Error),

    /// A threshold crossing was detected. `delivered` is `false` when the
    /// notification could not be sent or no destination is configured.
    Alert { event: AlertEvent, delivered: bool },

    /// The reading reached the broker.
    Published,

    /// The reading was dropped.
    PublishFailed(Error),

    /// A remote configuration replaced the tank settings.
    ConfigApplied,

    /// A remote configuration was refused; previous settings stay.
    ConfigRejected,
}
