//! Device context — the state shared between the acquisition pipeline
//! and the remote-configuration receiver.
//!
//! One instance, owned by the [`DeviceLoop`](super::device_loop::DeviceLoop)
//! and passed explicitly wherever it is needed. Both writers run on the
//! loop thread, in distinct steps of a tick, so no lock is involved.

use crate::config::DeviceSettings;
use crate::tank::{AlertState, TankReading};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceContext {
    /// Tank geometry and notification destination (remote config writes).
    pub settings: DeviceSettings,
    /// Hysteresis latch (notification gate writes).
    pub alerts: AlertState,
    /// Most recent successful reading, if any.
    pub last_reading: Option<TankReading>,
}

impl DeviceContext {
    pub fn new(settings: DeviceSettings) -> Self {
        Self {
            settings,
            ..Default::default()
        }
    }
}
