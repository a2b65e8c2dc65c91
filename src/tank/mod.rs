//! Tank domain — geometry, distance samples, derived readings and alerts.
//!
//! ```text
//!  DistanceSample ──▶ estimator::estimate ──▶ TankReading ──▶ gate::evaluate
//!        ▲                    ▲                                    │
//!   RangeSampler         TankGeometry                 (AlertState', AlertEvent?)
//! ```
//!
//! Everything here is pure: no I/O, no clocks, no hidden state.

pub mod estimator;
pub mod gate;

use serde::{Deserialize, Serialize};

/// Speed of sound in air at ~20 °C, in centimetres per microsecond.
pub const SPEED_OF_SOUND_CM_PER_US: f32 = 0.0343;

/// Distances closer than this are the "tank full" zone.
pub const FULL_ZONE_CM: f32 = 10.0;

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Rectangular tank dimensions, set at runtime by remote configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TankGeometry {
    pub height_cm: f32,
    pub length_cm: f32,
    pub width_cm: f32,
    pub full_volume_liters: f32,
}

impl TankGeometry {
    /// A percentage can only be computed once the height is known.
    pub fn is_configured(&self) -> bool {
        self.height_cm > 0.0
    }

    /// All dimensions finite and non-negative.
    pub fn is_valid(&self) -> bool {
        [
            self.height_cm,
            self.length_cm,
            self.width_cm,
            self.full_volume_liters,
        ]
        .iter()
        .all(|v| v.is_finite() && *v >= 0.0)
    }
}

// ---------------------------------------------------------------------------
// Distance sample
// ---------------------------------------------------------------------------

/// One ultrasonic measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceSample {
    /// High-time of the echo pulse; 0 means the echo never came back.
    pub microseconds_echo: u32,
    pub distance_cm: f32,
    /// Monotonic time of the trigger pulse (µs since boot).
    pub timestamp_us: u64,
}

impl DistanceSample {
    /// Convert an echo pulse width into a sample.
    pub fn from_echo(microseconds_echo: u32, timestamp_us: u64) -> Self {
        Self {
            microseconds_echo,
            // The pulse covers the way out and back.
            distance_cm: microseconds_echo as f32 * SPEED_OF_SOUND_CM_PER_US / 2.0,
            timestamp_us,
        }
    }

    /// `false` when the sensor timed out. Such a sample has no distance.
    pub fn has_echo(&self) -> bool {
        self.microseconds_echo != 0
    }

    /// Distance to the water surface, `None` when there was no echo.
    pub fn distance(&self) -> Option<f32> {
        self.has_echo().then_some(self.distance_cm)
    }
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Volume estimate derived from a sample and the tank geometry.
///
/// Kept in floating point; the published payload truncates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TankReading {
    pub volume_liters: f32,
    pub percent_full: f32,
}

impl TankReading {
    pub const EMPTY: Self = Self {
        volume_liters: 0.0,
        percent_full: 0.0,
    };

    /// Volume as published (truncated toward zero).
    pub fn volume_liters_int(&self) -> i64 {
        self.volume_liters as i64
    }

    /// Fill percentage as published (truncated toward zero).
    pub fn percent_int(&self) -> i64 {
        self.percent_full as i64
    }
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

/// Threshold crossings worth telling a human about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertEvent {
    TankFull,
    TankEmpty,
}

impl AlertEvent {
    /// Text delivered to the notification channel.
    pub const fn message(self) -> &'static str {
        match self {
            Self::TankFull => "La citerne est pleine!",
            Self::TankEmpty => "La citerne est vide!!!",
        }
    }
}

/// Hysteresis latch: which crossing has already been reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlertState {
    pub full_notified: bool,
    pub empty_notified: bool,
}
