//! Wire formats carried by the telemetry session.
//!
//! Field names are fixed by the cloud side, including the
//! `tank_lenght_in_cm` spelling, which must stay byte-for-byte as is.

use serde::{Deserialize, Serialize};

use crate::config::DeviceSettings;
use crate::tank::{TankGeometry, TankReading};

// ---------------------------------------------------------------------------
// Outbound: telemetry reading
// ---------------------------------------------------------------------------

/// One published reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryPayload {
    pub current_volume_in_liters: i64,
    pub current_volume_in_percent: i64,
    pub full_volume_in_liters: f32,
    pub on: bool,
    pub tank_height_in_cm: f32,
    #[serde(rename = "tank_lenght_in_cm")]
    pub tank_length_in_cm: f32,
    pub tank_width_in_cm: f32,
}

impl TelemetryPayload {
    pub fn new(reading: &TankReading, geometry: &TankGeometry) -> Self {
        Self {
            current_volume_in_liters: reading.volume_liters_int(),
            current_volume_in_percent: reading.percent_int(),
            full_volume_in_liters: geometry.full_volume_liters,
            on: true,
            tank_height_in_cm: geometry.height_cm,
            tank_length_in_cm: geometry.length_cm,
            tank_width_in_cm: geometry.width_cm,
        }
    }

    pub fn to_json(&self) -> Vec<u8> {
        // Plain numbers and a bool; serde_json only fails on non-finite floats,
        // which it writes as `null` instead.
        serde_json::to_vec(self).unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Inbound: remote configuration
// ---------------------------------------------------------------------------

/// Chat identifiers arrive either as JSON numbers or strings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ChatId {
    Number(i64),
    Text(String),
}

impl ChatId {
    fn into_destination(self) -> Option<String> {
        match self {
            Self::Number(n) => Some(n.to_string()),
            Self::Text(s) => {
                let s = s.trim();
                (!s.is_empty()).then(|| String::from(s))
            }
        }
    }
}

/// A remote-configuration message. Every field is required.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteConfig {
    pub full_volume_in_liters: f32,
    pub tank_height_in_cm: f32,
    #[serde(rename = "tank_lenght_in_cm")]
    pub tank_length_in_cm: f32,
    pub tank_width_in_cm: f32,
    pub unit: String,
    pub telegram_chat_id: ChatId,
}

/// Why a remote-configuration message was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteConfigError {
    /// Not JSON, wrong types, or a required field missing.
    Malformed,
    /// A geometry field is negative or not finite.
    InvalidGeometry,
}

impl core::fmt::Display for RemoteConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed remote config"),
            Self::InvalidGeometry => write!(f, "geometry must be finite and non-negative"),
        }
    }
}

impl RemoteConfig {
    /// Parse and validate a raw message body.
    pub fn parse(bytes: &[u8]) -> Result<Self, RemoteConfigError> {
        let cfg: Self = serde_json::from_slice(bytes).map_err(|_| RemoteConfigError::Malformed)?;
        if !cfg.geometry().is_valid() {
            return Err(RemoteConfigError::InvalidGeometry);
        }
        Ok(cfg)
    }

    pub fn geometry(&self) -> TankGeometry {
        TankGeometry {
            height_cm: self.tank_height_in_cm,
            length_cm: self.tank_length_in_cm,
            width_cm: self.tank_width_in_cm,
            full_volume_liters: self.full_volume_in_liters,
        }
    }

    /// Replace the settings in full; nothing is merged from the old value.
    pub fn into_settings(self) -> DeviceSettings {
        let geometry = self.geometry();
        DeviceSettings {
            geometry,
            chat_id: self.telegram_chat_id.into_destination(),
            unit: self.unit,
        }
    }
}
