//! System configuration parameters
//!
//! [`SystemConfig`] holds the compile-time tunables of the device loop,
//! [`CloudConfig`] the telemetry identity, and [`DeviceSettings`] the
//! runtime-mutable tank description delivered by remote configuration
//! (persisted to NVS so it survives a reboot).

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tank::TankGeometry;

/// Minimum spacing between two ultrasonic pings.
///
/// Consecutive pings closer than this pick up the tail of the previous echo.
pub const MIN_SAMPLE_SPACING_MS: u32 = 100;

/// Default version-resolution endpoint.
pub const DEFAULT_VERSION_CHECK_URL: &str =
    "http://us-central1-gcloud-ota-update.cloudfunctions.net/getDownloadUrl";

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Acquisition ---
    /// Time between two acquisition ticks (milliseconds)
    pub acquisition_period_ms: u32,
    /// Longest echo pulse we wait for before declaring "no echo" (µs)
    pub echo_timeout_us: u32,
    /// Idle delay at the end of every loop iteration (milliseconds)
    pub loop_idle_ms: u32,

    // --- Session ---
    /// Delay between connectivity / broker retries (milliseconds)
    pub reconnect_backoff_ms: u32,
    /// Upper bound on a blocking reconnect; `None` waits forever
    pub connectivity_wait_limit_ms: Option<u32>,
    /// Validity window of a freshly minted session credential (seconds)
    pub credential_validity_secs: u32,
    /// Reconnect this long before the credential expires (seconds)
    pub credential_refresh_margin_secs: u32,

    // --- Self-update ---
    /// Platform identifier sent to the version-check endpoint
    pub variant: String,
    /// Version-resolution endpoint base URL
    pub version_check_url: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Acquisition
            acquisition_period_ms: 60_000, // 1/min
            echo_timeout_us: 1_000_000,
            loop_idle_ms: 10,

            // Session
            reconnect_backoff_ms: 500,
            connectivity_wait_limit_ms: None,
            credential_validity_secs: 3600,
            credential_refresh_margin_secs: 60,

            // Self-update
            variant: String::from("esp32"),
            version_check_url: String::from(DEFAULT_VERSION_CHECK_URL),
        }
    }
}

impl SystemConfig {
    /// Range-check every field.
    pub fn validate(&self) -> Result<()> {
        if self.acquisition_period_ms < MIN_SAMPLE_SPACING_MS {
            return Err(Error::Config("acquisition_period_ms must be >= 100"));
        }
        if self.echo_timeout_us == 0 {
            return Err(Error::Config("echo_timeout_us must be > 0"));
        }
        if self.reconnect_backoff_ms == 0 {
            return Err(Error::Config("reconnect_backoff_ms must be > 0"));
        }
        if self.credential_validity_secs == 0 {
            return Err(Error::Config("credential_validity_secs must be > 0"));
        }
        if self.credential_refresh_margin_secs >= self.credential_validity_secs {
            return Err(Error::Config(
                "credential_refresh_margin_secs must be < credential_validity_secs",
            ));
        }
        if self.variant.is_empty() {
            return Err(Error::Config("variant must not be empty"));
        }
        if self.version_check_url.is_empty() {
            return Err(Error::Config("version_check_url must not be empty"));
        }
        Ok(())
    }
}

/// Telemetry broker identity.
///
/// Secrets come from the build environment; the defaults are only useful
/// against a local broker.
#[derive(Debug, Clone, PartialEq)]
pub struct CloudConfig {
    pub project_id: String,
    pub region: String,
    pub registry_id: String,
    pub device_id: String,
    pub broker_url: String,
    /// Device P-256 private key, PEM (SEC1 or PKCS#8).
    pub device_key_pem: String,
}

impl CloudConfig {
    /// Build from `TANKWATCH_*` build-time variables, falling back to the
    /// given device id when none was configured.
    pub fn from_build_env(device_id: &str) -> Self {
        Self {
            project_id: String::from(option_env!("TANKWATCH_PROJECT_ID").unwrap_or("weuiot")),
            region: String::from(option_env!("TANKWATCH_REGION").unwrap_or("europe-west1")),
            registry_id: String::from(option_env!("TANKWATCH_REGISTRY_ID").unwrap_or("citernes")),
            device_id: String::from(option_env!("TANKWATCH_DEVICE_ID").unwrap_or(device_id)),
            broker_url: String::from(
                option_env!("TANKWATCH_BROKER_URL").unwrap_or("mqtts://mqtt.googleapis.com:8883"),
            ),
            device_key_pem: String::from(option_env!("TANKWATCH_DEVICE_KEY_PEM").unwrap_or("")),
        }
    }

    /// MQTT client identifier expected by the cloud IoT bridge.
    pub fn client_id(&self) -> String {
        format!(
            "projects/{}/locations/{}/registries/{}/devices/{}",
            self.project_id, self.region, self.registry_id, self.device_id
        )
    }

    /// Outbound telemetry topic.
    pub fn events_topic(&self) -> String {
        format!("/devices/{}/events", self.device_id)
    }

    /// Inbound remote-configuration topic.
    pub fn config_topic(&self) -> String {
        format!("/devices/{}/config", self.device_id)
    }
}

/// Runtime settings written only by remote configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceSettings {
    pub geometry: TankGeometry,
    /// Notification destination (chat identifier); `None` until configured.
    pub chat_id: Option<String>,
    /// Display unit reported by the configuration channel.
    pub unit: String,
}
