//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ DeviceLoop / TelemetrySession / UpdateSequencer
//! ```
//!
//! Driven adapters (ranging sensor, WiFi, MQTT, HTTP, OTA partition,
//! notification bot, NVS) implement these traits. The domain consumes them
//! via generics, so it never touches hardware directly and every path can
//! be exercised on the host with mocks.
//!
//! Blocking waits use [`embedded_hal::delay::DelayNs`] rather than a port
//! of their own.

use core::fmt;

use crate::config::DeviceSettings;
use crate::tank::DistanceSample;
use crate::update::flash::OtaError;

// ───────────────────────────────────────────────────────────────
// Sensor + clock ports (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// The ultrasonic ranging sensor.
pub trait RangePort {
    /// Fire one ping and time the echo. Blocks for at most the echo timeout.
    fn sample(&mut self) -> DistanceSample;
}

/// Monotonic and wall-clock time.
pub trait ClockPort {
    /// Microseconds since boot (monotonic).
    fn uptime_us(&self) -> u64;

    /// Seconds since the Unix epoch, `None` until the clock is synced.
    fn unix_time_secs(&self) -> Option<u64>;
}

// ───────────────────────────────────────────────────────────────
// Connectivity port (network link)
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectivityError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    ConnectionFailed,
    AlreadyConnected,
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => {
                write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)")
            }
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
            Self::AlreadyConnected => write!(f, "already connected to AP"),
        }
    }
}

/// Station-mode network link.
pub trait ConnectivityPort {
    fn connect(&mut self) -> Result<(), ConnectivityError>;
    fn disconnect(&mut self);
    fn is_connected(&self) -> bool;
    /// Drive reconnection; called while waiting for the link.
    fn poll(&mut self);
    fn rssi(&self) -> Option<i8>;
}

// ───────────────────────────────────────────────────────────────
// Broker port (telemetry transport)
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerError {
    /// TCP/TLS connection could not be established.
    Unreachable,
    /// The broker refused the credential.
    Refused,
    /// Operation needs a live connection.
    NotConnected,
    /// The broker or the client queue rejected the message.
    Rejected,
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreachable => write!(f, "broker unreachable"),
            Self::Refused => write!(f, "broker refused credentials"),
            Self::NotConnected => write!(f, "not connected to broker"),
            Self::Rejected => write!(f, "message rejected"),
        }
    }
}

/// A message delivered by the broker on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Publish/subscribe transport to the telemetry broker.
pub trait BrokerPort {
    /// Open an authenticated connection. Blocks until the broker answers.
    fn connect(&mut self, client_id: &str, password: &str) -> Result<(), BrokerError>;

    /// Tear down the connection (no-op when already closed).
    fn disconnect(&mut self);

    /// Transport liveness, polled once per loop iteration.
    fn is_connected(&self) -> bool;

    fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError>;

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerError>;

    /// Take the next queued inbound message, if any. Never blocks.
    fn poll(&mut self) -> Option<InboundMessage>;
}

// ───────────────────────────────────────────────────────────────
// HTTP client port (version check + firmware download)
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpError {
    /// Connection, DNS or TLS failure.
    Connect,
    /// Reading the body failed part-way.
    Read,
    /// `read` called without a response in flight.
    NoResponse,
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "HTTP connection failed"),
            Self::Read => write!(f, "HTTP body read failed"),
            Self::NoResponse => write!(f, "no HTTP response in flight"),
        }
    }
}

/// Status line and framing of an HTTP response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// Declared `Content-Length`, `None` when the header is absent.
    pub content_length: Option<u64>,
}

/// Blocking HTTP GET client with a streamed body.
pub trait HttpClient {
    /// Send a GET and wait for the response headers.
    fn get(&mut self, url: &str) -> Result<HttpResponse, HttpError>;

    /// Read the body of the last response. `Ok(0)` means end of body.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, HttpError>;
}

// ───────────────────────────────────────────────────────────────
// Firmware image port (update-apply primitive)
// ───────────────────────────────────────────────────────────────

/// Sequential writer into the inactive firmware partition.
pub trait ImageWriter {
    /// Open a session for an image of exactly `size` bytes.
    fn begin(&mut self, size: u32) -> Result<(), OtaError>;

    /// Append bytes. Returns the total written so far.
    fn write(&mut self, data: &[u8]) -> Result<u32, OtaError>;

    /// Verify the image and mark it bootable. Fails unless every declared
    /// byte was written.
    fn finalize(&mut self) -> Result<(), OtaError>;

    /// Drop the partial image.
    fn abort(&mut self);
}

/// Software reset. On hardware this never returns.
pub trait RestartPort {
    fn restart(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Notification port (alert dispatch)
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyError {
    /// The channel could not be reached.
    Transport,
    /// The channel answered with an error status.
    Rejected(u16),
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport => write!(f, "notification channel unreachable"),
            Self::Rejected(status) => write!(f, "notification rejected (HTTP {})", status),
        }
    }
}

/// Outbound human-facing notifications.
pub trait NotifierPort {
    fn send(&mut self, destination: &str, text: &str) -> Result<(), NotifyError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → diagnostic log)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port. Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent settings)
// ───────────────────────────────────────────────────────────────

/// Loads and persists the remotely-configured [`DeviceSettings`].
///
/// Implementations MUST validate before persisting: invalid geometry is
/// rejected with [`ConfigError::ValidationFailed`], not silently clamped.
pub trait ConfigPort {
    /// Load settings. Returns [`DeviceSettings::default()`] on first boot.
    fn load(&self) -> Result<DeviceSettings, ConfigError>;

    /// Validate and persist settings.
    fn save(&mut self, settings: &DeviceSettings) -> Result<(), ConfigError>;
}

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored settings failed deserialization.
    Corrupted,
    /// A field failed range validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupted => write!(f, "settings corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
