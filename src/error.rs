//! Unified error types for the tankwatch firmware.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! device loop's error handling uniform. All variants are `Copy` so they can
//! be carried inside [`AppEvent`](crate::app::events::AppEvent)s without
//! allocation.
//!
//! None of these is ever escalated to a crash. The device loop recovers
//! each one locally:
//!
//! | Error                  | Recovery                                   |
//! |------------------------|--------------------------------------------|
//! | `SensorTimeout`        | skip this acquisition, retry next period   |
//! | `PublishRejected`      | drop this reading, retry next period       |
//! | `TransportUnavailable` | blocking reconnect path                    |
//! | `AuthExpired`          | drop session, re-authenticate              |
//! | `DownloadIncomplete`   | abort update, boot current firmware        |
//! | `ApplyFailed`          | abort update, boot current firmware        |

use core::fmt;

use crate::app::ports::{BrokerError, ConnectivityError};

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// No network, or the broker could not be reached.
    TransportUnavailable,
    /// The session credential reached the end of its validity window.
    AuthExpired,
    /// The firmware body ended before the declared length.
    DownloadIncomplete,
    /// The update-apply primitive refused or failed to finalize the image.
    ApplyFailed,
    /// The ranging sensor never returned an echo.
    SensorTimeout,
    /// The broker refused a publish, or the session was not authenticated.
    PublishRejected,
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TransportUnavailable => write!(f, "transport unavailable"),
            Self::AuthExpired => write!(f, "session credential expired"),
            Self::DownloadIncomplete => write!(f, "firmware download incomplete"),
            Self::ApplyFailed => write!(f, "firmware apply failed"),
            Self::SensorTimeout => write!(f, "no echo from ranging sensor"),
            Self::PublishRejected => write!(f, "telemetry publish rejected"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

impl From<BrokerError> for Error {
    fn from(e: BrokerError) -> Self {
        match e {
            BrokerError::Refused => Self::AuthExpired,
            BrokerError::Rejected => Self::PublishRejected,
            BrokerError::Unreachable | BrokerError::NotConnected => Self::TransportUnavailable,
        }
    }
}

impl From<ConnectivityError> for Error {
    fn from(e: ConnectivityError) -> Self {
        match e {
            ConnectivityError::NoCredentials => Self::Config("no WiFi credentials"),
            ConnectivityError::InvalidSsid => Self::Config("invalid SSID"),
            ConnectivityError::InvalidPassword => Self::Config("invalid WiFi password"),
            ConnectivityError::ConnectionFailed | ConnectivityError::AlreadyConnected => {
                Self::TransportUnavailable
            }
        }
    }
}

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
