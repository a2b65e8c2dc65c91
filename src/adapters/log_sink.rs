//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production). This
//! is the device's diagnostic log stream.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started { version } => {
                info!("BOOT | tankwatch v{}", version);
            }
            AppEvent::UpdateFinished(outcome) => {
                info!("UPDATE | {}", outcome);
            }
            AppEvent::SessionChanged { from, to } => {
                info!("SESSION | {} -> {}", from, to);
            }
            AppEvent::Reading {
                distance_cm,
                reading,
            } => {
                info!(
                    "READ | distance={:.1}cm | volume={}L | fill={}%",
                    distance_cm,
                    reading.volume_liters_int(),
                    reading.percent_int(),
                );
            }
            AppEvent::CycleSkipped(e) => {
                warn!("SKIP | {}", e);
            }
            AppEvent::Alert { event, delivered } => {
                info!(
                    "ALERT | {:?} \"{}\" | {}",
                    event,
                    event.message(),
                    if *delivered { "sent" } else { "NOT SENT" }
                );
            }
            AppEvent::Published => {
                info!("SESSION | reading published");
            }
            AppEvent::PublishFailed(e) => {
                warn!("SKIP | {}", e);
            }
            AppEvent::ConfigApplied => {
                info!("CONFIG | remote settings applied");
            }
            AppEvent::ConfigRejected => {
                warn!("CONFIG | remote settings rejected, keeping previous");
            }
        }
    }
}
