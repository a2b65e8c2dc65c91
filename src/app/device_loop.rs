//! Device loop — the top-level scheduler.
//!
//! [`DeviceLoop`] owns the device context and the telemetry session. It
//! exposes a hardware-agnostic API; all I/O flows through port traits
//! injected at call sites, so the whole loop runs against mocks on the host.
//!
//! ```text
//!  boot():  wait for network ─▶ UpdateSequencer::run (once) ─▶ restart on Applied
//!
//!  tick():  1. session.tick()              (poll transport, queue inbound config)
//!           2. ensure_connected()          (blocks while offline)
//!           3. every acquisition period:
//!                sample ─▶ estimate ─▶ gate ─▶ dispatch alert ─▶ publish
//!           4. apply queued remote configuration
//! ```
//!
//! Step 4 is the only writer of the tank settings after boot, and it never
//! runs inside step 3.

use std::collections::VecDeque;

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use super::context::DeviceContext;
use super::events::AppEvent;
use super::ports::{
    BrokerPort, ClockPort, ConfigPort, ConnectivityPort, EventSink, HttpClient, ImageWriter,
    NotifierPort, RangePort, RestartPort,
};
use crate::config::{DeviceSettings, SystemConfig};
use crate::error::Error;
use crate::tank::{AlertEvent, TankReading, estimator, gate};
use crate::telemetry::{
    RemoteConfig, RemoteConfigError, SessionState, TelemetryPayload, TelemetrySession,
    wait_for_network,
};
use crate::update::{UpdateOutcome, UpdateSequencer};

/// Remote-config messages held between ticks; older ones are dropped first.
const MAX_PENDING_CONFIG: usize = 4;

pub struct DeviceLoop<B: BrokerPort> {
    ctx: DeviceContext,
    session: TelemetrySession<B>,
    sequencer: UpdateSequencer,
    version: &'static str,
    acquisition_period_us: u64,
    last_acquisition_us: u64,
    backoff_ms: u32,
    wait_limit_ms: Option<u32>,
    pending_config: VecDeque<Vec<u8>>,
    last_session_state: SessionState,
    update_outcome: Option<UpdateOutcome>,
    settings_dirty: bool,
}

impl<B: BrokerPort> DeviceLoop<B> {
    /// Construct the loop. Does **not** touch the network; call
    /// [`boot`](Self::boot) next.
    pub fn new(
        config: &SystemConfig,
        settings: DeviceSettings,
        session: TelemetrySession<B>,
        version: &'static str,
    ) -> Self {
        let last_session_state = session.state();
        Self {
            ctx: DeviceContext::new(settings),
            session,
            sequencer: UpdateSequencer::from_config(config, version),
            version,
            acquisition_period_us: u64::from(config.acquisition_period_ms) * 1000,
            last_acquisition_us: 0,
            backoff_ms: config.reconnect_backoff_ms,
            wait_limit_ms: config.connectivity_wait_limit_ms,
            pending_config: VecDeque::new(),
            last_session_state,
            update_outcome: None,
            settings_dirty: false,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Boot sequence: wait for the network, then run the self-update once.
    ///
    /// On [`UpdateOutcome::Applied`] the restart port has been invoked; on
    /// hardware that call does not return. A second call returns the first
    /// outcome without touching the network.
    pub fn boot<N>(
        &mut self,
        net: &mut N,
        http: &mut impl HttpClient,
        writer: &mut impl ImageWriter,
        restart: &mut impl RestartPort,
        sink: &mut impl EventSink,
    ) -> UpdateOutcome
    where
        N: ConnectivityPort + ClockPort + DelayNs,
    {
        if let Some(outcome) = self.update_outcome {
            return outcome;
        }
        sink.emit(&AppEvent::Started {
            version: self.version,
        });

        let outcome = match wait_for_network(net, self.backoff_ms, self.wait_limit_ms) {
            Ok(()) => self.sequencer.run(http, writer, restart),
            Err(e) => {
                warn!("boot: {}, update check skipped", e);
                UpdateOutcome::UpToDate
            }
        };
        self.update_outcome = Some(outcome);
        sink.emit(&AppEvent::UpdateFinished(outcome));
        outcome
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one loop iteration.
    ///
    /// The `hw` parameter satisfies the sensor, network and clock ports at
    /// once, which avoids a double mutable borrow while keeping the port
    /// boundary explicit.
    pub fn tick<H>(
        &mut self,
        hw: &mut H,
        notifier: &mut impl NotifierPort,
        sink: &mut impl EventSink,
    ) where
        H: RangePort + ConnectivityPort + ClockPort + DelayNs,
    {
        // 1. Service the transport
        let inbound = self.session.tick(&*hw);
        for msg in inbound {
            if msg.topic == self.session.config_topic() {
                self.queue_config(msg.payload);
            } else {
                warn!("ignoring message on unexpected topic {}", msg.topic);
            }
        }
        self.note_session_change(sink);

        // 2. Recover the session (may block)
        if !self.session.is_connected() {
            if let Err(e) = self.session.ensure_connected(hw) {
                warn!("session recovery abandoned: {}", e);
            }
            self.note_session_change(sink);
        }

        // 3. Acquisition
        let now = hw.uptime_us();
        if now.saturating_sub(self.last_acquisition_us) >= self.acquisition_period_us {
            self.last_acquisition_us = now;
            self.acquire(hw, notifier, sink);
        }

        // 4. Remote configuration, strictly after the pipeline
        while let Some(payload) = self.pending_config.pop_front() {
            // Rejections are already reported through the sink.
            let _ = self.apply_remote_config(&payload, sink);
        }
    }

    /// sample → estimate → gate → dispatch → publish, as one step.
    fn acquire(
        &mut self,
        range: &mut impl RangePort,
        notifier: &mut impl NotifierPort,
        sink: &mut impl EventSink,
    ) {
        let sample = range.sample();
        let geometry = self.ctx.settings.geometry;
        let Some(reading) = estimator::estimate(&sample, &geometry) else {
            sink.emit(&AppEvent::CycleSkipped(Error::SensorTimeout));
            return;
        };
        self.ctx.last_reading = Some(reading);
        sink.emit(&AppEvent::Reading {
            distance_cm: sample.distance_cm,
            reading,
        });

        if geometry.is_configured() {
            let (next, event) = gate::evaluate(&reading, self.ctx.alerts);
            self.ctx.alerts = next;
            if let Some(event) = event {
                let delivered = self.dispatch(event, notifier);
                sink.emit(&AppEvent::Alert { event, delivered });
            }
        }

        let payload = TelemetryPayload::new(&reading, &geometry).to_json();
        match self.session.publish(&payload, None) {
            Ok(()) => sink.emit(&AppEvent::Published),
            Err(e) => sink.emit(&AppEvent::PublishFailed(e)),
        }
    }

    fn dispatch(&self, event: AlertEvent, notifier: &mut impl NotifierPort) -> bool {
        let Some(chat_id) = self.ctx.settings.chat_id.as_deref() else {
            warn!("alert {:?} not sent: no destination configured", event);
            return false;
        };
        match notifier.send(chat_id, event.message()) {
            Ok(()) => true,
            Err(e) => {
                warn!("alert {:?} not sent: {}", event, e);
                false
            }
        }
    }

    fn note_session_change(&mut self, sink: &mut impl EventSink) {
        let now = self.session.state();
        if now != self.last_session_state {
            sink.emit(&AppEvent::SessionChanged {
                from: self.last_session_state,
                to: now,
            });
            self.last_session_state = now;
        }
    }

    // ── Remote configuration ──────────────────────────────────

    fn queue_config(&mut self, payload: Vec<u8>) {
        if self.pending_config.len() >= MAX_PENDING_CONFIG {
            warn!("remote config queue full, dropping oldest");
            self.pending_config.pop_front();
        }
        self.pending_config.push_back(payload);
    }

    /// Replace the tank settings from a raw remote-config body.
    ///
    /// A message with any field missing or invalid is refused as a whole;
    /// the previous settings stay in force.
    pub fn apply_remote_config(
        &mut self,
        payload: &[u8],
        sink: &mut impl EventSink,
    ) -> Result<(), RemoteConfigError> {
        match RemoteConfig::parse(payload) {
            Ok(cfg) => {
                let settings = cfg.into_settings();
                if settings != self.ctx.settings {
                    self.settings_dirty = true;
                }
                info!(
                    "remote config: height={} length={} width={} full={}L unit={}",
                    settings.geometry.height_cm,
                    settings.geometry.length_cm,
                    settings.geometry.width_cm,
                    settings.geometry.full_volume_liters,
                    settings.unit
                );
                self.ctx.settings = settings;
                sink.emit(&AppEvent::ConfigApplied);
                Ok(())
            }
            Err(e) => {
                warn!("remote config rejected: {}", e);
                sink.emit(&AppEvent::ConfigRejected);
                Err(e)
            }
        }
    }

    /// Persist the settings if a remote config changed them.
    /// Returns `true` if they were saved.
    pub fn save_settings_if_dirty(&mut self, storage: &mut impl ConfigPort) -> bool {
        if !self.settings_dirty {
            return false;
        }
        match storage.save(&self.ctx.settings) {
            Ok(()) => {
                self.settings_dirty = false;
                info!("settings saved to NVS");
                true
            }
            Err(e) => {
                warn!("settings save failed: {}", e);
                false
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn context(&self) -> &DeviceContext {
        &self.ctx
    }

    pub fn last_reading(&self) -> Option<TankReading> {
        self.ctx.last_reading
    }

    pub fn session(&self) -> &TelemetrySession<B> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut TelemetrySession<B> {
        &mut self.session
    }

    pub fn update_outcome(&self) -> Option<UpdateOutcome> {
        self.update_outcome
    }

    pub fn is_settings_dirty(&self) -> bool {
        self.settings_dirty
    }

    pub fn version(&self) -> &'static str {
        self.version
    }
}
