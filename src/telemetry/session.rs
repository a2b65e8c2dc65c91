//! Telemetry session — one authenticated broker connection, kept alive.
//!
//! ```text
//!                 ensure_connected()
//!  Disconnected ─────────────────────▶ Connecting ──credential ok──▶ Authenticated
//!       ▲                                  │                          │    ▲
//!       │            connect refused ──────┘             publish() ───┘    │
//!       │                                                    ▼             │
//!       └──── transport lost / credential near expiry ── Publishing ──────┘
//! ```
//!
//! Liveness is polled once per [`tick`](TelemetrySession::tick), never pushed.
//! A publish failure does not change state; only transport loss does.

use core::fmt;

use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};

use super::credential::{CredentialIssuer, SessionCredential};
use crate::app::ports::{BrokerPort, ClockPort, ConnectivityPort, InboundMessage};
use crate::config::{CloudConfig, SystemConfig};
use crate::error::{Error, Result};

/// Inbound messages drained per tick; the rest wait for the next one.
const MAX_INBOUND_PER_TICK: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Authenticated,
    Publishing,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "DISCONNECTED",
            Self::Connecting => "CONNECTING",
            Self::Authenticated => "AUTHENTICATED",
            Self::Publishing => "PUBLISHING",
        };
        f.write_str(name)
    }
}

/// Retry and credential-lifetime policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub backoff_ms: u32,
    /// `None` blocks until the link is back.
    pub wait_limit_ms: Option<u32>,
    pub refresh_margin_secs: u32,
}

impl SessionConfig {
    pub fn from_system(cfg: &SystemConfig) -> Self {
        Self {
            backoff_ms: cfg.reconnect_backoff_ms,
            wait_limit_ms: cfg.connectivity_wait_limit_ms,
            refresh_margin_secs: cfg.credential_refresh_margin_secs,
        }
    }
}

pub struct TelemetrySession<B: BrokerPort> {
    broker: B,
    state: SessionState,
    issuer: CredentialIssuer,
    client_id: String,
    events_topic: String,
    config_topic: String,
    credential: Option<SessionCredential>,
    config: SessionConfig,
}

impl<B: BrokerPort> TelemetrySession<B> {
    pub fn new(
        broker: B,
        cloud: &CloudConfig,
        issuer: CredentialIssuer,
        config: SessionConfig,
    ) -> Self {
        Self {
            broker,
            state: SessionState::Disconnected,
            issuer,
            client_id: cloud.client_id(),
            events_topic: cloud.events_topic(),
            config_topic: cloud.config_topic(),
            credential: None,
            config,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Authenticated and the transport still reports itself alive.
    pub fn is_connected(&self) -> bool {
        matches!(
            self.state,
            SessionState::Authenticated | SessionState::Publishing
        ) && self.broker.is_connected()
    }

    pub fn credential(&self) -> Option<&SessionCredential> {
        self.credential.as_ref()
    }

    pub fn config_topic(&self) -> &str {
        &self.config_topic
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    pub fn broker_mut(&mut self) -> &mut B {
        &mut self.broker
    }

    fn set_state(&mut self, next: SessionState) {
        if next != self.state {
            info!("session: {} -> {}", self.state, next);
            self.state = next;
        }
    }

    fn drop_session(&mut self) {
        self.credential = None;
        self.set_state(SessionState::Disconnected);
    }

    /// Service the transport. Never blocks.
    ///
    /// Returns the inbound messages received since the last tick.
    pub fn tick(&mut self, clock: &impl ClockPort) -> Vec<InboundMessage> {
        let mut inbound = Vec::new();
        while inbound.len() < MAX_INBOUND_PER_TICK {
            match self.broker.poll() {
                Some(msg) => inbound.push(msg),
                None => break,
            }
        }

        if self.state == SessionState::Disconnected {
            return inbound;
        }

        if !self.broker.is_connected() {
            warn!("session: transport lost");
            self.drop_session();
            return inbound;
        }

        let expiring = self
            .credential
            .as_ref()
            .is_some_and(|c| c.needs_refresh(clock.uptime_us(), self.config.refresh_margin_secs));
        if expiring {
            warn!("session: {}, reconnecting", Error::AuthExpired);
            self.broker.disconnect();
            self.drop_session();
        }

        inbound
    }

    /// Drive Disconnected → Authenticated. Blocks.
    ///
    /// Waits for the network, mints a fresh credential and connects,
    /// retrying at the configured backoff. Gives up with
    /// [`Error::TransportUnavailable`] only when a wait limit is configured
    /// and has elapsed.
    pub fn ensure_connected<N>(&mut self, net: &mut N) -> Result<()>
    where
        N: ConnectivityPort + ClockPort + DelayNs,
    {
        if self.is_connected() {
            return Ok(());
        }

        let started_us = net.uptime_us();
        loop {
            let remaining = remaining_ms(self.config.wait_limit_ms, started_us, net.uptime_us());
            wait_for_network(net, self.config.backoff_ms, remaining)?;

            match self.try_connect(net) {
                Ok(()) => return Ok(()),
                Err(e) => warn!("session: connect attempt failed: {}", e),
            }

            if remaining_ms(self.config.wait_limit_ms, started_us, net.uptime_us()) == Some(0) {
                warn!("session: giving up after {:?} ms", self.config.wait_limit_ms);
                return Err(Error::TransportUnavailable);
            }
            net.delay_ms(self.config.backoff_ms);
        }
    }

    fn try_connect(&mut self, clock: &impl ClockPort) -> Result<()> {
        self.set_state(SessionState::Connecting);
        self.credential = None;

        let Some(now_unix) = clock.unix_time_secs() else {
            warn!("session: wall clock not set, cannot mint credential");
            self.set_state(SessionState::Disconnected);
            return Err(Error::AuthExpired);
        };
        let credential = match self.issuer.issue(now_unix, clock.uptime_us()) {
            Ok(c) => c,
            Err(e) => {
                warn!("session: {}", e);
                self.set_state(SessionState::Disconnected);
                return Err(Error::AuthExpired);
            }
        };

        if let Err(e) = self.broker.connect(&self.client_id, &credential.token) {
            self.broker.disconnect();
            self.set_state(SessionState::Disconnected);
            return Err(e.into());
        }

        if let Err(e) = self.broker.subscribe(&self.config_topic) {
            warn!("session: subscribe {} failed: {}", self.config_topic, e);
        }

        info!(
            "session: {} authenticated, credential expires at {}",
            self.client_id, credential.expires_at
        );
        self.credential = Some(credential);
        self.set_state(SessionState::Authenticated);
        Ok(())
    }

    /// Publish to `topic`, or to the telemetry topic when `None`.
    ///
    /// Requires an authenticated session. Failures are logged and reported,
    /// never fatal.
    pub fn publish(&mut self, payload: &[u8], topic: Option<&str>) -> Result<()> {
        if self.state != SessionState::Authenticated {
            warn!("session: publish while {}, dropped", self.state);
            return Err(Error::PublishRejected);
        }

        self.state = SessionState::Publishing;
        let topic = topic.unwrap_or(&self.events_topic);
        let result = self.broker.publish(topic, payload);
        self.state = SessionState::Authenticated;

        match result {
            Ok(()) => {
                debug!("session: published {} bytes to {}", payload.len(), topic);
                Ok(())
            }
            Err(e) => {
                warn!("session: publish to {} failed: {}", topic, e);
                Err(Error::PublishRejected)
            }
        }
    }
}

/// Block until the network link is up, polling at `backoff_ms`.
///
/// With `limit_ms = None` this waits forever.
pub fn wait_for_network<N>(net: &mut N, backoff_ms: u32, limit_ms: Option<u32>) -> Result<()>
where
    N: ConnectivityPort + ClockPort + DelayNs,
{
    let started_us = net.uptime_us();
    let mut waiting = false;
    loop {
        if net.is_connected() {
            if waiting {
                info!(
                    "network up after {} ms",
                    elapsed_ms(started_us, net.uptime_us())
                );
            }
            return Ok(());
        }
        if !waiting {
            info!("waiting for network...");
            waiting = true;
        }
        if let Some(limit) = limit_ms {
            if elapsed_ms(started_us, net.uptime_us()) >= limit {
                warn!("network still down after {} ms", limit);
                return Err(Error::TransportUnavailable);
            }
        }
        net.delay_ms(backoff_ms);
        net.poll();
    }
}

fn elapsed_ms(started_us: u64, now_us: u64) -> u32 {
    u32::try_from(now_us.saturating_sub(started_us) / 1000).unwrap_or(u32::MAX)
}

fn remaining_ms(limit_ms: Option<u32>, started_us: u64, now_us: u64) -> Option<u32> {
    limit_ms.map(|limit| limit.saturating_sub(elapsed_ms(started_us, now_us)))
}
