//! Mock port implementations for integration tests.
//!
//! Everything records what it was asked to do so tests can assert on the
//! full call history without touching GPIO, sockets or flash.

use std::collections::{HashMap, VecDeque};

use embedded_hal::delay::DelayNs;
use p256::ecdsa::SigningKey;
use tankwatch::app::events::AppEvent;
use tankwatch::app::ports::{
    BrokerError, BrokerPort, ClockPort, ConfigError, ConfigPort, ConnectivityError,
    ConnectivityPort, EventSink, HttpClient, HttpError, HttpResponse, ImageWriter, InboundMessage,
    NotifierPort, NotifyError, RangePort, RestartPort,
};
use tankwatch::config::{CloudConfig, DeviceSettings, SystemConfig};
use tankwatch::tank::{DistanceSample, TankGeometry};
use tankwatch::telemetry::{CredentialIssuer, SessionConfig, TelemetrySession};
use tankwatch::update::OtaError;

pub const DEVICE_ID: &str = "TW-TEST01";
pub const CONFIG_TOPIC: &str = "/devices/TW-TEST01/config";
pub const EVENTS_TOPIC: &str = "/devices/TW-TEST01/events";
pub const WALL_CLOCK_BASE: u64 = 1_700_000_000;

// ── MockHardware ──────────────────────────────────────────────
//
// Range + connectivity + clock + delay on one value, the way the device
// loop takes them. Time only moves through `delay_*` and `advance_ms`.

pub struct MockHardware {
    pub now_us: u64,
    /// Distances returned in order; `None` is a missing echo. The last
    /// entry repeats once the script runs out.
    pub distances: VecDeque<Option<f32>>,
    pub samples_taken: u32,
    pub link_up: bool,
    /// Link comes up after this many polls while down.
    pub link_up_after_polls: Option<u32>,
    pub polls: u32,
    pub wall_clock: bool,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new() -> Self {
        Self {
            now_us: 0,
            distances: VecDeque::new(),
            samples_taken: 0,
            link_up: true,
            link_up_after_polls: None,
            polls: 0,
            wall_clock: true,
        }
    }

    pub fn with_distances(distances: &[Option<f32>]) -> Self {
        Self {
            distances: distances.iter().copied().collect(),
            ..Self::new()
        }
    }

    pub fn advance_ms(&mut self, ms: u64) {
        self.now_us += ms * 1000;
    }
}

impl Default for MockHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl RangePort for MockHardware {
    fn sample(&mut self) -> DistanceSample {
        self.samples_taken += 1;
        let next = if self.distances.len() > 1 {
            self.distances.pop_front().flatten()
        } else {
            self.distances.front().copied().flatten()
        };
        match next {
            Some(distance_cm) => DistanceSample {
                microseconds_echo: 1,
                distance_cm,
                timestamp_us: self.now_us,
            },
            None => DistanceSample::from_echo(0, self.now_us),
        }
    }
}

impl ConnectivityPort for MockHardware {
    fn connect(&mut self) -> Result<(), ConnectivityError> {
        if self.link_up {
            Ok(())
        } else {
            Err(ConnectivityError::ConnectionFailed)
        }
    }

    fn disconnect(&mut self) {
        self.link_up = false;
    }

    fn is_connected(&self) -> bool {
        self.link_up
    }

    fn poll(&mut self) {
        self.polls += 1;
        if let Some(after) = self.link_up_after_polls {
            if self.polls >= after {
                self.link_up = true;
            }
        }
    }

    fn rssi(&self) -> Option<i8> {
        self.link_up.then_some(-55)
    }
}

impl ClockPort for MockHardware {
    fn uptime_us(&self) -> u64 {
        self.now_us
    }

    fn unix_time_secs(&self) -> Option<u64> {
        self.wall_clock
            .then_some(WALL_CLOCK_BASE + self.now_us / 1_000_000)
    }
}

impl DelayNs for MockHardware {
    fn delay_ns(&mut self, ns: u32) {
        self.now_us += u64::from(ns / 1000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.now_us += u64::from(ms) * 1000;
    }
}

// ── MockBroker ────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MockBroker {
    pub connected: bool,
    /// Refuse this many connects before accepting.
    pub refuse: u32,
    pub reject_publish: bool,
    pub connects: Vec<(String, String)>,
    pub subscriptions: Vec<String>,
    pub published: Vec<(String, Vec<u8>)>,
    pub inbound: VecDeque<InboundMessage>,
}

#[allow(dead_code)]
impl MockBroker {
    pub fn deliver(&mut self, topic: &str, payload: &[u8]) {
        self.inbound.push_back(InboundMessage {
            topic: topic.to_string(),
            payload: payload.to_vec(),
        });
    }

    pub fn published_json(&self) -> Vec<serde_json::Value> {
        self.published
            .iter()
            .map(|(_, p)| serde_json::from_slice(p).unwrap())
            .collect()
    }
}

impl BrokerPort for MockBroker {
    fn connect(&mut self, client_id: &str, password: &str) -> Result<(), BrokerError> {
        self.connects
            .push((client_id.to_string(), password.to_string()));
        if self.refuse > 0 {
            self.refuse -= 1;
            return Err(BrokerError::Refused);
        }
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
        self.subscriptions.push(topic.to_string());
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerError> {
        if !self.connected {
            return Err(BrokerError::NotConnected);
        }
        if self.reject_publish {
            return Err(BrokerError::Rejected);
        }
        self.published.push((topic.to_string(), payload.to_vec()));
        Ok(())
    }

    fn poll(&mut self) -> Option<InboundMessage> {
        self.inbound.pop_front()
    }
}

// ── MockNotifier ──────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MockNotifier {
    pub fail: bool,
    pub sent: Vec<(String, String)>,
}

impl NotifierPort for MockNotifier {
    fn send(&mut self, destination: &str, text: &str) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::Transport);
        }
        self.sent.push((destination.to_string(), text.to_string()));
        Ok(())
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── ScriptedHttp ──────────────────────────────────────────────

pub struct HttpReply {
    pub status: u16,
    pub content_length: Option<u64>,
    pub body: Vec<u8>,
    /// Fail the read after this many body bytes.
    pub fail_after: Option<usize>,
}

#[allow(dead_code)]
impl HttpReply {
    pub fn ok(body: &[u8]) -> Self {
        Self {
            status: 200,
            content_length: Some(body.len() as u64),
            body: body.to_vec(),
            fail_after: None,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            content_length: Some(0),
            body: Vec::new(),
            fail_after: None,
        }
    }
}

/// Answers requests in order; runs out with a connect error.
#[derive(Default)]
pub struct ScriptedHttp {
    pub replies: VecDeque<Result<HttpReply, HttpError>>,
    pub requests: Vec<String>,
    body: VecDeque<u8>,
    read_budget: Option<usize>,
}

#[allow(dead_code)]
impl ScriptedHttp {
    pub fn new(replies: Vec<Result<HttpReply, HttpError>>) -> Self {
        Self {
            replies: replies.into(),
            ..Default::default()
        }
    }
}

impl HttpClient for ScriptedHttp {
    fn get(&mut self, url: &str) -> Result<HttpResponse, HttpError> {
        self.requests.push(url.to_string());
        let reply = self.replies.pop_front().unwrap_or(Err(HttpError::Connect))?;
        self.body = reply.body.into();
        self.read_budget = reply.fail_after;
        Ok(HttpResponse {
            status: reply.status,
            content_length: reply.content_length,
        })
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, HttpError> {
        let mut n = buf.len().min(self.body.len());
        if let Some(budget) = self.read_budget.as_mut() {
            if *budget == 0 {
                return Err(HttpError::Read);
            }
            n = n.min(*budget);
            *budget -= n;
        }
        for (slot, byte) in buf.iter_mut().zip(self.body.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

// ── MockImageWriter ───────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MockImageWriter {
    pub capacity: Option<u32>,
    pub declared: Option<u32>,
    pub data: Vec<u8>,
    pub finalized: bool,
    pub aborted: bool,
}

impl ImageWriter for MockImageWriter {
    fn begin(&mut self, size: u32) -> Result<(), OtaError> {
        if self.capacity.is_some_and(|cap| size > cap) {
            return Err(OtaError::InvalidSize);
        }
        self.declared = Some(size);
        self.data.clear();
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<u32, OtaError> {
        self.data.extend_from_slice(data);
        Ok(self.data.len() as u32)
    }

    fn finalize(&mut self) -> Result<(), OtaError> {
        if self.declared != Some(self.data.len() as u32) {
            return Err(OtaError::IncompleteTransfer);
        }
        self.finalized = true;
        Ok(())
    }

    fn abort(&mut self) {
        self.aborted = true;
    }
}

// ── MockRestart ───────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MockRestart {
    pub restarts: u32,
}

impl RestartPort for MockRestart {
    fn restart(&mut self) {
        self.restarts += 1;
    }
}

// ── MemoryConfig ──────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryConfig {
    pub stored: HashMap<&'static str, DeviceSettings>,
    pub saves: u32,
    pub fail: bool,
}

impl ConfigPort for MemoryConfig {
    fn load(&self) -> Result<DeviceSettings, ConfigError> {
        self.stored
            .get("settings")
            .cloned()
            .ok_or(ConfigError::Corrupted)
    }

    fn save(&mut self, settings: &DeviceSettings) -> Result<(), ConfigError> {
        if self.fail {
            return Err(ConfigError::IoError);
        }
        self.saves += 1;
        self.stored.insert("settings", settings.clone());
        Ok(())
    }
}

// ── Fixtures ──────────────────────────────────────────────────

pub fn cloud() -> CloudConfig {
    CloudConfig {
        project_id: "weuiot".into(),
        region: "europe-west1".into(),
        registry_id: "citernes".into(),
        device_id: DEVICE_ID.into(),
        broker_url: "mqtts://localhost:8883".into(),
        device_key_pem: String::new(),
    }
}

pub fn device_key() -> SigningKey {
    SigningKey::from_slice(&[0x11; 32]).unwrap()
}

pub fn test_config() -> SystemConfig {
    SystemConfig {
        acquisition_period_ms: 60_000,
        ..SystemConfig::default()
    }
}

pub fn session(broker: MockBroker, config: &SystemConfig) -> TelemetrySession<MockBroker> {
    TelemetrySession::new(
        broker,
        &cloud(),
        CredentialIssuer::new("weuiot", device_key(), config.credential_validity_secs),
        SessionConfig::from_system(config),
    )
}

/// 100 cm tall, 50 × 40 cm footprint, 200 L nominal.
pub fn geometry() -> TankGeometry {
    TankGeometry {
        height_cm: 100.0,
        length_cm: 50.0,
        width_cm: 40.0,
        full_volume_liters: 200.0,
    }
}

#[allow(dead_code)]
pub fn settings_with_chat(chat_id: &str) -> DeviceSettings {
    DeviceSettings {
        geometry: geometry(),
        chat_id: Some(chat_id.to_string()),
        unit: "L".into(),
    }
}
