//! MQTT broker adapter.
//!
//! Implements [`BrokerPort`] over the ESP-IDF MQTT client.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::mqtt::client::EspMqttClient`
//!   over TLS with the certificate bundle. The client's event callback runs
//!   on the MQTT task; it only flips the liveness flag and queues inbound
//!   messages, which the loop thread drains through [`BrokerPort::poll`].
//! - **all other targets**: an in-process loopback for host-side tests.
//!
//! A dropped connection is never resumed with the old credential. The
//! client's own auto-reconnect is disabled, and a drop latches the adapter
//! disconnected until the session connects again with a fresh credential
//! (and resubscribes).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::{info, warn};

use crate::app::ports::{BrokerError, BrokerPort, InboundMessage};

#[cfg(target_os = "espidf")]
use esp_idf_svc::mqtt::client::{EspMqttClient, EventPayload, MqttClientConfiguration, QoS};

/// Inbound messages held until the loop drains them; oldest dropped first.
const MAX_QUEUED_INBOUND: usize = 8;

/// How long `connect` waits for the broker's CONNACK.
#[cfg(target_os = "espidf")]
const CONNECT_TIMEOUT_MS: u32 = 10_000;

/// State shared with the MQTT event callback.
#[derive(Default)]
struct Shared {
    connected: AtomicBool,
    /// Set on the first disconnect of a client; cleared only by `connect`.
    lost: AtomicBool,
    inbound: Mutex<VecDeque<InboundMessage>>,
}

impl Shared {
    fn on_connected(&self) {
        if !self.lost.load(Ordering::Acquire) {
            self.connected.store(true, Ordering::Release);
        }
    }

    fn on_disconnected(&self) {
        self.lost.store(true, Ordering::Release);
        self.connected.store(false, Ordering::Release);
    }

    fn reset(&self) {
        self.lost.store(false, Ordering::Release);
        self.connected.store(false, Ordering::Release);
    }

    fn push_inbound(&self, msg: InboundMessage) {
        let Ok(mut queue) = self.inbound.lock() else {
            return;
        };
        if queue.len() >= MAX_QUEUED_INBOUND {
            warn!("MQTT: inbound queue full, dropping oldest");
            queue.pop_front();
        }
        queue.push_back(msg);
    }
}

pub struct MqttAdapter {
    broker_url: String,
    shared: Arc<Shared>,
    #[cfg(target_os = "espidf")]
    client: Option<EspMqttClient<'static>>,
    #[cfg(not(target_os = "espidf"))]
    sim: SimBroker,
}

/// Simulation: what the loopback broker has seen.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
pub struct SimBroker {
    pub refuse_connect: bool,
    pub reject_publish: bool,
    pub last_password: Option<String>,
    pub subscriptions: Vec<String>,
    pub published: Vec<(String, Vec<u8>)>,
}

impl MqttAdapter {
    pub fn new(broker_url: &str) -> Self {
        Self {
            broker_url: String::from(broker_url),
            shared: Arc::new(Shared::default()),
            #[cfg(target_os = "espidf")]
            client: None,
            #[cfg(not(target_os = "espidf"))]
            sim: SimBroker::default(),
        }
    }

    pub fn broker_url(&self) -> &str {
        &self.broker_url
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim(&mut self) -> &mut SimBroker {
        &mut self.sim
    }

    /// Simulation: broker pushes a message to a subscribed topic.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_deliver(&mut self, topic: &str, payload: &[u8]) {
        if self.is_connected() && self.sim.subscriptions.iter().any(|t| t == topic) {
            self.shared.push_inbound(InboundMessage {
                topic: String::from(topic),
                payload: payload.to_vec(),
            });
        }
    }

    /// Simulation: broker drops the connection.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_drop_connection(&mut self) {
        self.shared.on_disconnected();
    }

    /// Simulation: the client library re-establishes a dropped link by
    /// itself, still holding the old credential.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_link_resumed(&mut self) {
        self.shared.on_connected();
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self, client_id: &str, password: &str) -> Result<(), BrokerError> {
        use esp_idf_hal::delay::FreeRtos;

        let conf = MqttClientConfiguration {
            client_id: Some(client_id),
            // The bridge ignores the username; the JWT goes in the password.
            username: Some("unused"),
            password: Some(password),
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            // A library reconnect would reuse this JWT and lose the subscription.
            disable_auto_reconnect: true,
            ..Default::default()
        };

        self.shared.reset();
        let shared = Arc::clone(&self.shared);
        let client = EspMqttClient::new_cb(&self.broker_url, &conf, move |event| {
            match event.payload() {
                EventPayload::Connected(_) => shared.on_connected(),
                EventPayload::Disconnected => shared.on_disconnected(),
                EventPayload::Received { topic, data, .. } => {
                    shared.push_inbound(InboundMessage {
                        topic: String::from(topic.unwrap_or_default()),
                        payload: data.to_vec(),
                    });
                }
                EventPayload::Error(e) => warn!("MQTT: {:?}", e),
                _ => {}
            }
        })
        .map_err(|e| {
            warn!("MQTT: client init failed: {:?}", e);
            BrokerError::Unreachable
        })?;
        self.client = Some(client);

        let mut waited = 0;
        while !self.shared.connected.load(Ordering::Acquire) {
            if waited >= CONNECT_TIMEOUT_MS {
                warn!("MQTT: no CONNACK within {} ms", CONNECT_TIMEOUT_MS);
                self.client = None;
                return Err(BrokerError::Unreachable);
            }
            FreeRtos::delay_ms(50);
            waited += 50;
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self, _client_id: &str, password: &str) -> Result<(), BrokerError> {
        self.sim.last_password = Some(String::from(password));
        if self.sim.refuse_connect {
            return Err(BrokerError::Refused);
        }
        self.shared.reset();
        self.shared.on_connected();
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
        let client = self.client.as_mut().ok_or(BrokerError::NotConnected)?;
        client
            .subscribe(topic, QoS::AtLeastOnce)
            .map(|_| ())
            .map_err(|e| {
                warn!("MQTT: subscribe failed: {:?}", e);
                BrokerError::Rejected
            })
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
        self.sim.subscriptions.push(String::from(topic));
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerError> {
        let client = self.client.as_mut().ok_or(BrokerError::NotConnected)?;
        client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .map(|_| ())
            .map_err(|e| {
                warn!("MQTT: publish failed: {:?}", e);
                BrokerError::Rejected
            })
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerError> {
        if self.sim.reject_publish {
            return Err(BrokerError::Rejected);
        }
        self.sim
            .published
            .push((String::from(topic), payload.to_vec()));
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_disconnect(&mut self) {
        // Dropping the client stops its task and closes the socket.
        self.client = None;
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disconnect(&mut self) {
        self.sim.subscriptions.clear();
    }
}

// ───────────────────────────────────────────────────────────────
// BrokerPort
// ───────────────────────────────────────────────────────────────

impl BrokerPort for MqttAdapter {
    fn connect(&mut self, client_id: &str, password: &str) -> Result<(), BrokerError> {
        self.disconnect();
        info!("MQTT: connecting to {}", self.broker_url);
        self.platform_connect(client_id, password)?;
        info!("MQTT: connected as {}", client_id);
        Ok(())
    }

    fn disconnect(&mut self) {
        self.platform_disconnect();
        self.shared.connected.store(false, Ordering::Release);
    }

    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
        if !self.is_connected() {
            return Err(BrokerError::NotConnected);
        }
        self.platform_subscribe(topic)
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerError> {
        if !self.is_connected() {
            return Err(BrokerError::NotConnected);
        }
        self.platform_publish(topic, payload)
    }

    fn poll(&mut self) -> Option<InboundMessage> {
        self.shared.inbound.lock().ok()?.pop_front()
    }
}
