//! TelemetrySession against the mock broker: identity, credentials,
//! refresh and bounded waits.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use p256::ecdsa::signature::Verifier;
use p256::ecdsa::{Signature, VerifyingKey};
use tankwatch::config::SystemConfig;
use tankwatch::error::Error;
use tankwatch::telemetry::SessionState;

use crate::mock_ports::*;

fn decode_segment(segment: &str) -> serde_json::Value {
    serde_json::from_slice(&URL_SAFE_NO_PAD.decode(segment).unwrap()).unwrap()
}

#[test]
fn connects_with_bridge_identity_and_signed_token() {
    let cfg = test_config();
    let mut s = session(MockBroker::default(), &cfg);
    let mut hw = MockHardware::new();
    s.ensure_connected(&mut hw).unwrap();

    let (client_id, token) = &s.broker().connects[0];
    assert_eq!(
        client_id,
        "projects/weuiot/locations/europe-west1/registries/citernes/devices/TW-TEST01"
    );

    let parts: Vec<&str> = token.split('.').collect();
    assert_eq!(parts.len(), 3);
    assert_eq!(decode_segment(parts[0])["alg"], "ES256");
    let claims = decode_segment(parts[1]);
    assert_eq!(claims["aud"], "weuiot");
    assert_eq!(claims["iat"], WALL_CLOCK_BASE);
    assert_eq!(claims["exp"], WALL_CLOCK_BASE + 3600);

    let signing_input = format!("{}.{}", parts[0], parts[1]);
    let signature = Signature::from_slice(&URL_SAFE_NO_PAD.decode(parts[2]).unwrap()).unwrap();
    VerifyingKey::from(&device_key())
        .verify(signing_input.as_bytes(), &signature)
        .unwrap();
}

#[test]
fn credential_is_refreshed_before_expiry() {
    let cfg = SystemConfig {
        credential_validity_secs: 600,
        credential_refresh_margin_secs: 60,
        ..test_config()
    };
    let mut s = session(MockBroker::default(), &cfg);
    let mut hw = MockHardware::new();
    s.ensure_connected(&mut hw).unwrap();

    hw.advance_ms(500_000);
    s.tick(&hw);
    assert_eq!(s.state(), SessionState::Authenticated);

    hw.advance_ms(45_000);
    s.tick(&hw);
    assert_eq!(s.state(), SessionState::Disconnected);

    s.ensure_connected(&mut hw).unwrap();
    let credential = s.credential().unwrap();
    assert_eq!(credential.issued_at, WALL_CLOCK_BASE + 545);
    assert_eq!(s.broker().connects.len(), 2);
}

#[test]
fn refused_connects_are_retried_at_backoff() {
    let cfg = test_config();
    let broker = MockBroker {
        refuse: 3,
        ..Default::default()
    };
    let mut s = session(broker, &cfg);
    let mut hw = MockHardware::new();
    s.ensure_connected(&mut hw).unwrap();

    assert_eq!(s.broker().connects.len(), 4);
    assert_eq!(hw.now_us, 3 * u64::from(cfg.reconnect_backoff_ms) * 1000);
    assert_eq!(s.state(), SessionState::Authenticated);
}

#[test]
fn unbounded_wait_rides_out_long_outage() {
    let cfg = test_config();
    let mut s = session(MockBroker::default(), &cfg);
    let mut hw = MockHardware {
        link_up: false,
        link_up_after_polls: Some(1_000),
        ..MockHardware::new()
    };
    s.ensure_connected(&mut hw).unwrap();
    assert!(s.is_connected());
    assert_eq!(hw.polls, 1_000);
}

#[test]
fn bounded_wait_reports_transport_unavailable() {
    let cfg = SystemConfig {
        connectivity_wait_limit_ms: Some(10_000),
        ..test_config()
    };
    let mut s = session(MockBroker::default(), &cfg);
    let mut hw = MockHardware {
        link_up: false,
        ..MockHardware::new()
    };
    assert_eq!(
        s.ensure_connected(&mut hw),
        Err(Error::TransportUnavailable)
    );
    assert!(s.broker().connects.is_empty());
    assert!(hw.now_us >= 10_000_000);
}

#[test]
fn publish_is_refused_until_authenticated() {
    let cfg = test_config();
    let mut s = session(MockBroker::default(), &cfg);
    assert_eq!(s.publish(b"{}", None), Err(Error::PublishRejected));

    s.ensure_connected(&mut MockHardware::new()).unwrap();
    assert_eq!(s.publish(b"{}", None), Ok(()));
    assert_eq!(s.state(), SessionState::Authenticated);
}
