//! DeviceLoop → session → estimator → gate, end to end against mocks.

use tankwatch::app::DeviceLoop;
use tankwatch::app::events::AppEvent;
use tankwatch::config::DeviceSettings;
use tankwatch::error::Error;
use tankwatch::tank::{AlertEvent, AlertState};
use tankwatch::telemetry::SessionState;
use tankwatch::update::UpdateOutcome;

use crate::mock_ports::*;

const FULL_MSG: &str = "La citerne est pleine!";
const EMPTY_MSG: &str = "La citerne est vide!!!";

const NEW_CONFIG: &[u8] = br#"{"full_volume_in_liters":1000,"tank_height_in_cm":200,
    "tank_lenght_in_cm":100,"tank_width_in_cm":50,"unit":"L","telegram_chat_id":123456}"#;

fn device(settings: DeviceSettings) -> DeviceLoop<MockBroker> {
    let cfg = test_config();
    DeviceLoop::new(&cfg, settings, session(MockBroker::default(), &cfg), "0.3.0")
}

struct Rig {
    dev: DeviceLoop<MockBroker>,
    hw: MockHardware,
    notifier: MockNotifier,
    sink: RecordingSink,
}

impl Rig {
    fn new(settings: DeviceSettings, distances: &[Option<f32>]) -> Self {
        Self {
            dev: device(settings),
            hw: MockHardware::with_distances(distances),
            notifier: MockNotifier::default(),
            sink: RecordingSink::default(),
        }
    }

    fn tick(&mut self) {
        self.dev.tick(&mut self.hw, &mut self.notifier, &mut self.sink);
    }

    /// Advance one acquisition period and tick.
    fn cycle(&mut self) {
        self.hw.advance_ms(60_000);
        self.tick();
    }

    fn broker(&mut self) -> &mut MockBroker {
        self.dev.session_mut().broker_mut()
    }
}

// ── Boot ──────────────────────────────────────────────────────

#[test]
fn boot_runs_update_once() {
    let mut dev = device(DeviceSettings::default());
    let mut hw = MockHardware::new();
    let mut http = ScriptedHttp::new(vec![Ok(HttpReply::ok(b""))]);
    let mut writer = MockImageWriter::default();
    let mut restart = MockRestart::default();
    let mut sink = RecordingSink::default();

    let first = dev.boot(&mut hw, &mut http, &mut writer, &mut restart, &mut sink);
    let second = dev.boot(&mut hw, &mut http, &mut writer, &mut restart, &mut sink);

    assert_eq!(first, UpdateOutcome::UpToDate);
    assert_eq!(second, UpdateOutcome::UpToDate);
    assert_eq!(http.requests.len(), 1);
    assert!(http.requests[0].contains("version=0.3.0"));
    assert_eq!(
        sink.events,
        vec![
            AppEvent::Started { version: "0.3.0" },
            AppEvent::UpdateFinished(UpdateOutcome::UpToDate),
        ]
    );
    assert_eq!(dev.update_outcome(), Some(UpdateOutcome::UpToDate));
}

#[test]
fn boot_applies_update_and_restarts() {
    let image = vec![0xE9u8; 3000];
    let mut dev = device(DeviceSettings::default());
    let mut hw = MockHardware::new();
    let mut http = ScriptedHttp::new(vec![
        Ok(HttpReply::ok(b"https://fw.local/tankwatch-0.4.0.bin\n")),
        Ok(HttpReply::ok(&image)),
    ]);
    let mut writer = MockImageWriter::default();
    let mut restart = MockRestart::default();
    let mut sink = RecordingSink::default();

    let outcome = dev.boot(&mut hw, &mut http, &mut writer, &mut restart, &mut sink);

    assert_eq!(outcome, UpdateOutcome::Applied);
    assert_eq!(http.requests[1], "https://fw.local/tankwatch-0.4.0.bin");
    assert!(writer.finalized);
    assert_eq!(writer.data, image);
    assert_eq!(restart.restarts, 1);
}

#[test]
fn boot_waits_for_network_before_checking() {
    let mut dev = device(DeviceSettings::default());
    let mut hw = MockHardware {
        link_up: false,
        link_up_after_polls: Some(4),
        ..MockHardware::new()
    };
    let mut http = ScriptedHttp::new(vec![Ok(HttpReply::status(404))]);
    let mut sink = RecordingSink::default();

    let outcome = dev.boot(
        &mut hw,
        &mut http,
        &mut MockImageWriter::default(),
        &mut MockRestart::default(),
        &mut sink,
    );

    assert_eq!(outcome, UpdateOutcome::UpToDate);
    assert_eq!(hw.polls, 4);
    assert_eq!(http.requests.len(), 1);
}

// ── Acquisition ───────────────────────────────────────────────

#[test]
fn first_tick_connects_without_sampling() {
    let mut rig = Rig::new(settings_with_chat("42"), &[Some(60.0)]);
    rig.tick();

    assert_eq!(rig.dev.session().state(), SessionState::Authenticated);
    assert_eq!(rig.hw.samples_taken, 0);
    assert!(rig.sink.events.contains(&AppEvent::SessionChanged {
        from: SessionState::Disconnected,
        to: SessionState::Authenticated,
    }));
    assert_eq!(rig.broker().subscriptions, vec![CONFIG_TOPIC]);
}

#[test]
fn reading_is_published_with_wire_field_names() {
    let mut rig = Rig::new(settings_with_chat("42"), &[Some(60.0)]);
    rig.tick();
    rig.cycle();

    let published = &rig.broker().published;
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, EVENTS_TOPIC);

    let json = &rig.broker().published_json()[0];
    assert_eq!(json["current_volume_in_liters"], 80);
    assert_eq!(json["current_volume_in_percent"], 40);
    assert_eq!(json["full_volume_in_liters"], 200.0);
    assert_eq!(json["on"], true);
    assert_eq!(json["tank_height_in_cm"], 100.0);
    assert_eq!(json["tank_lenght_in_cm"], 50.0);
    assert_eq!(json["tank_width_in_cm"], 40.0);
    assert!(rig.sink.events.contains(&AppEvent::Published));
}

#[test]
fn acquisition_respects_period() {
    let mut rig = Rig::new(settings_with_chat("42"), &[Some(60.0)]);
    rig.tick();
    rig.cycle();
    rig.hw.advance_ms(30_000);
    rig.tick();
    assert_eq!(rig.hw.samples_taken, 1);
    rig.hw.advance_ms(30_000);
    rig.tick();
    assert_eq!(rig.hw.samples_taken, 2);
}

#[test]
fn missing_echo_skips_cycle() {
    let mut rig = Rig::new(settings_with_chat("42"), &[None]);
    rig.tick();
    rig.cycle();

    assert!(rig.broker().published.is_empty());
    assert!(rig.dev.last_reading().is_none());
    assert!(
        rig.sink
            .events
            .contains(&AppEvent::CycleSkipped(Error::SensorTimeout))
    );
}

// ── Alerts ────────────────────────────────────────────────────

#[test]
fn full_alert_is_sent_once_per_crossing() {
    let mut rig = Rig::new(
        settings_with_chat("42"),
        &[Some(5.0), Some(5.0), Some(95.0), Some(5.0)],
    );
    rig.tick();
    for _ in 0..4 {
        rig.cycle();
    }

    assert_eq!(
        rig.notifier.sent,
        vec![
            ("42".to_string(), FULL_MSG.to_string()),
            ("42".to_string(), EMPTY_MSG.to_string()),
            ("42".to_string(), FULL_MSG.to_string()),
        ]
    );
    // Every reading is still published.
    assert_eq!(rig.broker().published.len(), 4);
}

#[test]
fn failed_dispatch_still_latches_gate() {
    let mut rig = Rig::new(settings_with_chat("42"), &[Some(95.0)]);
    rig.notifier.fail = true;
    rig.tick();
    rig.cycle();
    rig.notifier.fail = false;
    rig.cycle();

    assert!(rig.notifier.sent.is_empty());
    assert_eq!(
        rig.sink.count(|e| matches!(e, AppEvent::Alert { .. })),
        1
    );
    assert!(rig.sink.events.contains(&AppEvent::Alert {
        event: AlertEvent::TankEmpty,
        delivered: false,
    }));
    assert_eq!(
        rig.dev.context().alerts,
        AlertState {
            full_notified: false,
            empty_notified: true,
        }
    );
}

#[test]
fn missing_destination_is_reported_undelivered() {
    let settings = DeviceSettings {
        chat_id: None,
        ..settings_with_chat("unused")
    };
    let mut rig = Rig::new(settings, &[Some(5.0)]);
    rig.tick();
    rig.cycle();

    assert!(rig.notifier.sent.is_empty());
    assert!(rig.sink.events.contains(&AppEvent::Alert {
        event: AlertEvent::TankFull,
        delivered: false,
    }));
}

#[test]
fn unconfigured_geometry_publishes_without_alerts() {
    let mut rig = Rig::new(DeviceSettings::default(), &[Some(5.0)]);
    rig.tick();
    rig.cycle();

    assert!(rig.notifier.sent.is_empty());
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::Alert { .. })), 0);
    let json = &rig.broker().published_json()[0];
    assert_eq!(json["current_volume_in_liters"], 0);
    assert_eq!(json["current_volume_in_percent"], 0);
}

// ── Remote configuration ──────────────────────────────────────

#[test]
fn config_is_applied_after_the_pipeline() {
    let mut rig = Rig::new(settings_with_chat("42"), &[Some(60.0)]);
    rig.tick();

    rig.broker().deliver(CONFIG_TOPIC, NEW_CONFIG);
    rig.cycle();

    // The reading of this tick still used the old geometry.
    let json = &rig.broker().published_json()[0];
    assert_eq!(json["tank_height_in_cm"], 100.0);

    let settings = &rig.dev.context().settings;
    assert_eq!(settings.geometry.height_cm, 200.0);
    assert_eq!(settings.geometry.length_cm, 100.0);
    assert_eq!(settings.chat_id.as_deref(), Some("123456"));

    let published = rig
        .sink
        .events
        .iter()
        .position(|e| *e == AppEvent::Published)
        .unwrap();
    let applied = rig
        .sink
        .events
        .iter()
        .position(|e| *e == AppEvent::ConfigApplied)
        .unwrap();
    assert!(published < applied);

    // Next cycle uses the new geometry: 200 − 60 = 140 cm × 100 × 50 = 700 L.
    rig.cycle();
    let json = &rig.broker().published_json()[1];
    assert_eq!(json["tank_height_in_cm"], 200.0);
    assert_eq!(json["current_volume_in_liters"], 700);
    assert_eq!(json["current_volume_in_percent"], 70);
}

#[test]
fn partial_config_is_rejected_whole() {
    let mut rig = Rig::new(settings_with_chat("42"), &[Some(60.0)]);
    rig.tick();
    rig.broker().deliver(
        CONFIG_TOPIC,
        br#"{"tank_height_in_cm":300,"unit":"L","telegram_chat_id":1}"#,
    );
    rig.tick();

    assert_eq!(rig.dev.context().settings, settings_with_chat("42"));
    assert!(rig.sink.events.contains(&AppEvent::ConfigRejected));
    assert!(!rig.dev.is_settings_dirty());
}

#[test]
fn messages_on_other_topics_are_ignored() {
    let mut rig = Rig::new(settings_with_chat("42"), &[Some(60.0)]);
    rig.tick();
    rig.broker()
        .deliver("/devices/TW-TEST01/commands", NEW_CONFIG);
    rig.tick();

    assert_eq!(rig.dev.context().settings, settings_with_chat("42"));
}

#[test]
fn applied_config_is_persisted_once() {
    let mut rig = Rig::new(settings_with_chat("42"), &[Some(60.0)]);
    let mut store = MemoryConfig::default();
    rig.tick();
    rig.broker().deliver(CONFIG_TOPIC, NEW_CONFIG);
    rig.tick();

    assert!(rig.dev.is_settings_dirty());
    assert!(rig.dev.save_settings_if_dirty(&mut store));
    assert!(!rig.dev.save_settings_if_dirty(&mut store));
    assert_eq!(store.saves, 1);
    assert_eq!(
        store.stored["settings"].geometry.full_volume_liters,
        1000.0
    );
}

#[test]
fn failed_save_stays_dirty() {
    let mut rig = Rig::new(settings_with_chat("42"), &[Some(60.0)]);
    let mut store = MemoryConfig {
        fail: true,
        ..Default::default()
    };
    rig.tick();
    rig.broker().deliver(CONFIG_TOPIC, NEW_CONFIG);
    rig.tick();

    assert!(!rig.dev.save_settings_if_dirty(&mut store));
    assert!(rig.dev.is_settings_dirty());
}

// ── Session recovery ──────────────────────────────────────────

#[test]
fn lost_transport_is_recovered_with_new_credential() {
    let mut rig = Rig::new(settings_with_chat("42"), &[Some(60.0)]);
    rig.tick();
    let first_token = rig.broker().connects[0].1.clone();

    rig.broker().connected = false;
    rig.hw.advance_ms(5_000);
    rig.tick();

    assert_eq!(rig.dev.session().state(), SessionState::Authenticated);
    let connects = &rig.broker().connects;
    assert_eq!(connects.len(), 2);
    assert_ne!(connects[1].1, first_token);
    assert_eq!(rig.broker().subscriptions.len(), 2);
    assert!(rig.sink.events.contains(&AppEvent::SessionChanged {
        from: SessionState::Authenticated,
        to: SessionState::Disconnected,
    }));
}

#[test]
fn rejected_publish_is_reported_and_loop_continues() {
    let mut rig = Rig::new(settings_with_chat("42"), &[Some(60.0)]);
    rig.tick();
    rig.broker().reject_publish = true;
    rig.cycle();
    rig.broker().reject_publish = false;
    rig.cycle();

    assert!(
        rig.sink
            .events
            .contains(&AppEvent::PublishFailed(Error::PublishRejected))
    );
    assert_eq!(rig.broker().published.len(), 1);
}
