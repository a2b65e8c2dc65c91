//! Tankwatch Firmware — Main Entry Point
//!
//! Hexagonal architecture around a single cooperative device loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter      MqttAdapter    HttpAdapter   NvsAdapter  │
//! │  (Range+Net+Clock)    (Broker)       (HttpClient)  (Config)    │
//! │  TelegramNotifier     OtaManager     LogEventSink  StatusPage  │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              DeviceLoop (pure logic)                   │    │
//! │  │  UpdateSequencer · TelemetrySession · Estimator · Gate │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

// ── Imports ───────────────────────────────────────────────────
use anyhow::Result;
use log::{info, warn};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_hal::delay::{Ets, FreeRtos};
use esp_idf_hal::gpio::{AnyInputPin, AnyOutputPin, PinDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::sntp::EspSntp;
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};

use tankwatch::adapters::device_id;
use tankwatch::adapters::hardware::HardwareAdapter;
use tankwatch::adapters::http::HttpAdapter;
use tankwatch::adapters::log_sink::LogEventSink;
use tankwatch::adapters::mqtt::MqttAdapter;
use tankwatch::adapters::nvs::NvsAdapter;
use tankwatch::adapters::status_page::StatusPage;
use tankwatch::adapters::telegram::TelegramNotifier;
use tankwatch::adapters::time::Esp32TimeAdapter;
use tankwatch::adapters::wifi::WifiAdapter;
use tankwatch::app::ports::{ConfigPort, ConnectivityPort};
use tankwatch::app::DeviceLoop;
use tankwatch::config::{CloudConfig, DeviceSettings, SystemConfig};
use tankwatch::pins;
use tankwatch::sensors::RangeSampler;
use tankwatch::telemetry::{CredentialIssuer, SessionConfig, TelemetrySession, signing_key_from_pem};
use tankwatch::update::{check_rollback, OtaManager, SystemRestart};

const VERSION: &str = env!("CARGO_PKG_VERSION");

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Tankwatch v{}                    ║", VERSION);
    info!("╚══════════════════════════════════════╝");

    // ── 1b. Keep the image we just booted ─────────────────────
    check_rollback();

    let config = SystemConfig::default();
    config.validate()?;

    // ── 2. Persisted tank settings (or defaults) ──────────────
    let mut nvs = match NvsAdapter::new() {
        Ok(n) => n,
        Err(e) => {
            warn!("NVS init failed ({}), settings will not persist", e);
            NvsAdapter::uninitialised()
        }
    };
    let settings = match nvs.load() {
        Ok(s) => {
            info!("Settings loaded from NVS");
            s
        }
        Err(e) => {
            warn!("NVS settings load failed ({}), waiting for remote config", e);
            DeviceSettings::default()
        }
    };

    // ── 3. Device identity ────────────────────────────────────
    let mac = device_id::read_mac();
    let dev_id = device_id::device_id(&mac);
    info!(
        "Device ID: {} (hostname: {})",
        dev_id,
        device_id::hostname(&mac)
    );
    let cloud = CloudConfig::from_build_env(&dev_id);

    // ── 4. Peripherals ────────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;

    let mut wifi = WifiAdapter::new(BlockingWifi::wrap(
        EspWifi::new(peripherals.modem, sys_loop.clone(), None)?,
        sys_loop,
    )?);
    if let Err(e) = wifi.set_credentials(
        option_env!("TANKWATCH_WIFI_SSID").unwrap_or(""),
        option_env!("TANKWATCH_WIFI_PASSWORD").unwrap_or(""),
    ) {
        warn!("WiFi: build-time credentials rejected: {}", e);
    } else if let Err(e) = wifi.connect() {
        // A failed attempt schedules a retry that `poll` drives.
        warn!("WiFi: initial connect failed ({}), retrying", e);
    }

    // SAFETY: the ranging pins are claimed nowhere else.
    let trigger = PinDriver::output(unsafe { AnyOutputPin::new(pins::RANGE_TRIGGER_GPIO) })?;
    let echo = PinDriver::input(unsafe { AnyInputPin::new(pins::RANGE_ECHO_GPIO) })?;

    let clock = Esp32TimeAdapter::new();
    let sampler = RangeSampler::new(trigger, echo, Ets, clock, config.echo_timeout_us);
    let mut hw = HardwareAdapter::new(sampler, wifi, clock, FreeRtos);

    // SNTP runs in the background; credentials are minted once it has set
    // the wall clock.
    let _sntp = EspSntp::new_default()?;

    // ── 5. Application ────────────────────────────────────────
    let issuer = CredentialIssuer::new(
        &cloud.project_id,
        signing_key_from_pem(&cloud.device_key_pem)?,
        config.credential_validity_secs,
    );
    let session = TelemetrySession::new(
        MqttAdapter::new(&cloud.broker_url),
        &cloud,
        issuer,
        SessionConfig::from_system(&config),
    );
    let mut device = DeviceLoop::new(&config, settings, session, VERSION);
    let mut sink = LogEventSink::new();

    // ── 6. Boot-time self-update (runs once) ──────────────────
    device.boot(
        &mut hw,
        &mut HttpAdapter::new(),
        &mut OtaManager::new(),
        &mut SystemRestart,
        &mut sink,
    );

    let _status = StatusPage::start(VERSION)?;
    let mut notifier = TelegramNotifier::new(
        HttpAdapter::new(),
        option_env!("TANKWATCH_BOT_TOKEN").unwrap_or(""),
    );

    info!("System ready. Entering device loop.");

    // ── 7. Device loop ────────────────────────────────────────
    loop {
        device.tick(&mut hw, &mut notifier, &mut sink);

        // Remote config is applied at the end of tick; persist it here.
        device.save_settings_if_dirty(&mut nvs);

        FreeRtos::delay_ms(config.loop_idle_ms);
    }
}
