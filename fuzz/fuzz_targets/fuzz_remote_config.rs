//! Fuzz target: `RemoteConfig::parse`
//!
//! Feeds arbitrary bytes to the inbound config parser, as a broker would
//! deliver them on the config topic.
//!
//! Invariants checked:
//! - No panics under any byte sequence
//! - An accepted config always carries finite, non-negative geometry
//! - Converting an accepted config into settings keeps that geometry
//!
//! cargo fuzz run fuzz_remote_config

#![no_main]

use libfuzzer_sys::fuzz_target;
use tankwatch::telemetry::RemoteConfig;

fuzz_target!(|data: &[u8]| {
    let Ok(cfg) = RemoteConfig::parse(data) else {
        return;
    };

    let geometry = cfg.geometry();
    assert!(geometry.is_valid(), "accepted invalid geometry: {geometry:?}");

    let settings = cfg.into_settings();
    assert_eq!(settings.geometry, geometry);
    if let Some(chat) = &settings.chat_id {
        assert!(!chat.is_empty(), "empty chat id survived parsing");
    }
});
