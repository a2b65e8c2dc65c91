//! Fuzz target: distance → volume estimation and the notification gate
//!
//! Interprets the input as a stream of little-endian f32 distances against
//! a fixed tank and runs each through the estimator and the gate.
//!
//! Invariants checked:
//! - No panics, including NaN and infinite distances
//! - The fill percentage is never NaN
//! - At most one latch is set after any evaluation
//!
//! cargo fuzz run fuzz_estimator

#![no_main]

use libfuzzer_sys::fuzz_target;
use tankwatch::tank::estimator::estimate_distance;
use tankwatch::tank::gate::evaluate;
use tankwatch::tank::{AlertState, TankGeometry};

const GEOMETRY: TankGeometry = TankGeometry {
    height_cm: 120.0,
    length_cm: 80.0,
    width_cm: 50.0,
    full_volume_liters: 400.0,
};

fuzz_target!(|data: &[u8]| {
    let mut state = AlertState::default();
    for chunk in data.chunks_exact(4) {
        let distance = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        let reading = estimate_distance(distance, &GEOMETRY);
        assert!(!reading.percent_full.is_nan(), "NaN percent for {distance}");

        let (next, _) = evaluate(&reading, state);
        assert!(!(next.full_notified && next.empty_notified));
        state = next;
    }
});
