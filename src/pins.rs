//! GPIO assignments for the tankwatch sensor board.
//!
//! Single source of truth: `main` builds the pin drivers from these numbers.

// ---------------------------------------------------------------------------
// Ultrasonic ranging sensor (HC-SR04 / JSN-SR04T)
// ---------------------------------------------------------------------------

/// Digital output: 10 µs HIGH pulse starts a measurement.
pub const RANGE_TRIGGER_GPIO: i32 = 16;
/// Digital input: HIGH for the round-trip time of the acoustic pulse.
pub const RANGE_ECHO_GPIO: i32 = 17;
