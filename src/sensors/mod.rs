//! Sensor subsystem — the single ultrasonic ranging sensor.
//!
//! [`ultrasonic::RangeSampler`] produces one [`DistanceSample`](crate::tank::DistanceSample)
//! per acquisition tick. Spacing between pings is the caller's job
//! (see [`MIN_SAMPLE_SPACING_MS`](crate::config::MIN_SAMPLE_SPACING_MS)).

pub mod ultrasonic;

pub use ultrasonic::RangeSampler;
