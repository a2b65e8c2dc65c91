//! HC-SR04 style ultrasonic ranging sensor.
//!
//! Protocol: hold TRIG low for 2 µs, high for 10 µs, then low. The sensor
//! answers with a pulse on ECHO whose high time is the round-trip flight
//! time of the ping.
//!
//! Timing is a busy-wait against the monotonic clock, bounded by the echo
//! timeout. Any phase that overruns yields `microseconds_echo = 0`.
//!
//! ## Dual-target design
//!
//! Generic over `embedded-hal` 1.0 pins and delay, so the same code drives
//! `esp-idf-hal` `PinDriver`s on the device and scripted pins in tests.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use log::{debug, warn};

use crate::app::ports::{ClockPort, RangePort};
use crate::tank::DistanceSample;

/// Settle time with TRIG low before the ping.
const TRIGGER_SETTLE_US: u32 = 2;
/// TRIG high time that starts a ping.
const TRIGGER_PULSE_US: u32 = 10;

pub struct RangeSampler<T, E, D, C> {
    trigger: T,
    echo: E,
    delay: D,
    clock: C,
    echo_timeout_us: u32,
}

impl<T, E, D, C> RangeSampler<T, E, D, C>
where
    T: OutputPin,
    E: InputPin,
    D: DelayNs,
    C: ClockPort,
{
    pub fn new(trigger: T, echo: E, delay: D, clock: C, echo_timeout_us: u32) -> Self {
        Self {
            trigger,
            echo,
            delay,
            clock,
            echo_timeout_us,
        }
    }

    fn fire_trigger(&mut self) -> bool {
        let ok = self.trigger.set_low().is_ok() && {
            self.delay.delay_us(TRIGGER_SETTLE_US);
            self.trigger.set_high().is_ok()
        } && {
            self.delay.delay_us(TRIGGER_PULSE_US);
            self.trigger.set_low().is_ok()
        };
        if !ok {
            warn!("ranging: trigger pin write failed");
        }
        ok
    }

    /// A read error counts as "low": the pulse is then timed out, not invented.
    fn echo_high(&mut self) -> bool {
        self.echo.is_high().unwrap_or(false)
    }

    /// Spin while ECHO equals `level`. `false` if the deadline passes first.
    fn wait_while(&mut self, level: bool, deadline: u64) -> bool {
        while self.echo_high() == level {
            if self.clock.uptime_us() >= deadline {
                return false;
            }
        }
        true
    }

    /// Width of the next high pulse on ECHO in µs, 0 on timeout.
    fn pulse_in(&mut self) -> u32 {
        let deadline = self.clock.uptime_us() + u64::from(self.echo_timeout_us);

        // A pulse already in progress is the tail of an earlier ping.
        if !self.wait_while(true, deadline) || !self.wait_while(false, deadline) {
            return 0;
        }
        let rise = self.clock.uptime_us();
        if !self.wait_while(true, deadline) {
            return 0;
        }
        let width = self.clock.uptime_us().saturating_sub(rise);
        u32::try_from(width).unwrap_or(0)
    }
}

impl<T, E, D, C> RangePort for RangeSampler<T, E, D, C>
where
    T: OutputPin,
    E: InputPin,
    D: DelayNs,
    C: ClockPort,
{
    fn sample(&mut self) -> DistanceSample {
        let timestamp_us = self.clock.uptime_us();
        let echo_us = if self.fire_trigger() { self.pulse_in() } else { 0 };
        let sample = DistanceSample::from_echo(echo_us, timestamp_us);
        if sample.has_echo() {
            debug!("ranging: echo {} us = {:.1} cm", echo_us, sample.distance_cm);
        } else {
            debug!("ranging: no echo within {} us", self.echo_timeout_us);
        }
        sample
    }
}
