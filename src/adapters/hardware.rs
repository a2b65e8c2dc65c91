//! Hardware adapter — bridges real peripherals to domain port traits.
//!
//! Owns the ranging sensor, the network link, the clock and the blocking
//! delay, exposing them through [`RangePort`], [`ConnectivityPort`],
//! [`ClockPort`] and `DelayNs` on one value. The device loop takes all
//! four as a single `&mut`, so none of them is borrowed twice.

use embedded_hal::delay::DelayNs;

use super::time::Esp32TimeAdapter;
use crate::app::ports::{ClockPort, ConnectivityError, ConnectivityPort, RangePort};
use crate::tank::DistanceSample;

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter<R, N, D> {
    range: R,
    net: N,
    clock: Esp32TimeAdapter,
    delay: D,
}

impl<R, N, D> HardwareAdapter<R, N, D>
where
    R: RangePort,
    N: ConnectivityPort,
    D: DelayNs,
{
    pub fn new(range: R, net: N, clock: Esp32TimeAdapter, delay: D) -> Self {
        Self {
            range,
            net,
            clock,
            delay,
        }
    }

    pub fn net(&self) -> &N {
        &self.net
    }

    pub fn net_mut(&mut self) -> &mut N {
        &mut self.net
    }
}

// ── RangePort ─────────────────────────────────────────────────

impl<R: RangePort, N, D> RangePort for HardwareAdapter<R, N, D> {
    fn sample(&mut self) -> DistanceSample {
        self.range.sample()
    }
}

// ── ConnectivityPort ──────────────────────────────────────────

impl<R, N: ConnectivityPort, D> ConnectivityPort for HardwareAdapter<R, N, D> {
    fn connect(&mut self) -> Result<(), ConnectivityError> {
        self.net.connect()
    }

    fn disconnect(&mut self) {
        self.net.disconnect();
    }

    fn is_connected(&self) -> bool {
        self.net.is_connected()
    }

    fn poll(&mut self) {
        self.net.poll();
    }

    fn rssi(&self) -> Option<i8> {
        self.net.rssi()
    }
}

// ── ClockPort ─────────────────────────────────────────────────

impl<R, N, D> ClockPort for HardwareAdapter<R, N, D> {
    fn uptime_us(&self) -> u64 {
        self.clock.uptime_us()
    }

    fn unix_time_secs(&self) -> Option<u64> {
        self.clock.unix_time_secs()
    }
}

// ── DelayNs ───────────────────────────────────────────────────

impl<R, N, D: DelayNs> DelayNs for HardwareAdapter<R, N, D> {
    fn delay_ns(&mut self, ns: u32) {
        self.delay.delay_ns(ns);
    }

    fn delay_us(&mut self, us: u32) {
        self.delay.delay_us(us);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }
}
