//! Notification gate — one alert per threshold crossing.
//!
//! A pure transition function over [`AlertState`]. Dispatching the returned
//! event is the caller's job, which keeps this free of I/O.
//!
//! Rules, evaluated on the published (truncated) percentage:
//!
//! - `percent >= 100` and not yet reported → `TankFull`, latch full,
//!   re-arm empty.
//! - `percent < 20` and not yet reported → `TankEmpty`, latch empty,
//!   re-arm full.
//! - The full check runs first: a reading that satisfies both conditions
//!   yields `TankFull`.
//! - A latched condition produces no event and no state change.
//!
//! "Full" is `>= 100`, not `== 100`: a linear-zone reading can exceed 100 %
//! when the box volume of the geometry is larger than `full_volume_liters`,
//! and such a reading also raises `TankFull`.

use super::{AlertEvent, AlertState, TankReading};

/// Percentage at or above which the tank is reported full.
pub const FULL_PERCENT: i64 = 100;
/// Percentage below which the tank is reported empty.
pub const EMPTY_PERCENT: i64 = 20;

/// Compute the next latch state and the event to dispatch, if any.
pub fn evaluate(reading: &TankReading, state: AlertState) -> (AlertState, Option<AlertEvent>) {
    let percent = reading.percent_int();
    transition(percent >= FULL_PERCENT, percent < EMPTY_PERCENT, state)
}

/// Latch transition on already-classified conditions.
///
/// Split out of [`evaluate`] so the full-before-empty precedence can be
/// exercised with both conditions raised at once.
pub fn transition(
    is_full: bool,
    is_empty: bool,
    state: AlertState,
) -> (AlertState, Option<AlertEvent>) {
    if is_full && !state.full_notified {
        let next = AlertState {
            full_notified: true,
            empty_notified: false,
        };
        return (next, Some(AlertEvent::TankFull));
    }

    if is_empty && !state.empty_notified {
        let next = AlertState {
            full_notified: false,
            empty_notified: true,
        };
        return (next, Some(AlertEvent::TankEmpty));
    }

    (state, None)
}
