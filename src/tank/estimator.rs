//! Distance → volume estimation for a rectangular tank.
//!
//! The sensor is mounted at the top of the tank looking down, so the water
//! level is the tank height minus the measured distance. Edge-case policy,
//! checked in this order:
//!
//! 1. `distance >= height` → empty (or sensor above the tank top).
//! 2. `0 < distance < 10 cm` → full zone: 100 % and the nominal full volume.
//! 3. otherwise → linear: `length × width × level / 1000` litres.

use super::{DistanceSample, FULL_ZONE_CM, TankGeometry, TankReading};

/// Estimate the tank content. Returns `None` when the sample has no echo.
pub fn estimate(sample: &DistanceSample, geometry: &TankGeometry) -> Option<TankReading> {
    let distance = sample.distance()?;
    Some(estimate_distance(distance, geometry))
}

/// Estimate from a raw distance in centimetres.
pub fn estimate_distance(distance_cm: f32, geometry: &TankGeometry) -> TankReading {
    if distance_cm >= geometry.height_cm {
        return TankReading::EMPTY;
    }

    if distance_cm > 0.0 && distance_cm < FULL_ZONE_CM {
        return TankReading {
            volume_liters: geometry.full_volume_liters,
            percent_full: 100.0,
        };
    }

    let level_cm = geometry.height_cm - distance_cm;
    let volume_liters = geometry.length_cm * geometry.width_cm * level_cm / 1000.0;
    TankReading {
        volume_liters,
        percent_full: percent_of(volume_liters, geometry.full_volume_liters),
    }
}

fn percent_of(volume: f32, full: f32) -> f32 {
    if full <= 0.0 {
        return 0.0;
    }
    let pct = 100.0 * volume / full;
    if pct.is_finite() { pct } else { 0.0 }
}
