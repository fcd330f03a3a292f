//! Synthetic dive generators.
//!
//! Values are simple functions of depth so tests can predict what the
//! interpolation should produce.

use probe_common::{ChannelValues, RawReading, SessionId};

/// Depths of a clean cast: down from `step` to `max_depth`, then back up.
///
/// ```
/// use test_utils::v_cast_depths;
///
/// assert_eq!(v_cast_depths(3.0, 1.0), vec![1.0, 2.0, 3.0, 2.0, 1.0]);
/// ```
pub fn v_cast_depths(max_depth: f64, step: f64) -> Vec<f64> {
    let steps = (max_depth / step).round() as usize;
    let down: Vec<f64> = (1..=steps).map(|i| i as f64 * step).collect();
    let up = down.iter().rev().skip(1).copied();
    down.iter().copied().chain(up).collect()
}

/// Depths of a cast that climbs back `rebound` dbar half way down.
pub fn yo_yo_depths(max_depth: f64, step: f64, rebound: f64) -> Vec<f64> {
    let mut depths = v_cast_depths(max_depth, step);
    let apex = depths.len() / 2;
    let middle = apex / 2;
    depths.insert(middle + 1, depths[middle] - rebound);
    depths
}

/// Temperature falling 0.5 degrees per dbar from 12 at the surface.
pub fn temperature_at(depth: f64) -> f64 {
    12.0 - 0.5 * depth
}

/// Salinity rising 0.1 per dbar from 30 at the surface.
pub fn salinity_at(depth: f64) -> f64 {
    30.0 + 0.1 * depth
}

/// Raw readings for `depths` with temperature and salinity from the
/// functions above; other channels unreported.
pub fn raw_readings(session_id: SessionId, depths: &[f64]) -> Vec<RawReading> {
    depths
        .iter()
        .enumerate()
        .map(|(i, &depth)| RawReading {
            session_id,
            seq: i as i64 + 1,
            pressure_dbar: depth,
            values: ChannelValues {
                temperature: Some(temperature_at(depth)),
                salinity: Some(salinity_at(depth)),
                ..Default::default()
            },
        })
        .collect()
}
