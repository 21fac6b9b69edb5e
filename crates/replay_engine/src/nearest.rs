//! Per-driver sample selection

use std::cmp::Ordering;
use std::collections::BTreeMap;

use contracts::PositionSample;

/// Closest sample to `t` for every driver
///
/// `samples` is in storage order; on equal distance the earlier sample wins.
/// Result is ordered by driver number.
pub fn closest_per_driver(samples: &[PositionSample], t: f64) -> Vec<PositionSample> {
    let mut best: BTreeMap<u32, PositionSample> = BTreeMap::new();
    for sample in samples {
        best.entry(sample.driver_number)
            .and_modify(|current| {
                let delta = (sample.timestamp - t).abs();
                let current_delta = (current.timestamp - t).abs();
                if delta.partial_cmp(&current_delta) == Some(Ordering::Less) {
                    *current = *sample;
                }
            })
            .or_insert(*sample);
    }
    best.into_values().collect()
}

/// Latest sample at or before `t` for every driver, ordered by position
///
/// Ties on timestamp keep the earlier stored sample; driver number breaks
/// position ties.
pub fn latest_per_driver(samples: &[PositionSample], t: f64) -> Vec<PositionSample> {
    let mut latest: BTreeMap<u32, PositionSample> = BTreeMap::new();
    for sample in samples.iter().filter(|s| s.timestamp <= t) {
        latest
            .entry(sample.driver_number)
            .and_modify(|current| {
                if sample.timestamp > current.timestamp {
                    *current = *sample;
                }
            })
            .or_insert(*sample);
    }
    let mut rows: Vec<PositionSample> = latest.into_values().collect();
    order_by_position(&mut rows);
    rows
}

/// Sort by race position, then driver number
pub fn order_by_position(rows: &mut [PositionSample]) {
    rows.sort_by_key(|p| (p.position, p.driver_number));
}

/// Whether the selection is representative of the live field
///
/// Requires at least `min_drivers` distinct drivers and one driver at or above
/// `leader_max_position`.
pub fn is_representative(rows: &[PositionSample], min_drivers: usize, leader_max_position: u32) -> bool {
    rows.len() >= min_drivers && rows.iter().any(|p| p.position <= leader_max_position)
}
