//! Reconstruction policy

use contracts::{
    CarState, PositionSample, ReconstructionConfig, ReconstructionTier, ReplayState,
    SampleSource,
};
use tracing::{debug, instrument};

use crate::error::{ReplayError, Result};
use crate::nearest::{closest_per_driver, is_representative, order_by_position};

/// Tolerance-expanding nearest-match search with a last-known-position fallback
///
/// Stateless apart from its policy; one instance serves any number of queries.
#[derive(Debug, Clone, Default)]
pub struct ReconstructionEngine {
    config: ReconstructionConfig,
}

impl ReconstructionEngine {
    pub fn new(config: ReconstructionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReconstructionConfig {
        &self.config
    }

    /// Reconstruct the state of every car at `t`
    ///
    /// Returns `None` only when the session has no position data at all.
    ///
    /// 1. Within `end_of_session_margin_s` of the last sample: fallback directly
    /// 2. Try each tolerance; accept the first representative window
    /// 3. Otherwise fallback: latest sample at or before `t` per driver
    #[instrument(
        name = "replay_reconstruct",
        skip(self, source),
        fields(session_key = %session_key, t = t)
    )]
    pub fn reconstruct<S>(&self, source: &S, session_key: &str, t: f64) -> Result<Option<ReplayState>>
    where
        S: SampleSource + ?Sized,
    {
        if !t.is_finite() {
            return Err(ReplayError::InvalidTimestamp(t));
        }

        let Some(max_ts) = source.max_position_timestamp(session_key)? else {
            debug!("No position data for session");
            return Ok(None);
        };

        if self.config.near_session_end(t, max_ts) {
            debug!(max_ts, "Query near session end, skipping window search");
        } else {
            for &tolerance in &self.config.tolerances_s {
                let rows = closest_per_driver(&source.positions_near(session_key, t, tolerance)?, t);
                if is_representative(&rows, self.config.min_drivers, self.config.leader_max_position) {
                    debug!(tolerance, drivers = rows.len(), "Window accepted");
                    let cars = self.join_telemetry(
                        source,
                        session_key,
                        &rows,
                        self.config.match_telemetry_window_s,
                    )?;
                    return Ok(Some(ReplayState {
                        timestamp: t,
                        cars,
                        tier: ReconstructionTier::Window { tolerance },
                    }));
                }
                metrics::counter!("replayer_window_rejections_total").increment(1);
                debug!(tolerance, drivers = rows.len(), "Window not representative, widening");
            }
        }

        let mut rows = source.latest_positions_at_or_before(session_key, t)?;
        order_by_position(&mut rows);
        debug!(drivers = rows.len(), "Fallback to last known positions");
        let cars = self.join_telemetry(
            source,
            session_key,
            &rows,
            self.config.fallback_telemetry_window_s,
        )?;
        Ok(Some(ReplayState {
            timestamp: t,
            cars,
            tier: ReconstructionTier::Fallback,
        }))
    }

    /// Run a single nearest-match window without the representativeness gate
    ///
    /// Cars are ordered by driver number.
    #[instrument(
        name = "replay_search_window",
        skip(self, source),
        fields(session_key = %session_key, t = t, tolerance = tolerance)
    )]
    pub fn search_window<S>(
        &self,
        source: &S,
        session_key: &str,
        t: f64,
        tolerance: f64,
    ) -> Result<ReplayState>
    where
        S: SampleSource + ?Sized,
    {
        if !t.is_finite() {
            return Err(ReplayError::InvalidTimestamp(t));
        }
        let rows = closest_per_driver(&source.positions_near(session_key, t, tolerance)?, t);
        let cars = self.join_telemetry(
            source,
            session_key,
            &rows,
            self.config.match_telemetry_window_s,
        )?;
        Ok(ReplayState {
            timestamp: t,
            cars,
            tier: ReconstructionTier::Window { tolerance },
        })
    }

    /// Left-join each position sample with the closest telemetry sample
    fn join_telemetry<S>(
        &self,
        source: &S,
        session_key: &str,
        rows: &[PositionSample],
        window: f64,
    ) -> Result<Vec<CarState>>
    where
        S: SampleSource + ?Sized,
    {
        rows.iter()
            .map(|position| {
                let telemetry = source.telemetry_near(
                    session_key,
                    position.driver_number,
                    position.timestamp,
                    window,
                )?;
                Ok(CarState::from_samples(position, telemetry.as_ref()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemorySampleSource;
    use contracts::TelemetrySample;

    const KEY: &str = "9158";

    fn position(driver_number: u32, timestamp: f64, position: u32) -> PositionSample {
        PositionSample {
            driver_number,
            timestamp,
            position,
        }
    }

    /// Twelve drivers reporting every 5s from t=0 to t=3600, positions 1..=12
    fn full_field() -> MemorySampleSource {
        let mut source = MemorySampleSource::new();
        for step in 0..=720 {
            let ts = step as f64 * 5.0;
            for driver in 1..=12u32 {
                source.push_position(KEY, position(driver, ts + driver as f64 * 0.01, driver));
            }
        }
        source
    }

    #[test]
    fn test_scenario_9158_single_window() {
        let mut source = MemorySampleSource::new();
        source.push_position(KEY, position(1, 100.0, 1));
        source.push_position(KEY, position(16, 100.2, 2));
        source.push_position(KEY, position(44, 99.9, 3));

        let engine = ReconstructionEngine::default();
        let state = engine.search_window(&source, KEY, 100.0, 1.0).unwrap();

        assert_eq!(state.cars.len(), 3);
        let drivers: Vec<u32> = state.cars.iter().map(|c| c.driver_number).collect();
        assert_eq!(drivers, vec![1, 16, 44]);
        for car in &state.cars {
            assert_eq!(car.speed, 0.0);
            assert_eq!(car.gear, 1);
            assert_eq!(car.throttle, 0.0);
            assert!(!car.brake);
        }
    }

    #[test]
    fn test_no_position_data_is_none() {
        let engine = ReconstructionEngine::default();
        let source = MemorySampleSource::new();
        assert!(engine.reconstruct(&source, KEY, 100.0).unwrap().is_none());
    }

    #[test]
    fn test_rejects_non_finite_timestamp() {
        let engine = ReconstructionEngine::default();
        let err = engine
            .reconstruct(&full_field(), KEY, f64::NAN)
            .unwrap_err();
        assert!(matches!(err, ReplayError::InvalidTimestamp(_)));
    }

    #[test]
    fn test_narrowest_window_accepted() {
        let engine = ReconstructionEngine::default();
        let state = engine.reconstruct(&full_field(), KEY, 1000.0).unwrap().unwrap();

        assert_eq!(state.tier, ReconstructionTier::Window { tolerance: 1.0 });
        assert_eq!(state.cars.len(), 12);
        // window tier is ordered by driver number
        assert!(state
            .cars
            .windows(2)
            .all(|w| w[0].driver_number < w[1].driver_number));
    }

    #[test]
    fn test_widens_until_enough_drivers() {
        let engine = ReconstructionEngine::default();
        // samples every 5s: a 1s window around 1002.5 holds nothing
        let state = engine.reconstruct(&full_field(), KEY, 1002.5).unwrap().unwrap();
        assert_eq!(state.tier, ReconstructionTier::Window { tolerance: 10.0 });
        assert_eq!(state.cars.len(), 12);
    }

    #[test]
    fn test_unknown_position_counts_as_leader() {
        // one car with a missing (0) position, the rest at 5..=13
        let mut source = MemorySampleSource::new();
        source.push_position(KEY, position(7, 1000.0, 0));
        for driver in 20..29u32 {
            source.push_position(KEY, position(driver, 1000.1, driver - 15));
        }
        source.push_position(KEY, position(20, 9000.0, 5));

        let engine = ReconstructionEngine::default();
        let state = engine.reconstruct(&source, KEY, 1000.0).unwrap().unwrap();
        assert_eq!(state.tier, ReconstructionTier::Window { tolerance: 1.0 });
        assert_eq!(state.cars.len(), 10);
    }

    #[test]
    fn test_leader_gate_forces_widening() {
        // around t=2000 the leaders are silent; 10 backmarkers report within 1s
        let mut gated = MemorySampleSource::new();
        for step in 0..=720 {
            let ts = step as f64 * 5.0;
            if (ts - 2000.0).abs() < 100.0 {
                continue;
            }
            for driver in 1..=3u32 {
                gated.push_position(KEY, position(driver, ts, driver));
            }
        }
        for driver in 20..30u32 {
            gated.push_position(KEY, position(driver, 2000.0, driver - 16));
        }

        let engine = ReconstructionEngine::default();
        let one_second = engine.search_window(&gated, KEY, 2000.0, 1.0).unwrap();
        assert_eq!(one_second.cars.len(), 10);
        assert!(one_second.cars.iter().all(|c| c.position > 3));

        let state = engine.reconstruct(&gated, KEY, 2000.0).unwrap().unwrap();
        assert_eq!(state.tier, ReconstructionTier::Window { tolerance: 300.0 });
        assert!(state.cars.iter().any(|c| c.position <= 3));
        assert_eq!(state.cars.len(), 13);
    }

    #[test]
    fn test_end_of_session_short_circuit() {
        let mut source = full_field();
        // a retired car whose last report is long before the end
        source.push_position(KEY, position(99, 2900.0, 20));

        let engine = ReconstructionEngine::default();
        // max_ts ~ 3600.12, so 3100 is inside the 600s margin
        let state = engine.reconstruct(&source, KEY, 3100.0).unwrap().unwrap();
        assert_eq!(state.tier, ReconstructionTier::Fallback);
        assert_eq!(state.cars.len(), 13);
        assert!(state.cars.iter().any(|c| c.driver_number == 99));

        // the window search would have answered with the 12 active cars only
        let window = engine.search_window(&source, KEY, 3100.0, 1.0).unwrap();
        assert_eq!(window.cars.len(), 12);
    }

    #[test]
    fn test_fallback_covers_every_driver_with_history() {
        let mut source = MemorySampleSource::new();
        source.push_position(KEY, position(1, 10.0, 2));
        source.push_position(KEY, position(16, 20.0, 1));
        source.push_position(KEY, position(44, 5000.0, 3));

        let engine = ReconstructionEngine::default();
        let state = engine.reconstruct(&source, KEY, 30.0).unwrap().unwrap();
        assert_eq!(state.tier, ReconstructionTier::Fallback);
        let order: Vec<u32> = state.cars.iter().map(|c| c.driver_number).collect();
        assert_eq!(order, vec![16, 1]);
    }

    #[test]
    fn test_fallback_before_first_sample_is_empty() {
        let mut source = MemorySampleSource::new();
        source.push_position(KEY, position(1, 100.0, 1));
        let engine = ReconstructionEngine::default();
        let state = engine.reconstruct(&source, KEY, 50.0).unwrap().unwrap();
        assert_eq!(state.tier, ReconstructionTier::Fallback);
        assert!(state.cars.is_empty());
    }

    #[test]
    fn test_telemetry_join_windows() {
        let mut source = MemorySampleSource::new();
        source.push_position(KEY, position(1, 100.0, 1));
        source.push_telemetry(
            KEY,
            TelemetrySample {
                driver_number: 1,
                timestamp: 130.0,
                speed: Some(250.0),
                gear: Some(6),
                throttle: Some(80.0),
                brake: Some(100.0),
                ..Default::default()
            },
        );

        let engine = ReconstructionEngine::default();
        // window tier: 30s away is outside the 1s join
        let state = engine.search_window(&source, KEY, 100.0, 1.0).unwrap();
        assert_eq!(state.cars[0].speed, 0.0);

        // fallback tier joins within 60s
        let state = engine.reconstruct(&source, KEY, 100.0).unwrap().unwrap();
        assert_eq!(state.tier, ReconstructionTier::Fallback);
        let car = &state.cars[0];
        assert_eq!(car.speed, 250.0);
        assert_eq!(car.gear, 6);
        assert!(car.brake);
        assert_eq!(car.timestamp, 100.0);
    }
}
