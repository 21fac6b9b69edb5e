//! `state` and `timeline` command implementations.

use std::time::Instant;

use anyhow::{Context, Result};
use contracts::{ReconstructionTier, ReplayState, ServiceConfig, Timeline};
use observability::ReplayMetricsAggregator;
use replay_engine::ReplayEngine;
use telemetry_store::TelemetryStore;
use tracing::info;

use crate::cli::{StateArgs, TimelineArgs};

fn open_store(config: &ServiceConfig) -> Result<TelemetryStore> {
    TelemetryStore::open(&config.store)
        .with_context(|| format!("Failed to open database {}", config.store.path))
}

/// Execute the `state` command
pub async fn run_state(config: &ServiceConfig, args: &StateArgs) -> Result<()> {
    let store = open_store(config)?;
    let engine = ReplayEngine::new(store.clone(), config.reconstruction.clone());

    let result = match (args.t, args.from, args.to) {
        (Some(t), _, _) => match args.window {
            Some(tolerance) => {
                print_window(&engine, &args.session_key, t, tolerance, args.json).await
            }
            None => print_state(&engine, &args.session_key, t, args.json).await,
        },
        (None, Some(from), Some(to)) => {
            sweep(&engine, &args.session_key, SweepRange { from, to, step: args.step }, args.json)
                .await
        }
        _ => Err(anyhow::anyhow!("Either -t or --from/--to is required")),
    };

    store.shutdown().await?;
    result
}

async fn print_state(engine: &ReplayEngine, session_key: &str, t: f64, json: bool) -> Result<()> {
    let state = engine
        .state_at(session_key, t)
        .await
        .with_context(|| format!("Reconstruction failed for session {session_key}"))?;

    let Some(state) = state else {
        anyhow::bail!("No data found for session {session_key} at timestamp {t}");
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        print_state_table(&state);
    }
    Ok(())
}

async fn print_window(
    engine: &ReplayEngine,
    session_key: &str,
    t: f64,
    tolerance: f64,
    json: bool,
) -> Result<()> {
    if !(tolerance.is_finite() && tolerance > 0.0) {
        anyhow::bail!("--window must be a positive number of seconds");
    }
    let state = engine
        .search_window(session_key, t, tolerance)
        .await
        .with_context(|| format!("Window search failed for session {session_key}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        print_state_table(&state);
    }
    Ok(())
}

fn describe_tier(tier: &ReconstructionTier) -> String {
    match tier {
        ReconstructionTier::Window { tolerance } => format!("nearest match within {tolerance}s"),
        ReconstructionTier::Fallback => "last known positions".to_string(),
    }
}

fn print_state_table(state: &ReplayState) {
    println!(
        "t = {} ({}, {} cars)\n",
        state.timestamp,
        describe_tier(&state.tier),
        state.cars.len()
    );
    println!("{:>3}  {:>3}  {:>7}  {:>4}  {:>5}  {:>5}  {:>14}", "P", "#", "km/h", "gear", "thr", "brake", "sample t");
    for car in &state.cars {
        println!(
            "{:>3}  {:>3}  {:>7.1}  {:>4}  {:>5.0}  {:>5}  {:>14.3}",
            car.position,
            car.driver_number,
            car.speed,
            car.gear,
            car.throttle,
            if car.brake { "on" } else { "-" },
            car.timestamp
        );
    }
}

/// Upper bound on queries in one sweep
const MAX_SWEEP_QUERIES: u64 = 100_000;

/// Inclusive time range walked by a sweep
#[derive(Debug, Clone, Copy)]
struct SweepRange {
    from: f64,
    to: f64,
    step: f64,
}

impl SweepRange {
    fn timestamps(self) -> Result<Vec<f64>> {
        let valid_step = self.step.is_finite() && self.step > 0.0;
        if !valid_step {
            anyhow::bail!("--step must be a positive number of seconds");
        }
        if !(self.from.is_finite() && self.to.is_finite()) {
            anyhow::bail!("--from and --to must be finite timestamps");
        }
        if self.from > self.to {
            anyhow::bail!("--from must not be after --to");
        }
        let steps = ((self.to - self.from) / self.step).floor();
        if !steps.is_finite() || steps >= MAX_SWEEP_QUERIES as f64 {
            anyhow::bail!(
                "sweep would run more than {MAX_SWEEP_QUERIES} queries, use a larger --step"
            );
        }
        let count = steps as u64 + 1;
        Ok((0..count).map(|i| self.from + i as f64 * self.step).collect())
    }
}

async fn sweep(engine: &ReplayEngine, session_key: &str, range: SweepRange, json: bool) -> Result<()> {
    let timestamps = range.timestamps()?;
    info!(session_key, queries = timestamps.len(), "Starting replay sweep");

    let mut aggregator = ReplayMetricsAggregator::new();
    let mut states = Vec::with_capacity(if json { timestamps.len() } else { 0 });
    for t in timestamps {
        let started = Instant::now();
        let state = engine.state_at(session_key, t).await?;
        aggregator.update(state.as_ref(), started.elapsed().as_secs_f64() * 1000.0);
        if json {
            states.push(serde_json::json!({ "t": t, "state": state }));
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&states)?);
    } else {
        println!("{}", aggregator.summary());
    }
    Ok(())
}

/// Execute the `timeline` command
pub async fn run_timeline(config: &ServiceConfig, args: &TimelineArgs) -> Result<()> {
    let store = open_store(config)?;
    let engine = ReplayEngine::new(store.clone(), config.reconstruction.clone());
    let timeline = engine.timeline(&args.session_key).await;
    store.shutdown().await?;

    let Some(timeline) = timeline? else {
        anyhow::bail!("No timeline data found for session {}", args.session_key);
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&timeline)?);
    } else {
        print_timeline(&timeline);
    }
    Ok(())
}

fn seconds(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.3}"))
}

fn print_timeline(timeline: &Timeline) {
    println!(
        "Session {} ({} laps, {} entries)\n",
        timeline.session_key,
        timeline.total_laps,
        timeline.entries.len()
    );
    println!("{:>3}  {:>3}  {:>8}  {:>8}  {:>8}  {:>9}  {}", "lap", "#", "s1", "s2", "s3", "lap", "pit");
    for entry in &timeline.entries {
        println!(
            "{:>3}  {:>3}  {:>8}  {:>8}  {:>8}  {:>9}  {}",
            entry.lap,
            entry.driver_number,
            seconds(entry.sector1_time),
            seconds(entry.sector2_time),
            seconds(entry.sector3_time),
            seconds(entry.lap_time),
            if entry.pit_stop { "yes" } else { "" }
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_range_is_inclusive() {
        let range = SweepRange {
            from: 100.0,
            to: 130.0,
            step: 10.0,
        };
        assert_eq!(range.timestamps().unwrap(), vec![100.0, 110.0, 120.0, 130.0]);
    }

    #[test]
    fn sweep_range_rejects_bad_input() {
        let zero = SweepRange {
            from: 0.0,
            to: 10.0,
            step: 0.0,
        };
        assert!(zero.timestamps().is_err());
        let reversed = SweepRange {
            from: 10.0,
            to: 0.0,
            step: 1.0,
        };
        assert!(reversed.timestamps().is_err());
    }

    #[test]
    fn sweep_range_is_bounded() {
        let unbounded = SweepRange {
            from: 0.0,
            to: f64::INFINITY,
            step: 10.0,
        };
        assert!(unbounded.timestamps().is_err());
        let not_a_number = SweepRange {
            from: f64::NAN,
            to: 10.0,
            step: 1.0,
        };
        assert!(not_a_number.timestamps().is_err());
        let too_fine = SweepRange {
            from: 1_678_028_400.0,
            to: 1_678_035_600.0,
            step: 0.001,
        };
        assert!(too_fine.timestamps().is_err());

        let at_limit = SweepRange {
            from: 0.0,
            to: (MAX_SWEEP_QUERIES - 1) as f64,
            step: 1.0,
        };
        assert_eq!(at_limit.timestamps().unwrap().len() as u64, MAX_SWEEP_QUERIES);
    }
}
