//! Synthetic upstream sessions

use chrono::{DateTime, SecondsFormat};
use contracts::{UpstreamRecord, UpstreamSession};
use ingestion::mock::{car_data_record, lap_record, position_record};
use ingestion::MockSession;

/// 2023-03-05T15:00:00Z
pub const T0: f64 = 1_678_028_400.0;

/// Driver numbers in running order (index 0 runs P1)
pub const DRIVERS: [u32; 20] = [
    1, 11, 16, 55, 44, 14, 63, 18, 31, 10, 27, 23, 77, 24, 4, 21, 81, 2, 20, 22,
];

pub fn iso(ts: f64) -> String {
    DateTime::from_timestamp_millis((ts * 1000.0).round() as i64)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}

/// Full grid over `duration_s` seconds
///
/// Positions every 4s (car `i` offset by `i * 0.04`s), telemetry every 2s at
/// +0.5s with speed `200 + i`, one lap per 40s with driver 44 pitting on lap 2.
pub fn grid_session(duration_s: f64) -> MockSession {
    let mut session = MockSession::default();

    let ticks = (duration_s / 4.0) as u32;
    for k in 0..=ticks {
        for (i, driver) in DRIVERS.iter().enumerate() {
            let ts = T0 + f64::from(k) * 4.0 + i as f64 * 0.04;
            session
                .positions
                .push(position_record(*driver, &iso(ts), i as u32 + 1));
        }
    }

    let samples = (duration_s / 2.0) as u32;
    for k in 0..=samples {
        let ts = T0 + f64::from(k) * 2.0 + 0.5;
        for (i, driver) in DRIVERS.iter().enumerate() {
            session.car_data.push(car_data_record(
                *driver,
                &iso(ts),
                200.0 + i as f64,
                7,
                98.0,
                0.0,
            ));
        }
    }

    let laps = (duration_s / 40.0) as u32;
    for lap in 1..=laps {
        // Reverse order so the store has to sort
        for driver in DRIVERS.iter().rev() {
            let pit = (lap == 2 && *driver == 44).then(|| iso(T0 + 75.0));
            session
                .laps
                .push(lap_record(*driver, lap, 95.0, pit.as_deref()));
        }
    }

    session
}

/// Positions 4..=16 sampled at T0+100.1, the top three only at T0+106
pub fn gate_session() -> MockSession {
    let mut positions: Vec<UpstreamRecord> = DRIVERS[3..16]
        .iter()
        .zip(4u32..)
        .map(|(driver, pos)| position_record(*driver, &iso(T0 + 100.1), pos))
        .collect();
    positions.extend(
        DRIVERS[..3]
            .iter()
            .zip(1u32..)
            .map(|(driver, pos)| position_record(*driver, &iso(T0 + 106.0), pos)),
    );
    // Keeps the query far from the session end
    positions.push(position_record(1, &iso(T0 + 5000.0), 1));

    MockSession {
        positions,
        ..Default::default()
    }
}

/// Three cars sampled once an hour
pub fn sparse_session() -> MockSession {
    let mut positions = Vec::new();
    for ts in [T0, T0 + 3600.0] {
        for (i, driver) in DRIVERS[..3].iter().enumerate() {
            positions.push(position_record(*driver, &iso(ts), i as u32 + 1));
        }
    }
    positions.push(position_record(1, &iso(T0 + 10_000.0), 1));

    MockSession {
        positions,
        ..Default::default()
    }
}

pub fn bahrain_listing(session_key: &str, session_type: &str) -> UpstreamSession {
    UpstreamSession {
        session_key: session_key.to_string(),
        session_name: session_type.to_string(),
        session_type: session_type.to_string(),
        country_name: "Bahrain".to_string(),
        year: 2023,
        date_start: "2023-03-05T15:00:00+00:00".to_string(),
        date_end: "2023-03-05T17:00:00+00:00".to_string(),
    }
}
