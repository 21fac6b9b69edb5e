//! Upstream record normalization
//!
//! Converts raw provider records into typed samples. Malformed records are
//! skipped and counted; unparseable dates become the 0.0 sentinel.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use contracts::{
    LapRecord, PositionSample, TelemetryBatch, TelemetrySample, UpstreamRecord, UpstreamSession,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

/// Timestamp assigned to records whose date could not be parsed
pub const SENTINEL_TIMESTAMP: f64 = 0.0;

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse an ISO-8601 date into epoch seconds
///
/// Accepts `Z`, `+HH:MM` and `+HHMM` offsets; dates without an offset are read
/// as UTC. Returns `None` for anything else.
pub fn try_parse_timestamp(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let utc = if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        dt.to_utc()
    } else if let Some(dt) = OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(raw, fmt).ok())
    {
        dt.to_utc()
    } else if let Some(naive) = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
    {
        naive.and_utc()
    } else {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()?
            .and_hms_opt(0, 0, 0)?
            .and_utc()
    };

    Some(utc.timestamp_micros() as f64 / 1_000_000.0)
}

/// Parse an ISO-8601 date, falling back to the 0.0 sentinel
pub fn parse_timestamp(raw: &str) -> f64 {
    try_parse_timestamp(raw).unwrap_or_else(|| {
        warn!(raw, "Unparseable upstream timestamp, using sentinel");
        SENTINEL_TIMESTAMP
    })
}

/// Per-kind normalization counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeStats {
    /// Records converted
    pub accepted: usize,
    /// Records dropped (missing driver number, wrong field types)
    pub skipped: usize,
    /// Accepted records whose date became the sentinel
    pub sentinels: usize,
}

impl NormalizeStats {
    fn merge(&mut self, other: NormalizeStats) {
        self.accepted += other.accepted;
        self.skipped += other.skipped;
        self.sentinels += other.sentinels;
    }
}

/// Normalization result for one session
#[derive(Debug, Default)]
pub struct Normalized {
    pub batch: TelemetryBatch,
    pub positions: NormalizeStats,
    pub telemetry: NormalizeStats,
    pub laps: NormalizeStats,
}

impl Normalized {
    /// Counters summed over the three kinds
    pub fn totals(&self) -> NormalizeStats {
        let mut total = NormalizeStats::default();
        total.merge(self.positions);
        total.merge(self.telemetry);
        total.merge(self.laps);
        total
    }
}

/// Normalize the three raw record sets of one session
pub fn normalize_session(
    positions: Vec<UpstreamRecord>,
    car_data: Vec<UpstreamRecord>,
    laps: Vec<UpstreamRecord>,
) -> Normalized {
    let (positions, position_stats) = normalize_positions(positions);
    let (telemetry, telemetry_stats) = normalize_telemetry(car_data);
    let (laps, lap_stats) = normalize_laps(laps);
    Normalized {
        batch: TelemetryBatch {
            positions,
            telemetry,
            laps,
        },
        positions: position_stats,
        telemetry: telemetry_stats,
        laps: lap_stats,
    }
}

/// Integral JSON number, accepting `3` and `3.0` alike
///
/// Anything else (fractional, out of range, non-numeric) reads as absent.
fn lenient_int<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<i64>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let int = match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        _ => None,
    };
    Ok(int.and_then(|i| T::try_from(i).ok()))
}

#[derive(Deserialize)]
struct RawPosition {
    driver_number: u32,
    #[serde(default)]
    date: Option<Value>,
    #[serde(default, deserialize_with = "lenient_int")]
    position: Option<u32>,
}

#[derive(Deserialize)]
struct RawCarData {
    driver_number: u32,
    #[serde(default)]
    date: Option<Value>,
    #[serde(default)]
    speed: Option<f64>,
    #[serde(default, deserialize_with = "lenient_int")]
    n_gear: Option<i64>,
    #[serde(default)]
    throttle: Option<f64>,
    #[serde(default)]
    brake: Option<f64>,
    #[serde(default, deserialize_with = "lenient_int")]
    rpm: Option<i64>,
    #[serde(default, deserialize_with = "lenient_int")]
    drs: Option<i64>,
}

#[derive(Deserialize)]
struct RawLap {
    driver_number: u32,
    lap_number: u32,
    #[serde(default)]
    lap_duration: Option<f64>,
    #[serde(default, alias = "duration_sector_1")]
    sector_1_duration: Option<f64>,
    #[serde(default, alias = "duration_sector_2")]
    sector_2_duration: Option<f64>,
    #[serde(default, alias = "duration_sector_3")]
    sector_3_duration: Option<f64>,
    #[serde(default)]
    pit_in_time: Option<PitTime>,
    #[serde(default)]
    pit_out_time: Option<PitTime>,
}

/// Pit times arrive either as epoch seconds or as ISO dates
#[derive(Deserialize)]
#[serde(untagged)]
enum PitTime {
    Seconds(f64),
    Date(String),
}

impl PitTime {
    fn seconds(self) -> Option<f64> {
        match self {
            PitTime::Seconds(s) => Some(s),
            PitTime::Date(raw) => try_parse_timestamp(&raw),
        }
    }
}

fn decode_all<T: DeserializeOwned>(
    kind: &'static str,
    records: Vec<UpstreamRecord>,
) -> (Vec<T>, usize) {
    let mut decoded = Vec::with_capacity(records.len());
    let mut skipped = 0;
    for record in records {
        match serde_json::from_value::<T>(Value::Object(record)) {
            Ok(raw) => decoded.push(raw),
            Err(e) => {
                skipped += 1;
                tracing::debug!(kind, error = %e, "Skipping malformed upstream record");
            }
        }
    }
    if skipped > 0 {
        warn!(kind, skipped, "Skipped malformed upstream records");
    }
    (decoded, skipped)
}

/// Epoch seconds of a raw `date` value; non-strings get the sentinel
fn stamp(date: Option<&Value>, sentinels: &mut usize) -> f64 {
    let ts = match date {
        Some(Value::String(raw)) => parse_timestamp(raw),
        Some(Value::Null) | None => SENTINEL_TIMESTAMP,
        Some(other) => {
            warn!(value = %other, "Non-string date, using sentinel timestamp");
            SENTINEL_TIMESTAMP
        }
    };
    if ts == SENTINEL_TIMESTAMP {
        *sentinels += 1;
    }
    ts
}

/// Normalize raw position records
///
/// A missing position value becomes 0.
pub fn normalize_positions(records: Vec<UpstreamRecord>) -> (Vec<PositionSample>, NormalizeStats) {
    let (raw, skipped) = decode_all::<RawPosition>("position", records);
    let mut sentinels = 0;
    let samples: Vec<_> = raw
        .into_iter()
        .map(|r| PositionSample {
            driver_number: r.driver_number,
            timestamp: stamp(r.date.as_ref(), &mut sentinels),
            position: r.position.unwrap_or(0),
        })
        .collect();
    let stats = NormalizeStats {
        accepted: samples.len(),
        skipped,
        sentinels,
    };
    (samples, stats)
}

/// Normalize raw car telemetry records
pub fn normalize_telemetry(
    records: Vec<UpstreamRecord>,
) -> (Vec<TelemetrySample>, NormalizeStats) {
    let (raw, skipped) = decode_all::<RawCarData>("car_data", records);
    let mut sentinels = 0;
    let samples: Vec<_> = raw
        .into_iter()
        .map(|r| TelemetrySample {
            driver_number: r.driver_number,
            timestamp: stamp(r.date.as_ref(), &mut sentinels),
            speed: r.speed,
            gear: r.n_gear,
            throttle: r.throttle,
            brake: r.brake,
            rpm: r.rpm,
            drs: r.drs,
        })
        .collect();
    let stats = NormalizeStats {
        accepted: samples.len(),
        skipped,
        sentinels,
    };
    (samples, stats)
}

/// Normalize raw lap records
///
/// Pit times that cannot be read are treated as absent.
pub fn normalize_laps(records: Vec<UpstreamRecord>) -> (Vec<LapRecord>, NormalizeStats) {
    let (raw, skipped) = decode_all::<RawLap>("laps", records);
    let laps: Vec<_> = raw
        .into_iter()
        .map(|r| LapRecord {
            driver_number: r.driver_number,
            lap_number: r.lap_number,
            lap_duration: r.lap_duration,
            sector_1_duration: r.sector_1_duration,
            sector_2_duration: r.sector_2_duration,
            sector_3_duration: r.sector_3_duration,
            pit_in_time: r.pit_in_time.and_then(PitTime::seconds),
            pit_out_time: r.pit_out_time.and_then(PitTime::seconds),
        })
        .collect();
    let stats = NormalizeStats {
        accepted: laps.len(),
        skipped,
        sentinels: 0,
    };
    (laps, stats)
}

/// Read a session listing record
///
/// The session key may be a number or a string upstream. Records without a key
/// are dropped.
pub fn session_from_record(record: &UpstreamRecord) -> Option<UpstreamSession> {
    let session_key = match record.get("session_key")? {
        Value::Number(n) => n.to_string(),
        Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
        _ => return None,
    };
    let text = |field: &str| {
        record
            .get(field)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let year = record
        .get("year")
        .and_then(Value::as_i64)
        .and_then(|y| i32::try_from(y).ok())
        .unwrap_or(0);

    Some(UpstreamSession {
        session_key,
        session_name: text("session_name"),
        session_type: text("session_type"),
        country_name: text("country_name"),
        year,
        date_start: text("date_start"),
        date_end: text("date_end"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> UpstreamRecord {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn parses_common_iso_shapes() {
        let expected = 1_678_024_866.0;
        assert_eq!(try_parse_timestamp("2023-03-05T14:01:06Z"), Some(expected));
        assert_eq!(try_parse_timestamp("2023-03-05T14:01:06+00:00"), Some(expected));
        assert_eq!(try_parse_timestamp("2023-03-05T17:01:06+03:00"), Some(expected));
        assert_eq!(try_parse_timestamp("2023-03-05T14:01:06+0000"), Some(expected));
        assert_eq!(try_parse_timestamp("2023-03-05T14:01:06"), Some(expected));
        assert_eq!(try_parse_timestamp("2023-03-05 14:01:06"), Some(expected));
    }

    #[test]
    fn keeps_fractional_seconds() {
        let ts = try_parse_timestamp("2023-03-05T14:01:06.250000+00:00").unwrap();
        assert!((ts - 1_678_024_866.25).abs() < 1e-6);
    }

    #[test]
    fn invalid_dates_become_sentinel() {
        assert_eq!(parse_timestamp("not a date"), SENTINEL_TIMESTAMP);
        assert_eq!(parse_timestamp(""), SENTINEL_TIMESTAMP);
        assert_eq!(try_parse_timestamp("2023-13-45T00:00:00Z"), None);
    }

    #[test]
    fn positions_skip_malformed_and_default_position() {
        let records = vec![
            record(json!({"driver_number": 1, "date": "2023-03-05T14:01:06Z", "position": 1})),
            record(json!({"date": "2023-03-05T14:01:06Z", "position": 2})),
            record(json!({"driver_number": "eleven", "position": 3})),
            record(json!({"driver_number": 16, "date": "garbage"})),
        ];
        let (samples, stats) = normalize_positions(records);
        assert_eq!(stats.accepted, 2);
        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.sentinels, 1);
        assert_eq!(samples[0].timestamp, 1_678_024_866.0);
        assert_eq!(samples[1].driver_number, 16);
        assert_eq!(samples[1].position, 0);
        assert_eq!(samples[1].timestamp, SENTINEL_TIMESTAMP);
    }

    #[test]
    fn positions_keep_records_with_non_string_dates() {
        let records = vec![
            record(json!({"driver_number": 1, "date": 1678024866, "position": 1})),
            record(json!({"driver_number": 16, "date": "garbage", "position": 2})),
            record(json!({"driver_number": 44, "date": "2023-03-05T14:01:06Z", "position": 3.0})),
            record(json!({"driver_number": 63, "date": null, "position": 2.5})),
        ];
        let (samples, stats) = normalize_positions(records);
        assert_eq!(stats.accepted, 4);
        assert_eq!(stats.skipped, 0);
        assert_eq!(stats.sentinels, 3);

        assert_eq!(samples[0].driver_number, 1);
        assert_eq!(samples[0].timestamp, SENTINEL_TIMESTAMP);
        assert_eq!(samples[0].position, 1);
        assert_eq!(samples[2].position, 3);
        assert_eq!(samples[2].timestamp, 1_678_024_866.0);
        assert_eq!(samples[3].position, 0);
    }

    #[test]
    fn telemetry_accepts_integral_float_ordinals() {
        let records = vec![record(json!({
            "driver_number": 1,
            "date": ["2023-03-05T14:01:06Z"],
            "n_gear": 7.0,
            "rpm": 11250.0,
            "drs": 12
        }))];
        let (samples, stats) = normalize_telemetry(records);
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.sentinels, 1);
        assert_eq!(samples[0].gear, Some(7));
        assert_eq!(samples[0].rpm, Some(11250));
        assert_eq!(samples[0].drs, Some(12));
        assert_eq!(samples[0].timestamp, SENTINEL_TIMESTAMP);
    }

    #[test]
    fn telemetry_keeps_missing_fields_absent() {
        let records = vec![record(json!({
            "driver_number": 44,
            "date": "2023-03-05T14:01:06.5Z",
            "speed": 287,
            "brake": 100,
            "drs": null
        }))];
        let (samples, stats) = normalize_telemetry(records);
        assert_eq!(stats.accepted, 1);
        let sample = samples[0];
        assert_eq!(sample.speed, Some(287.0));
        assert_eq!(sample.gear, None);
        assert_eq!(sample.brake, Some(100.0));
        assert_eq!(sample.drs, None);
    }

    #[test]
    fn lap_pit_times_accept_numbers_and_dates() {
        let records = vec![
            record(json!({
                "driver_number": 1, "lap_number": 14, "lap_duration": 96.2,
                "pit_in_time": "2023-03-05T14:30:00Z"
            })),
            record(json!({
                "driver_number": 11, "lap_number": 14, "pit_out_time": 1678026600.0
            })),
            record(json!({"driver_number": 16, "lap_number": 14, "pit_in_time": "soon"})),
            record(json!({"driver_number": 55})),
        ];
        let (laps, stats) = normalize_laps(records);
        assert_eq!(stats.accepted, 3);
        assert_eq!(stats.skipped, 1);
        assert!(laps[0].has_pit_stop());
        assert!(laps[1].has_pit_stop());
        assert!(!laps[2].has_pit_stop());
        assert_eq!(laps[0].lap_duration, Some(96.2));
    }

    #[test]
    fn session_keys_accept_numbers() {
        let session = session_from_record(&record(json!({
            "session_key": 7953,
            "session_name": "Race",
            "session_type": "Race",
            "country_name": "Bahrain",
            "year": 2023
        })))
        .unwrap();
        assert_eq!(session.session_key, "7953");
        assert!(session.is_race());
        assert_eq!(session.date_start, "");
        assert!(session_from_record(&record(json!({"session_name": "Race"}))).is_none());
    }
}
