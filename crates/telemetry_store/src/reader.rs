//! Read-only connection pool and query primitives
//!
//! Reads run on the blocking thread pool with their own connections, so a
//! long ingest transaction on the writer never blocks them (WAL mode).

use std::path::PathBuf;
use std::sync::Mutex;

use contracts::{
    ContractError, LapRecord, PositionSample, SampleSource, SessionMetadata, SessionRecord,
    TelemetrySample,
};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};

use crate::error::{Result, StoreError};
use crate::schema;

/// Pool of idle read-only connections
pub(crate) struct ReaderPool {
    path: PathBuf,
    idle: Mutex<Vec<Connection>>,
    max_idle: usize,
}

impl ReaderPool {
    pub(crate) fn new(path: PathBuf, max_idle: usize) -> Self {
        Self {
            path,
            idle: Mutex::new(Vec::with_capacity(max_idle)),
            max_idle: max_idle.max(1),
        }
    }

    /// Run `op` against a pooled connection, returning it to the pool afterwards
    pub(crate) fn with_reader<T, E>(
        &self,
        op: impl FnOnce(&StoreReader<'_>) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let pooled = self.idle.lock().ok().and_then(|mut idle| idle.pop());
        let conn = match pooled {
            Some(conn) => conn,
            None => self.open()?,
        };
        let result = op(&StoreReader { conn: &conn });
        self.release(conn);
        result
    }

    fn open(&self) -> Result<Connection> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_NO_MUTEX
            | OpenFlags::SQLITE_OPEN_URI;
        let conn = Connection::open_with_flags(&self.path, flags)
            .map_err(|e| StoreError::open(self.path.display().to_string(), e))?;
        schema::init_reader(&conn)?;
        Ok(conn)
    }

    fn release(&self, conn: Connection) {
        if let Ok(mut idle) = self.idle.lock() {
            if idle.len() < self.max_idle {
                idle.push(conn);
            }
        }
    }
}

/// Read-only view of the store backed by one pooled connection
pub struct StoreReader<'c> {
    conn: &'c Connection,
}

/// Row counts of one session across the three telemetry tables
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowCounts {
    pub positions: u64,
    pub telemetry: u64,
    pub laps: u64,
}

/// Session row plus its ordered laps
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineRows {
    pub session: SessionRecord,
    /// Ordered by lap number, driver number, then insertion order
    pub laps: Vec<LapRecord>,
    /// Highest lap number (0 if no laps)
    pub total_laps: u32,
}

impl StoreReader<'_> {
    /// Whether a session row is present
    pub fn session_exists(&self, session_key: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM sessions WHERE session_key = ?1",
                params![session_key],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Session row, if present
    pub fn session(&self, session_key: &str) -> Result<Option<SessionRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT session_name, session_type, country_name, year, date_start, date_end, total_laps
                 FROM sessions WHERE session_key = ?1",
                params![session_key],
                |row| {
                    Ok(SessionRecord {
                        session_key: session_key.to_string(),
                        metadata: SessionMetadata {
                            session_name: row.get(0)?,
                            session_type: row.get(1)?,
                            country_name: row.get(2)?,
                            year: row.get(3)?,
                            date_start: row.get(4)?,
                            date_end: row.get(5)?,
                            total_laps: row.get(6)?,
                        },
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    /// Laps of a session, ordered by lap, driver, then insertion
    pub fn laps(&self, session_key: &str) -> Result<Vec<LapRecord>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT driver_number, lap_number, lap_duration, sector_1_duration, sector_2_duration,
                    sector_3_duration, pit_in_time, pit_out_time
             FROM lap_times WHERE session_key = ?1
             ORDER BY lap_number, driver_number, id",
        )?;
        let laps = stmt
            .query_map(params![session_key], |row| {
                Ok(LapRecord {
                    driver_number: row.get(0)?,
                    lap_number: row.get(1)?,
                    lap_duration: row.get(2)?,
                    sector_1_duration: row.get(3)?,
                    sector_2_duration: row.get(4)?,
                    sector_3_duration: row.get(5)?,
                    pit_in_time: row.get(6)?,
                    pit_out_time: row.get(7)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(laps)
    }

    /// Session row with ordered laps, `None` when the session is unknown
    pub fn timeline_rows(&self, session_key: &str) -> Result<Option<TimelineRows>> {
        let Some(session) = self.session(session_key)? else {
            return Ok(None);
        };
        let laps = self.laps(session_key)?;
        let total_laps = laps.iter().map(|l| l.lap_number).max().unwrap_or(0);
        Ok(Some(TimelineRows {
            session,
            laps,
            total_laps,
        }))
    }

    /// Row counts of a session
    pub fn row_counts(&self, session_key: &str) -> Result<RowCounts> {
        let count = |table: &str| -> Result<u64> {
            let sql = format!("SELECT COUNT(*) FROM {table} WHERE session_key = ?1");
            let n: i64 = self.conn.query_row(&sql, params![session_key], |row| row.get(0))?;
            Ok(n as u64)
        };
        Ok(RowCounts {
            positions: count("position_data")?,
            telemetry: count("car_data")?,
            laps: count("lap_times")?,
        })
    }

    fn max_position_timestamp_inner(&self, session_key: &str) -> Result<Option<f64>> {
        let max: Option<f64> = self.conn.query_row(
            "SELECT MAX(timestamp) FROM position_data WHERE session_key = ?1",
            params![session_key],
            |row| row.get(0),
        )?;
        Ok(max)
    }

    fn positions_near_inner(
        &self,
        session_key: &str,
        t: f64,
        tolerance: f64,
    ) -> Result<Vec<PositionSample>> {
        // Range predicate uses the (session_key, timestamp) index, ABS keeps it strict
        let mut stmt = self.conn.prepare_cached(
            "SELECT driver_number, timestamp, position FROM position_data
             WHERE session_key = ?1
               AND timestamp > ?2 - ?3 AND timestamp < ?2 + ?3
               AND ABS(timestamp - ?2) < ?3
             ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![session_key, t, tolerance], position_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn latest_positions_inner(&self, session_key: &str, t: f64) -> Result<Vec<PositionSample>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT driver_number, timestamp, position FROM (
                 SELECT driver_number, timestamp, position,
                        ROW_NUMBER() OVER (
                            PARTITION BY driver_number ORDER BY timestamp DESC, id ASC
                        ) AS rn
                 FROM position_data
                 WHERE session_key = ?1 AND timestamp <= ?2
             )
             WHERE rn = 1
             ORDER BY position, driver_number",
        )?;
        let rows = stmt
            .query_map(params![session_key, t], position_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn telemetry_near_inner(
        &self,
        session_key: &str,
        driver_number: u32,
        t: f64,
        window: f64,
    ) -> Result<Option<TelemetrySample>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT driver_number, timestamp, speed, gear, throttle, brake, rpm, drs FROM car_data
             WHERE session_key = ?1 AND driver_number = ?2
               AND timestamp > ?3 - ?4 AND timestamp < ?3 + ?4
               AND ABS(timestamp - ?3) < ?4
             ORDER BY ABS(timestamp - ?3), id
             LIMIT 1",
        )?;
        let sample = stmt
            .query_row(params![session_key, driver_number, t, window], |row| {
                Ok(TelemetrySample {
                    driver_number: row.get(0)?,
                    timestamp: row.get(1)?,
                    speed: row.get(2)?,
                    gear: row.get(3)?,
                    throttle: row.get(4)?,
                    brake: row.get(5)?,
                    rpm: row.get(6)?,
                    drs: row.get(7)?,
                })
            })
            .optional()?;
        Ok(sample)
    }
}

fn position_from_row(row: &Row<'_>) -> rusqlite::Result<PositionSample> {
    Ok(PositionSample {
        driver_number: row.get(0)?,
        timestamp: row.get(1)?,
        position: row.get(2)?,
    })
}

impl SampleSource for StoreReader<'_> {
    fn max_position_timestamp(&self, session_key: &str) -> Result<Option<f64>, ContractError> {
        Ok(self.max_position_timestamp_inner(session_key)?)
    }

    fn positions_near(
        &self,
        session_key: &str,
        t: f64,
        tolerance: f64,
    ) -> Result<Vec<PositionSample>, ContractError> {
        Ok(self.positions_near_inner(session_key, t, tolerance)?)
    }

    fn latest_positions_at_or_before(
        &self,
        session_key: &str,
        t: f64,
    ) -> Result<Vec<PositionSample>, ContractError> {
        Ok(self.latest_positions_inner(session_key, t)?)
    }

    fn telemetry_near(
        &self,
        session_key: &str,
        driver_number: u32,
        t: f64,
        window: f64,
    ) -> Result<Option<TelemetrySample>, ContractError> {
        Ok(self.telemetry_near_inner(session_key, driver_number, t, window)?)
    }
}
