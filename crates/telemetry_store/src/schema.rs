//! SQLite schema and connection setup

use std::time::Duration;

use rusqlite::Connection;

/// How long a connection waits on a locked database before failing
pub(crate) const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sessions (
    session_key TEXT PRIMARY KEY,
    session_name TEXT NOT NULL,
    session_type TEXT NOT NULL,
    country_name TEXT NOT NULL,
    year INTEGER NOT NULL,
    date_start TEXT NOT NULL DEFAULT '',
    date_end TEXT NOT NULL DEFAULT '',
    total_laps INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS position_data (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_key TEXT NOT NULL,
    driver_number INTEGER NOT NULL,
    timestamp REAL NOT NULL,
    position INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS car_data (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_key TEXT NOT NULL,
    driver_number INTEGER NOT NULL,
    timestamp REAL NOT NULL,
    speed REAL,
    gear INTEGER,
    throttle REAL,
    brake REAL,
    rpm INTEGER,
    drs INTEGER
);

CREATE TABLE IF NOT EXISTS lap_times (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_key TEXT NOT NULL,
    driver_number INTEGER NOT NULL,
    lap_number INTEGER NOT NULL,
    lap_duration REAL,
    sector_1_duration REAL,
    sector_2_duration REAL,
    sector_3_duration REAL,
    pit_in_time REAL,
    pit_out_time REAL
);

CREATE INDEX IF NOT EXISTS idx_position_session_time ON position_data (session_key, timestamp);
CREATE INDEX IF NOT EXISTS idx_position_driver_time ON position_data (driver_number, timestamp);
CREATE INDEX IF NOT EXISTS idx_car_session_time ON car_data (session_key, timestamp);
CREATE INDEX IF NOT EXISTS idx_car_driver_time ON car_data (driver_number, timestamp);
CREATE INDEX IF NOT EXISTS idx_lap_session_lap ON lap_times (session_key, lap_number);
CREATE INDEX IF NOT EXISTS idx_lap_driver_lap ON lap_times (driver_number, lap_number);
";

/// Configure the write connection and create tables if missing
pub(crate) fn init_writer(conn: &Connection) -> rusqlite::Result<()> {
    // journal_mode returns the resulting mode as a row
    let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    tracing::debug!(journal_mode = %mode, "Store journal mode set");
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch(SCHEMA)
}

/// Configure a read-only connection
pub(crate) fn init_reader(conn: &Connection) -> rusqlite::Result<()> {
    conn.busy_timeout(BUSY_TIMEOUT)
}
