//! Session metadata

use serde::{Deserialize, Serialize};

/// Default display name when the caller does not provide one
pub const UNKNOWN_RACE: &str = "Unknown Race";

/// Default country when the caller does not provide one
pub const UNKNOWN_COUNTRY: &str = "Unknown";

/// Session row, written once per session key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Display name (e.g. "Race")
    pub session_name: String,
    /// Session type (e.g. "Race", "Qualifying")
    pub session_type: String,
    pub country_name: String,
    pub year: i32,
    /// Highest lap number seen at ingest
    pub total_laps: u32,
    /// Upstream start date string (may be empty)
    #[serde(default)]
    pub date_start: String,
    /// Upstream end date string (may be empty)
    #[serde(default)]
    pub date_end: String,
}

impl Default for SessionMetadata {
    fn default() -> Self {
        Self {
            session_name: UNKNOWN_RACE.to_string(),
            session_type: "Race".to_string(),
            country_name: UNKNOWN_COUNTRY.to_string(),
            year: 0,
            total_laps: 0,
            date_start: String::new(),
            date_end: String::new(),
        }
    }
}

/// Session listed by the upstream provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamSession {
    pub session_key: String,
    pub session_name: String,
    pub session_type: String,
    pub country_name: String,
    pub year: i32,
    pub date_start: String,
    pub date_end: String,
}

impl UpstreamSession {
    /// Whether this is a race (as opposed to practice/qualifying)
    pub fn is_race(&self) -> bool {
        self.session_type == "Race"
    }
}

/// Stored session row plus its key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_key: String,
    #[serde(flatten)]
    pub metadata: SessionMetadata,
}
