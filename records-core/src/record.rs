use chrono::{NaiveDateTime, Timelike, Utc};
use uuid::Uuid;

use crate::error::RecordError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: Uuid,
    pub created_at: NaiveDateTime,
}

impl Record {
    /// A new record stamped with the current UTC time.
    ///
    /// The timestamp is truncated to microseconds, the precision PostgreSQL
    /// keeps for `timestamp` columns, so a read returns exactly what was
    /// inserted.
    pub fn new() -> Self {
        let now = Utc::now().naive_utc();
        let micros = now.nanosecond() / 1_000 * 1_000;
        Self {
            id: Uuid::new_v4(),
            created_at: now.with_nanosecond(micros).unwrap_or(now),
        }
    }

    pub fn id_string(&self) -> String {
        self.id.hyphenated().to_string()
    }

    /// ISO-8601 without zone suffix; fractional seconds only when non-zero.
    pub fn created_at_string(&self) -> String {
        format_timestamp(&self.created_at)
    }
}

impl Default for Record {
    fn default() -> Self {
        Self::new()
    }
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    if ts.nanosecond() == 0 {
        ts.format("%Y-%m-%dT%H:%M:%S").to_string()
    } else {
        ts.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
    }
}

/// Parses the textual timestamps the store hands back
/// (`2024-01-01 00:00:00.123` or `2024-01-01T00:00:00`).
pub fn parse_timestamp(text: &str) -> Result<NaiveDateTime, RecordError> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f"))
        .map_err(|e| RecordError::Execution(format!("unexpected timestamp {text:?}: {e}")))
}

/// Canonical lowercase hyphenated form of a store-returned identifier.
pub fn parse_id(text: &str) -> Result<Uuid, RecordError> {
    Uuid::parse_str(text.trim())
        .map_err(|e| RecordError::Execution(format!("unexpected id {text:?}: {e}")))
}
