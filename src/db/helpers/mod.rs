use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};

/// Storage timestamps are written by SQLite as `YYYY-MM-DDTHH:MM:SS.SSSZ`.
pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field} '{value}'"))
}

/// Day key matching the `recorded_at` prefix.
pub fn day_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
