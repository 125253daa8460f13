use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};

use crate::db::{
    connection::Database,
    helpers::{day_key, parse_datetime},
    models::{DeviceId, StoredReading},
};

const INSERT_READING: &str =
    "INSERT INTO readings (current, power, device_id) VALUES (?1, ?2, ?3)";

fn row_to_reading(row: &Row) -> Result<StoredReading> {
    let recorded_at: String = row.get("recorded_at")?;

    Ok(StoredReading {
        id: row.get("id")?,
        recorded_at: parse_datetime(&recorded_at, "recorded_at")?,
        current: row.get("current")?,
        power: row.get("power")?,
        device_id: row.get("device_id")?,
    })
}

/// Full history of one device in storage order. Shared by the interactive
/// worker and the export thread, which runs it on its own connection.
pub(crate) fn select_device_history(
    conn: &Connection,
    device_id: DeviceId,
) -> Result<Vec<StoredReading>> {
    let mut stmt = conn.prepare(
        "SELECT id, recorded_at, current, power, device_id
         FROM readings
         WHERE device_id = ?1
         ORDER BY recorded_at ASC, id ASC",
    )?;
    let mut rows = stmt.query(params![device_id])?;
    let mut readings = Vec::new();
    while let Some(row) = rows.next()? {
        readings.push(row_to_reading(row)?);
    }
    Ok(readings)
}

impl Database {
    /// Inserts one reading and waits for the row id.
    pub async fn insert_reading(
        &self,
        current: f64,
        power: f64,
        device_id: Option<DeviceId>,
    ) -> Result<i64> {
        self.execute(move |conn| {
            conn.execute(INSERT_READING, params![current, power, device_id])
                .with_context(|| "failed to insert reading")?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// Queues one reading insert without waiting for it to land.
    pub fn enqueue_reading(&self, current: f64, power: f64, device_id: DeviceId) -> Result<()> {
        self.submit("reading insert", move |conn| {
            conn.execute(INSERT_READING, params![current, power, device_id])?;
            Ok(())
        })
    }

    pub async fn readings_for_device(&self, device_id: DeviceId) -> Result<Vec<StoredReading>> {
        self.execute(move |conn| select_device_history(conn, device_id))
            .await
    }

    /// Readings of `device_id` whose storage timestamp falls on `date` (UTC).
    pub async fn readings_for_device_on(
        &self,
        device_id: DeviceId,
        date: NaiveDate,
    ) -> Result<Vec<StoredReading>> {
        let day = day_key(date);
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, recorded_at, current, power, device_id
                 FROM readings
                 WHERE device_id = ?1 AND substr(recorded_at, 1, 10) = ?2
                 ORDER BY recorded_at ASC, id ASC",
            )?;
            let mut rows = stmt.query(params![device_id, day])?;
            let mut readings = Vec::new();
            while let Some(row) = rows.next()? {
                readings.push(row_to_reading(row)?);
            }
            Ok(readings)
        })
        .await
    }

    /// `[current, power]` pairs of every reading attached to some device.
    pub async fn attributed_samples(&self) -> Result<Vec<[f64; 2]>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT current, power FROM readings
                 WHERE device_id IS NOT NULL
                 ORDER BY id ASC",
            )?;
            let samples = stmt
                .query_map([], |row| Ok([row.get::<_, f64>(0)?, row.get::<_, f64>(1)?]))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(samples)
        })
        .await
    }
}
