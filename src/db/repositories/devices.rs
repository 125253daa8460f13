use anyhow::{anyhow, bail, Context, Result};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::parse_datetime,
    models::{Device, DeviceId},
};

fn row_to_device(row: &Row) -> Result<Device> {
    let created_at: String = row.get("created_at")?;

    Ok(Device {
        id: row.get("id")?,
        name: row.get("name")?,
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

impl Database {
    /// Registers a new appliance. Names are unique.
    pub async fn create_device(&self, name: String) -> Result<Device> {
        let name = name.trim().to_string();
        if name.is_empty() {
            bail!("device name must not be empty");
        }

        self.execute(move |conn| {
            conn.execute("INSERT INTO devices (name) VALUES (?1)", params![name])
                .with_context(|| format!("failed to insert device '{name}'"))?;

            let device_id = conn.last_insert_rowid();
            let mut stmt =
                conn.prepare("SELECT id, name, created_at FROM devices WHERE id = ?1")?;
            let mut rows = stmt.query(params![device_id])?;
            match rows.next()? {
                Some(row) => row_to_device(row),
                None => Err(anyhow!("Device not found after insert")),
            }
        })
        .await
    }

    pub async fn list_devices(&self) -> Result<Vec<Device>> {
        self.execute(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, name, created_at FROM devices ORDER BY id ASC")?;
            let mut rows = stmt.query([])?;
            let mut devices = Vec::new();
            while let Some(row) = rows.next()? {
                devices.push(row_to_device(row)?);
            }
            Ok(devices)
        })
        .await
    }

    pub async fn get_device(&self, device_id: DeviceId) -> Result<Option<Device>> {
        self.execute(move |conn| {
            conn.query_row(
                "SELECT id, name, created_at FROM devices WHERE id = ?1",
                params![device_id],
                |row| {
                    Ok((
                        row.get::<_, DeviceId>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?
            .map(|(id, name, created_at)| {
                Ok(Device {
                    id,
                    name,
                    created_at: parse_datetime(&created_at, "created_at")?,
                })
            })
            .transpose()
        })
        .await
    }
}
