use std::{
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
    thread,
};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::oneshot::{self, error::TryRecvError};

use crate::db::{repositories::select_device_history, Database, DeviceId};

use super::csv_writer::write_readings;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("an export is already in progress")]
    Busy,
    #[error("could not read history: {0}")]
    Query(String),
    #[error("could not write {}: {message}", path.display())]
    Write { path: PathBuf, message: String },
    #[error("export worker failed to start: {0}")]
    Spawn(String),
    #[error("export worker exited without reporting")]
    WorkerLost,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub device_id: DeviceId,
    pub path: PathBuf,
    pub rows: usize,
}

type ExportOutcome = Result<ExportSummary, ExportError>;

/// Reads the full history of `device_id` through a fresh connection and
/// writes it to `out` as CSV. The query runs before the file is created, so
/// a storage failure leaves no file behind.
pub fn export_device_history(
    db: &Database,
    device_id: DeviceId,
    out: &Path,
) -> ExportOutcome {
    let conn = db
        .open_reader()
        .map_err(|err| ExportError::Query(format!("{err:#}")))?;
    let readings = select_device_history(&conn, device_id)
        .map_err(|err| ExportError::Query(format!("{err:#}")))?;
    drop(conn);

    let write_error = |message: String| ExportError::Write {
        path: out.to_path_buf(),
        message,
    };
    let file = File::create(out).map_err(|err| write_error(err.to_string()))?;
    let rows = write_readings(BufWriter::new(file), &readings)
        .map_err(|err| write_error(err.to_string()))?;

    Ok(ExportSummary {
        device_id,
        path: out.to_path_buf(),
        rows,
    })
}

/// Completion side of one background export.
pub struct ExportHandle {
    receiver: oneshot::Receiver<ExportOutcome>,
}

impl ExportHandle {
    /// Spawns the export thread and returns immediately.
    pub fn spawn(db: Database, device_id: DeviceId, out: PathBuf) -> Result<Self, ExportError> {
        let (done_tx, done_rx) = oneshot::channel();

        thread::Builder::new()
            .name("wattwatch-export".into())
            .spawn(move || {
                log_info!("Exporting device {device_id} history to {}", out.display());
                let outcome = export_device_history(&db, device_id, &out);
                match &outcome {
                    Ok(summary) => log_info!(
                        "Export of device {device_id} finished: {} rows",
                        summary.rows
                    ),
                    Err(err) => log_error!("Export of device {device_id} failed: {err}"),
                }
                if done_tx.send(outcome).is_err() {
                    log_error!("Export result dropped; nobody was waiting");
                }
            })
            .map_err(|err| ExportError::Spawn(err.to_string()))?;

        Ok(Self { receiver: done_rx })
    }

    /// Non-blocking check. `None` while the export is still running.
    pub fn try_result(&mut self) -> Option<ExportOutcome> {
        match self.receiver.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(ExportError::WorkerLost)),
        }
    }

    pub async fn wait(self) -> ExportOutcome {
        self.receiver.await.unwrap_or(Err(ExportError::WorkerLost))
    }
}

/// Runs at most one export at a time. A new export is refused until the
/// previous one's completion has been observed through `poll` or `finish`.
pub struct Exporter {
    db: Database,
    pending: Option<ExportHandle>,
}

impl Exporter {
    pub fn new(db: Database) -> Self {
        Self { db, pending: None }
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    pub fn start(&mut self, device_id: DeviceId, out: PathBuf) -> Result<(), ExportError> {
        if self.pending.is_some() {
            return Err(ExportError::Busy);
        }
        self.pending = Some(ExportHandle::spawn(self.db.clone(), device_id, out)?);
        Ok(())
    }

    /// Returns the completion message once, then frees the exporter.
    pub fn poll(&mut self) -> Option<ExportOutcome> {
        let outcome = self.pending.as_mut()?.try_result()?;
        self.pending = None;
        Some(outcome)
    }

    /// Waits for the pending export, if any.
    pub async fn finish(&mut self) -> Option<ExportOutcome> {
        let handle = self.pending.take()?;
        Some(handle.wait().await)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rusqlite::params;

    use super::*;

    async fn seeded_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("export.sqlite3")).unwrap();
        for name in ["Lampara", "Televisor", "Refrigerador"] {
            db.create_device(name.into()).await.unwrap();
        }
        db.execute(|conn| {
            for (at, current, power, device) in [
                ("2024-05-01T10:00:01.000Z", 1.1, 5.2, 3),
                ("2024-05-01T10:00:00.000Z", 1.0, 5.0, 3),
                ("2024-05-01T10:00:00.500Z", 7.0, 7.0, 1),
            ] {
                conn.execute(
                    "INSERT INTO readings (recorded_at, current, power, device_id)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![at, current, power, device],
                )?;
            }
            Ok(())
        })
        .await
        .unwrap();
        (dir, db)
    }

    #[tokio::test]
    async fn exports_device_history_in_timestamp_order() {
        let (dir, db) = seeded_db().await;
        let out = dir.path().join("device3.csv");
        let mut exporter = Exporter::new(db);

        exporter.start(3, out.clone()).unwrap();
        let summary = exporter.finish().await.unwrap().unwrap();

        assert_eq!(summary.rows, 2);
        let text = std::fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Fecha y Hora,Corriente (A),Potencia (W)",
                "2024-05-01 10:00:00.000,1.0,5.0",
                "2024-05-01 10:00:01.000,1.1,5.2",
            ]
        );
    }

    #[tokio::test]
    async fn second_export_is_refused_until_completion_is_seen() {
        let (dir, db) = seeded_db().await;
        let mut exporter = Exporter::new(db);

        exporter.start(3, dir.path().join("a.csv")).unwrap();
        assert!(matches!(
            exporter.start(3, dir.path().join("b.csv")),
            Err(ExportError::Busy)
        ));

        let outcome = loop {
            if let Some(outcome) = exporter.poll() {
                break outcome;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        };
        assert!(outcome.is_ok());
        assert!(!exporter.is_busy());
        exporter.start(3, dir.path().join("b.csv")).unwrap();
        assert!(exporter.finish().await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn write_failure_is_reported_through_completion() {
        let (dir, db) = seeded_db().await;
        let mut exporter = Exporter::new(db);
        let out = dir.path().join("missing").join("out.csv");

        exporter.start(3, out).unwrap();
        let outcome = exporter.finish().await.unwrap();
        assert!(matches!(outcome, Err(ExportError::Write { .. })));
    }

    #[tokio::test]
    async fn unknown_device_exports_header_only() {
        let (dir, db) = seeded_db().await;
        let out = dir.path().join("none.csv");
        let summary = ExportHandle::spawn(db, 99, out.clone())
            .unwrap()
            .wait()
            .await
            .unwrap();
        assert_eq!(summary.rows, 0);
        assert_eq!(std::fs::read_to_string(out).unwrap().lines().count(), 1);
    }

    #[tokio::test]
    async fn query_failure_leaves_no_file_behind() {
        let (dir, db) = seeded_db().await;
        db.execute(|conn| {
            conn.execute_batch("DROP TABLE readings")?;
            Ok(())
        })
        .await
        .unwrap();
        let out = dir.path().join("broken.csv");
        let mut exporter = Exporter::new(db);

        exporter.start(3, out.clone()).unwrap();
        let outcome = exporter.finish().await.unwrap();

        assert!(matches!(outcome, Err(ExportError::Query(_))));
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn finish_without_export_is_none() {
        let (_dir, db) = seeded_db().await;
        let mut exporter = Exporter::new(db);
        assert!(exporter.finish().await.is_none());
        assert!(exporter.poll().is_none());
    }
}
