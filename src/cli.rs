//! Command-line front end.

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use log::{info, warn};
use tokio::time::{self, MissedTickBehavior};

use crate::{
    anomaly::{analyze, AnalysisError, IsolationForest},
    db::{Database, DeviceId},
    export::Exporter,
    fleet::DeviceFleet,
    sensing::{list_ports, open_serial, DeviceLink, MonitorController},
    settings::{MonitorSettings, SettingsStore},
};

/// Serial power-sensor monitor with SQLite history
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Settings file (JSON); created with defaults on first update
    #[arg(long, default_value = "wattwatch.json")]
    pub settings: PathBuf,

    /// Serial port override, e.g. COM7 or /dev/ttyACM0
    #[arg(long)]
    pub port: Option<String>,

    /// Database file override
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Anomaly model override
    #[arg(long)]
    pub model: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List serial ports the OS exposes
    Ports,
    /// List registered appliances
    Devices,
    /// Register an appliance
    AddDevice { name: String },
    /// Stream readings from the sensor into the device's history
    Monitor {
        #[arg(long)]
        device: DeviceId,
        /// Stop after this many seconds instead of waiting for Ctrl-C
        #[arg(long)]
        seconds: Option<u64>,
    },
    /// Write a device's full history to a CSV file
    Export {
        #[arg(long)]
        device: DeviceId,
        #[arg(long)]
        out: PathBuf,
    },
    /// Show a device's readings for one day (UTC)
    History {
        #[arg(long)]
        device: DeviceId,
        /// YYYY-MM-DD
        #[arg(long)]
        date: NaiveDate,
    },
    /// Flag outliers across every attributed reading
    Analyze,
}

impl Cli {
    fn resolve_settings(&self) -> Result<MonitorSettings> {
        let store = SettingsStore::new(self.settings.clone())?;
        let mut settings = store.current();
        if let Some(port) = &self.port {
            settings.serial.port = port.clone();
        }
        if let Some(db) = &self.db {
            settings.database_path = db.clone();
        }
        if let Some(model) = &self.model {
            settings.model_path = model.clone();
        }
        Ok(settings)
    }
}

pub async fn execute(cli: Cli) -> Result<()> {
    let settings = cli.resolve_settings()?;

    if let Command::Ports = cli.command {
        let ports = list_ports()?;
        if ports.is_empty() {
            println!("No serial ports found");
        }
        for port in ports {
            println!("{port}");
        }
        return Ok(());
    }

    let db = Database::new(settings.database_path.clone())?;

    match cli.command {
        Command::Ports => Ok(()),
        Command::Devices => {
            for device in db.list_devices().await? {
                println!(
                    "{:>4}  {:<24} {}",
                    device.id,
                    device.name,
                    device.created_at.format("%Y-%m-%d %H:%M")
                );
            }
            Ok(())
        }
        Command::AddDevice { name } => {
            let device = db.create_device(name).await?;
            println!("Registered device {} ({})", device.id, device.name);
            Ok(())
        }
        Command::Monitor { device, seconds } => monitor(&settings, db, device, seconds).await,
        Command::Export { device, out } => {
            let mut exporter = Exporter::new(db);
            exporter.start(device, out)?;
            match exporter.finish().await {
                Some(Ok(summary)) => {
                    println!("Wrote {} rows to {}", summary.rows, summary.path.display());
                    Ok(())
                }
                Some(Err(err)) => Err(err.into()),
                None => Ok(()),
            }
        }
        Command::History { device, date } => {
            if db.get_device(device).await?.is_none() {
                bail!("device {device} is not registered");
            }
            let readings = db.readings_for_device_on(device, date).await?;
            if readings.is_empty() {
                println!("No readings for device {device} on {date}");
            }
            for reading in readings {
                println!(
                    "{}  {:>8.3} A  {:>9.3} W",
                    reading.recorded_at.format("%H:%M:%S%.3f"),
                    reading.current,
                    reading.power
                );
            }
            Ok(())
        }
        Command::Analyze => {
            let model = IsolationForest::load(&settings.model_path)?;
            match analyze(&db, &model).await {
                Ok(report) => {
                    println!("{:>10}  {:>10}  Estado", "Corriente", "Potencia");
                    for row in &report.rows {
                        println!("{:>10.3}  {:>10.3}  {}", row.current, row.power, row.label);
                    }
                    println!(
                        "{} readings, {} flagged",
                        report.rows.len(),
                        report.outlier_count()
                    );
                    Ok(())
                }
                Err(AnalysisError::NoData) => {
                    println!("No hay datos históricos disponibles.");
                    Ok(())
                }
                Err(err) => Err(err.into()),
            }
        }
    }
}

async fn monitor(
    settings: &MonitorSettings,
    db: Database,
    device_id: DeviceId,
    seconds: Option<u64>,
) -> Result<()> {
    let mut fleet = DeviceFleet::new(db.list_devices().await?);
    fleet.toggle(device_id);
    if !fleet.can_view(device_id) {
        bail!("device {device_id} is not registered");
    }

    let port = open_serial(&settings.serial)?;
    let link: Box<dyn DeviceLink> = Box::new(port);
    info!("Connected to {}", link.describe());

    let mut controller = MonitorController::new(Arc::new(db), settings.poll_interval());
    let series = controller.start(Some(link), Some(device_id)).await?;

    let deadline = async {
        match seconds {
            Some(limit) => time::sleep(Duration::from_secs(limit)).await,
            None => {
                if let Err(err) = tokio::signal::ctrl_c().await {
                    warn!("Ctrl-C handler unavailable: {err}");
                    std::future::pending::<()>().await;
                }
            }
        }
    };
    tokio::pin!(deadline);

    let mut report = time::interval(Duration::from_secs(1));
    report.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = report.tick() => {
                let last = match series.read() {
                    Ok(buffer) => buffer.last(),
                    Err(poisoned) => poisoned.into_inner().last(),
                };
                if let Some(reading) = last {
                    println!(
                        "t={:>8.3}s  {:>7.3} A  {:>8.3} W",
                        reading.timestamp, reading.current, reading.power
                    );
                }
            }
        }
    }

    let session = controller
        .stop()
        .await
        .context("failed to stop monitoring")?;
    if let Some(session) = session {
        println!("{}", session.summary());
    }
    Ok(())
}
