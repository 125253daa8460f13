use std::{io, sync::Arc, time::Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    db::DeviceId,
    series::{PlotProjection, Reading, SeriesBuffer, SharedSeries},
};

use super::{
    link::{DeviceLink, LineAssembler, LineError},
    parser::{parse_line, Measurement},
    sink::ReadingSink,
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

const READ_CHUNK: usize = 512;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum MonitorStatus {
    #[default]
    Idle,
    Polling,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MonitorError {
    #[error("no device connected")]
    NotConnected,
    #[error("monitoring already active (session {0})")]
    AlreadyPolling(String),
}

/// One start/stop cycle: the device it is attributed to and its buffer.
pub struct Session {
    pub id: String,
    pub device_id: Option<DeviceId>,
    pub started_at: DateTime<Utc>,
    origin: Instant,
    series: SharedSeries,
}

impl Session {
    fn new(device_id: Option<DeviceId>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            device_id,
            started_at: Utc::now(),
            origin: Instant::now(),
            series: SeriesBuffer::shared(),
        }
    }

    /// Seconds since the session started; every session restarts at zero.
    pub fn elapsed_secs(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }

    pub fn series(&self) -> SharedSeries {
        Arc::clone(&self.series)
    }

    pub fn projection(&self) -> PlotProjection {
        PlotProjection::new(self.series())
    }

    pub fn len(&self) -> usize {
        match self.series.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn summary(&self) -> String {
        format!(
            "Session {} started {} captured {} readings",
            self.id,
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.len()
        )
    }
}

/// What one tick did with the lines it found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    pub lines: usize,
    pub accepted: usize,
    pub skipped: usize,
    pub rejected: usize,
    pub persist_failures: usize,
}

/// The ingestion state machine: `Idle -> Polling -> Idle`.
///
/// The monitor owns the device handle and the active [`Session`]. Each
/// [`Monitor::tick`] drains whatever the device has buffered, parses
/// complete lines, appends readings and forwards them to the sink.
pub struct Monitor {
    status: MonitorStatus,
    session: Option<Session>,
    link: Option<Box<dyn DeviceLink>>,
    assembler: LineAssembler,
    sink: Arc<dyn ReadingSink>,
}

impl Monitor {
    pub fn new(sink: Arc<dyn ReadingSink>) -> Self {
        Self {
            status: MonitorStatus::Idle,
            session: None,
            link: None,
            assembler: LineAssembler::new(),
            sink,
        }
    }

    pub fn status(&self) -> MonitorStatus {
        self.status
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// True while polling with a usable device handle.
    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    pub fn start(
        &mut self,
        link: Option<Box<dyn DeviceLink>>,
        device_id: Option<DeviceId>,
    ) -> Result<&Session, MonitorError> {
        if let Some(session) = &self.session {
            return Err(MonitorError::AlreadyPolling(session.id.clone()));
        }
        let link = link.ok_or(MonitorError::NotConnected)?;

        log_info!(
            "Monitoring started on {} for device {:?}",
            link.describe(),
            device_id
        );

        self.link = Some(link);
        self.assembler.clear();
        self.status = MonitorStatus::Polling;
        Ok(self.session.insert(Session::new(device_id)))
    }

    /// Returns to `Idle` and releases the device. Calling it while idle is a
    /// no-op that returns `None`.
    pub fn stop(&mut self) -> Option<Session> {
        self.status = MonitorStatus::Idle;
        self.link = None;
        self.assembler.clear();

        let session = self.session.take()?;
        log_info!(
            "Monitoring stopped for session {} after {} readings",
            session.id,
            session.len()
        );
        Some(session)
    }

    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();
        if self.status != MonitorStatus::Polling {
            return report;
        }

        for line in self.drain() {
            report.lines += 1;
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    log_warn!("Discarding device input: {err}");
                    report.rejected += 1;
                    continue;
                }
            };

            match parse_line(&line) {
                Ok(Some(measurement)) => {
                    report.accepted += 1;
                    if !self.accept(measurement) {
                        report.persist_failures += 1;
                    }
                }
                Ok(None) => report.skipped += 1,
                Err(err) => {
                    log_warn!("Discarding malformed device line: {err}");
                    report.rejected += 1;
                }
            }
        }

        report
    }

    /// Pulls every buffered byte off the link and returns the completed
    /// lines. A failing link is dropped; later ticks see no input.
    fn drain(&mut self) -> Vec<Result<String, LineError>> {
        let Some(link) = self.link.as_mut() else {
            return Vec::new();
        };

        let mut lines = Vec::new();
        let mut buf = [0u8; READ_CHUNK];
        loop {
            let available = match link.bytes_available() {
                Ok(0) => break,
                Ok(count) => count,
                Err(err) => {
                    log_error!("Device link lost: {err}; idling until restarted");
                    self.link = None;
                    break;
                }
            };

            let want = available.min(buf.len());
            match link.read_available(&mut buf[..want]) {
                Ok(0) => break,
                Ok(read) => {
                    lines.extend(self.assembler.push(&buf[..read]));
                }
                Err(err)
                    if matches!(
                        err.kind(),
                        io::ErrorKind::TimedOut
                            | io::ErrorKind::WouldBlock
                            | io::ErrorKind::Interrupted
                    ) =>
                {
                    break;
                }
                Err(err) => {
                    log_error!("Device read failed: {err}; idling until restarted");
                    self.link = None;
                    break;
                }
            }
        }

        lines
    }

    /// Appends to the buffer, then hands the values to the sink. Returns
    /// false when the sink refused; the in-memory append stands regardless.
    fn accept(&mut self, measurement: Measurement) -> bool {
        let Some(session) = self.session.as_ref() else {
            return true;
        };

        let reading = Reading {
            timestamp: session.elapsed_secs(),
            current: measurement.current,
            power: measurement.power,
        };
        match session.series.write() {
            Ok(mut guard) => guard.append(reading),
            Err(poisoned) => poisoned.into_inner().append(reading),
        }

        let Some(device_id) = session.device_id else {
            return true;
        };
        match self.sink.record(reading.current, reading.power, device_id) {
            Ok(()) => true,
            Err(err) => {
                log_error!("Failed to persist reading for device {device_id}: {err}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensing::{
        link::{testing::ScriptedLink, MAX_LINE_LEN},
        sink::testing::RecordingSink,
    };

    fn monitor_with(sink: Arc<RecordingSink>) -> Monitor {
        Monitor::new(sink)
    }

    fn started(device_id: Option<DeviceId>) -> (Monitor, ScriptedLink, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let mut monitor = monitor_with(sink.clone());
        let link = ScriptedLink::new();
        monitor
            .start(Some(Box::new(link.clone())), device_id)
            .unwrap();
        (monitor, link, sink)
    }

    fn buffer_of(monitor: &Monitor) -> SeriesBuffer {
        monitor.session().unwrap().series().read().unwrap().clone()
    }

    #[test]
    fn one_tick_ingests_valid_lines_and_skips_noise() {
        let (mut monitor, link, sink) = started(Some(3));
        link.feed("Irms:1.20A,Potencia:5.40W\nnoise\nIrms:1.25A,Potencia:5.60W\n");

        let report = monitor.tick();

        assert_eq!(report.lines, 3);
        assert_eq!(report.accepted, 2);
        assert_eq!(report.skipped, 1);
        let buffer = buffer_of(&monitor);
        assert_eq!(buffer.currents(), &[1.20, 1.25]);
        assert_eq!(buffer.powers(), &[5.40, 5.60]);
        assert!(buffer.times()[0] <= buffer.times()[1]);
        assert_eq!(sink.calls(), vec![(1.20, 5.40, 3), (1.25, 5.60, 3)]);
    }

    #[test]
    fn start_without_handle_is_not_connected() {
        let mut monitor = monitor_with(Arc::new(RecordingSink::default()));
        assert!(matches!(
            monitor.start(None, Some(1)),
            Err(MonitorError::NotConnected)
        ));
        assert_eq!(monitor.status(), MonitorStatus::Idle);
    }

    #[test]
    fn second_start_is_rejected() {
        let (mut monitor, _link, _sink) = started(None);
        let again = monitor.start(Some(Box::new(ScriptedLink::new())), None);
        assert!(matches!(again, Err(MonitorError::AlreadyPolling(_))));
    }

    #[test]
    fn stop_twice_is_harmless() {
        let (mut monitor, _link, _sink) = started(Some(1));
        assert!(monitor.stop().is_some());
        assert!(monitor.stop().is_none());
        assert_eq!(monitor.status(), MonitorStatus::Idle);
        assert!(!monitor.is_connected());
    }

    #[test]
    fn malformed_lines_do_not_stop_polling() {
        let (mut monitor, link, _sink) = started(None);
        link.feed("Irms:xA,Potencia:5W\n");
        link.feed_bytes(b"\xff\xfe\n");
        link.feed("Irms:0.5A,Potencia:2.5W\n");

        let report = monitor.tick();
        assert_eq!(report.rejected, 2);
        assert_eq!(report.accepted, 1);
        assert_eq!(monitor.status(), MonitorStatus::Polling);
        assert_eq!(buffer_of(&monitor).currents(), &[0.5]);
    }

    #[test]
    fn partial_line_waits_for_next_tick() {
        let (mut monitor, link, _sink) = started(None);
        link.feed("Irms:1.0A,Pot");
        assert_eq!(monitor.tick().accepted, 0);

        link.feed("encia:4.0W\n");
        assert_eq!(monitor.tick().accepted, 1);
        assert_eq!(buffer_of(&monitor).powers(), &[4.0]);
    }

    #[test]
    fn unterminated_noise_is_bounded_and_polling_recovers() {
        let (mut monitor, link, _sink) = started(None);
        link.feed_bytes(&vec![b'x'; 5 * MAX_LINE_LEN]);

        let report = monitor.tick();
        assert!(report.rejected >= 1);
        assert_eq!(report.accepted, 0);
        assert!(monitor.assembler.pending_len() <= MAX_LINE_LEN);
        assert_eq!(link.remaining(), 0);

        link.feed("\nIrms:1.0A,Potencia:2.0W\n");
        let report = monitor.tick();
        assert_eq!(report.accepted, 1);
        assert_eq!(report.rejected, 0);
        assert_eq!(buffer_of(&monitor).currents(), &[1.0]);
    }

    #[test]
    fn summary_reports_start_time_and_count() {
        let (mut monitor, link, _sink) = started(Some(2));
        link.feed("Irms:1.0A,Potencia:4.0W\n");
        monitor.tick();
        let session = monitor.stop().unwrap();

        let summary = session.summary();
        let started = session.started_at.format("%Y-%m-%d %H:%M:%S").to_string();
        assert!(summary.contains(&session.id));
        assert!(summary.contains(&started));
        assert!(summary.ends_with("captured 1 readings"));
    }

    #[test]
    fn without_device_nothing_is_persisted() {
        let (mut monitor, link, sink) = started(None);
        link.feed("Irms:1.0A,Potencia:4.0W\n");
        monitor.tick();
        assert_eq!(buffer_of(&monitor).len(), 1);
        assert!(sink.calls().is_empty());
    }

    #[test]
    fn sink_failure_keeps_the_in_memory_reading() {
        let sink = Arc::new(RecordingSink::failing());
        let mut monitor = monitor_with(sink.clone());
        let link = ScriptedLink::new();
        monitor.start(Some(Box::new(link.clone())), Some(7)).unwrap();
        link.feed("Irms:2.0A,Potencia:9.0W\n");

        let report = monitor.tick();
        assert_eq!(report.persist_failures, 1);
        assert_eq!(buffer_of(&monitor).len(), 1);
        assert_eq!(sink.calls().len(), 1);
    }

    #[test]
    fn lost_link_degrades_ticks_to_noops() {
        let (mut monitor, link, _sink) = started(None);
        link.feed("Irms:1.0A,Potencia:4.0W\n");
        monitor.tick();

        link.disconnect();
        assert_eq!(monitor.tick(), TickReport::default());
        assert!(!monitor.is_connected());
        assert_eq!(monitor.status(), MonitorStatus::Polling);
        assert_eq!(monitor.tick(), TickReport::default());
        assert_eq!(buffer_of(&monitor).len(), 1);
    }

    #[test]
    fn restart_begins_a_fresh_session() {
        let (mut monitor, link, _sink) = started(Some(1));
        link.feed("Irms:1.0A,Potencia:4.0W\n");
        monitor.tick();
        let first = monitor.stop().unwrap();

        let link = ScriptedLink::new();
        monitor.start(Some(Box::new(link.clone())), Some(1)).unwrap();
        let second = monitor.session().unwrap();
        assert_ne!(first.id, second.id);
        assert!(second.is_empty());
        assert!(second.elapsed_secs() < 5.0);
    }

    #[test]
    fn idle_tick_reads_nothing() {
        let sink = Arc::new(RecordingSink::default());
        let mut monitor = monitor_with(sink);
        assert_eq!(monitor.tick(), TickReport::default());
    }
}
