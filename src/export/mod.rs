//! Bulk CSV export of a device's persisted history.
//!
//! Exports run on their own thread with their own read-only connection, so
//! a long history never stalls the polling loop or shares a cursor with the
//! database worker. Completion comes back as a single message.

mod csv_writer;
mod worker;

pub use csv_writer::{write_readings, CSV_HEADER};
pub use worker::{export_device_history, ExportError, ExportHandle, ExportSummary, Exporter};
