use std::io;

use crate::db::StoredReading;

pub const CSV_HEADER: [&str; 3] = ["Fecha y Hora", "Corriente (A)", "Potencia (W)"];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Writes the header and one row per reading, in the order given.
/// Returns the number of data rows written.
pub fn write_readings<W: io::Write>(
    writer: W,
    readings: &[StoredReading],
) -> Result<usize, csv::Error> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(CSV_HEADER)?;
    for reading in readings {
        csv.write_record([
            reading.recorded_at.format(TIMESTAMP_FORMAT).to_string(),
            format_value(reading.current),
            format_value(reading.power),
        ])?;
    }
    csv.flush()?;
    Ok(readings.len())
}

// Debug formatting keeps a trailing `.0` on whole numbers.
fn format_value(value: f64) -> String {
    format!("{value:?}")
}
