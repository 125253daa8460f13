//! Parser for the sensor's line protocol.
//!
//! The sketch on the board prints one line per sample:
//!
//! ```text
//! Irms:1.20A,Potencia:5.40W
//! ```
//!
//! Anything else it prints (boot banners, calibration chatter) is not a
//! sample and is skipped without complaint.

use thiserror::Error;

const CURRENT_MARKER: &str = "Irms";
const POWER_MARKER: &str = "Potencia";

/// Values carried by one sample line. The ingestion loop stamps it with a
/// session time to turn it into a [`crate::series::Reading`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub current: f64,
    pub power: f64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("expected `{expected}` field at position {position} in {line:?}")]
    Layout {
        expected: &'static str,
        position: usize,
        line: String,
    },
    #[error("invalid {field} value {text:?}")]
    Number { field: &'static str, text: String },
}

/// Parses one trimmed line.
///
/// `Ok(None)` when the line does not mention both markers. `Err` when it
/// does but the payload is malformed.
pub fn parse_line(line: &str) -> Result<Option<Measurement>, ParseError> {
    if !(line.contains(CURRENT_MARKER) && line.contains(POWER_MARKER)) {
        return Ok(None);
    }

    let parts: Vec<&str> = line.split(',').collect();
    if parts.len() < 2 {
        return Err(ParseError::Layout {
            expected: POWER_MARKER,
            position: 1,
            line: line.to_string(),
        });
    }

    let current = parse_field(parts[0], CURRENT_MARKER, 0, 'A', line)?;
    let power = parse_field(parts[1], POWER_MARKER, 1, 'W', line)?;

    Ok(Some(Measurement { current, power }))
}

fn parse_field(
    part: &str,
    marker: &'static str,
    position: usize,
    unit: char,
    line: &str,
) -> Result<f64, ParseError> {
    let layout_error = || ParseError::Layout {
        expected: marker,
        position,
        line: line.to_string(),
    };

    let (key, value) = part.split_once(':').ok_or_else(layout_error)?;
    if !key.contains(marker) {
        return Err(layout_error());
    }

    let value = value.trim();
    let number = value.strip_suffix(unit).unwrap_or(value).trim();
    number.parse::<f64>().map_err(|_| ParseError::Number {
        field: marker,
        text: value.to_string(),
    })
}
