//! Byte-level access to the sensor and reassembly of its output into lines.

use std::io::{self, Read};

use anyhow::{Context, Result};
use serialport::SerialPort;
use thiserror::Error;

use crate::settings::SerialSettings;

/// A device handle the ingestion loop can drain without blocking.
pub trait DeviceLink: Send {
    /// Number of bytes already buffered and readable right now.
    fn bytes_available(&mut self) -> io::Result<usize>;

    /// Reads up to `buf.len()` of the buffered bytes.
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    fn describe(&self) -> String {
        "device".into()
    }
}

impl DeviceLink for Box<dyn SerialPort> {
    fn bytes_available(&mut self) -> io::Result<usize> {
        self.bytes_to_read()
            .map(|count| count as usize)
            .map_err(io::Error::from)
    }

    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read(buf)
    }

    fn describe(&self) -> String {
        self.name().unwrap_or_else(|| "serial port".into())
    }
}

/// Opens the configured serial port (8N1, no flow control).
pub fn open_serial(settings: &SerialSettings) -> Result<Box<dyn SerialPort>> {
    serialport::new(&settings.port, settings.baud_rate)
        .data_bits(serialport::DataBits::Eight)
        .parity(serialport::Parity::None)
        .stop_bits(serialport::StopBits::One)
        .flow_control(serialport::FlowControl::None)
        .timeout(settings.timeout())
        .open()
        .with_context(|| {
            format!(
                "could not connect to {} at {} baud",
                settings.port, settings.baud_rate
            )
        })
}

/// Names of the serial ports the OS currently exposes.
pub fn list_ports() -> Result<Vec<String>> {
    let ports = serialport::available_ports().context("failed to enumerate serial ports")?;
    Ok(ports.into_iter().map(|port| port.port_name).collect())
}

/// Longest line kept while waiting for its terminator. Sample lines are a
/// few dozen bytes; anything longer is noise or a baud mismatch.
pub const MAX_LINE_LEN: usize = 1024;

#[derive(Debug, Error, PartialEq)]
pub enum LineError {
    #[error("line is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("discarded {0} bytes without a line terminator")]
    Overflow(usize),
}

/// Splits a byte stream into `\n`-terminated lines, holding back a trailing
/// partial line until the rest of it arrives.
#[derive(Debug, Default)]
pub struct LineAssembler {
    pending: Vec<u8>,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `bytes` and returns every line completed by them, without the
    /// terminator. Invalid UTF-8 is returned as an `Err` for that line only.
    /// A partial line longer than [`MAX_LINE_LEN`] is dropped and reported as
    /// [`LineError::Overflow`]; assembly resumes with the following bytes.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Result<String, LineError>> {
        let mut lines = Vec::new();
        for &byte in bytes {
            if byte == b'\n' {
                let raw = std::mem::take(&mut self.pending);
                lines.push(
                    String::from_utf8(raw)
                        .map(|line| line.trim().to_string())
                        .map_err(LineError::from),
                );
            } else {
                self.pending.push(byte);
                if self.pending.len() > MAX_LINE_LEN {
                    let discarded = self.pending.len();
                    self.pending.clear();
                    lines.push(Err(LineError::Overflow(discarded)));
                }
            }
        }
        lines
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
