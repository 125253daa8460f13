//! Live ingestion from the sensor: line protocol, device access, the tick
//! state machine and the task that drives it.

pub mod controller;
pub mod link;
pub mod loop_worker;
pub mod monitor;
pub mod parser;
pub mod sink;

pub use controller::MonitorController;
pub use link::{list_ports, open_serial, DeviceLink};
pub use monitor::{Monitor, MonitorError, MonitorStatus, Session, TickReport};
pub use parser::{parse_line, Measurement, ParseError};
pub use sink::{PersistenceError, ReadingSink};
