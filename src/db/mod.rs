mod connection;
pub(crate) mod helpers;
mod migrations;
pub mod models;
pub(crate) mod repositories;

pub use connection::Database;
pub use models::{Device, DeviceId, StoredReading};
