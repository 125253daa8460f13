//! Where accepted readings go after they land in the session buffer.

use thiserror::Error;

use crate::db::{Database, DeviceId};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Durable destination for accepted readings.
///
/// `record` starts exactly one write and must not wait for it; the storage
/// layer stamps the row with its own clock.
pub trait ReadingSink: Send + Sync {
    fn record(&self, current: f64, power: f64, device_id: DeviceId)
        -> Result<(), PersistenceError>;
}

impl ReadingSink for Database {
    fn record(
        &self,
        current: f64,
        power: f64,
        device_id: DeviceId,
    ) -> Result<(), PersistenceError> {
        self.enqueue_reading(current, power, device_id)
            .map_err(|err| PersistenceError::Unavailable(format!("{err:#}")))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::{PersistenceError, ReadingSink};
    use crate::db::DeviceId;

    /// Sink that remembers every call, optionally failing all of them.
    #[derive(Default)]
    pub struct RecordingSink {
        pub calls: Mutex<Vec<(f64, f64, DeviceId)>>,
        pub fail: bool,
    }

    impl RecordingSink {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn calls(&self) -> Vec<(f64, f64, DeviceId)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ReadingSink for RecordingSink {
        fn record(
            &self,
            current: f64,
            power: f64,
            device_id: DeviceId,
        ) -> Result<(), PersistenceError> {
            self.calls.lock().unwrap().push((current, power, device_id));
            if self.fail {
                return Err(PersistenceError::Unavailable("test sink".into()));
            }
            Ok(())
        }
    }
}
