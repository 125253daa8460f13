pub mod device;
pub mod reading;

pub use device::{Device, DeviceId};
pub use reading::StoredReading;
