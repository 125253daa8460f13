//! Device catalog model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Key associating readings with one monitored appliance.
pub type DeviceId = i64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}
