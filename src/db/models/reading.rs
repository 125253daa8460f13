//! Persisted reading model.
//!
//! A `StoredReading` is the durable twin of an in-session reading. Its
//! timestamp comes from the storage layer at insert time and has nothing to
//! do with the session-relative time used for plotting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::DeviceId;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredReading {
    pub id: i64,
    pub recorded_at: DateTime<Utc>,
    pub current: f64,
    pub power: f64,
    pub device_id: Option<DeviceId>,
}
