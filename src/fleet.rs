//! Which appliance is currently switched on for live monitoring.

use serde::Serialize;

use crate::db::{Device, DeviceId};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum PowerState {
    #[default]
    Off,
    On,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetEntry {
    pub device: Device,
    pub power: PowerState,
}

/// Catalog snapshot plus the single powered-on selection.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeviceFleet {
    entries: Vec<FleetEntry>,
}

impl DeviceFleet {
    pub fn new(devices: Vec<Device>) -> Self {
        let entries = devices
            .into_iter()
            .map(|device| FleetEntry {
                device,
                power: PowerState::Off,
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[FleetEntry] {
        &self.entries
    }

    /// Flips `device_id`. Switching one on switches every other off.
    /// Returns the new state, or `None` for an unknown id.
    pub fn toggle(&mut self, device_id: DeviceId) -> Option<PowerState> {
        let target = self
            .entries
            .iter()
            .position(|entry| entry.device.id == device_id)?;

        let next = match self.entries[target].power {
            PowerState::On => PowerState::Off,
            PowerState::Off => PowerState::On,
        };

        if next == PowerState::On {
            for entry in &mut self.entries {
                entry.power = PowerState::Off;
            }
        }
        self.entries[target].power = next;
        Some(next)
    }

    pub fn powered_on(&self) -> Option<&Device> {
        self.entries
            .iter()
            .find(|entry| entry.power == PowerState::On)
            .map(|entry| &entry.device)
    }

    /// The live view of a device is only reachable while it is on.
    pub fn can_view(&self, device_id: DeviceId) -> bool {
        self.powered_on()
            .is_some_and(|device| device.id == device_id)
    }

    /// Replaces the catalog, keeping the selection if the device survived.
    pub fn refresh(&mut self, devices: Vec<Device>) {
        let selected = self.powered_on().map(|device| device.id);
        *self = Self::new(devices);
        if let Some(id) = selected {
            self.toggle(id);
        }
    }
}
