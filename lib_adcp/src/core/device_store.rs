//! # Device State Store
//!
//! Last-known ensemble per instrument, keyed by serial number. Records are created on
//! the first ensemble seen for a serial number and replaced on every later one; they
//! live for the lifetime of the process. The store does no locking of its own: the hub
//! owns it and is the only writer.

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::ensemble::Ensemble;

/// Serial number → last ensemble.
#[derive(Debug, Default)]
pub struct DeviceStateStore {
    devices: HashMap<String, Arc<Ensemble>>,
}

impl DeviceStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `ensemble` as the latest state of its device.
    ///
    /// Returns `true` when the serial number was not known before.
    pub fn upsert(&mut self, ensemble: Arc<Ensemble>) -> bool {
        let serial = ensemble.serial_number.clone();
        match self.devices.insert(serial, ensemble) {
            Some(_) => {
                log::trace!("ADCP exists, last ensemble replaced");
                false
            }
            None => {
                log::info!("ADCP does not exist, now tracking {} devices", self.devices.len());
                true
            }
        }
    }

    /// Snapshot of all known serial numbers, sorted.
    pub fn list_serial_numbers(&self) -> Vec<String> {
        let mut serials: Vec<String> = self.devices.keys().cloned().collect();
        serials.sort();
        serials
    }

    /// Latest ensemble for `serial_number`, if the device is known.
    pub fn last_ensemble(&self, serial_number: &str) -> Option<Arc<Ensemble>> {
        self.devices.get(serial_number).cloned()
    }

    /// Every device with its latest ensemble.
    pub fn snapshot(&self) -> HashMap<String, Arc<Ensemble>> {
        self.devices.clone()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
