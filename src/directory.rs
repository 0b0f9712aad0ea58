// src/directory.rs
//! Справочник устройств: read-only lookups used to label stock rows and
//! pick recipients. Device CRUD lives elsewhere.

use std::collections::BTreeSet;

use sqlx::SqlitePool;

use crate::error::LedgerResult;
use crate::models::{Device, DeviceType, ItemType};

pub trait DeviceDirectory: Send + Sync {
    fn devices(&self) -> &[Device];

    fn device(&self, id: &str) -> Option<&Device> {
        self.devices().iter().find(|d| d.id == id)
    }

    /// Display name for a printer; `None` if the id is unknown.
    fn printer_label(&self, printer_id: &str) -> Option<String> {
        self.device(printer_id).map(Device::label)
    }

    fn printers(&self) -> Vec<&Device> {
        self.devices().iter().filter(|d| d.is_printer()).collect()
    }

    /// Distinct assignees who may receive an item of this type, sorted.
    fn eligible_recipients(&self, item_type: ItemType) -> Vec<String> {
        let holds = |device: &Device| match item_type {
            ItemType::Keyboard | ItemType::Mouse => {
                matches!(device.device_type, DeviceType::Computer | DeviceType::Laptop)
            }
            ItemType::Toner => device.device_type == DeviceType::Printer,
            ItemType::Monitor => device.device_type == DeviceType::Computer,
            ItemType::Cable | ItemType::Other => true,
        };

        self.devices()
            .iter()
            .filter(|d| holds(*d))
            .filter_map(|d| d.assignee())
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Snapshot of the device registry held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDeviceDirectory {
    devices: Vec<Device>,
}

impl InMemoryDeviceDirectory {
    pub fn new(devices: Vec<Device>) -> Self {
        Self { devices }
    }

    /// Loads the `devices` table. Rows with an unknown device type are skipped.
    pub async fn load(pool: &SqlitePool) -> LedgerResult<Self> {
        let rows: Vec<(String, Option<String>, String, String, Option<String>, Option<String>)> = sqlx::query_as(
            "SELECT id, asset_number, type, serial_number, model_number, assigned_to FROM devices",
        )
            .fetch_all(pool)
            .await?;

        let mut devices = Vec::with_capacity(rows.len());
        for (id, asset_number, device_type, serial_number, model_number, assigned_to) in rows {
            let Some(device_type) = DeviceType::parse(&device_type) else {
                log::warn!("Skipping device {} with unknown type '{}'", id, device_type);
                continue;
            };
            devices.push(Device {
                id,
                asset_number,
                device_type,
                serial_number,
                model_number,
                assigned_to: assigned_to.unwrap_or_default(),
            });
        }

        log::info!("Loaded {} devices into the directory", devices.len());
        Ok(Self { devices })
    }

    pub fn insert(&mut self, device: Device) {
        self.devices.retain(|d| d.id != device.id);
        self.devices.push(device);
    }
}

impl DeviceDirectory for InMemoryDeviceDirectory {
    fn devices(&self) -> &[Device] {
        &self.devices
    }
}
