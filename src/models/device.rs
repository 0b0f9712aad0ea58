// src/models/device.rs
use serde::{Deserialize, Serialize};

use super::DeviceType;

/// Assignee value the device registry uses for unassigned hardware.
pub const NOT_ASSIGNED: &str = "Not Assigned";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_number: Option<String>,
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    pub serial_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_number: Option<String>,
    #[serde(default)]
    pub assigned_to: String,
}

impl Device {
    pub fn is_printer(&self) -> bool {
        self.device_type == DeviceType::Printer
    }

    pub fn assignee(&self) -> Option<&str> {
        let name = self.assigned_to.trim();
        if name.is_empty() || name == NOT_ASSIGNED {
            None
        } else {
            Some(name)
        }
    }

    /// "<asset or serial> - <assignee>[ (<model number>)]"
    pub fn label(&self) -> String {
        let tag = self
            .asset_number
            .as_deref()
            .filter(|a| !a.is_empty())
            .unwrap_or(&self.serial_number);
        let holder = if self.assigned_to.is_empty() {
            "Unassigned"
        } else {
            self.assigned_to.as_str()
        };
        match self.model_number.as_deref().filter(|m| !m.is_empty()) {
            Some(model) => format!("{} - {} ({})", tag, holder, model),
            None => format!("{} - {}", tag, holder),
        }
    }
}
