//! Device identity
//!
//! A device is registered with the sync server once and keeps the
//! server-issued id in the `Device` setting. Every push and pull sends that
//! id, and the server uses it to scope pending markers per device.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::store::Store;

/// Setting holding the registered device as JSON
pub const DEVICE_SETTING: &str = "Device";

/// A registered sync client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Server-issued id; empty until registered
    #[serde(default)]
    pub id: String,
    pub name: String,
}

impl Device {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    pub fn is_registered(&self) -> bool {
        !self.id.is_empty()
    }
}

impl Store {
    /// The local device, if one has been registered
    pub fn device(&self) -> Result<Option<Device>> {
        let Some(raw) = self.get_setting(DEVICE_SETTING)? else {
            return Ok(None);
        };
        let device: Device = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid {} setting", DEVICE_SETTING))?;
        Ok(Some(device).filter(Device::is_registered))
    }

    pub fn set_device(&mut self, device: &Device) -> Result<()> {
        let raw = serde_json::to_string(device).context("Failed to encode device")?;
        self.save_setting(DEVICE_SETTING, raw)
    }

    /// Forget the local device identity
    pub fn clear_device(&mut self) -> Result<bool> {
        self.remove_setting(DEVICE_SETTING)
    }
}
