// SPDX-License-Identifier: GPL-3.0-only

//! Device enrichment models published alongside mount events

use serde::{Deserialize, Serialize};

use crate::DeviceNumber;

/// Best-effort drive metadata looked up for a device number.
///
/// Every field is optional: a lookup stage that fails leaves its fields
/// absent instead of failing the whole lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMetadata {
    /// UDisks2 drive object path ("/" means no backing drive and stays None)
    pub drive_path: Option<String>,

    /// Drive serial number
    pub serial: Option<String>,

    /// Filesystem UUID of the block device
    pub uuid: Option<String>,

    /// Drive vendor name
    pub vendor: Option<String>,

    /// Drive model name
    pub model: Option<String>,
}

impl DeviceMetadata {
    /// True when no lookup stage produced anything.
    pub fn is_empty(&self) -> bool {
        self.drive_path.is_none()
            && self.serial.is_none()
            && self.uuid.is_none()
            && self.vendor.is_none()
            && self.model.is_none()
    }
}

/// Device information cached for one active mount.
///
/// Built when a mount is first observed and held until that mount goes away.
/// A path that is unmounted and mounted again gets a freshly resolved record,
/// never an update in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Device number backing the mount
    pub device: DeviceNumber,

    /// Mount point this record was resolved for
    pub mount_path: String,

    /// Resolved drive metadata
    pub metadata: DeviceMetadata,
}

impl DeviceInfo {
    pub fn new(
        device: DeviceNumber,
        mount_path: impl Into<String>,
        metadata: DeviceMetadata,
    ) -> Self {
        Self {
            device,
            mount_path: mount_path.into(),
            metadata,
        }
    }
}
