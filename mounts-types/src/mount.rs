// SPDX-License-Identifier: GPL-3.0-only

//! Mount table entry model

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::DeviceNumber;

/// What a device is mounted as.
///
/// The mount table only yields `Filesystem` entries today; `Swap` is reserved
/// for a swap-table channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MountKind {
    Filesystem,
    Swap,
}

/// One active mount: a device attached at a path.
///
/// Entries are immutable snapshots. A table re-parse produces fresh entries
/// rather than updating old ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MountEntry {
    /// Device number backing the mount
    pub device: DeviceNumber,

    /// Absolute mount point, octal escapes already decoded
    pub mount_path: String,

    /// Mount flavor (always `Filesystem` from the mount table)
    pub kind: MountKind,
}

impl MountEntry {
    pub fn new(device: DeviceNumber, mount_path: impl Into<String>, kind: MountKind) -> Self {
        Self {
            device,
            mount_path: mount_path.into(),
            kind,
        }
    }
}

/// Total order the diff engine sorts and merges by: mount path first, then
/// device, then kind.
impl Ord for MountEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.mount_path
            .cmp(&other.mount_path)
            .then_with(|| self.device.cmp(&other.device))
            .then_with(|| self.kind.cmp(&other.kind))
    }
}

impl PartialOrd for MountEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
