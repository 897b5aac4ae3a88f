// SPDX-License-Identifier: GPL-3.0-only

//! Best-effort resolution of device numbers to drive metadata
//!
//! Walks UDisks2 on the system bus: enumerate block devices, match on the
//! kernel device number, then follow the block's drive object for the
//! serial, vendor and model strings.

use std::collections::HashMap;

use async_trait::async_trait;
use mounts_types::{DeviceMetadata, DeviceNumber};
use udisks2::block::BlockProxy;
use udisks2::drive::DriveProxy;
use zbus::Connection;
use zbus::zvariant::{self, Value};
use zbus_macros::proxy;

use crate::error::ResolveError;

#[proxy(
    default_service = "org.freedesktop.UDisks2",
    default_path = "/org/freedesktop/UDisks2/Manager",
    interface = "org.freedesktop.UDisks2.Manager"
)]
trait UDisks2Manager {
    fn get_block_devices(
        &self,
        options: HashMap<String, Value<'_>>,
    ) -> zbus::Result<Vec<zvariant::OwnedObjectPath>>;
}

/// Source of drive metadata for the devices behind new mounts.
///
/// Implementations must not fail: lookup problems are theirs to log, and the
/// caller gets whatever fields could be filled in.
#[async_trait]
pub trait DeviceInfoResolver: Send + Sync {
    async fn resolve(&self, device: DeviceNumber) -> DeviceMetadata;
}

/// Resolver backed by the UDisks2 daemon on the system bus.
///
/// Each resolution opens its own connection. The monitor resolves rarely
/// (once per new mount) and a held connection would only go stale between
/// events.
#[derive(Debug, Default)]
pub struct UdisksResolver;

impl UdisksResolver {
    pub fn new() -> Self {
        Self
    }

    async fn lookup(&self, device: DeviceNumber) -> Result<DeviceMetadata, ResolveError> {
        let connection = Connection::system()
            .await
            .map_err(|e| ResolveError::ConnectionFailed(e.to_string()))?;

        let block = find_block(&connection, device).await?;

        let mut metadata = DeviceMetadata {
            uuid: non_empty(block.id_uuid().await.unwrap_or_default()),
            ..DeviceMetadata::default()
        };

        let drive_path = match block.drive().await {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!("No drive path on block for device {device}: {e}");
                return Ok(metadata);
            }
        };
        if drive_path.as_str() == "/" {
            // UDisks2 publishes "/" for blocks without a backing drive (loop, dm, ...)
            tracing::debug!("Device {device} has no backing drive");
            return Ok(metadata);
        }
        metadata.drive_path = Some(drive_path.to_string());

        match DriveProxy::builder(&connection)
            .path(drive_path.to_string())?
            .build()
            .await
        {
            Ok(drive) => {
                metadata.serial = non_empty(drive.serial().await.unwrap_or_default());
                metadata.vendor = non_empty(drive.vendor().await.unwrap_or_default());
                metadata.model = non_empty(drive.model().await.unwrap_or_default());
            }
            Err(e) => {
                tracing::warn!("No drive object at {drive_path} for device {device}: {e}");
            }
        }

        Ok(metadata)
    }
}

#[async_trait]
impl DeviceInfoResolver for UdisksResolver {
    async fn resolve(&self, device: DeviceNumber) -> DeviceMetadata {
        match self.lookup(device).await {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!("Device info lookup failed for {device}: {e}");
                DeviceMetadata::default()
            }
        }
    }
}

/// Find the UDisks2 block object whose kernel device number matches.
async fn find_block(
    connection: &Connection,
    device: DeviceNumber,
) -> Result<BlockProxy<'static>, ResolveError> {
    let manager = UDisks2ManagerProxy::new(connection)
        .await
        .map_err(|e| ResolveError::DBusError(e.to_string()))?;

    let block_paths = manager
        .get_block_devices(HashMap::new())
        .await
        .map_err(|e| ResolveError::DBusError(e.to_string()))?;

    for path in block_paths {
        let block = match BlockProxy::builder(connection)
            .path(path.to_string())?
            .build()
            .await
        {
            Ok(proxy) => proxy,
            Err(_) => continue,
        };

        match block.device_number().await {
            Ok(dev) if DeviceNumber::from_raw(dev) == device => return Ok(block),
            Ok(_) => {}
            Err(e) => tracing::debug!("Skipping block without a device number: {e}"),
        }
    }

    Err(ResolveError::BlockNotFound(device.to_string()))
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}
