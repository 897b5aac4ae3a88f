// SPDX-License-Identifier: GPL-3.0-only

//! D-Bus surface of the monitor
//!
//! One object, two broadcast signals. Subscribers get the serial, vendor,
//! model and uuid of the device behind each mount event; mount paths and
//! device numbers stay internal.

use async_trait::async_trait;
use mounts_types::DeviceInfo;
use zbus::interface;
use zbus::object_server::InterfaceRef;

use crate::monitor::EventSink;

pub const BUS_NAME: &str = "org.freedesktop.MountMonitor";
pub const OBJECT_PATH: &str = "/org/freedesktop/MountMonitor";

/// Mount event D-Bus interface
pub struct MonitorHandler {
    version: String,
}

impl MonitorHandler {
    pub fn new() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[interface(name = "org.freedesktop.MountMonitor.Base")]
impl MonitorHandler {
    /// Get service version
    #[zbus(property)]
    async fn version(&self) -> &str {
        &self.version
    }

    /// Signal emitted when a filesystem is mounted
    #[zbus(signal)]
    pub(crate) async fn mount_added(
        signal_ctxt: &zbus::object_server::SignalEmitter<'_>,
        serial: &str,
        vendor: &str,
        model: &str,
        uuid: &str,
    ) -> zbus::Result<()>;

    /// Signal emitted when a filesystem is unmounted
    #[zbus(signal)]
    pub(crate) async fn mount_removed(
        signal_ctxt: &zbus::object_server::SignalEmitter<'_>,
        serial: &str,
        vendor: &str,
        model: &str,
        uuid: &str,
    ) -> zbus::Result<()>;
}

/// Pushes monitor events out as D-Bus signals.
pub struct DbusEventSink {
    iface: InterfaceRef<MonitorHandler>,
}

impl DbusEventSink {
    pub fn new(iface: InterfaceRef<MonitorHandler>) -> Self {
        Self { iface }
    }
}

#[async_trait]
impl EventSink for DbusEventSink {
    async fn mount_added(&self, info: &DeviceInfo) {
        tracing::info!("Mount added: {} ({})", info.mount_path, info.device);

        let m = &info.metadata;
        if let Err(e) = MonitorHandler::mount_added(
            self.iface.signal_emitter(),
            m.serial.as_deref().unwrap_or(""),
            m.vendor.as_deref().unwrap_or(""),
            m.model.as_deref().unwrap_or(""),
            m.uuid.as_deref().unwrap_or(""),
        )
        .await
        {
            tracing::error!("Failed to emit MountAdded signal: {e}");
        }
    }

    async fn mount_removed(&self, info: &DeviceInfo) {
        tracing::info!("Mount removed: {} ({})", info.mount_path, info.device);

        let m = &info.metadata;
        if let Err(e) = MonitorHandler::mount_removed(
            self.iface.signal_emitter(),
            m.serial.as_deref().unwrap_or(""),
            m.vendor.as_deref().unwrap_or(""),
            m.model.as_deref().unwrap_or(""),
            m.uuid.as_deref().unwrap_or(""),
        )
        .await
        {
            tracing::error!("Failed to emit MountRemoved signal: {e}");
        }
    }
}
