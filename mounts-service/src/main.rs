// SPDX-License-Identifier: GPL-3.0-only

//! Mount monitor daemon - publishes mount and unmount events over D-Bus
//!
//! Watches the kernel mount table, enriches every change with UDisks2 drive
//! metadata, and broadcasts MountAdded/MountRemoved signals on the session
//! bus.

use anyhow::Result;
use mounts_udisks::UdisksResolver;
use tracing_subscriber::{EnvFilter, fmt};
use zbus::connection::Builder as ConnectionBuilder;

mod diff;
mod error;
mod iface;
mod monitor;
mod mountinfo;
mod watch;

use iface::{BUS_NAME, DbusEventSink, MonitorHandler, OBJECT_PATH};
use monitor::MountMonitor;
use mountinfo::SysBlockProbe;
use watch::MountsWatch;

const MOUNT_TABLE: &str = "/proc/self/mountinfo";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging to journald/stderr
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mount_monitord=info,mounts_udisks=info,warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting mount monitor v{}", env!("CARGO_PKG_VERSION"));

    // The watch must be up before the bus name goes out
    let watch = MountsWatch::open(MOUNT_TABLE)?;

    let connection = ConnectionBuilder::session()?
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, MonitorHandler::new())?
        .build()
        .await?;

    tracing::info!("Service registered on D-Bus session bus");
    tracing::info!("  - {BUS_NAME} at {OBJECT_PATH}");

    let iface_ref = connection
        .object_server()
        .interface::<_, MonitorHandler>(OBJECT_PATH)
        .await?;

    let mut monitor = MountMonitor::new(
        MOUNT_TABLE,
        Box::new(SysBlockProbe),
        Box::new(UdisksResolver::new()),
        Box::new(DbusEventSink::new(iface_ref)),
    );

    let monitor_task = tokio::spawn(async move { monitor.run(watch).await });
    tracing::info!("Mount table monitoring enabled");

    // Keep running until shutdown. The monitor only returns on watch failure,
    // and without the watch the daemon has no event source left.
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("Received shutdown signal, mount monitor shutting down");
            Ok(())
        }
        result = monitor_task => {
            match result {
                Ok(Err(e)) => {
                    tracing::error!("Mount monitoring stopped: {e}");
                    Err(e.into())
                }
                Err(e) => {
                    tracing::error!("Mount monitor task failed: {e}");
                    Err(e.into())
                }
                Ok(Ok(())) => Ok(()),
            }
        }
    }
}
