// SPDX-License-Identifier: GPL-3.0-only

//! Session bus subscriber that prints mount monitor events as they arrive.

use anyhow::Result;
use futures_util::StreamExt;
use zbus::Connection;
use zbus_macros::proxy;

#[proxy(
    default_service = "org.freedesktop.MountMonitor",
    default_path = "/org/freedesktop/MountMonitor",
    interface = "org.freedesktop.MountMonitor.Base"
)]
trait MountMonitorBase {
    #[zbus(property)]
    fn version(&self) -> zbus::Result<String>;

    #[zbus(signal)]
    fn mount_added(
        &self,
        serial: String,
        vendor: String,
        model: String,
        uuid: String,
    ) -> zbus::Result<()>;

    #[zbus(signal)]
    fn mount_removed(
        &self,
        serial: String,
        vendor: String,
        model: String,
        uuid: String,
    ) -> zbus::Result<()>;
}

#[tokio::main]
async fn main() -> Result<()> {
    let connection = Connection::session().await?;
    let proxy = MountMonitorBaseProxy::new(&connection).await?;

    match proxy.version().await {
        Ok(version) => println!("Listening to mount monitor v{version}"),
        Err(_) => println!("Mount monitor not on the bus yet; listening anyway"),
    }

    let mut added = proxy.receive_mount_added().await?;
    let mut removed = proxy.receive_mount_removed().await?;

    loop {
        tokio::select! {
            Some(signal) = added.next() => {
                let args = signal.args()?;
                println!(
                    "mount added: serial={} vendor={} model={} uuid={}",
                    args.serial(),
                    args.vendor(),
                    args.model(),
                    args.uuid()
                );
            }
            Some(signal) = removed.next() => {
                let args = signal.args()?;
                println!(
                    "mount removed: serial={} vendor={} model={} uuid={}",
                    args.serial(),
                    args.vendor(),
                    args.model(),
                    args.uuid()
                );
            }
            else => break,
        }
    }

    Ok(())
}
