// SPDX-License-Identifier: GPL-3.0-only

//! Mount monitor state machine
//!
//! Owns the current mount snapshot and the per-mount device info cache,
//! reconciles on every mount table change notification, and pushes
//! added/removed events into the sink. A single task owns the monitor, so
//! at most one reconciliation runs at a time.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use mounts_types::{DeviceInfo, DeviceMetadata, DeviceNumber, MountEntry, MountKind};
use mounts_udisks::DeviceInfoResolver;

use crate::diff::diff_mounts;
use crate::error::Result;
use crate::mountinfo::{self, BlockDeviceProbe};
use crate::watch::MountsWatch;

/// Ceiling on one device metadata lookup; a stuck UDisks2 call must not
/// stall mount event processing forever.
const RESOLVE_TIMEOUT: Duration = Duration::from_secs(10);

/// Receives mount events as reconciliation discovers them.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn mount_added(&self, info: &DeviceInfo);
    async fn mount_removed(&self, info: &DeviceInfo);
}

pub struct MountMonitor {
    table_path: PathBuf,
    probe: Box<dyn BlockDeviceProbe + Send + Sync>,
    resolver: Box<dyn DeviceInfoResolver>,
    sink: Box<dyn EventSink>,
    /// Per-lookup ceiling; `RESOLVE_TIMEOUT` in production.
    resolve_timeout: Duration,
    /// Current snapshot; `None` until the first successful table read.
    mounts: Option<Vec<MountEntry>>,
    /// Device info per mount path, kept from mount to unmount.
    cache: HashMap<String, DeviceInfo>,
}

impl MountMonitor {
    pub fn new(
        table_path: impl Into<PathBuf>,
        probe: Box<dyn BlockDeviceProbe + Send + Sync>,
        resolver: Box<dyn DeviceInfoResolver>,
        sink: Box<dyn EventSink>,
    ) -> Self {
        Self {
            table_path: table_path.into(),
            probe,
            resolver,
            sink,
            resolve_timeout: RESOLVE_TIMEOUT,
            mounts: None,
            cache: HashMap::new(),
        }
    }

    /// Parse the mount table if no snapshot is held. Idempotent once
    /// populated; a read failure leaves the snapshot unpopulated.
    fn ensure(&mut self) -> Result<()> {
        if self.mounts.is_none() {
            self.mounts = Some(mountinfo::load(&self.table_path, self.probe.as_ref())?);
        }
        Ok(())
    }

    /// Drop the snapshot so the next `ensure` re-reads the table. The device
    /// info cache survives; its entries belong to mounts, not snapshots.
    fn invalidate(&mut self) {
        self.mounts = None;
    }

    fn current(&self) -> &[MountEntry] {
        self.mounts.as_deref().unwrap_or_default()
    }

    /// All current mounts backed by `device`.
    pub fn mounts_for_dev(&self, device: DeviceNumber) -> Vec<&MountEntry> {
        self.current()
            .iter()
            .filter(|m| m.device == device)
            .collect()
    }

    /// Whether `device` currently backs any mount, and as what.
    pub fn is_dev_in_use(&self, device: DeviceNumber) -> Option<MountKind> {
        self.mounts_for_dev(device).first().map(|m| m.kind)
    }

    /// Re-read the mount table and emit events for the difference.
    ///
    /// Removals are emitted before additions so a path that moved between
    /// devices tears down before it comes back up. A failed table read
    /// restores the previous snapshot and emits nothing.
    pub async fn reconcile(&mut self) -> Result<()> {
        let previous = self.mounts.clone();
        self.invalidate();
        if let Err(e) = self.ensure() {
            self.mounts = previous;
            return Err(e);
        }

        let old = previous.unwrap_or_default();
        let new = self.current().to_vec();
        let diff = diff_mounts(&old, &new);
        if diff.is_empty() {
            return Ok(());
        }

        for entry in &diff.removed {
            match self.cache.remove(&entry.mount_path) {
                Some(info) => {
                    let device_state = if self.is_dev_in_use(entry.device).is_some() {
                        "still in use"
                    } else {
                        "released"
                    };
                    tracing::debug!(
                        "{} unmounted, device {} {device_state}",
                        entry.mount_path,
                        entry.device
                    );
                    self.sink.mount_removed(&info).await;
                }
                None => {
                    tracing::warn!("No cached device info for removed mount {}", entry.mount_path);
                }
            }
        }

        for entry in &diff.added {
            let info = self.resolve_entry(entry).await;
            self.cache.insert(entry.mount_path.clone(), info.clone());
            self.sink.mount_added(&info).await;
        }

        Ok(())
    }

    /// Resolve device info for every mount in the current snapshot without
    /// emitting events. Run once at startup so mounts that predate the
    /// daemon still have removal records later.
    async fn prime(&mut self) {
        let entries = self.current().to_vec();
        for entry in &entries {
            let info = self.resolve_entry(entry).await;
            self.cache.insert(entry.mount_path.clone(), info);
        }
        tracing::info!("Primed device info for {} existing mounts", entries.len());
    }

    async fn resolve_entry(&self, entry: &MountEntry) -> DeviceInfo {
        let lookup = self.resolver.resolve(entry.device);
        let metadata = match tokio::time::timeout(self.resolve_timeout, lookup).await {
            Ok(metadata) => metadata,
            Err(_) => {
                tracing::warn!(
                    "Device info lookup for {} at {} timed out",
                    entry.device,
                    entry.mount_path
                );
                DeviceMetadata::default()
            }
        };
        DeviceInfo::new(entry.device, entry.mount_path.clone(), metadata)
    }

    /// Event loop: adopt the current table, then reconcile on every change
    /// notification. Returns only if the watch itself fails.
    pub async fn run(&mut self, mut watch: MountsWatch) -> Result<()> {
        match self.ensure() {
            Ok(()) => {
                tracing::info!("Tracking {} mounts", self.current().len());
                self.prime().await;
            }
            Err(e) => tracing::warn!("Initial mount table read failed: {e}"),
        }

        loop {
            watch.changed().await?;
            if let Err(e) = self.reconcile().await {
                tracing::warn!("Mount reconciliation failed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Debug)]
    enum Event {
        Added(DeviceInfo),
        Removed(DeviceInfo),
    }

    struct RecordingSink {
        events: Arc<Mutex<Vec<Event>>>,
    }

    #[async_trait]
    impl EventSink for RecordingSink {
        async fn mount_added(&self, info: &DeviceInfo) {
            self.events.lock().unwrap().push(Event::Added(info.clone()));
        }

        async fn mount_removed(&self, info: &DeviceInfo) {
            self.events
                .lock()
                .unwrap()
                .push(Event::Removed(info.clone()));
        }
    }

    /// Hands out a distinct serial per call so tests can tell a fresh
    /// resolution from a replayed one.
    struct FakeResolver {
        calls: AtomicUsize,
        fail: bool,
    }

    impl FakeResolver {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl DeviceInfoResolver for FakeResolver {
        async fn resolve(&self, device: DeviceNumber) -> DeviceMetadata {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return DeviceMetadata::default();
            }
            DeviceMetadata {
                serial: Some(format!("serial-{call}")),
                uuid: Some(format!("uuid-{device}")),
                ..DeviceMetadata::default()
            }
        }
    }

    /// Never resolves; only the reconcile timeout gets past it.
    struct HangingResolver;

    #[async_trait]
    impl DeviceInfoResolver for HangingResolver {
        async fn resolve(&self, _device: DeviceNumber) -> DeviceMetadata {
            std::future::pending().await
        }
    }

    struct NoProbe;

    impl BlockDeviceProbe for NoProbe {
        fn block_rdev(
            &self,
            _path: &str,
        ) -> std::result::Result<Option<DeviceNumber>, nix::errno::Errno> {
            Err(nix::errno::Errno::ENOENT)
        }
    }

    fn table_line(path: &str, minor: u64) -> String {
        format!("30 25 8:{minor} / {path} rw,noatime shared:1 - ext4 /dev/sdx{minor} rw")
    }

    fn monitor_at(
        path: &Path,
        resolver: impl DeviceInfoResolver + 'static,
    ) -> (MountMonitor, Arc<Mutex<Vec<Event>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = RecordingSink {
            events: events.clone(),
        };
        let monitor = MountMonitor::new(
            path,
            Box::new(NoProbe),
            Box::new(resolver),
            Box::new(sink),
        );
        (monitor, events)
    }

    #[tokio::test]
    async fn emits_removals_before_additions() {
        let table = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(table.path(), table_line("/mnt/a", 1) + "\n").unwrap();

        let (mut monitor, events) = monitor_at(table.path(), FakeResolver::new());
        monitor.ensure().unwrap();
        monitor.prime().await;

        std::fs::write(table.path(), table_line("/mnt/b", 2) + "\n").unwrap();
        monitor.reconcile().await.unwrap();

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        let Event::Removed(removed) = &events[0] else {
            panic!("expected a removal first, got {:?}", events[0]);
        };
        assert_eq!(removed.mount_path, "/mnt/a");
        let Event::Added(added) = &events[1] else {
            panic!("expected an addition second, got {:?}", events[1]);
        };
        assert_eq!(added.mount_path, "/mnt/b");
    }

    #[tokio::test]
    async fn cache_lifecycle_follows_mounts() {
        let table = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(table.path(), "").unwrap();

        let (mut monitor, events) = monitor_at(table.path(), FakeResolver::new());
        monitor.ensure().unwrap();

        std::fs::write(table.path(), table_line("/mnt/a", 1) + "\n").unwrap();
        monitor.reconcile().await.unwrap();
        let first_serial = monitor.cache["/mnt/a"].metadata.serial.clone();

        std::fs::write(table.path(), "").unwrap();
        monitor.reconcile().await.unwrap();
        assert!(!monitor.cache.contains_key("/mnt/a"));

        // Remounting resolves afresh instead of replaying the old record
        std::fs::write(table.path(), table_line("/mnt/a", 1) + "\n").unwrap();
        monitor.reconcile().await.unwrap();
        let second_serial = monitor.cache["/mnt/a"].metadata.serial.clone();
        assert_ne!(first_serial, second_serial);

        let events = events.lock().unwrap();
        assert!(matches!(&events[0], Event::Added(i) if i.metadata.serial == first_serial));
        assert!(matches!(&events[1], Event::Removed(i) if i.metadata.serial == first_serial));
        assert!(matches!(&events[2], Event::Added(i) if i.metadata.serial == second_serial));
    }

    #[tokio::test]
    async fn missing_cache_entry_drops_the_removal_event() {
        let table = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(table.path(), table_line("/mnt/a", 1) + "\n").unwrap();

        // Adopted without priming: no cache entry for /mnt/a exists
        let (mut monitor, events) = monitor_at(table.path(), FakeResolver::new());
        monitor.ensure().unwrap();

        std::fs::write(table.path(), "").unwrap();
        monitor.reconcile().await.unwrap();

        assert!(events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn resolver_failure_still_emits_the_addition() {
        let table = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(table.path(), "").unwrap();

        let (mut monitor, events) = monitor_at(table.path(), FakeResolver::failing());
        monitor.ensure().unwrap();

        std::fs::write(table.path(), table_line("/mnt/a", 1) + "\n").unwrap();
        monitor.reconcile().await.unwrap();

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        let Event::Added(info) = &events[0] else {
            panic!("expected an addition, got {:?}", events[0]);
        };
        assert_eq!(info.mount_path, "/mnt/a");
        assert!(info.metadata.is_empty());
    }

    #[tokio::test]
    async fn stuck_resolver_times_out_with_empty_metadata() {
        let table = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(table.path(), "").unwrap();

        let (mut monitor, events) = monitor_at(table.path(), HangingResolver);
        monitor.resolve_timeout = Duration::from_millis(50);
        monitor.ensure().unwrap();

        std::fs::write(table.path(), table_line("/mnt/a", 1) + "\n").unwrap();
        monitor.reconcile().await.unwrap();

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        let Event::Added(info) = &events[0] else {
            panic!("expected an addition, got {:?}", events[0]);
        };
        assert_eq!(info.mount_path, "/mnt/a");
        assert!(info.metadata.is_empty());
    }

    #[tokio::test]
    async fn read_failure_keeps_the_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mountinfo");
        std::fs::write(&path, table_line("/mnt/a", 1) + "\n").unwrap();

        let (mut monitor, events) = monitor_at(&path, FakeResolver::new());
        monitor.ensure().unwrap();
        monitor.prime().await;

        std::fs::remove_file(&path).unwrap();
        assert!(monitor.reconcile().await.is_err());

        // Snapshot and cache both survive the failed read
        assert_eq!(monitor.current().len(), 1);
        assert!(monitor.cache.contains_key("/mnt/a"));
        assert!(events.lock().unwrap().is_empty());

        // Table comes back unchanged: still nothing to report
        std::fs::write(&path, table_line("/mnt/a", 1) + "\n").unwrap();
        monitor.reconcile().await.unwrap();
        assert!(events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn ensure_is_idempotent_until_invalidated() {
        let table = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(table.path(), table_line("/mnt/a", 1) + "\n").unwrap();

        let (mut monitor, _events) = monitor_at(table.path(), FakeResolver::new());
        monitor.ensure().unwrap();
        assert_eq!(monitor.current().len(), 1);

        // A table change is invisible until the snapshot is invalidated
        std::fs::write(table.path(), "").unwrap();
        monitor.ensure().unwrap();
        assert_eq!(monitor.current().len(), 1);

        monitor.invalidate();
        assert!(monitor.mounts.is_none());
        monitor.ensure().unwrap();
        assert!(monitor.current().is_empty());
    }

    #[tokio::test]
    async fn priming_is_silent_and_backs_later_removals() {
        let table = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(table.path(), table_line("/mnt/a", 1) + "\n").unwrap();

        let (mut monitor, events) = monitor_at(table.path(), FakeResolver::new());
        monitor.ensure().unwrap();
        monitor.prime().await;
        assert!(events.lock().unwrap().is_empty());

        std::fs::write(table.path(), "").unwrap();
        monitor.reconcile().await.unwrap();

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], Event::Removed(i) if i.mount_path == "/mnt/a"));
    }

    #[tokio::test]
    async fn queries_cover_devices_in_use() {
        let table = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            table.path(),
            format!("{}\n{}\n", table_line("/mnt/a", 1), table_line("/mnt/b", 1)),
        )
        .unwrap();

        let (mut monitor, _events) = monitor_at(table.path(), FakeResolver::new());
        monitor.ensure().unwrap();

        let dev = DeviceNumber::from_parts(8, 1);
        assert_eq!(monitor.mounts_for_dev(dev).len(), 2);
        assert_eq!(monitor.is_dev_in_use(dev), Some(MountKind::Filesystem));

        let idle = DeviceNumber::from_parts(8, 9);
        assert!(monitor.mounts_for_dev(idle).is_empty());
        assert_eq!(monitor.is_dev_in_use(idle), None);
    }
}
