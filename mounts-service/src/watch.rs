// SPDX-License-Identifier: GPL-3.0-only

//! Mount table change notification
//!
//! The kernel reports mount table changes as an error/priority readiness
//! condition on a held-open mountinfo handle. There is no data to read; the
//! readiness itself is the event.

use std::fs::File;
use std::io;
use std::path::Path;

use tokio::io::Interest;
use tokio::io::unix::AsyncFd;

const WATCH_INTEREST: Interest = Interest::ERROR.add(Interest::PRIORITY);

pub struct MountsWatch {
    inner: AsyncFd<File>,
}

impl MountsWatch {
    /// Open `path` and register it with the reactor. The handle stays open
    /// for the life of the watch; every change is signalled on this one fd.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        let inner = AsyncFd::with_interest(file, WATCH_INTEREST)?;
        Ok(Self { inner })
    }

    /// Wait for the next mount table change.
    ///
    /// Readiness is cleared before returning, so a change landing while the
    /// caller is still reconciling arms the next wait instead of being lost.
    pub async fn changed(&mut self) -> io::Result<()> {
        let mut guard = self.inner.ready(WATCH_INTEREST).await?;
        guard.clear_ready();
        Ok(())
    }
}
