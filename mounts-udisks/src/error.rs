// SPDX-License-Identifier: GPL-3.0-only

//! Error types for UDisks2 lookups

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("D-Bus error: {0}")]
    DBusError(String),

    #[error("No block object for device {0}")]
    BlockNotFound(String),

    #[error("Zbus error")]
    Zbus(#[from] zbus::Error),
}
