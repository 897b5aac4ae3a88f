// SPDX-License-Identifier: GPL-3.0-only

use thiserror::Error;

/// Monitor-specific errors
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Failed to read mount table {path}: {source}")]
    TableRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Mount table watch failed: {0}")]
    Watch(#[from] std::io::Error),
}

/// Result type alias for monitor operations
pub type Result<T> = std::result::Result<T, MonitorError>;
