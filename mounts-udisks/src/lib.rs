// SPDX-License-Identifier: GPL-3.0-only

//! UDisks2-backed device metadata resolution
//!
//! Maps a raw device number to the drive metadata published with mount
//! events. All lookups are best effort: a failing stage is logged and the
//! remaining fields come back empty, the caller never sees an error.

mod error;
mod resolver;

pub use error::ResolveError;
pub use resolver::{DeviceInfoResolver, UdisksResolver};
