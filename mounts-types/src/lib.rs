// SPDX-License-Identifier: GPL-3.0-only

//! Canonical domain models for the mount monitor
//!
//! This crate defines the single source of truth for mount-state types.
//! These models are used throughout the stack:
//!
//! - **mounts-udisks**: Returns `DeviceMetadata` from its resolver API
//! - **mounts-service**: Tracks `MountEntry` snapshots, caches `DeviceInfo`
//!   per mount, and publishes the metadata fields over D-Bus
//!
//! `MountEntry` carries the total order the diff engine relies on; everything
//! else is plain owned data with no behavior beyond construction.

pub mod device;
pub mod info;
pub mod mount;

pub use device::DeviceNumber;
pub use info::{DeviceInfo, DeviceMetadata};
pub use mount::{MountEntry, MountKind};
