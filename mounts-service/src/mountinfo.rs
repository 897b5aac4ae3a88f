// SPDX-License-Identifier: GPL-3.0-only

//! Kernel mount table parsing
//!
//! Each mountinfo line names one mount:
//!
//! ```text
//! 36 35 98:0 /sub /mnt/data rw,noatime master:1 - ext4 /dev/sdb1 rw
//! ```
//!
//! The fields consumed here are the device number (third field) and the
//! octal-escaped mount point (fifth field). Btrfs lines report a virtual
//! `0:N` device and need the post-separator fields to recover the real one.

use std::collections::HashSet;
use std::path::Path;

use mounts_types::{DeviceNumber, MountEntry, MountKind};
use nix::errno::Errno;
use nix::sys::stat::{SFlag, stat};

use crate::error::{MonitorError, Result};

/// Separator between the per-mount and per-superblock halves of a line.
const OPTIONAL_FIELDS_END: &str = " - ";

/// Stat access for the btrfs device fallback. A trait seam so parser tests
/// can run against synthetic device nodes.
pub trait BlockDeviceProbe {
    /// Device number of the block special file at `path`.
    ///
    /// `Ok(None)` means the path exists but is not a block device.
    fn block_rdev(&self, path: &str) -> std::result::Result<Option<DeviceNumber>, Errno>;
}

/// Probe backed by real stat calls.
pub struct SysBlockProbe;

impl BlockDeviceProbe for SysBlockProbe {
    fn block_rdev(&self, path: &str) -> std::result::Result<Option<DeviceNumber>, Errno> {
        let st = stat(Path::new(path))?;
        if SFlag::from_bits_truncate(st.st_mode) & SFlag::S_IFMT == SFlag::S_IFBLK {
            Ok(Some(DeviceNumber::from_raw(st.st_rdev)))
        } else {
            Ok(None)
        }
    }
}

/// Read and parse the mount table at `path`.
///
/// An unreadable table is a hard failure; malformed lines inside a readable
/// table are not.
pub fn load(path: &Path, probe: &dyn BlockDeviceProbe) -> Result<Vec<MountEntry>> {
    let text = std::fs::read_to_string(path).map_err(|source| MonitorError::TableRead {
        path: path.display().to_string(),
        source,
    })?;
    Ok(parse(&text, probe))
}

/// Parse mount table text into entries.
///
/// Lines that cannot be parsed are logged and skipped so one bad line never
/// hides the rest of the table. Duplicate `(device, mount path)` pairs
/// collapse to their first occurrence.
pub fn parse(text: &str, probe: &dyn BlockDeviceProbe) -> Vec<MountEntry> {
    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for line in text.lines() {
        if line.is_empty() {
            continue;
        }
        let Some(entry) = parse_line(line, probe) else {
            continue;
        };
        if seen.insert((entry.device, entry.mount_path.clone())) {
            entries.push(entry);
        }
    }

    entries
}

fn parse_line(line: &str, probe: &dyn BlockDeviceProbe) -> Option<MountEntry> {
    let Some((major, minor, mount_point)) = scan_fields(line) else {
        tracing::warn!("Error parsing mount line '{line}'");
        return None;
    };

    let device = if major == 0 {
        btrfs_device(line, probe)?
    } else {
        DeviceNumber::from_parts(major, minor)
    };

    Some(MountEntry::new(
        device,
        decode_octal_escapes(mount_point),
        MountKind::Filesystem,
    ))
}

/// Pull the device number halves and the encoded mount point out of a line.
///
/// The mount id and parent id must scan as integers even though nothing here
/// uses them; a line that cannot provide all five leading fields is
/// malformed.
fn scan_fields(line: &str) -> Option<(u64, u64, &str)> {
    let mut fields = line.split_whitespace();
    let mount_id = fields.next()?;
    let parent_id = fields.next()?;
    let device = fields.next()?;
    let _root = fields.next()?;
    let mount_point = fields.next()?;

    mount_id.parse::<u32>().ok()?;
    parent_id.parse::<u32>().ok()?;

    let (major, minor) = device.split_once(':')?;
    Some((major.parse().ok()?, minor.parse().ok()?, mount_point))
}

/// Recover the real block device behind a btrfs mount.
///
/// Btrfs mounts carry an anonymous `0:N` device in the table; the mount
/// source after the separator names the device node that actually backs
/// them.
fn btrfs_device(line: &str, probe: &dyn BlockDeviceProbe) -> Option<DeviceNumber> {
    let (_, superblock) = line.split_once(OPTIONAL_FIELDS_END)?;

    let mut fields = superblock.split_whitespace();
    let (Some(fstype), Some(source)) = (fields.next(), fields.next()) else {
        tracing::warn!("Error parsing superblock fields of '{line}'");
        return None;
    };

    if fstype != "btrfs" || !source.starts_with("/dev/") {
        return None;
    }

    let source = decode_octal_escapes(source);
    match probe.block_rdev(&source) {
        Ok(Some(device)) => Some(device),
        Ok(None) => {
            tracing::warn!("{source} is not a block device");
            None
        }
        Err(e) => {
            tracing::warn!("Error statting {source}: {e}");
            None
        }
    }
}

/// Decode the octal back-slash escapes the kernel applies to table fields
/// (`\040` space, `\011` tab, `\012` newline, `\134` backslash).
///
/// A backslash not followed by an octal digit is dropped and the next
/// character kept as-is. Decoding works on bytes; invalid UTF-8 degrades
/// lossily rather than failing the line.
fn decode_octal_escapes(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'\\' || i + 1 >= bytes.len() {
            out.push(bytes[i]);
            i += 1;
            continue;
        }

        let mut value = 0u32;
        let mut digits = 0;
        while digits < 3 && i + 1 + digits < bytes.len() {
            let b = bytes[i + 1 + digits];
            if !matches!(b, b'0'..=b'7') {
                break;
            }
            value = value * 8 + u32::from(b - b'0');
            digits += 1;
        }

        if digits > 0 {
            out.push(value as u8);
            i += 1 + digits;
        } else {
            out.push(bytes[i + 1]);
            i += 2;
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}
