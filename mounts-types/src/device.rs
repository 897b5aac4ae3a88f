// SPDX-License-Identifier: GPL-3.0-only

//! Linux device number handling

use std::fmt;

use serde::{Deserialize, Serialize};

/// A Linux `dev_t` in the glibc 64-bit encoding.
///
/// Mount table lines carry the number as `major:minor`; stat calls return the
/// raw encoded value. Both forms convert losslessly through this type, also
/// for majors above the legacy 8-bit range (NVMe uses 259).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceNumber(u64);

impl DeviceNumber {
    /// Build from the `major:minor` pair reported by the kernel.
    pub fn from_parts(major: u64, minor: u64) -> Self {
        Self(
            (minor & 0xff)
                | ((major & 0xfff) << 8)
                | ((minor & !0xff) << 12)
                | ((major & !0xfff) << 32),
        )
    }

    /// Wrap a raw `dev_t` value, e.g. `st_rdev` from a stat call.
    pub fn from_raw(dev: u64) -> Self {
        Self(dev)
    }

    pub fn major(self) -> u64 {
        ((self.0 >> 32) & 0xffff_f000) | ((self.0 >> 8) & 0x0000_0fff)
    }

    pub fn minor(self) -> u64 {
        ((self.0 >> 12) & 0xffff_ff00) | (self.0 & 0x0000_00ff)
    }

    pub fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DeviceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.major(), self.minor())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_major_minor() {
        let sda1 = DeviceNumber::from_parts(8, 1);
        assert_eq!(sda1.major(), 8);
        assert_eq!(sda1.minor(), 1);
        assert_eq!(sda1.as_raw(), 0x801);

        let nvme = DeviceNumber::from_parts(259, 3);
        assert_eq!(nvme.major(), 259);
        assert_eq!(nvme.minor(), 3);

        let wide = DeviceNumber::from_parts(0x1fff, 0xf_ffff);
        assert_eq!(wide.major(), 0x1fff);
        assert_eq!(wide.minor(), 0xf_ffff);
    }

    #[test]
    fn raw_value_round_trips() {
        let dev = DeviceNumber::from_parts(254, 17);
        assert_eq!(DeviceNumber::from_raw(dev.as_raw()), dev);
    }

    #[test]
    fn displays_as_major_minor() {
        assert_eq!(DeviceNumber::from_parts(8, 17).to_string(), "8:17");
        assert_eq!(DeviceNumber::from_parts(0, 25).to_string(), "0:25");
    }

    #[test]
    fn orders_by_raw_value() {
        let a = DeviceNumber::from_parts(8, 1);
        let b = DeviceNumber::from_parts(8, 2);
        assert!(a < b);
    }
}
