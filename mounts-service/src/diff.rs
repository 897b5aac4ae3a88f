// SPDX-License-Identifier: GPL-3.0-only

//! Snapshot difference computation

use std::cmp::Ordering;

use mounts_types::MountEntry;

/// Mounts that appeared and disappeared between two snapshots.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MountDiff {
    pub added: Vec<MountEntry>,
    pub removed: Vec<MountEntry>,
}

impl MountDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Compare two mount snapshots.
///
/// Both sides are sorted internally, so callers may pass snapshots in table
/// order and the result does not depend on input ordering. Entries equal
/// under the `MountEntry` total order count as unchanged and land in neither
/// bucket.
pub fn diff_mounts(old: &[MountEntry], new: &[MountEntry]) -> MountDiff {
    let mut old = old.to_vec();
    let mut new = new.to_vec();
    old.sort_unstable();
    new.sort_unstable();

    let mut diff = MountDiff::default();
    let (mut i, mut j) = (0, 0);

    while i < old.len() && j < new.len() {
        match old[i].cmp(&new[j]) {
            Ordering::Less => {
                diff.removed.push(old[i].clone());
                i += 1;
            }
            Ordering::Greater => {
                diff.added.push(new[j].clone());
                j += 1;
            }
            Ordering::Equal => {
                i += 1;
                j += 1;
            }
        }
    }
    diff.removed.extend_from_slice(&old[i..]);
    diff.added.extend_from_slice(&new[j..]);

    diff
}
