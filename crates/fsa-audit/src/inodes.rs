//! Inode allocation audit.
//!
//! Cross-checks the inode table against the free-inode set in both
//! directions. The allocated set is returned for the directory audit.

use crate::finding::Finding;
use fsa_types::{InodeNumber, Snapshot};
use std::collections::BTreeSet;

/// Audit inode allocation state.
///
/// Emits `ALLOCATED INODE ... ON FREELIST` for every inode present in both
/// the table and the free set, then `UNALLOCATED INODE ... NOT ON FREELIST`
/// for every legal inode number accounted for by neither. Both groups come
/// out in ascending inode order. The legal range is
/// `[first_non_reserved_inode, total_inodes]` plus the root inode, which is
/// always a legal target wherever the reserved boundary sits.
#[must_use]
pub fn audit_inode_allocation(snapshot: &Snapshot) -> (Vec<Finding>, BTreeSet<InodeNumber>) {
    let allocated: BTreeSet<InodeNumber> = snapshot.inodes.iter().map(|inode| inode.ino).collect();
    let mut findings = Vec::new();

    for &ino in allocated.intersection(&snapshot.free_inodes) {
        findings.push(Finding::AllocatedInodeOnFreelist(ino));
    }

    let first = snapshot.superblock.first_non_reserved_inode.0;
    let mut legal: BTreeSet<InodeNumber> = (first..=snapshot.superblock.total_inodes)
        .map(InodeNumber)
        .collect();
    legal.insert(InodeNumber::ROOT);

    for ino in legal {
        if !allocated.contains(&ino) && !snapshot.free_inodes.contains(&ino) {
            findings.push(Finding::UnallocatedInodeNotOnFreelist(ino));
        }
    }

    (findings, allocated)
}
