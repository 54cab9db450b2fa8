//! Directory structure audit.
//!
//! Three scans over the directory entries, each in report order: entry
//! targets must be valid allocated inodes; recomputed hard-link counts must
//! match stored link counts; `'.'` must self-reference and `'..'` must agree
//! with the parent relationships reconstructed from the non-dot entries.

use crate::finding::Finding;
use fsa_types::{InodeNumber, Snapshot};
use std::collections::{BTreeSet, HashMap};

/// Audit directory entries against the snapshot and the allocated-inode set
/// produced by the inode allocation audit.
#[must_use]
pub fn audit_directories(snapshot: &Snapshot, allocated: &BTreeSet<InodeNumber>) -> Vec<Finding> {
    let mut findings = Vec::new();
    let total_inodes = snapshot.superblock.total_inodes;

    // Every entry must point at a valid, allocated inode.
    for entry in &snapshot.dirents {
        if entry.target.0 < 1 || entry.target.0 > total_inodes {
            findings.push(Finding::InvalidDirTarget {
                parent: entry.parent,
                name: entry.name.clone(),
                target: entry.target,
            });
        } else if !allocated.contains(&entry.target) {
            findings.push(Finding::UnallocatedDirTarget {
                parent: entry.parent,
                name: entry.name.clone(),
                target: entry.target,
            });
        }
    }

    // Recount hard links; every entry counts, `'.'` and `'..'` included.
    let mut counted: HashMap<InodeNumber, u32> = HashMap::new();
    for entry in &snapshot.dirents {
        *counted.entry(entry.target).or_insert(0) += 1;
    }
    for inode in &snapshot.inodes {
        match counted.get(&inode.ino) {
            None => findings.push(Finding::LinkCountMismatch {
                ino: inode.ino,
                counted: 0,
                stored: inode.link_count,
            }),
            Some(&links) if links != inode.link_count => {
                findings.push(Finding::LinkCountMismatch {
                    ino: inode.ino,
                    counted: links,
                    stored: inode.link_count,
                });
            }
            Some(_) => {}
        }
    }

    // Reconstruct each directory's true parent from the non-dot entries;
    // root is its own parent. Last writer wins for a given child.
    let mut parent_map: HashMap<InodeNumber, InodeNumber> = HashMap::new();
    parent_map.insert(InodeNumber::ROOT, InodeNumber::ROOT);
    for entry in &snapshot.dirents {
        if !entry.is_dot() && !entry.is_dot_dot() {
            parent_map.insert(entry.target, entry.parent);
        }
    }

    for entry in &snapshot.dirents {
        if entry.is_dot() {
            if entry.parent != entry.target {
                findings.push(Finding::WrongDotLink {
                    parent: entry.parent,
                    target: entry.target,
                });
            }
        } else if entry.is_dot_dot() {
            // The mismatch test compares the target against the target's
            // reconstructed parent, while the printed expectation is the
            // entry parent's reconstructed parent. Inherited verbatim from
            // the reference checker; a target missing from the map counts as
            // a mismatch rather than aborting the scan.
            if parent_map.get(&entry.target) != Some(&entry.target) {
                let expected = parent_map
                    .get(&entry.parent)
                    .copied()
                    .unwrap_or(entry.parent);
                findings.push(Finding::WrongDotDotLink {
                    parent: entry.parent,
                    target: entry.target,
                    expected,
                });
            }
        }
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture;
    use fsa_types::FileType;

    fn lines(findings: &[Finding]) -> Vec<String> {
        findings.iter().map(ToString::to_string).collect()
    }

    fn allocated(snapshot: &Snapshot) -> BTreeSet<InodeNumber> {
        snapshot.inodes.iter().map(|inode| inode.ino).collect()
    }

    /// Root directory with correct dot entries and link count 2.
    fn rooted_snapshot() -> Snapshot {
        let mut snapshot = fixture::snapshot();
        snapshot
            .inodes
            .push(fixture::inode(2, FileType::Directory, 2, &[]));
        snapshot.dirents.push(fixture::dirent(2, 0, 2, "'.'"));
        snapshot.dirents.push(fixture::dirent(2, 12, 2, "'..'"));
        snapshot
    }

    #[test]
    fn consistent_tree_is_clean() {
        let mut snapshot = rooted_snapshot();
        snapshot
            .inodes
            .push(fixture::inode(12, FileType::Directory, 2, &[]));
        // Root gains a third link from 12's '..'.
        snapshot.inodes[0].link_count = 3;
        snapshot.dirents.push(fixture::dirent(2, 24, 12, "'sub'"));
        snapshot.dirents.push(fixture::dirent(12, 0, 12, "'.'"));
        snapshot.dirents.push(fixture::dirent(12, 12, 2, "'..'"));

        let set = allocated(&snapshot);
        assert!(audit_directories(&snapshot, &set).is_empty());
    }

    #[test]
    fn out_of_range_target_is_invalid() {
        let mut snapshot = rooted_snapshot();
        snapshot.inodes[0].link_count = 2;
        snapshot.dirents.push(fixture::dirent(2, 24, 26, "'botch'"));
        // total_inodes is 24, so 26 is out of range; 0 is too.
        snapshot.dirents.push(fixture::dirent(2, 36, 0, "'null'"));

        let set = allocated(&snapshot);
        let findings = audit_directories(&snapshot, &set);
        assert_eq!(
            lines(&findings),
            vec![
                "DIRECTORY INODE 2 NAME 'botch' INVALID INODE 26",
                "DIRECTORY INODE 2 NAME 'null' INVALID INODE 0",
            ]
        );
    }

    #[test]
    fn in_range_unallocated_target_is_reported() {
        let mut snapshot = rooted_snapshot();
        snapshot.dirents.push(fixture::dirent(2, 24, 17, "'lost'"));

        let set = allocated(&snapshot);
        let findings = audit_directories(&snapshot, &set);
        assert_eq!(
            lines(&findings),
            vec!["DIRECTORY INODE 2 NAME 'lost' UNALLOCATED INODE 17"]
        );
    }

    #[test]
    fn link_count_recount_includes_dot_entries() {
        // Root has '.', '..', and a subdirectory entry naming it; stored
        // count says 2.
        let mut snapshot = rooted_snapshot();
        snapshot
            .inodes
            .push(fixture::inode(12, FileType::Directory, 2, &[]));
        snapshot.dirents.push(fixture::dirent(2, 24, 12, "'sub'"));
        snapshot.dirents.push(fixture::dirent(12, 0, 12, "'.'"));
        snapshot.dirents.push(fixture::dirent(12, 12, 2, "'..'"));

        let set = allocated(&snapshot);
        let findings = audit_directories(&snapshot, &set);
        assert_eq!(
            lines(&findings),
            vec!["INODE 2 HAS 3 LINKS BUT LINKCOUNT IS 2"]
        );
    }

    #[test]
    fn zero_link_inode_is_reported() {
        let mut snapshot = rooted_snapshot();
        snapshot
            .inodes
            .push(fixture::inode(13, FileType::RegularFile, 1, &[]));

        let set = allocated(&snapshot);
        let findings = audit_directories(&snapshot, &set);
        assert_eq!(
            lines(&findings),
            vec!["INODE 13 HAS 0 LINKS BUT LINKCOUNT IS 1"]
        );
    }

    #[test]
    fn dot_must_self_reference() {
        let mut snapshot = rooted_snapshot();
        snapshot
            .inodes
            .push(fixture::inode(12, FileType::Directory, 2, &[]));
        snapshot.inodes[0].link_count = 3;
        snapshot.dirents.push(fixture::dirent(2, 24, 12, "'sub'"));
        // 12's '.' wrongly points at root.
        snapshot.dirents.push(fixture::dirent(12, 0, 2, "'.'"));
        snapshot.dirents.push(fixture::dirent(12, 12, 2, "'..'"));
        snapshot.inodes[0].link_count = 4;
        snapshot.inodes[1].link_count = 1;

        let set = allocated(&snapshot);
        let findings = audit_directories(&snapshot, &set);
        assert_eq!(
            lines(&findings),
            vec!["DIRECTORY INODE 12 NAME '.' LINK TO INODE 2 SHOULD BE 12"]
        );
    }

    #[test]
    fn dot_dot_expected_parent_comes_from_the_entry_parent() {
        // Directory 12 (child of root) has '..' pointing at directory 5,
        // whose true parent is root. The expected value printed is the
        // reconstructed parent of 12, not of 5.
        let mut snapshot = rooted_snapshot();
        // Root is named by its own dot entries plus 5's '..' only, since
        // 12's '..' is the broken link under test.
        snapshot.inodes[0].link_count = 3;
        snapshot
            .inodes
            .push(fixture::inode(5, FileType::Directory, 3, &[]));
        snapshot
            .inodes
            .push(fixture::inode(12, FileType::Directory, 2, &[]));
        snapshot.dirents.push(fixture::dirent(2, 24, 5, "'five'"));
        snapshot.dirents.push(fixture::dirent(2, 36, 12, "'sub'"));
        snapshot.dirents.push(fixture::dirent(5, 0, 5, "'.'"));
        snapshot.dirents.push(fixture::dirent(5, 12, 2, "'..'"));
        snapshot.dirents.push(fixture::dirent(12, 0, 12, "'.'"));
        snapshot.dirents.push(fixture::dirent(12, 12, 5, "'..'"));
        snapshot.inodes[1].link_count = 3;

        let set = allocated(&snapshot);
        let findings = audit_directories(&snapshot, &set);
        assert_eq!(
            lines(&findings),
            vec!["DIRECTORY INODE 12 NAME '..' LINK TO INODE 5 SHOULD BE 2"]
        );
    }

    #[test]
    fn root_dot_dot_points_at_itself() {
        let snapshot = rooted_snapshot();
        let set = allocated(&snapshot);
        assert!(audit_directories(&snapshot, &set).is_empty());
    }

    #[test]
    fn dot_dot_target_missing_from_parent_map_is_a_mismatch() {
        // '..' points at 20, which never appears as a non-dot child and is
        // not root, so the reconstructed map knows nothing about it.
        let mut snapshot = rooted_snapshot();
        snapshot.inodes[0].link_count = 1;
        snapshot
            .inodes
            .push(fixture::inode(20, FileType::RegularFile, 1, &[]));
        snapshot.dirents.pop();
        snapshot.dirents.push(fixture::dirent(2, 12, 20, "'..'"));

        let set = allocated(&snapshot);
        let findings = audit_directories(&snapshot, &set);
        assert_eq!(
            lines(&findings),
            vec!["DIRECTORY INODE 2 NAME '..' LINK TO INODE 20 SHOULD BE 2"]
        );
    }
}
