//! Block consistency audit.
//!
//! Walks every file and directory inode's 15-slot block pointer list,
//! following the single/double/triple indirect chains through the snapshot's
//! indirect-slot records, and accumulates an owner list per referenced block.
//! A block's first owner is only reported once a second claimant appears, so
//! a block referenced exactly once never produces a duplicate line. After the
//! scan, blocks from the lowest referenced data block upward are checked
//! against the free-block set in both directions.

use crate::finding::{BlockOwner, BlockRef, Finding, RefKind};
use fsa_types::{
    BlockNumber, Inode, InodeNumber, Snapshot, DIRECT_BLOCK_SLOTS, DOUBLE_INDIRECT_OFFSET,
    SINGLE_INDIRECT_OFFSET, TRIPLE_INDIRECT_OFFSET,
};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Slot index and diagnostic kind for each indirect root in the pointer list.
const INDIRECT_ROOTS: [(usize, RefKind, u32); 3] = [
    (12, RefKind::SingleIndirect, SINGLE_INDIRECT_OFFSET),
    (13, RefKind::DoubleIndirect, DOUBLE_INDIRECT_OFFSET),
    (14, RefKind::TripleIndirect, TRIPLE_INDIRECT_OFFSET),
];

/// Audit every block reference in the snapshot.
///
/// Findings come out in traversal order: inode-table order with each inode's
/// direct slots first and indirect chains in slot order, then the
/// unreferenced-block scan ascending, then allocated-on-freelist ascending.
#[must_use]
pub fn audit_blocks(snapshot: &Snapshot) -> Vec<Finding> {
    let mut audit = BlockAudit::new(snapshot);
    for inode in &snapshot.inodes {
        audit.scan_inode(inode);
    }
    audit.scan_unreferenced();
    audit.scan_freelist();
    audit.findings
}

/// Accumulator state threaded through the traversal.
struct BlockAudit<'a> {
    snapshot: &'a Snapshot,
    total_blocks: u32,
    /// Block number to its claimants; position 0 is the first owner.
    owners: BTreeMap<BlockNumber, Vec<BlockOwner>>,
    /// Lowest valid data block reference seen so far. Lower bound of the
    /// unreferenced scan; a heuristic, since the true lowest data block may
    /// itself be unreferenced.
    first_data_block: Option<BlockNumber>,
    findings: Vec<Finding>,
}

impl<'a> BlockAudit<'a> {
    fn new(snapshot: &'a Snapshot) -> Self {
        let group = &snapshot.group;
        let mut owners: BTreeMap<BlockNumber, Vec<BlockOwner>> = BTreeMap::new();
        // Group-0 metadata blocks claim ownership before any inode is scanned.
        owners.insert(
            group.free_block_bitmap,
            vec![BlockOwner::FreeBlockBitmap {
                group: group.group_no,
            }],
        );
        owners.insert(
            group.free_inode_bitmap,
            vec![BlockOwner::FreeInodeBitmap {
                group: group.group_no,
            }],
        );
        owners.insert(
            group.inode_table,
            vec![BlockOwner::InodeTable {
                group: group.group_no,
            }],
        );

        Self {
            snapshot,
            total_blocks: snapshot.superblock.total_blocks,
            owners,
            first_data_block: None,
            findings: Vec::new(),
        }
    }

    fn scan_inode(&mut self, inode: &Inode) {
        if !inode.file_type.has_block_list() {
            return;
        }

        for (slot, &block) in inode
            .block_addresses
            .iter()
            .take(DIRECT_BLOCK_SLOTS)
            .enumerate()
        {
            self.check(inode.ino, slot as u32, block, RefKind::Direct);
        }

        for (slot, kind, offset) in INDIRECT_ROOTS {
            if let Some(&root) = inode.block_addresses.get(slot) {
                if self.check(inode.ino, offset, root, kind) {
                    self.walk_indirect(inode.ino, kind.depth(), root);
                }
            }
        }
    }

    /// Follow the indirect chain below `holder`, one level at a time.
    ///
    /// Every slot's pointer is validated as a plain block reference at its
    /// logical offset; only valid non-leaf pointers are recursed into.
    fn walk_indirect(&mut self, ino: InodeNumber, level: u8, holder: BlockNumber) {
        let snapshot = self.snapshot;
        for slot in snapshot.indirect_slots(ino, level, holder) {
            let valid = self.check(ino, slot.logical_offset, slot.block, RefKind::Direct);
            if valid && level > 1 {
                self.walk_indirect(ino, level - 1, slot.block);
            }
        }
    }

    /// Validate one block reference. Returns true when the reference is a
    /// real, in-range, non-reserved block (ownership registered), which is
    /// the condition for recursing into it.
    fn check(&mut self, ino: InodeNumber, offset: u32, block: BlockNumber, kind: RefKind) -> bool {
        if block.is_hole() {
            return false;
        }

        let block_ref = BlockRef {
            kind,
            block,
            ino,
            offset,
        };

        if block.0 >= self.total_blocks {
            self.findings.push(Finding::InvalidBlock(block_ref));
            return false;
        }
        if block.is_reserved() {
            self.findings.push(Finding::ReservedBlock(block_ref));
            return false;
        }

        match self.owners.entry(block) {
            Entry::Occupied(mut entry) => {
                let claimants = entry.get_mut();
                if claimants.len() == 1 {
                    // Second claimant: the first owner is reported now, once.
                    self.findings.push(Finding::Duplicate(claimants[0]));
                }
                self.findings
                    .push(Finding::Duplicate(BlockOwner::Ref(block_ref)));
                claimants.push(BlockOwner::Ref(block_ref));
            }
            Entry::Vacant(entry) => {
                entry.insert(vec![BlockOwner::Ref(block_ref)]);
            }
        }

        self.first_data_block = Some(match self.first_data_block {
            Some(current) => current.min(block),
            None => block,
        });
        true
    }

    /// Blocks between the lowest referenced data block and the end of the
    /// volume must be owned or free.
    fn scan_unreferenced(&mut self) {
        let Some(first) = self.first_data_block else {
            return;
        };
        for number in first.0..self.total_blocks {
            let block = BlockNumber(number);
            if !self.owners.contains_key(&block) && !self.snapshot.free_blocks.contains(&block) {
                self.findings.push(Finding::UnreferencedBlock(block));
            }
        }
    }

    /// Owned blocks must not sit on the free list.
    fn scan_freelist(&mut self) {
        for &block in self.owners.keys() {
            if self.snapshot.free_blocks.contains(&block) {
                self.findings.push(Finding::AllocatedBlockOnFreelist(block));
            }
        }
    }
}
