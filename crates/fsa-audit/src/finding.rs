//! Audit finding taxonomy.
//!
//! Every inconsistency an audit pass can detect is one [`Finding`] variant,
//! and its `Display` impl is the finding's literal diagnostic line. The line
//! formats are an observable contract: downstream tooling compares transcripts
//! byte for byte, so nothing here may reword or reorder a field.

use fsa_types::{BlockNumber, InodeNumber};
use std::fmt;

/// Indirection depth of a block reference, selecting the diagnostic tag.
///
/// Only the three indirect root slots carry a tagged description; pointers
/// found inside indirect blocks are reported with the plain `BLOCK` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    Direct,
    SingleIndirect,
    DoubleIndirect,
    TripleIndirect,
}

impl RefKind {
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::Direct => "",
            Self::SingleIndirect => "INDIRECT ",
            Self::DoubleIndirect => "DOUBLE INDIRECT ",
            Self::TripleIndirect => "TRIPLE INDIRECT ",
        }
    }

    /// Levels of indirection below a root of this kind.
    #[must_use]
    pub fn depth(self) -> u8 {
        match self {
            Self::Direct => 0,
            Self::SingleIndirect => 1,
            Self::DoubleIndirect => 2,
            Self::TripleIndirect => 3,
        }
    }
}

/// One block reference made by an inode: the pointer value, who made it, and
/// at which file-relative block offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRef {
    pub kind: RefKind,
    pub block: BlockNumber,
    pub ino: InodeNumber,
    pub offset: u32,
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}BLOCK {} IN INODE {} AT OFFSET {}",
            self.kind.tag(),
            self.block,
            self.ino,
            self.offset
        )
    }
}

/// A claimant of a block: either a group-0 metadata structure registered
/// before the inode scan, or an inode's block reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOwner {
    FreeBlockBitmap { group: u32 },
    FreeInodeBitmap { group: u32 },
    InodeTable { group: u32 },
    Ref(BlockRef),
}

impl fmt::Display for BlockOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FreeBlockBitmap { group } => write!(f, "FREE BLOCK BITMAP FOR GROUP {group}"),
            Self::FreeInodeBitmap { group } => write!(f, "FREE INODE BITMAP FOR GROUP {group}"),
            Self::InodeTable { group } => write!(f, "INODE TABLE FOR GROUP {group}"),
            Self::Ref(block_ref) => block_ref.fmt(f),
        }
    }
}

/// One audit inconsistency. `Display` yields the exact diagnostic line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    /// Block reference outside `[0, total_blocks)`.
    InvalidBlock(BlockRef),
    /// Block reference into the reserved boot/superblock/descriptor region.
    ReservedBlock(BlockRef),
    /// A block claimed by more than one owner. The first owner's description
    /// is emitted once, when the second claimant appears; after that every
    /// claimant (including the new one) gets its own line.
    Duplicate(BlockOwner),
    /// In-range data block with no owner that is also missing from the
    /// free-block set.
    UnreferencedBlock(BlockNumber),
    /// Block with an owner that also sits on the free-block set.
    AllocatedBlockOnFreelist(BlockNumber),
    /// Inode present in the inode table and in the free-inode set.
    AllocatedInodeOnFreelist(InodeNumber),
    /// Legal inode number found in neither the table nor the free-inode set.
    UnallocatedInodeNotOnFreelist(InodeNumber),
    /// Directory entry whose target is outside `[1, total_inodes]`.
    InvalidDirTarget {
        parent: InodeNumber,
        name: String,
        target: InodeNumber,
    },
    /// Directory entry whose in-range target is not an allocated inode.
    UnallocatedDirTarget {
        parent: InodeNumber,
        name: String,
        target: InodeNumber,
    },
    /// Recomputed hard-link count disagrees with the stored one.
    LinkCountMismatch {
        ino: InodeNumber,
        counted: u32,
        stored: u32,
    },
    /// A `'.'` entry that does not reference its containing directory.
    WrongDotLink {
        parent: InodeNumber,
        target: InodeNumber,
    },
    /// A `'..'` entry whose target fails the reconstructed-parent check.
    WrongDotDotLink {
        parent: InodeNumber,
        target: InodeNumber,
        expected: InodeNumber,
    },
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidBlock(block_ref) => write!(f, "INVALID {block_ref}"),
            Self::ReservedBlock(block_ref) => write!(f, "RESERVED {block_ref}"),
            Self::Duplicate(owner) => write!(f, "DUPLICATE {owner}"),
            Self::UnreferencedBlock(block) => write!(f, "UNREFERENCED BLOCK {block}"),
            Self::AllocatedBlockOnFreelist(block) => {
                write!(f, "ALLOCATED BLOCK {block} ON FREELIST")
            }
            Self::AllocatedInodeOnFreelist(ino) => {
                write!(f, "ALLOCATED INODE {ino} ON FREELIST")
            }
            Self::UnallocatedInodeNotOnFreelist(ino) => {
                write!(f, "UNALLOCATED INODE {ino} NOT ON FREELIST")
            }
            Self::InvalidDirTarget {
                parent,
                name,
                target,
            } => write!(f, "DIRECTORY INODE {parent} NAME {name} INVALID INODE {target}"),
            Self::UnallocatedDirTarget {
                parent,
                name,
                target,
            } => write!(
                f,
                "DIRECTORY INODE {parent} NAME {name} UNALLOCATED INODE {target}"
            ),
            Self::LinkCountMismatch {
                ino,
                counted,
                stored,
            } => write!(f, "INODE {ino} HAS {counted} LINKS BUT LINKCOUNT IS {stored}"),
            Self::WrongDotLink { parent, target } => write!(
                f,
                "DIRECTORY INODE {parent} NAME '.' LINK TO INODE {target} SHOULD BE {parent}"
            ),
            Self::WrongDotDotLink {
                parent,
                target,
                expected,
            } => write!(
                f,
                "DIRECTORY INODE {parent} NAME '..' LINK TO INODE {target} SHOULD BE {expected}"
            ),
        }
    }
}
