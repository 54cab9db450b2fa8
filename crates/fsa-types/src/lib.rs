#![forbid(unsafe_code)]
//! Canonical in-memory model of one filesystem metadata snapshot.
//!
//! A snapshot is produced once by the ingestion layer (`fsa-report`) and is
//! never mutated afterwards; the audit passes in `fsa-audit` consume it
//! read-only. Numbers are ext2-width: block and inode numbers are `u32`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Number of direct block pointer slots in an inode.
pub const DIRECT_BLOCK_SLOTS: usize = 12;
/// Total block address slots in an inode (12 direct + 3 indirect roots).
pub const BLOCK_ADDRESS_SLOTS: usize = 15;

/// Logical block offset of the first block reachable through the
/// single-indirect root (slot 12).
pub const SINGLE_INDIRECT_OFFSET: u32 = 12;
/// Logical block offset of the first block reachable through the
/// double-indirect root (slot 13): 12 + 256.
pub const DOUBLE_INDIRECT_OFFSET: u32 = 268;
/// Logical block offset of the first block reachable through the
/// triple-indirect root (slot 14): 12 + 256 + 256².
pub const TRIPLE_INDIRECT_OFFSET: u32 = 65804;

/// Highest block number in the reserved boot/superblock/descriptor region.
/// Blocks in `(0, 3]` are never legal data blocks.
pub const RESERVED_BLOCK_MAX: u32 = 3;

/// Directory entry names as they appear in the report stream: the extraction
/// side wraps every name in single quotes, so the self and parent links are
/// matched against the quoted literals.
pub const DOT: &str = "'.'";
pub const DOT_DOT: &str = "'..'";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockNumber(pub u32);

impl BlockNumber {
    /// True for blocks in the reserved region `(0, 3]`.
    #[must_use]
    pub fn is_reserved(self) -> bool {
        self.0 > 0 && self.0 <= RESERVED_BLOCK_MAX
    }

    /// A zero pointer slot is a sparse hole, not a reference.
    #[must_use]
    pub fn is_hole(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for BlockNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InodeNumber(pub u32);

impl InodeNumber {
    /// The root directory. Always a legal allocation target, even when the
    /// superblock's first non-reserved inode boundary sits above it.
    pub const ROOT: Self = Self(2);
}

impl fmt::Display for InodeNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Inode file type, decoded from the single-character tag in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileType {
    RegularFile,
    Directory,
    Symlink,
    /// Any other tag (device nodes, fifos, unknown types). Carried verbatim;
    /// these inodes hold no block list to walk.
    Other(char),
}

impl FileType {
    #[must_use]
    pub fn from_tag(tag: char) -> Self {
        match tag {
            'f' => Self::RegularFile,
            'd' => Self::Directory,
            's' => Self::Symlink,
            other => Self::Other(other),
        }
    }

    /// Only regular files and directories carry a walkable 15-slot block
    /// pointer list.
    #[must_use]
    pub fn has_block_list(self) -> bool {
        matches!(self, Self::RegularFile | Self::Directory)
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Self::RegularFile => 'f',
            Self::Directory => 'd',
            Self::Symlink => 's',
            Self::Other(c) => *c,
        };
        write!(f, "{tag}")
    }
}

/// Filesystem-wide geometry from the superblock record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Superblock {
    pub total_blocks: u32,
    pub total_inodes: u32,
    pub block_size: u32,
    pub inode_size: u32,
    pub blocks_per_group: u32,
    pub inodes_per_group: u32,
    pub first_non_reserved_inode: InodeNumber,
}

/// Block group descriptor. Current scope covers group 0 only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub group_no: u32,
    pub block_count: u32,
    pub inode_count: u32,
    pub free_block_count: u32,
    pub free_inode_count: u32,
    pub free_block_bitmap: BlockNumber,
    pub free_inode_bitmap: BlockNumber,
    pub inode_table: BlockNumber,
}

/// One inode table entry.
///
/// Everything except `ino`, `file_type`, `link_count`, and `block_addresses`
/// is opaque metadata: carried through for completeness but never audited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inode {
    pub ino: InodeNumber,
    pub file_type: FileType,
    pub mode: String,
    pub owner: u32,
    pub group: u32,
    pub link_count: u32,
    pub ctime: String,
    pub mtime: String,
    pub atime: String,
    pub size: u64,
    pub block_count: u32,
    /// 15 slots (12 direct, then single/double/triple indirect roots) for
    /// files and directories; fast symlinks may carry a single slot and
    /// other types none. A zero entry is a sparse hole.
    pub block_addresses: Vec<BlockNumber>,
}

/// One directory entry (hard link) inside a parent directory's data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub parent: InodeNumber,
    /// Byte position of this entry within the parent's data.
    pub byte_offset: u64,
    pub target: InodeNumber,
    pub entry_len: u32,
    pub name_len: u32,
    /// Name verbatim from the report, including the surrounding quotes.
    pub name: String,
}

impl DirEntry {
    #[must_use]
    pub fn is_dot(&self) -> bool {
        self.name == DOT
    }

    #[must_use]
    pub fn is_dot_dot(&self) -> bool {
        self.name == DOT_DOT
    }
}

/// One pointer slot inside an indirect block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndirectRecord {
    /// Inode that owns the indirect chain.
    pub ino: InodeNumber,
    /// Indirection level of the block holding this slot: 1, 2, or 3.
    pub level: u8,
    /// File-relative block index this slot ultimately maps to.
    pub logical_offset: u32,
    /// Block that contains this pointer slot.
    pub indirect_block: BlockNumber,
    /// Value stored in the slot: a data block at level 1, a deeper indirect
    /// block otherwise.
    pub block: BlockNumber,
}

/// Immutable point-in-time view of one filesystem's metadata.
///
/// Free sets are deduplicated and ordered; inode, directory-entry, and
/// indirect rows keep report order, which the audit passes treat as an
/// observable contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub superblock: Superblock,
    pub group: Group,
    pub free_blocks: BTreeSet<BlockNumber>,
    pub free_inodes: BTreeSet<InodeNumber>,
    pub inodes: Vec<Inode>,
    pub dirents: Vec<DirEntry>,
    pub indirects: Vec<IndirectRecord>,
}

impl Snapshot {
    /// Indirect pointer slots owned by `ino` that live at `level` inside the
    /// indirect block `holder`, in report order.
    pub fn indirect_slots(
        &self,
        ino: InodeNumber,
        level: u8,
        holder: BlockNumber,
    ) -> impl Iterator<Item = &IndirectRecord> {
        self.indirects
            .iter()
            .filter(move |r| r.ino == ino && r.level == level && r.indirect_block == holder)
    }
}
